//! `victoweb` command line entry point.
//!
//! # Responsibility
//! - Resolve settings from flags layered over the environment.
//! - Run migrations, the HTTP server and the admin seeding commands.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use log::info;
use victoweb_core::config::{ENV_DATABASE, ENV_LISTEN, ENV_LOG_DIR, ENV_LOG_LEVEL, ENV_TIME_ZONE};
use victoweb_core::db::migrations::migration_status;
use victoweb_core::repo::account_repo::SqliteAccountRepository;
use victoweb_core::service::account_service::AccountService;
use victoweb_core::service::admin_seed::{
    create_admin_batch, seed_named_admins, AdminBatchOptions, NamedAdminOptions,
    DEFAULT_ADMIN_DOMAIN, DEFAULT_BATCH_COUNT, DEFAULT_BATCH_PREFIX,
};
use victoweb_core::{init_console_logging, init_logging, now_millis, open_db, Settings};
use victoweb_web::AppState;

#[derive(Debug, Parser)]
#[command(name = "victoweb", version, about = "VictoWeb student portal")]
struct Cli {
    /// SQLite database file.
    #[arg(long, global = true, env = ENV_DATABASE)]
    database: Option<String>,
    #[arg(long, global = true, env = ENV_LOG_LEVEL)]
    log_level: Option<String>,
    /// Write rolling log files here instead of stderr.
    #[arg(long, global = true, env = ENV_LOG_DIR)]
    log_dir: Option<String>,
    /// IANA zone used for display times, e.g. `Africa/Cairo`.
    #[arg(long, global = true, env = ENV_TIME_ZONE)]
    time_zone: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Apply pending migrations and print the schema version.
    Migrate,
    /// Migrate, then serve HTTP until Ctrl-C.
    Runserver {
        /// `HOST:PORT` or a bare port.
        addr: Option<String>,
    },
    /// Create numbered staff accounts.
    CreateAdminBatch(BatchArgs),
    /// Create or update the leadership roster.
    SeedNamedAdmins(NamedArgs),
}

#[derive(Debug, Args)]
struct BatchArgs {
    #[arg(long, default_value_t = i64::from(DEFAULT_BATCH_COUNT))]
    count: i64,
    #[arg(long, default_value = DEFAULT_BATCH_PREFIX)]
    prefix: String,
    /// Shared password; random per account when omitted.
    #[arg(long)]
    password: Option<String>,
    #[arg(long, default_value = DEFAULT_ADMIN_DOMAIN)]
    domain: String,
    #[arg(long)]
    dry_run: bool,
}

#[derive(Debug, Args)]
struct NamedArgs {
    #[arg(long)]
    password: Option<String>,
    #[arg(long, default_value = DEFAULT_ADMIN_DOMAIN)]
    domain: String,
    #[arg(long)]
    dry_run: bool,
}

impl Cli {
    /// Settings from the environment with parsed flags layered on top.
    fn settings(&self) -> Result<Settings> {
        Settings::from_env()
            .and_then(|settings| settings.with_overrides(|key| self.flag(key)))
            .context("invalid configuration")
    }

    fn flag(&self, key: &str) -> Option<String> {
        match key {
            ENV_DATABASE => self.database.clone(),
            ENV_LOG_LEVEL => self.log_level.clone(),
            ENV_LOG_DIR => self.log_dir.clone(),
            ENV_TIME_ZONE => self.time_zone.clone(),
            ENV_LISTEN => match &self.command {
                Command::Runserver { addr } => addr.clone(),
                _ => None,
            },
            _ => None,
        }
    }
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let settings = cli.settings()?;
    let logging = match &settings.log_dir {
        Some(dir) => init_logging(settings.log_level, &dir.to_string_lossy()),
        None => init_console_logging(settings.log_level),
    };
    logging
        .map_err(anyhow::Error::msg)
        .context("failed to initialize logging")?;

    match cli.command {
        Command::Migrate => migrate(&settings),
        Command::Runserver { .. } => runserver(settings),
        Command::CreateAdminBatch(args) => admin_batch(&settings, args),
        Command::SeedNamedAdmins(args) => named_admins(&settings, args),
    }
}

fn open(settings: &Settings) -> Result<rusqlite::Connection> {
    open_db(&settings.database_path)
        .with_context(|| format!("failed to open database {}", settings.database_path.display()))
}

fn migrate(settings: &Settings) -> Result<()> {
    let conn = open(settings)?;
    let status = migration_status(&conn).context("failed to read schema version")?;
    println!(
        "database {} at schema version {} (latest {})",
        settings.database_path.display(),
        status.current,
        status.latest
    );
    Ok(())
}

fn runserver(settings: Settings) -> Result<()> {
    let conn = open(&settings)?;
    let purged = AccountService::new(SqliteAccountRepository::new(&conn))
        .purge_expired_sessions(now_millis())
        .context("failed to purge expired sessions")?;
    info!("event=session_purge module=cli status=ok purged={}", purged);

    let addr = settings.listen_addr;
    let state = AppState::new(conn, settings);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    runtime
        .block_on(victoweb_web::serve(state, addr))
        .context("server failed")
}

fn admin_batch(settings: &Settings, args: BatchArgs) -> Result<()> {
    let conn = open(settings)?;
    let options = AdminBatchOptions {
        count: args.count,
        prefix: args.prefix,
        password: args.password,
        domain: args.domain,
        dry_run: args.dry_run,
    };
    let report = create_admin_batch(&SqliteAccountRepository::new(&conn), &options)
        .context("create-admin-batch failed")?;

    let verb = if report.dry_run { "Would create" } else { "Created" };
    for credential in &report.created {
        println!("{verb} {} password: {}", credential.username, credential.password_display);
    }
    for username in &report.skipped {
        println!("Skipped existing {username}");
    }
    println!(
        "{} created, {} skipped{}",
        report.created.len(),
        report.skipped.len(),
        if report.dry_run { " (dry run)" } else { "" }
    );
    Ok(())
}

fn named_admins(settings: &Settings, args: NamedArgs) -> Result<()> {
    let conn = open(settings)?;
    let options = NamedAdminOptions {
        password: args.password,
        domain: args.domain,
        dry_run: args.dry_run,
    };
    let report = seed_named_admins(&SqliteAccountRepository::new(&conn), &options)
        .context("seed-named-admins failed")?;

    for username in &report.created {
        println!("Created {username}");
    }
    for username in &report.updated {
        println!("Updated {username}");
    }
    for username in &report.skipped {
        println!("Unchanged {username}");
    }
    if !report.credentials.is_empty() {
        println!("Credentials:");
        for credential in &report.credentials {
            println!("  {} {}", credential.username, credential.password_display);
        }
    }
    println!(
        "{} created, {} updated, {} unchanged{}",
        report.created.len(),
        report.updated.len(),
        report.skipped.len(),
        if report.dry_run { " (dry run)" } else { "" }
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_batch_flags_and_global_options() {
        let cli = Cli::parse_from([
            "victoweb",
            "create-admin-batch",
            "--count",
            "3",
            "--prefix",
            "ops",
            "--dry-run",
            "--time-zone",
            "Africa/Cairo",
        ]);
        assert_eq!(cli.time_zone.as_deref(), Some("Africa/Cairo"));
        match cli.command {
            Command::CreateAdminBatch(args) => {
                assert_eq!(args.count, 3);
                assert_eq!(args.prefix, "ops");
                assert!(args.dry_run);
                assert_eq!(args.domain, DEFAULT_ADMIN_DOMAIN);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn flags_beat_environment_and_environment_fills_absent_flags() {
        std::env::set_var(ENV_DATABASE, "from-env.sqlite3");
        std::env::set_var(ENV_TIME_ZONE, "Africa/Cairo");
        let cli = Cli::parse_from(["victoweb", "--database", "from-flag.sqlite3", "migrate"]);
        std::env::remove_var(ENV_DATABASE);
        std::env::remove_var(ENV_TIME_ZONE);

        assert_eq!(cli.database.as_deref(), Some("from-flag.sqlite3"));
        assert_eq!(cli.time_zone.as_deref(), Some("Africa/Cairo"));
        let settings = cli.settings().expect("settings");
        assert_eq!(
            settings.database_path,
            std::path::PathBuf::from("from-flag.sqlite3")
        );
        assert_eq!(settings.time_zone.name(), "Africa/Cairo");
    }

    #[test]
    fn runserver_address_overrides_listen_setting() {
        let cli = Cli::parse_from(["victoweb", "runserver", "0.0.0.0:9000"]);
        let settings = cli.settings().expect("settings");
        assert_eq!(settings.listen_addr.port(), 9000);
    }
}
