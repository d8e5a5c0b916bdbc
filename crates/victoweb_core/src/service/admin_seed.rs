//! Staff account seeding behind the `create-admin-batch` and
//! `seed-named-admins` commands.
//!
//! # Invariants
//! - Dry runs never write.
//! - Existing usernames are never recreated; batch seeding skips them and
//!   named seeding brings them up to date.

use super::password::{hash_password, PasswordHashError};
use crate::model::account::{AdminRole, NewAccount};
use crate::model::committee::iter_committees;
use crate::repo::account_repo::AccountRepository;
use crate::repo::RepoError;
use log::info;
use rand::Rng;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub const DEFAULT_BATCH_COUNT: u32 = 10;
pub const DEFAULT_BATCH_PREFIX: &str = "admin";
pub const DEFAULT_ADMIN_DOMAIN: &str = "vc29.local";
pub const PROVIDED_PASSWORD_LABEL: &str = "(provided password)";

const BATCH_PASSWORD_ALPHABET: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789!@#$%?-_";
const NAMED_PASSWORD_ALPHABET: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789!@#%?-_";
const BATCH_PASSWORD_LENGTH: usize = 14;
const NAMED_PASSWORD_LENGTH: usize = 16;

#[derive(Debug)]
pub enum SeedError {
    InvalidOption {
        option: &'static str,
        message: &'static str,
    },
    Hash(PasswordHashError),
    Repo(RepoError),
}

impl Display for SeedError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidOption { option, message } => write!(f, "--{option} {message}"),
            Self::Hash(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for SeedError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidOption { .. } => None,
            Self::Hash(err) => Some(err),
            Self::Repo(err) => Some(err),
        }
    }
}

impl From<RepoError> for SeedError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<PasswordHashError> for SeedError {
    fn from(value: PasswordHashError) -> Self {
        Self::Hash(value)
    }
}

/// Username with the password to hand over (or the provided-password marker).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeededCredential {
    pub username: String,
    pub password_display: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminBatchOptions {
    pub count: i64,
    pub prefix: String,
    pub password: Option<String>,
    pub domain: String,
    pub dry_run: bool,
}

impl Default for AdminBatchOptions {
    fn default() -> Self {
        Self {
            count: i64::from(DEFAULT_BATCH_COUNT),
            prefix: DEFAULT_BATCH_PREFIX.to_string(),
            password: None,
            domain: DEFAULT_ADMIN_DOMAIN.to_string(),
            dry_run: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdminBatchReport {
    pub created: Vec<SeededCredential>,
    pub skipped: Vec<String>,
    pub dry_run: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedAdminOptions {
    pub password: Option<String>,
    pub domain: String,
    pub dry_run: bool,
}

impl Default for NamedAdminOptions {
    fn default() -> Self {
        Self {
            password: None,
            domain: DEFAULT_ADMIN_DOMAIN.to_string(),
            dry_run: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamedAdminReport {
    pub created: Vec<String>,
    pub updated: Vec<String>,
    pub skipped: Vec<String>,
    /// Credentials of accounts actually created (empty on dry runs).
    pub credentials: Vec<SeededCredential>,
    pub dry_run: bool,
}

/// One leadership account of the fixed roster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedAdminProfile {
    pub username: String,
    pub full_name: String,
    pub email: String,
    pub role: AdminRole,
}

/// Ensures `prefix01..prefixNN` staff superusers exist.
pub fn create_admin_batch<R: AccountRepository>(
    repo: &R,
    options: &AdminBatchOptions,
) -> Result<AdminBatchReport, SeedError> {
    let prefix = options.prefix.trim();
    let domain = options.domain.trim();
    if options.count <= 0 {
        return Err(SeedError::InvalidOption {
            option: "count",
            message: "must be a positive integer.",
        });
    }
    if prefix.is_empty() {
        return Err(SeedError::InvalidOption {
            option: "prefix",
            message: "cannot be empty.",
        });
    }
    if domain.is_empty() {
        return Err(SeedError::InvalidOption {
            option: "domain",
            message: "cannot be empty.",
        });
    }
    let password_override = options.password.as_deref().filter(|value| !value.is_empty());

    let width = options.count.to_string().len().max(2);
    let mut report = AdminBatchReport {
        dry_run: options.dry_run,
        ..AdminBatchReport::default()
    };

    for index in 1..=options.count {
        let padded = format!("{index:0width$}");
        let username = format!("{prefix}{padded}");
        if repo.find_by_username(&username)?.is_some() {
            report.skipped.push(username);
            continue;
        }

        let password = match password_override {
            Some(value) => value.to_string(),
            None => random_password(BATCH_PASSWORD_ALPHABET, BATCH_PASSWORD_LENGTH),
        };
        if !options.dry_run {
            repo.create_account(&NewAccount {
                username: username.clone(),
                password_hash: hash_password(&password)?,
                email: format!("{username}@{domain}"),
                full_name: format!("Admin {padded}"),
                is_staff: true,
                is_superuser: true,
                ..NewAccount::default()
            })?;
        }
        report.created.push(SeededCredential {
            username,
            password_display: if password_override.is_some() {
                PROVIDED_PASSWORD_LABEL.to_string()
            } else {
                password
            },
        });
    }

    info!(
        "event=admin_batch module=admin_seed status=ok dry_run={} created={} skipped={}",
        options.dry_run,
        report.created.len(),
        report.skipped.len()
    );
    Ok(report)
}

/// Fixed leadership roster for `domain` (emails lowercased).
pub fn named_admin_roster(domain: &str) -> Vec<NamedAdminProfile> {
    let profile = |username: String, full_name: String, role: AdminRole| NamedAdminProfile {
        email: format!("{username}@{domain}").to_lowercase(),
        username,
        full_name,
        role,
    };

    let mut roster = vec![
        profile(
            "union_president".to_string(),
            "Union President".to_string(),
            AdminRole::UnionPresident,
        ),
        profile(
            "union_vice_president".to_string(),
            "Union Vice President".to_string(),
            AdminRole::UnionVicePresident,
        ),
    ];
    for committee in iter_committees() {
        roster.push(profile(
            format!("{}_lead", committee.key),
            format!("{} Lead", committee.name),
            AdminRole::CommitteeLead,
        ));
    }
    for index in 1..=2 {
        roster.push(profile(
            format!("operations_admin_{index:02}"),
            format!("Operations Center Admin {index:02}"),
            AdminRole::OperationsAdmin,
        ));
    }
    for index in 1..=2 {
        roster.push(profile(
            format!("media_admin_{index:02}"),
            format!("Media Admin {index:02}"),
            AdminRole::MediaAdmin,
        ));
    }
    roster.push(profile(
        "dev_admin".to_string(),
        "Development Admin".to_string(),
        AdminRole::DevAdmin,
    ));
    roster
}

/// Creates or refreshes the leadership roster.
pub fn seed_named_admins<R: AccountRepository>(
    repo: &R,
    options: &NamedAdminOptions,
) -> Result<NamedAdminReport, SeedError> {
    let domain = match options.domain.trim() {
        "" => DEFAULT_ADMIN_DOMAIN,
        value => value,
    };
    let password_override = options.password.as_deref().filter(|value| !value.is_empty());
    let mut report = NamedAdminReport {
        dry_run: options.dry_run,
        ..NamedAdminReport::default()
    };

    for profile in named_admin_roster(domain) {
        let Some(mut account) = repo.find_by_username(&profile.username)? else {
            if !options.dry_run {
                let password = match password_override {
                    Some(value) => value.to_string(),
                    None => random_password(NAMED_PASSWORD_ALPHABET, NAMED_PASSWORD_LENGTH),
                };
                repo.create_account(&NewAccount {
                    username: profile.username.clone(),
                    password_hash: hash_password(&password)?,
                    email: profile.email.clone(),
                    full_name: profile.full_name.clone(),
                    is_staff: true,
                    is_superuser: true,
                    admin_role: profile.role,
                    ..NewAccount::default()
                })?;
                report.credentials.push(SeededCredential {
                    username: profile.username.clone(),
                    password_display: if password_override.is_some() {
                        PROVIDED_PASSWORD_LABEL.to_string()
                    } else {
                        password
                    },
                });
            }
            report.created.push(profile.username);
            continue;
        };

        let profile_changed = account.full_name != profile.full_name
            || account.email != profile.email
            || !account.is_staff
            || !account.is_superuser
            || account.admin_role != profile.role;
        let changed = profile_changed || password_override.is_some();

        if !options.dry_run {
            if profile_changed {
                account.full_name = profile.full_name.clone();
                account.email = profile.email.clone();
                account.is_staff = true;
                account.is_superuser = true;
                account.admin_role = profile.role;
                repo.update_account(&account)?;
            }
            if let Some(password) = password_override {
                repo.set_password_hash(account.id, &hash_password(password)?)?;
            }
        }

        if changed {
            report.updated.push(profile.username);
        } else {
            report.skipped.push(profile.username);
        }
    }

    info!(
        "event=named_admins module=admin_seed status=ok dry_run={} created={} updated={} skipped={}",
        options.dry_run,
        report.created.len(),
        report.updated.len(),
        report.skipped.len()
    );
    Ok(report)
}

fn random_password(alphabet: &[u8], length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| char::from(alphabet[rng.gen_range(0..alphabet.len())]))
        .collect()
}
