//! Runtime settings for the portal.
//!
//! # Responsibility
//! - Resolve database, time zone, listen address and logging settings.
//! - Keep environment parsing in one place so commands share defaults.
//!
//! # Invariants
//! - `time_zone` is always a valid IANA zone.
//! - `session_ttl_secs` is always positive.

use crate::logging::{default_log_level, normalize_level};
use chrono_tz::Tz;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

pub const ENV_DATABASE: &str = "VICTOWEB_DATABASE";
pub const ENV_DEBUG: &str = "VICTOWEB_DEBUG";
pub const ENV_TIME_ZONE: &str = "VICTOWEB_TIME_ZONE";
pub const ENV_LISTEN: &str = "VICTOWEB_LISTEN";
pub const ENV_LOG_LEVEL: &str = "VICTOWEB_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "VICTOWEB_LOG_DIR";
pub const ENV_SESSION_TTL: &str = "VICTOWEB_SESSION_TTL";

pub const DEFAULT_DATABASE_PATH: &str = "data/victoweb.sqlite3";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_SESSION_TTL_SECS: u64 = 14 * 24 * 60 * 60;

/// Settings resolution error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    pub key: &'static str,
    pub value: String,
    pub message: String,
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid value `{}` for {}: {}",
            self.value, self.key, self.message
        )
    }
}

impl Error for ConfigError {}

/// Resolved portal settings.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub database_path: PathBuf,
    pub debug: bool,
    pub time_zone: Tz,
    pub listen_addr: SocketAddr,
    pub log_level: &'static str,
    pub log_dir: Option<PathBuf>,
    pub session_ttl_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
            debug: true,
            time_zone: Tz::UTC,
            listen_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), DEFAULT_PORT),
            log_level: default_log_level(),
            log_dir: None,
            session_ttl_secs: DEFAULT_SESSION_TTL_SECS,
        }
    }
}

impl Settings {
    /// Reads settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds settings from an arbitrary key lookup; unset or blank keys keep defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::default().with_overrides(lookup)
    }

    /// Replaces the fields whose key `lookup` answers; unset or blank keys keep
    /// the current value.
    pub fn with_overrides<F>(self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let mut settings = self;

        if let Some(path) = read(ENV_DATABASE) {
            settings.database_path = PathBuf::from(path);
        }
        if let Some(flag) = read(ENV_DEBUG) {
            settings.debug = flag == "1";
        }
        if let Some(zone) = read(ENV_TIME_ZONE) {
            settings.time_zone = parse_time_zone(&zone)?;
        }
        if let Some(addr) = read(ENV_LISTEN) {
            settings.listen_addr = parse_listen_addr(&addr).map_err(|message| ConfigError {
                key: ENV_LISTEN,
                value: addr.clone(),
                message,
            })?;
        }
        if let Some(level) = read(ENV_LOG_LEVEL) {
            settings.log_level = normalize_level(&level).map_err(|message| ConfigError {
                key: ENV_LOG_LEVEL,
                value: level.clone(),
                message,
            })?;
        }
        if let Some(dir) = read(ENV_LOG_DIR) {
            settings.log_dir = Some(PathBuf::from(dir));
        }
        if let Some(ttl) = read(ENV_SESSION_TTL) {
            settings.session_ttl_secs = parse_session_ttl(&ttl)?;
        }

        Ok(settings)
    }
}

/// Parses an IANA time zone name such as `Africa/Cairo`.
pub fn parse_time_zone(raw: &str) -> Result<Tz, ConfigError> {
    raw.trim().parse::<Tz>().map_err(|err| ConfigError {
        key: ENV_TIME_ZONE,
        value: raw.to_string(),
        message: err.to_string(),
    })
}

/// Parses a development-server address.
///
/// Accepts `PORT`, `HOST:PORT` and `[V6]:PORT`; a bare port binds loopback.
pub fn parse_listen_addr(raw: &str) -> Result<SocketAddr, String> {
    let trimmed = raw.trim();
    if let Ok(port) = trimmed.parse::<u16>() {
        return Ok(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port));
    }
    if let Ok(addr) = trimmed.parse::<SocketAddr>() {
        return Ok(addr);
    }
    if let Some(port) = trimmed.strip_prefix("localhost:") {
        let port = port
            .parse::<u16>()
            .map_err(|_| format!("`{port}` is not a valid port number"))?;
        return Ok(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port));
    }
    Err("expected PORT, HOST:PORT or [IPV6]:PORT".to_string())
}

fn parse_session_ttl(raw: &str) -> Result<u64, ConfigError> {
    match raw.parse::<u64>() {
        Ok(0) => Err(ConfigError {
            key: ENV_SESSION_TTL,
            value: raw.to_string(),
            message: "session lifetime must be positive".to_string(),
        }),
        Ok(secs) => Ok(secs),
        Err(err) => Err(ConfigError {
            key: ENV_SESSION_TTL,
            value: raw.to_string(),
            message: err.to_string(),
        }),
    }
}
