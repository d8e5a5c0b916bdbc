//! Shared application state handed to every handler.
//!
//! # Invariants
//! - SQLite access is serialized through one connection and always runs on
//!   the blocking pool, never on an async worker.

use crate::error::{ApiError, ApiResult};
use crate::events::AdminEventHub;
use rusqlite::Connection;
use std::sync::{Arc, Mutex, PoisonError};
use victoweb_core::service::chat_service::HubClock;
use victoweb_core::{now_millis, Settings};

/// Single shared SQLite connection.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Runs `work` against the connection on the blocking thread pool.
    pub async fn call<T, F>(&self, work: F) -> ApiResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> ApiResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock().unwrap_or_else(PoisonError::into_inner);
            work(&guard)
        })
        .await
        .map_err(|err| ApiError::Internal(format!("database task failed: {err}")))?
    }
}

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub hub: Arc<AdminEventHub>,
    pub settings: Arc<Settings>,
}

impl AppState {
    pub fn new(conn: Connection, settings: Settings) -> Self {
        Self {
            db: Database::new(conn),
            hub: Arc::new(AdminEventHub::new()),
            settings: Arc::new(settings),
        }
    }

    /// Clock for the configured display zone at the current instant.
    pub fn clock(&self) -> HubClock {
        HubClock::new(self.settings.time_zone, now_millis())
    }
}
