//! SQLite-backed storage for PeopleDesk.
//!
//! A single connection is shared behind a mutex; every handle cloned from a
//! `Database` talks to the same connection and the same maintenance gate.

mod checklists;
mod progress;
mod runs;
pub mod schema;
mod surveys;
mod users;

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, Row};
use uuid::Uuid;

use crate::config::{self, Config, DEFAULT_BUSY_TIMEOUT_MS};
use crate::error::{MaintenanceError, MaintenanceResult};
use crate::maintenance::MaintenanceGate;

pub use runs::record_run;

#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    gate: MaintenanceGate,
}

impl Database {
    /// Open (or create) the database described by `config`.
    pub fn open_with(config: &Config) -> MaintenanceResult<Self> {
        if let Some(parent) = config.db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    MaintenanceError::Connectivity(format!(
                        "cannot create {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }
        let conn = Connection::open(&config.db_path).map_err(|e| {
            MaintenanceError::Connectivity(format!("{}: {}", config.db_path.display(), e))
        })?;
        tracing::debug!(path = %config.db_path.display(), "database opened");
        Self::from_connection(conn, config.busy_timeout)
    }

    pub fn open(path: impl AsRef<Path>) -> MaintenanceResult<Self> {
        let config = Config {
            db_path: path.as_ref().to_path_buf(),
            busy_timeout: Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS),
        };
        Self::open_with(&config)
    }

    /// Open the database at the platform default location.
    pub fn open_default() -> MaintenanceResult<Self> {
        let path =
            config::default_db_path().map_err(|e| MaintenanceError::Connectivity(e.to_string()))?;
        Self::open(path)
    }

    /// Ephemeral database for tests.
    pub fn open_in_memory() -> MaintenanceResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| MaintenanceError::Connectivity(e.to_string()))?;
        Self::from_connection(conn, Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))
    }

    fn from_connection(conn: Connection, busy_timeout: Duration) -> MaintenanceResult<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")
            .map_err(|e| MaintenanceError::Connectivity(e.to_string()))?;
        conn.busy_timeout(busy_timeout)
            .map_err(|e| MaintenanceError::Connectivity(e.to_string()))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            gate: MaintenanceGate::default(),
        })
    }

    pub fn migrate(&self) -> anyhow::Result<()> {
        let conn = self.conn()?;
        conn.execute_batch(schema::SCHEMA)?;
        tracing::debug!("schema applied");
        Ok(())
    }

    /// Round-trip to the store. Used before any maintenance mutation.
    pub fn ping(&self) -> MaintenanceResult<()> {
        let conn = self.conn()?;
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .map_err(|e| MaintenanceError::Connectivity(e.to_string()))?;
        Ok(())
    }

    pub fn gate(&self) -> &MaintenanceGate {
        &self.gate
    }

    pub(crate) fn conn(&self) -> MaintenanceResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| MaintenanceError::Connectivity("connection mutex poisoned".into()))
    }
}

pub(crate) fn now() -> String {
    Utc::now().to_rfc3339()
}

pub(crate) fn get_uuid(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn get_time(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn invalid_enum(idx: usize, value: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        Type::Text,
        format!("unexpected value '{}'", value).into(),
    )
}
