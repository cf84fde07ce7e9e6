//! Runtime configuration shared by the CLI and the admin server.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use directories::ProjectDirs;

pub const DB_FILE_NAME: &str = "peopledesk.db";
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub busy_timeout: Duration,
}

impl Config {
    /// Build a config, falling back to the platform data directory when no
    /// database path is given.
    pub fn resolve(db_path: Option<PathBuf>, busy_timeout_ms: Option<u64>) -> anyhow::Result<Self> {
        let db_path = match db_path {
            Some(path) => path,
            None => default_db_path()?,
        };
        Ok(Self {
            db_path,
            busy_timeout: Duration::from_millis(busy_timeout_ms.unwrap_or(DEFAULT_BUSY_TIMEOUT_MS)),
        })
    }
}

/// `<data dir>/peopledesk/peopledesk.db`, e.g. `~/.local/share/peopledesk/` on Linux.
pub fn default_db_path() -> anyhow::Result<PathBuf> {
    let dirs = ProjectDirs::from("com", "peopledesk", "peopledesk")
        .context("could not determine a data directory for the database")?;
    Ok(dirs.data_dir().join(DB_FILE_NAME))
}
