//! Core library for PeopleDesk.
//!
//! This crate provides the domain models, database operations and the
//! projection maintenance engine for PeopleDesk, independent of any
//! transport layer (CLI, HTTP, etc.).
//!
//! # Usage
//!
//! ```no_run
//! use peopledesk_core::db::Database;
//! use peopledesk_core::maintenance::{ChecklistProgress, RebuildOptions, Rebuilder};
//!
//! let db = Database::open_default()?;
//! db.migrate()?;
//!
//! let report = Rebuilder::new(&db).run(&ChecklistProgress, RebuildOptions::default())?;
//! println!("{}", report.summary);
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod config;
pub mod db;
pub mod error;
pub mod maintenance;
pub mod models;

// Re-export commonly used types at crate root
pub use config::Config;
pub use db::Database;
pub use error::{MaintenanceError, MaintenanceResult};
