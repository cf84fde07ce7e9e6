//! Error taxonomy for projection maintenance.

use thiserror::Error;

use crate::models::ProjectionKey;

/// Result type alias for maintenance operations.
pub type MaintenanceResult<T> = Result<T, MaintenanceError>;

/// Which half of a plan a failed statement belonged to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanAction {
    Insert,
    Delete,
}

impl PlanAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Insert => "insert",
            Self::Delete => "delete",
        }
    }
}

impl std::fmt::Display for PlanAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors surfaced by the integrity guard, the unit of work and the
/// rebuild engine.
#[derive(Debug, Error)]
pub enum MaintenanceError {
    #[error("cannot reach the store: {0}")]
    Connectivity(String),

    #[error("failed to restore foreign-key enforcement: {0}")]
    ConstraintRestoration(String),

    #[error("{projection}: {action} of {key} failed: {reason}")]
    PlanApplication {
        projection: &'static str,
        action: PlanAction,
        key: ProjectionKey,
        reason: String,
    },

    #[error("another maintenance run is in progress")]
    MaintenanceInProgress,

    #[error("{projection}: cannot regenerate a row for {key}")]
    Irreproducible {
        projection: &'static str,
        key: ProjectionKey,
    },

    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),
}

impl MaintenanceError {
    /// Process exit code for the operator surface.
    ///
    /// A failed constraint restoration gets its own code because the store
    /// may need manual repair.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::ConstraintRestoration(_) => 2,
            _ => 1,
        }
    }

    /// True when the store may have been left in a degraded state.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ConstraintRestoration(_))
    }
}
