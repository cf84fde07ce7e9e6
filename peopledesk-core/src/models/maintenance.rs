use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Composite key of a projection row: who owns it and what it tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProjectionKey {
    pub owner_id: Uuid,
    pub item_id: Uuid,
}

impl ProjectionKey {
    pub fn new(owner_id: Uuid, item_id: Uuid) -> Self {
        Self { owner_id, item_id }
    }
}

impl fmt::Display for ProjectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.owner_id, self.item_id)
    }
}

/// Counts reported by a rebuild.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebuildSummary {
    pub inserted: usize,
    pub deleted: usize,
    pub unchanged: usize,
}

impl RebuildSummary {
    /// Nothing was (or would be) written.
    pub fn is_noop(&self) -> bool {
        self.inserted == 0 && self.deleted == 0
    }
}

impl fmt::Display for RebuildSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "inserted={} deleted={} unchanged={}",
            self.inserted, self.deleted, self.unchanged
        )
    }
}

/// A committed maintenance run, as recorded in `maintenance_runs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaintenanceRun {
    pub id: Uuid,
    pub projection: String,
    pub summary: RebuildSummary,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}
