use chrono::{DateTime, Utc};
use rusqlite::{params, Row, Transaction};
use uuid::Uuid;

use super::{get_time, get_uuid, Database};
use crate::models::{MaintenanceRun, RebuildSummary};

fn map_run(row: &Row<'_>) -> rusqlite::Result<MaintenanceRun> {
    let count = |idx: usize| -> rusqlite::Result<usize> {
        let value: i64 = row.get(idx)?;
        Ok(usize::try_from(value).unwrap_or(0))
    };
    Ok(MaintenanceRun {
        id: get_uuid(row, 0)?,
        projection: row.get(1)?,
        summary: RebuildSummary {
            inserted: count(2)?,
            deleted: count(3)?,
            unchanged: count(4)?,
        },
        started_at: get_time(row, 5)?,
        finished_at: get_time(row, 6)?,
    })
}

/// Record a run inside the rebuild transaction, so only committed runs are
/// ever visible.
pub fn record_run(
    tx: &Transaction<'_>,
    projection: &str,
    summary: &RebuildSummary,
    started_at: DateTime<Utc>,
) -> rusqlite::Result<MaintenanceRun> {
    let run = MaintenanceRun {
        id: Uuid::new_v4(),
        projection: projection.to_string(),
        summary: *summary,
        started_at,
        finished_at: Utc::now(),
    };
    tx.execute(
        "INSERT INTO maintenance_runs (id, projection, inserted, deleted, unchanged, started_at, finished_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            run.id.to_string(),
            run.projection,
            summary.inserted as i64,
            summary.deleted as i64,
            summary.unchanged as i64,
            run.started_at.to_rfc3339(),
            run.finished_at.to_rfc3339(),
        ],
    )?;
    Ok(run)
}

impl Database {
    /// Most recent committed maintenance runs, newest first.
    pub fn get_recent_runs(&self, limit: usize) -> anyhow::Result<Vec<MaintenanceRun>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, projection, inserted, deleted, unchanged, started_at, finished_at
             FROM maintenance_runs ORDER BY finished_at DESC LIMIT ?1",
        )?;
        let runs = stmt
            .query_map(params![limit as i64], map_run)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(runs)
    }
}
