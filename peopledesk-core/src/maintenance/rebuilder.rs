//! Operator entry point for projection rebuilds.

use chrono::Utc;
use rusqlite::Transaction;
use serde::Serialize;
use uuid::Uuid;

use super::engine::{apply_plan, rebuild_projection, Projection};
use super::unit_of_work::{run_in_transaction, run_then_roll_back};
use crate::db::{record_run, Database};
use crate::error::MaintenanceResult;
use crate::models::RebuildSummary;

#[derive(Debug, Clone, Copy, Default)]
pub struct RebuildOptions {
    /// Compute the plan inside the transaction, then roll back.
    pub dry_run: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RebuildReport {
    pub projection: String,
    pub dry_run: bool,
    #[serde(flatten)]
    pub summary: RebuildSummary,
    /// Id of the `maintenance_runs` row; `None` for dry runs.
    pub run_id: Option<Uuid>,
}

/// Runs one projection rebuild as an exclusive maintenance operation.
///
/// The sequence is: hold the maintenance gate, ping the store, then snapshot,
/// diff, apply and record the run inside one immediate transaction. The
/// snapshot and the writes share that transaction, so no other writer can
/// slip in between them. Failures are not retried.
pub struct Rebuilder<'a> {
    db: &'a Database,
}

impl<'a> Rebuilder<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    pub fn run(
        &self,
        projection: &dyn Projection,
        options: RebuildOptions,
    ) -> MaintenanceResult<RebuildReport> {
        let _lease = self.db.gate().try_acquire()?;
        self.db.ping()?;

        let name = projection.name();
        let started_at = Utc::now();
        tracing::info!(projection = name, dry_run = options.dry_run, "rebuild started");

        let work = |tx: &Transaction<'_>| -> MaintenanceResult<RebuildReport> {
            let required = projection.required_keys(tx)?;
            let current = projection.current_keys(tx)?;
            let plan = rebuild_projection(required, current);
            tracing::debug!(
                projection = name,
                to_insert = plan.to_insert.len(),
                to_delete = plan.to_delete.len(),
                unchanged = plan.unchanged.len(),
                "plan computed"
            );

            if options.dry_run {
                return Ok(RebuildReport {
                    projection: name.to_string(),
                    dry_run: true,
                    summary: plan.summary(),
                    run_id: None,
                });
            }

            let summary = apply_plan(tx, projection, &plan)?;
            let run = record_run(tx, name, &summary, started_at)?;
            Ok(RebuildReport {
                projection: name.to_string(),
                dry_run: false,
                summary,
                run_id: Some(run.id),
            })
        };

        let mut conn = self.db.conn()?;
        let result = if options.dry_run {
            run_then_roll_back(&mut conn, work)
        } else {
            run_in_transaction(&mut conn, work)
        };

        match &result {
            Ok(report) if report.summary.is_noop() => {
                tracing::info!(projection = name, summary = %report.summary, "rebuild finished, nothing to change");
            }
            Ok(report) => {
                tracing::info!(projection = name, summary = %report.summary, "rebuild finished");
            }
            // Restoration failures were already logged as fatal by the guard.
            Err(err) if err.is_fatal() => {}
            Err(err) => {
                tracing::error!(projection = name, error = %err, "rebuild failed and was rolled back");
            }
        }
        result
    }
}
