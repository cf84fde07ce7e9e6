//! Referential integrity guard.
//!
//! SQLite cannot toggle `foreign_keys` inside a transaction, so the guard
//! uses `defer_foreign_keys` instead: immediate constraints become deferred
//! until the guard restores them. SQLite also clears the pragma at COMMIT and
//! ROLLBACK, which means a rolled-back unit of work never leaks a relaxed
//! connection.
//!
//! Clearing the pragma discards SQLite's pending-violation counter, so a
//! successful scope is followed by an explicit `foreign_key_check` before
//! enforcement is considered restored. Dangling rows that predate the scope
//! are recorded on entry and do not count against it.

use std::collections::HashSet;

use rusqlite::Connection;

use crate::error::{MaintenanceError, MaintenanceResult};

/// One row of `PRAGMA foreign_key_check`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ForeignKeyViolation {
    pub table: String,
    pub rowid: Option<i64>,
    pub parent: String,
    /// Index of the violated constraint within `table`.
    pub fk_index: i64,
}

/// Run `scope` with foreign-key enforcement deferred.
///
/// Must be called inside a transaction. Nested calls run `scope` directly;
/// only the outermost guard toggles and restores. Only violations introduced
/// by `scope` fail the restoration check. If restoration fails the
/// error is logged as fatal and returned as
/// [`MaintenanceError::ConstraintRestoration`], unless `scope` itself failed,
/// in which case the scope's error wins.
pub fn with_integrity_checks_suspended<T, F>(conn: &Connection, scope: F) -> MaintenanceResult<T>
where
    F: FnOnce(&Connection) -> MaintenanceResult<T>,
{
    if !pragma_flag(conn, "foreign_keys")? {
        return scope(conn);
    }
    if pragma_flag(conn, "defer_foreign_keys")? {
        tracing::trace!("integrity checks already suspended, running nested scope");
        return scope(conn);
    }

    let baseline: HashSet<ForeignKeyViolation> =
        foreign_key_violations(conn)?.into_iter().collect();
    if !baseline.is_empty() {
        tracing::warn!(
            preexisting = baseline.len(),
            "store already holds dangling references; they are left for repair"
        );
    }

    conn.pragma_update(None, "defer_foreign_keys", "ON")?;
    tracing::debug!("foreign-key checks deferred");

    let outcome = scope(conn);
    let restored = restore(conn, outcome.is_ok(), &baseline);

    match (outcome, restored) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(err)) => {
            log_restoration_failure(&err);
            Err(err)
        }
        (Err(err), Ok(())) => Err(err),
        (Err(err), Err(restore_err)) => {
            log_restoration_failure(&restore_err);
            Err(err)
        }
    }
}

fn restore(
    conn: &Connection,
    verify: bool,
    baseline: &HashSet<ForeignKeyViolation>,
) -> MaintenanceResult<()> {
    let violations: Vec<ForeignKeyViolation> = if verify {
        foreign_key_violations(conn)
            .map_err(|e| MaintenanceError::ConstraintRestoration(e.to_string()))?
            .into_iter()
            .filter(|v| !baseline.contains(v))
            .collect()
    } else {
        Vec::new()
    };

    conn.pragma_update(None, "defer_foreign_keys", "OFF")
        .map_err(|e| MaintenanceError::ConstraintRestoration(e.to_string()))?;

    if let Some(first) = violations.first() {
        return Err(MaintenanceError::ConstraintRestoration(format!(
            "{} dangling reference(s), first in {} (rowid {}) -> {}",
            violations.len(),
            first.table,
            first
                .rowid
                .map(|r| r.to_string())
                .unwrap_or_else(|| "?".into()),
            first.parent,
        )));
    }
    tracing::debug!("foreign-key checks restored");
    Ok(())
}

fn log_restoration_failure(err: &MaintenanceError) {
    tracing::error!(
        fatal = true,
        error = %err,
        "foreign-key enforcement could not be restored; the store needs operator attention"
    );
}

fn pragma_flag(conn: &Connection, name: &str) -> rusqlite::Result<bool> {
    conn.pragma_query_value(None, name, |row| row.get::<_, i64>(0))
        .map(|value| value != 0)
}

pub fn foreign_key_violations(conn: &Connection) -> rusqlite::Result<Vec<ForeignKeyViolation>> {
    let mut stmt = conn.prepare("PRAGMA foreign_key_check")?;
    let rows = stmt.query_map([], |row| {
        Ok(ForeignKeyViolation {
            table: row.get(0)?,
            rowid: row.get(1)?,
            parent: row.get(2)?,
            fk_index: row.get(3)?,
        })
    })?;
    rows.collect()
}
