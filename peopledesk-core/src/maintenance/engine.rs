//! Projection rebuild engine.
//!
//! A rebuild is split in two: [`rebuild_projection`] diffs the key set the
//! sources imply against the keys currently in the projection, and
//! [`apply_plan`] writes the difference. Rows whose key is in both sets are
//! never touched, so their payload survives.

use std::collections::BTreeSet;

use rusqlite::Connection;
use serde::Serialize;

use super::guard::with_integrity_checks_suspended;
use crate::error::{MaintenanceError, MaintenanceResult, PlanAction};
use crate::models::{ProjectionKey, RebuildSummary};

/// A derived table that can be reconciled against its sources.
pub trait Projection {
    /// Stable name, used in logs and the run history.
    fn name(&self) -> &'static str;

    /// Whether applying a plan may transiently violate foreign keys.
    fn requires_integrity_guard(&self) -> bool {
        false
    }

    /// Keys implied by the source tables. Duplicates are allowed.
    fn required_keys(&self, conn: &Connection) -> rusqlite::Result<Vec<ProjectionKey>>;

    /// Keys currently present in the projection.
    fn current_keys(&self, conn: &Connection) -> rusqlite::Result<Vec<ProjectionKey>>;

    /// Create the row for `key` with the default payload.
    fn insert_default(&self, conn: &Connection, key: &ProjectionKey) -> MaintenanceResult<()>;

    /// Remove the row for `key` and anything that only exists because of it.
    fn delete(&self, conn: &Connection, key: &ProjectionKey) -> MaintenanceResult<()>;
}

/// The difference between the required and the current key sets. Every
/// list is sorted and free of duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RebuildPlan {
    pub to_insert: Vec<ProjectionKey>,
    pub to_delete: Vec<ProjectionKey>,
    pub unchanged: Vec<ProjectionKey>,
}

impl RebuildPlan {
    pub fn summary(&self) -> RebuildSummary {
        RebuildSummary {
            inserted: self.to_insert.len(),
            deleted: self.to_delete.len(),
            unchanged: self.unchanged.len(),
        }
    }

    pub fn is_noop(&self) -> bool {
        self.to_insert.is_empty() && self.to_delete.is_empty()
    }
}

pub fn rebuild_projection<S, C>(sources: S, current: C) -> RebuildPlan
where
    S: IntoIterator<Item = ProjectionKey>,
    C: IntoIterator<Item = ProjectionKey>,
{
    let required: BTreeSet<ProjectionKey> = sources.into_iter().collect();
    let current: BTreeSet<ProjectionKey> = current.into_iter().collect();

    let mut plan = RebuildPlan::default();
    for key in &required {
        if current.contains(key) {
            plan.unchanged.push(*key);
        } else {
            plan.to_insert.push(*key);
        }
    }
    plan.to_delete = current.difference(&required).copied().collect();
    plan
}

/// Write `plan`: deletes first, then inserts. Stops at the first failing
/// statement; the caller's transaction is expected to roll back.
pub fn apply_plan(
    conn: &Connection,
    projection: &dyn Projection,
    plan: &RebuildPlan,
) -> MaintenanceResult<RebuildSummary> {
    let apply = |conn: &Connection| -> MaintenanceResult<RebuildSummary> {
        for key in &plan.to_delete {
            projection
                .delete(conn, key)
                .map_err(|e| plan_error(projection, PlanAction::Delete, key, e))?;
        }
        for key in &plan.to_insert {
            projection
                .insert_default(conn, key)
                .map_err(|e| plan_error(projection, PlanAction::Insert, key, e))?;
        }
        Ok(plan.summary())
    };

    if projection.requires_integrity_guard() && !plan.is_noop() {
        with_integrity_checks_suspended(conn, apply)
    } else {
        apply(conn)
    }
}

fn plan_error(
    projection: &dyn Projection,
    action: PlanAction,
    key: &ProjectionKey,
    err: MaintenanceError,
) -> MaintenanceError {
    match err {
        MaintenanceError::Store(e) => MaintenanceError::PlanApplication {
            projection: projection.name(),
            action,
            key: *key,
            reason: e.to_string(),
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use uuid::Uuid;

    fn id(n: u128) -> Uuid {
        Uuid::from_u128(n)
    }

    fn key(owner: u128, item: u128) -> ProjectionKey {
        ProjectionKey::new(id(owner), id(item))
    }

    #[test]
    fn new_key_is_inserted_and_existing_key_left_alone() {
        // user 1 owns items A (10) and B (11); only A has a row today.
        let plan = rebuild_projection([key(1, 10), key(1, 11)], [key(1, 10)]);

        assert_eq!(plan.to_insert, vec![key(1, 11)]);
        assert_eq!(plan.unchanged, vec![key(1, 10)]);
        assert!(plan.to_delete.is_empty());
    }

    #[test]
    fn duplicate_sources_are_collapsed() {
        let plan = rebuild_projection([key(1, 10), key(1, 10), key(2, 10)], []);

        assert_eq!(plan.to_insert, vec![key(1, 10), key(2, 10)]);
        assert_eq!(plan.summary().inserted, 2);
    }

    #[test]
    fn empty_sources_delete_everything() {
        let current: Vec<_> = (0..10).map(|n| key(1, n)).collect();
        let plan = rebuild_projection([], current);

        assert_eq!(
            plan.summary(),
            RebuildSummary {
                inserted: 0,
                deleted: 10,
                unchanged: 0
            }
        );
        assert!(!plan.is_noop());
    }

    #[test]
    fn matching_sets_produce_noop_plan() {
        let keys = [key(1, 10), key(2, 11)];
        let plan = rebuild_projection(keys, keys);

        assert!(plan.is_noop());
        assert_eq!(plan.summary().unchanged, 2);
    }

    #[test]
    fn removed_source_deletes_only_its_row() {
        let plan = rebuild_projection([key(1, 10)], [key(1, 10), key(2, 10)]);

        assert_eq!(plan.to_delete, vec![key(2, 10)]);
        assert_eq!(plan.unchanged, vec![key(1, 10)]);
    }

    /// Records calls instead of touching a table; fails on the configured insert.
    struct Recording {
        fail_on_insert: Option<usize>,
        inserts: Cell<usize>,
        deletes: Cell<usize>,
    }

    impl Projection for Recording {
        fn name(&self) -> &'static str {
            "recording"
        }

        fn required_keys(&self, _: &Connection) -> rusqlite::Result<Vec<ProjectionKey>> {
            Ok(Vec::new())
        }

        fn current_keys(&self, _: &Connection) -> rusqlite::Result<Vec<ProjectionKey>> {
            Ok(Vec::new())
        }

        fn insert_default(&self, _: &Connection, _: &ProjectionKey) -> MaintenanceResult<()> {
            let n = self.inserts.get() + 1;
            self.inserts.set(n);
            if self.fail_on_insert == Some(n) {
                return Err(rusqlite::Error::QueryReturnedNoRows.into());
            }
            Ok(())
        }

        fn delete(&self, _: &Connection, _: &ProjectionKey) -> MaintenanceResult<()> {
            assert_eq!(self.inserts.get(), 0, "deletes must run before inserts");
            self.deletes.set(self.deletes.get() + 1);
            Ok(())
        }
    }

    #[test]
    fn apply_runs_deletes_before_inserts() {
        let conn = Connection::open_in_memory().unwrap();
        let projection = Recording {
            fail_on_insert: None,
            inserts: Cell::new(0),
            deletes: Cell::new(0),
        };
        let plan = rebuild_projection([key(1, 1), key(1, 2)], [key(9, 9)]);

        let summary = apply_plan(&conn, &projection, &plan).unwrap();

        assert_eq!(summary.inserted, 2);
        assert_eq!(summary.deleted, 1);
        assert_eq!(projection.deletes.get(), 1);
    }

    #[test]
    fn failing_insert_stops_the_plan() {
        let conn = Connection::open_in_memory().unwrap();
        let projection = Recording {
            fail_on_insert: Some(2),
            inserts: Cell::new(0),
            deletes: Cell::new(0),
        };
        let plan = rebuild_projection([key(1, 1), key(1, 2), key(1, 3)], []);

        let err = apply_plan(&conn, &projection, &plan).unwrap_err();

        match err {
            MaintenanceError::PlanApplication {
                projection: name,
                action,
                key: failed,
                ..
            } => {
                assert_eq!(name, "recording");
                assert_eq!(action, PlanAction::Insert);
                assert_eq!(failed, key(1, 2));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(projection.inserts.get(), 2);
    }
}
