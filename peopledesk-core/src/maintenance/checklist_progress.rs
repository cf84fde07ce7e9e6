//! Checklist progress projection: one row per (user, checklist item) for
//! every checklist assigned to the user.

use rusqlite::{params, Connection, Row};

use super::engine::Projection;
use crate::db::{get_uuid, now};
use crate::error::MaintenanceResult;
use crate::models::{ProjectionKey, VerificationStatus};

pub struct ChecklistProgress;

fn map_key(row: &Row<'_>) -> rusqlite::Result<ProjectionKey> {
    Ok(ProjectionKey::new(get_uuid(row, 0)?, get_uuid(row, 1)?))
}

impl Projection for ChecklistProgress {
    fn name(&self) -> &'static str {
        "checklist_progress"
    }

    fn required_keys(&self, conn: &Connection) -> rusqlite::Result<Vec<ProjectionKey>> {
        let mut stmt = conn.prepare(
            "SELECT a.user_id, i.id
             FROM checklist_assignments a
             JOIN checklist_items i ON i.checklist_id = a.checklist_id",
        )?;
        let keys = stmt.query_map([], map_key)?.collect();
        keys
    }

    fn current_keys(&self, conn: &Connection) -> rusqlite::Result<Vec<ProjectionKey>> {
        let mut stmt = conn.prepare("SELECT user_id, item_id FROM checklist_progress")?;
        let keys = stmt.query_map([], map_key)?.collect();
        keys
    }

    fn insert_default(&self, conn: &Connection, key: &ProjectionKey) -> MaintenanceResult<()> {
        conn.execute(
            "INSERT INTO checklist_progress (user_id, item_id, completed, note, verification, updated_at)
             VALUES (?1, ?2, 0, NULL, ?3, ?4)",
            params![
                key.owner_id.to_string(),
                key.item_id.to_string(),
                VerificationStatus::default().as_str(),
                now(),
            ],
        )?;
        Ok(())
    }

    fn delete(&self, conn: &Connection, key: &ProjectionKey) -> MaintenanceResult<()> {
        conn.execute(
            "DELETE FROM checklist_progress WHERE user_id = ?1 AND item_id = ?2",
            params![key.owner_id.to_string(), key.item_id.to_string()],
        )?;
        Ok(())
    }
}
