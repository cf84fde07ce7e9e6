use rusqlite::{params, OptionalExtension, Row};
use uuid::Uuid;

use super::{get_time, get_uuid, invalid_enum, now, Database};
use crate::error::MaintenanceError;
use crate::models::*;

const PROGRESS_COLUMNS: &str = "user_id, item_id, completed, note, verification, updated_at";

fn map_progress(row: &Row<'_>) -> rusqlite::Result<ProgressEntry> {
    let verification: String = row.get(4)?;
    Ok(ProgressEntry {
        user_id: get_uuid(row, 0)?,
        item_id: get_uuid(row, 1)?,
        completed: row.get(2)?,
        note: row.get(3)?,
        verification: VerificationStatus::from_str(&verification)
            .ok_or_else(|| invalid_enum(4, &verification))?,
        updated_at: get_time(row, 5)?,
    })
}

impl Database {
    pub fn get_progress_for_user(&self, user_id: Uuid) -> anyhow::Result<Vec<ProgressEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT p.user_id, p.item_id, p.completed, p.note, p.verification, p.updated_at
             FROM checklist_progress p
             JOIN checklist_items i ON i.id = p.item_id
             WHERE p.user_id = ?1
             ORDER BY i.checklist_id, i.position",
        )?;
        let entries = stmt
            .query_map(params![user_id.to_string()], map_progress)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    pub fn get_progress(&self, user_id: Uuid, item_id: Uuid) -> anyhow::Result<Option<ProgressEntry>> {
        let conn = self.conn()?;
        let entry = conn
            .query_row(
                &format!(
                    "SELECT {PROGRESS_COLUMNS} FROM checklist_progress WHERE user_id = ?1 AND item_id = ?2"
                ),
                params![user_id.to_string(), item_id.to_string()],
                map_progress,
            )
            .optional()?;
        Ok(entry)
    }

    pub fn count_progress(&self) -> anyhow::Result<usize> {
        let conn = self.conn()?;
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM checklist_progress", [], |row| row.get(0))?;
        Ok(usize::try_from(count)?)
    }

    /// Apply a user's edit to a progress row.
    ///
    /// Refused while a maintenance run holds the gate, so payload edits never
    /// race a rebuild. `note: Some(None)` clears the note. Returns `false`
    /// when the row does not exist.
    pub fn update_progress(
        &self,
        user_id: Uuid,
        item_id: Uuid,
        input: UpdateProgressInput,
    ) -> anyhow::Result<bool> {
        if self.gate().is_held() {
            return Err(MaintenanceError::MaintenanceInProgress.into());
        }
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE checklist_progress SET
                completed = COALESCE(?3, completed),
                note = CASE WHEN ?4 THEN ?5 ELSE note END,
                verification = COALESCE(?6, verification),
                updated_at = ?7
             WHERE user_id = ?1 AND item_id = ?2",
            params![
                user_id.to_string(),
                item_id.to_string(),
                input.completed,
                input.note.is_some(),
                input.note.flatten(),
                input.verification.map(|v| v.as_str()),
                now(),
            ],
        )?;
        Ok(updated > 0)
    }
}
