use rusqlite::{params, OptionalExtension, Row};
use uuid::Uuid;

use super::{get_time, get_uuid, now, Database};
use crate::models::*;

fn map_checklist(row: &Row<'_>) -> rusqlite::Result<Checklist> {
    Ok(Checklist {
        id: get_uuid(row, 0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        created_at: get_time(row, 3)?,
    })
}

fn map_item(row: &Row<'_>) -> rusqlite::Result<ChecklistItem> {
    Ok(ChecklistItem {
        id: get_uuid(row, 0)?,
        checklist_id: get_uuid(row, 1)?,
        description: row.get(2)?,
        position: row.get(3)?,
        created_at: get_time(row, 4)?,
    })
}

fn map_assignment(row: &Row<'_>) -> rusqlite::Result<ChecklistAssignment> {
    Ok(ChecklistAssignment {
        id: get_uuid(row, 0)?,
        checklist_id: get_uuid(row, 1)?,
        user_id: get_uuid(row, 2)?,
        assigned_at: get_time(row, 3)?,
    })
}

impl Database {
    pub fn create_checklist(&self, input: CreateChecklistInput) -> anyhow::Result<Checklist> {
        let conn = self.conn()?;
        let id = Uuid::new_v4();
        conn.execute(
            "INSERT INTO checklists (id, title, description, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![id.to_string(), input.title, input.description, now()],
        )?;
        let checklist = conn.query_row(
            "SELECT id, title, description, created_at FROM checklists WHERE id = ?1",
            params![id.to_string()],
            map_checklist,
        )?;
        Ok(checklist)
    }

    pub fn get_checklist(&self, id: Uuid) -> anyhow::Result<Option<Checklist>> {
        let conn = self.conn()?;
        let checklist = conn
            .query_row(
                "SELECT id, title, description, created_at FROM checklists WHERE id = ?1",
                params![id.to_string()],
                map_checklist,
            )
            .optional()?;
        Ok(checklist)
    }

    /// Append an item. Without an explicit position the item goes last.
    pub fn add_checklist_item(
        &self,
        checklist_id: Uuid,
        input: CreateChecklistItemInput,
    ) -> anyhow::Result<ChecklistItem> {
        let conn = self.conn()?;
        let position = match input.position {
            Some(position) => position,
            None => conn.query_row(
                "SELECT COALESCE(MAX(position) + 1, 0) FROM checklist_items WHERE checklist_id = ?1",
                params![checklist_id.to_string()],
                |row| row.get(0),
            )?,
        };
        let id = Uuid::new_v4();
        conn.execute(
            "INSERT INTO checklist_items (id, checklist_id, description, position, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![id.to_string(), checklist_id.to_string(), input.description, position, now()],
        )?;
        let item = conn.query_row(
            "SELECT id, checklist_id, description, position, created_at FROM checklist_items WHERE id = ?1",
            params![id.to_string()],
            map_item,
        )?;
        Ok(item)
    }

    pub fn get_checklist_items(&self, checklist_id: Uuid) -> anyhow::Result<Vec<ChecklistItem>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, checklist_id, description, position, created_at
             FROM checklist_items WHERE checklist_id = ?1 ORDER BY position, created_at",
        )?;
        let items = stmt
            .query_map(params![checklist_id.to_string()], map_item)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(items)
    }

    pub fn delete_checklist_item(&self, id: Uuid) -> anyhow::Result<bool> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM checklist_items WHERE id = ?1",
            params![id.to_string()],
        )?;
        Ok(deleted > 0)
    }

    /// Assign a checklist to a user. Progress rows are not created here; the
    /// checklist progress rebuild reconciles them.
    pub fn assign_checklist(
        &self,
        checklist_id: Uuid,
        input: AssignChecklistInput,
    ) -> anyhow::Result<ChecklistAssignment> {
        let conn = self.conn()?;
        let id = Uuid::new_v4();
        conn.execute(
            "INSERT INTO checklist_assignments (id, checklist_id, user_id, assigned_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![id.to_string(), checklist_id.to_string(), input.user_id.to_string(), now()],
        )?;
        let assignment = conn.query_row(
            "SELECT id, checklist_id, user_id, assigned_at FROM checklist_assignments WHERE id = ?1",
            params![id.to_string()],
            map_assignment,
        )?;
        tracing::debug!(
            checklist_id = %checklist_id,
            user_id = %input.user_id,
            "checklist assigned"
        );
        Ok(assignment)
    }

    pub fn get_assignments_for_user(
        &self,
        user_id: Uuid,
    ) -> anyhow::Result<Vec<ChecklistAssignment>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, checklist_id, user_id, assigned_at
             FROM checklist_assignments WHERE user_id = ?1 ORDER BY assigned_at",
        )?;
        let assignments = stmt
            .query_map(params![user_id.to_string()], map_assignment)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(assignments)
    }

    pub fn unassign_checklist(&self, checklist_id: Uuid, user_id: Uuid) -> anyhow::Result<bool> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM checklist_assignments WHERE checklist_id = ?1 AND user_id = ?2",
            params![checklist_id.to_string(), user_id.to_string()],
        )?;
        Ok(deleted > 0)
    }
}
