use rusqlite::{params, OptionalExtension, Row};
use uuid::Uuid;

use super::{get_time, get_uuid, invalid_enum, now, Database};
use crate::models::*;

const USER_COLUMNS: &str = "id, name, email, role, created_at";

fn map_user(row: &Row<'_>) -> rusqlite::Result<User> {
    let role: String = row.get(3)?;
    Ok(User {
        id: get_uuid(row, 0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        role: UserRole::from_str(&role).ok_or_else(|| invalid_enum(3, &role))?,
        created_at: get_time(row, 4)?,
    })
}

impl Database {
    pub fn create_user(&self, input: CreateUserInput) -> anyhow::Result<User> {
        let conn = self.conn()?;
        let id = Uuid::new_v4();
        let role = input.role.unwrap_or(UserRole::Employee);
        conn.execute(
            "INSERT INTO users (id, name, email, role, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![id.to_string(), input.name, input.email, role.as_str(), now()],
        )?;
        let user = conn.query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
            params![id.to_string()],
            map_user,
        )?;
        tracing::debug!(user_id = %user.id, role = role.as_str(), "user created");
        Ok(user)
    }

    pub fn get_user(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let conn = self.conn()?;
        let user = conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                params![id.to_string()],
                map_user,
            )
            .optional()?;
        Ok(user)
    }

    pub fn get_all_users(&self) -> anyhow::Result<Vec<User>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY name"))?;
        let users = stmt
            .query_map([], map_user)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(users)
    }

    /// Delete a user with everything that references them.
    ///
    /// Responses cascade from the user row, but their answers do not cascade
    /// from responses, so the answers go first.
    pub fn delete_user(&self, id: Uuid) -> anyhow::Result<bool> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let answers = tx.execute(
            "DELETE FROM survey_answers WHERE response_id IN
                (SELECT id FROM survey_responses WHERE respondent_id = ?1)",
            params![id.to_string()],
        )?;
        let deleted = tx.execute("DELETE FROM users WHERE id = ?1", params![id.to_string()])?;
        tx.commit()?;
        if deleted > 0 {
            tracing::debug!(user_id = %id, answers, "user deleted");
        }
        Ok(deleted > 0)
    }
}
