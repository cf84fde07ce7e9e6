//! Survey response reset.
//!
//! Keys are `(respondent, survey)`. The projection never requires a row, so
//! a rebuild purges every response in scope together with its answers.

use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::engine::Projection;
use crate::db::get_uuid;
use crate::error::{MaintenanceError, MaintenanceResult};
use crate::models::ProjectionKey;

/// Reset responses for one survey, or for all of them when `survey_id` is
/// `None`. Responses outside the scope are reported as unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct SurveyResponses {
    pub survey_id: Option<Uuid>,
}

impl SurveyResponses {
    pub fn all() -> Self {
        Self { survey_id: None }
    }

    pub fn for_survey(survey_id: Uuid) -> Self {
        Self {
            survey_id: Some(survey_id),
        }
    }
}

fn map_key(row: &Row<'_>) -> rusqlite::Result<ProjectionKey> {
    Ok(ProjectionKey::new(get_uuid(row, 0)?, get_uuid(row, 1)?))
}

impl Projection for SurveyResponses {
    fn name(&self) -> &'static str {
        "survey_responses"
    }

    // Responses go before their answers, so answers dangle until swept.
    fn requires_integrity_guard(&self) -> bool {
        true
    }

    fn required_keys(&self, conn: &Connection) -> rusqlite::Result<Vec<ProjectionKey>> {
        let Some(survey_id) = self.survey_id else {
            return Ok(Vec::new());
        };
        let mut stmt = conn.prepare(
            "SELECT respondent_id, survey_id FROM survey_responses WHERE survey_id <> ?1",
        )?;
        let keys = stmt
            .query_map(params![survey_id.to_string()], map_key)?
            .collect();
        keys
    }

    fn current_keys(&self, conn: &Connection) -> rusqlite::Result<Vec<ProjectionKey>> {
        let mut stmt = conn.prepare("SELECT respondent_id, survey_id FROM survey_responses")?;
        let keys = stmt.query_map([], map_key)?.collect();
        keys
    }

    fn insert_default(&self, _conn: &Connection, key: &ProjectionKey) -> MaintenanceResult<()> {
        Err(MaintenanceError::Irreproducible {
            projection: self.name(),
            key: *key,
        })
    }

    fn delete(&self, conn: &Connection, key: &ProjectionKey) -> MaintenanceResult<()> {
        let response_id: Option<String> = conn
            .query_row(
                "SELECT id FROM survey_responses WHERE respondent_id = ?1 AND survey_id = ?2",
                params![key.owner_id.to_string(), key.item_id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        let Some(response_id) = response_id else {
            return Ok(());
        };

        conn.execute(
            "DELETE FROM survey_responses WHERE id = ?1",
            params![response_id],
        )?;
        let answers = conn.execute(
            "DELETE FROM survey_answers WHERE response_id = ?1",
            params![response_id],
        )?;
        tracing::trace!(response_id = %response_id, answers, "survey response purged");
        Ok(())
    }
}
