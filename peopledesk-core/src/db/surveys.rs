use rusqlite::{params, OptionalExtension, Row};
use uuid::Uuid;

use super::{get_time, get_uuid, now, Database};
use crate::models::*;

fn map_survey(row: &Row<'_>) -> rusqlite::Result<Survey> {
    Ok(Survey {
        id: get_uuid(row, 0)?,
        title: row.get(1)?,
        created_at: get_time(row, 2)?,
    })
}

fn map_question(row: &Row<'_>) -> rusqlite::Result<SurveyQuestion> {
    Ok(SurveyQuestion {
        id: get_uuid(row, 0)?,
        survey_id: get_uuid(row, 1)?,
        prompt: row.get(2)?,
        position: row.get(3)?,
    })
}

fn map_answer(row: &Row<'_>) -> rusqlite::Result<SurveyAnswer> {
    Ok(SurveyAnswer {
        id: get_uuid(row, 0)?,
        question_id: get_uuid(row, 1)?,
        value: row.get(2)?,
    })
}

impl Database {
    pub fn create_survey(&self, input: CreateSurveyInput) -> anyhow::Result<SurveyWithQuestions> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let survey_id = Uuid::new_v4();
        tx.execute(
            "INSERT INTO surveys (id, title, created_at) VALUES (?1, ?2, ?3)",
            params![survey_id.to_string(), input.title, now()],
        )?;
        for (position, prompt) in input.questions.iter().enumerate() {
            tx.execute(
                "INSERT INTO survey_questions (id, survey_id, prompt, position) VALUES (?1, ?2, ?3, ?4)",
                params![Uuid::new_v4().to_string(), survey_id.to_string(), prompt, position as i64],
            )?;
        }
        tx.commit()?;
        drop(conn);

        self.get_survey(survey_id)?
            .ok_or_else(|| anyhow::anyhow!("survey {} vanished after insert", survey_id))
    }

    pub fn get_survey(&self, id: Uuid) -> anyhow::Result<Option<SurveyWithQuestions>> {
        let conn = self.conn()?;
        let survey = conn
            .query_row(
                "SELECT id, title, created_at FROM surveys WHERE id = ?1",
                params![id.to_string()],
                map_survey,
            )
            .optional()?;
        let Some(survey) = survey else {
            return Ok(None);
        };
        let mut stmt = conn.prepare(
            "SELECT id, survey_id, prompt, position FROM survey_questions
             WHERE survey_id = ?1 ORDER BY position",
        )?;
        let questions = stmt
            .query_map(params![id.to_string()], map_question)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Some(SurveyWithQuestions { survey, questions }))
    }

    /// Store a response and its answers atomically.
    pub fn submit_response(
        &self,
        survey_id: Uuid,
        input: SubmitResponseInput,
    ) -> anyhow::Result<SurveyResponse> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let response_id = Uuid::new_v4();
        let submitted_at = chrono::Utc::now();
        tx.execute(
            "INSERT INTO survey_responses (id, survey_id, respondent_id, submitted_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                response_id.to_string(),
                survey_id.to_string(),
                input.respondent_id.to_string(),
                submitted_at.to_rfc3339(),
            ],
        )?;
        let mut answers = Vec::with_capacity(input.answers.len());
        for answer in input.answers {
            let id = Uuid::new_v4();
            tx.execute(
                "INSERT INTO survey_answers (id, response_id, question_id, value) VALUES (?1, ?2, ?3, ?4)",
                params![
                    id.to_string(),
                    response_id.to_string(),
                    answer.question_id.to_string(),
                    answer.value,
                ],
            )?;
            answers.push(SurveyAnswer {
                id,
                question_id: answer.question_id,
                value: answer.value,
            });
        }
        tx.commit()?;

        Ok(SurveyResponse {
            id: response_id,
            survey_id,
            respondent_id: input.respondent_id,
            submitted_at,
            answers,
        })
    }

    pub fn get_responses(&self, survey_id: Uuid) -> anyhow::Result<Vec<SurveyResponse>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, survey_id, respondent_id, submitted_at FROM survey_responses
             WHERE survey_id = ?1 ORDER BY submitted_at",
        )?;
        let headers = stmt
            .query_map(params![survey_id.to_string()], |row| {
                Ok((
                    get_uuid(row, 0)?,
                    get_uuid(row, 1)?,
                    get_uuid(row, 2)?,
                    get_time(row, 3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut answer_stmt = conn.prepare(
            "SELECT id, question_id, value FROM survey_answers WHERE response_id = ?1",
        )?;
        let mut responses = Vec::with_capacity(headers.len());
        for (id, survey_id, respondent_id, submitted_at) in headers {
            let answers = answer_stmt
                .query_map(params![id.to_string()], map_answer)?
                .collect::<Result<Vec<_>, _>>()?;
            responses.push(SurveyResponse {
                id,
                survey_id,
                respondent_id,
                submitted_at,
                answers,
            });
        }
        Ok(responses)
    }

    /// `(responses, answers)` across all surveys.
    pub fn count_survey_rows(&self) -> anyhow::Result<(usize, usize)> {
        let conn = self.conn()?;
        let (responses, answers): (i64, i64) = conn.query_row(
            "SELECT (SELECT COUNT(*) FROM survey_responses), (SELECT COUNT(*) FROM survey_answers)",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok((usize::try_from(responses)?, usize::try_from(answers)?))
    }
}
