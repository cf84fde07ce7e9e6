use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use peopledesk_core::maintenance::{
    ChecklistProgress, Projection, RebuildOptions, RebuildReport, Rebuilder, SurveyResponses,
};
use peopledesk_core::models::*;
use peopledesk_core::Database;

use super::ApiError;

const DEFAULT_RUN_LIMIT: usize = 20;

#[derive(Debug, Default, Deserialize)]
pub struct RebuildParams {
    #[serde(default)]
    pub dry_run: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct SurveyResetParams {
    pub survey_id: Option<Uuid>,
    #[serde(default)]
    pub dry_run: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct RunsParams {
    pub limit: Option<usize>,
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn list_progress(
    State(db): State<Database>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Vec<ProgressEntry>>, ApiError> {
    blocking(db, move |db| {
        if db.get_user(user_id)?.is_none() {
            return Err(ApiError::not_found(format!("user {} not found", user_id)));
        }
        Ok(Json(db.get_progress_for_user(user_id)?))
    })
    .await
}

pub async fn update_progress(
    State(db): State<Database>,
    Path((user_id, item_id)): Path<(Uuid, Uuid)>,
    Json(input): Json<UpdateProgressInput>,
) -> Result<Json<ProgressEntry>, ApiError> {
    blocking(db, move |db| {
        if !db.update_progress(user_id, item_id, input)? {
            return Err(ApiError::not_found("progress entry not found"));
        }
        db.get_progress(user_id, item_id)?
            .map(Json)
            .ok_or_else(|| ApiError::not_found("progress entry not found"))
    })
    .await
}

pub async fn rebuild_checklist_progress(
    State(db): State<Database>,
    Query(params): Query<RebuildParams>,
) -> Result<Json<RebuildReport>, ApiError> {
    let options = RebuildOptions {
        dry_run: params.dry_run,
    };
    run_rebuild(db, ChecklistProgress, options).await
}

pub async fn reset_survey_responses(
    State(db): State<Database>,
    Query(params): Query<SurveyResetParams>,
) -> Result<Json<RebuildReport>, ApiError> {
    let projection = SurveyResponses {
        survey_id: params.survey_id,
    };
    let options = RebuildOptions {
        dry_run: params.dry_run,
    };
    run_rebuild(db, projection, options).await
}

pub async fn list_runs(
    State(db): State<Database>,
    Query(params): Query<RunsParams>,
) -> Result<Json<Vec<MaintenanceRun>>, ApiError> {
    let limit = params.limit.unwrap_or(DEFAULT_RUN_LIMIT);
    blocking(db, move |db| Ok(Json(db.get_recent_runs(limit)?))).await
}

async fn run_rebuild<P>(
    db: Database,
    projection: P,
    options: RebuildOptions,
) -> Result<Json<RebuildReport>, ApiError>
where
    P: Projection + Send + 'static,
{
    blocking(db, move |db| Ok(Json(Rebuilder::new(db).run(&projection, options)?))).await
}

/// Run store work on the blocking pool. A rebuild holds the connection for
/// its whole transaction, and waiting on it must not stall runtime workers.
async fn blocking<T, F>(db: Database, work: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&Database) -> Result<T, ApiError> + Send + 'static,
{
    tokio::task::spawn_blocking(move || work(&db))
        .await
        .map_err(|e| ApiError::Internal(format!("store task failed: {}", e)))?
}
