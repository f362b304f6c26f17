use axum::extract::rejection::FormRejection;
use axum::extract::{Multipart, Path, Query, State};
use axum::response::Redirect;
use axum::{Form, Json};
use serde::Deserialize;
use traintrack_core::access::AccessLevel;
use traintrack_core::artifact::{ArtifactRecord, ListingRecord, ModelDetail};
use traintrack_core::paths;
use traintrack_core::types::ArtifactKind;

use super::artifacts::{self, ListQuery};
use crate::auth::Caller;
use crate::error::AppError;
use crate::state::AppState;

/// GET /models
pub async fn list_models(
    State(app): State<AppState>,
    caller: Caller,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<ListingRecord>>, AppError> {
    caller.require(AccessLevel::Authenticated)?;
    artifacts::list(&app, ArtifactKind::Model, query).await
}

/// GET /models/{id}/info
pub async fn model_info(
    State(app): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<ArtifactRecord>, AppError> {
    caller.require(AccessLevel::Authenticated)?;
    Ok(Json(artifacts::get(&app, ArtifactKind::Model, id).await?))
}

/// GET /models/{id}: metadata plus visualizations and metrics.
pub async fn get_model(
    State(app): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<ModelDetail>, AppError> {
    caller.require(AccessLevel::Elevated)?;
    let record = artifacts::get(&app, ArtifactKind::Model, id).await?;
    let dir = record
        .path
        .clone()
        .unwrap_or_else(|| paths::artifact_dir(&app.root, ArtifactKind::Model, &record.id));
    let detail = tokio::task::spawn_blocking(move || ModelDetail::load(record, &dir))
        .await
        .map_err(AppError::join)??;
    Ok(Json(detail))
}

/// POST /models/upload
pub async fn upload_model(
    State(app): State<AppState>,
    caller: Caller,
    multipart: Multipart,
) -> Result<Redirect, AppError> {
    caller.require(AccessLevel::Elevated)?;
    artifacts::upload(&app, ArtifactKind::Model, multipart).await
}

/// POST /models/{id}/delete
pub async fn delete_model(
    State(app): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Redirect, AppError> {
    caller.require(AccessLevel::Admin)?;
    artifacts::delete(&app, ArtifactKind::Model, id).await
}

#[derive(Debug, Default, Deserialize)]
pub struct ExecuteBody {
    pub script: Option<String>,
}

/// POST /models/{id}/execute
///
/// `script` defaults to `execution.default_script`. The run is its own task
/// and finishes even if the client disconnects.
pub async fn execute_model(
    State(app): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
    body: Result<Form<ExecuteBody>, FormRejection>,
) -> Result<Redirect, AppError> {
    caller.require(AccessLevel::Elevated)?;
    let body = body.map(|Form(b)| b).unwrap_or_default();
    let script = body
        .script
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| app.config.execution.default_script.clone());

    let tracker = app.tracker.clone();
    let model_id = id.clone();
    tokio::spawn(async move { tracker.execute(&model_id, &script).await })
        .await
        .map_err(AppError::join)??;
    Ok(Redirect::to(&format!("/models/{id}")))
}

/// GET /models/{id}/status
pub async fn model_status(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let status = app.tracker.get_status(&id)?;
    Ok(Json(serde_json::json!({ "status": status })))
}
