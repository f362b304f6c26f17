use axum::extract::{Multipart, Path, Query, State};
use axum::response::Redirect;
use axum::Json;
use traintrack_core::access::AccessLevel;
use traintrack_core::artifact::{ArtifactRecord, ListingRecord};
use traintrack_core::types::ArtifactKind;

use super::artifacts::{self, ListQuery};
use crate::auth::Caller;
use crate::error::AppError;
use crate::state::AppState;

/// GET /datasets
pub async fn list_datasets(
    State(app): State<AppState>,
    caller: Caller,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<ListingRecord>>, AppError> {
    caller.require(AccessLevel::Authenticated)?;
    artifacts::list(&app, ArtifactKind::Dataset, query).await
}

/// GET /datasets/{id}/info
pub async fn dataset_info(
    State(app): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<ArtifactRecord>, AppError> {
    caller.require(AccessLevel::Authenticated)?;
    Ok(Json(artifacts::get(&app, ArtifactKind::Dataset, id).await?))
}

/// POST /datasets/upload
pub async fn upload_dataset(
    State(app): State<AppState>,
    caller: Caller,
    multipart: Multipart,
) -> Result<Redirect, AppError> {
    caller.require(AccessLevel::Elevated)?;
    artifacts::upload(&app, ArtifactKind::Dataset, multipart).await
}

/// POST /datasets/{id}/delete
pub async fn delete_dataset(
    State(app): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Redirect, AppError> {
    caller.require(AccessLevel::Admin)?;
    artifacts::delete(&app, ArtifactKind::Dataset, id).await
}
