//! Handler bodies shared by the dataset and model routes.

use axum::extract::Multipart;
use axum::response::Redirect;
use axum::Json;
use serde::Deserialize;
use traintrack_core::artifact::{ArtifactRecord, ListingRecord, SortKey};
use traintrack_core::registry;
use traintrack_core::types::ArtifactKind;
use traintrack_core::upload::{UploadFile, UploadForm};

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub sort: Option<String>,
}

/// Listing path for `kind`, where uploads and deletes send the browser.
pub fn list_path(kind: ArtifactKind) -> &'static str {
    match kind {
        ArtifactKind::Dataset => "/datasets",
        ArtifactKind::Model => "/models",
    }
}

pub async fn list(
    state: &AppState,
    kind: ArtifactKind,
    query: ListQuery,
) -> Result<Json<Vec<ListingRecord>>, AppError> {
    let sort = query
        .sort
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<SortKey>())
        .transpose()?;
    let registry = state.registry.clone();
    let listings = tokio::task::spawn_blocking(move || {
        registry::list_artifacts(registry.as_ref(), kind, sort)
    })
    .await
    .map_err(AppError::join)??;
    Ok(Json(listings))
}

pub async fn get(state: &AppState, kind: ArtifactKind, id: String) -> Result<ArtifactRecord, AppError> {
    let registry = state.registry.clone();
    let record = tokio::task::spawn_blocking(move || {
        registry::get_artifact(registry.as_ref(), kind, &id)
    })
    .await
    .map_err(AppError::join)??;
    Ok(record)
}

pub async fn upload(
    state: &AppState,
    kind: ArtifactKind,
    multipart: Multipart,
) -> Result<Redirect, AppError> {
    let form = read_upload_form(multipart).await?;
    let uploads = state.uploads.clone();
    tokio::task::spawn_blocking(move || uploads.upload(kind, form))
        .await
        .map_err(AppError::join)??;
    Ok(Redirect::to(list_path(kind)))
}

/// Lenient: deleting something that is already gone still redirects.
pub async fn delete(state: &AppState, kind: ArtifactKind, id: String) -> Result<Redirect, AppError> {
    let uploads = state.uploads.clone();
    tokio::task::spawn_blocking(move || uploads.delete(kind, &id))
        .await
        .map_err(AppError::join)??;
    Ok(Redirect::to(list_path(kind)))
}

/// Decode a multipart upload.
///
/// Text fields become metadata. File fields named `archive` and `image` are
/// the archive and cover image; every other file field is a payload file.
/// Empty file inputs (no file chosen) are skipped.
pub async fn read_upload_form(mut multipart: Multipart) -> Result<UploadForm, AppError> {
    let mut form = UploadForm::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::bad_request(e.body_text()))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        let file_name = field.file_name().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::bad_request(e.body_text()))?;

        match file_name {
            None => {
                form.fields
                    .insert(name, String::from_utf8_lossy(&bytes).into_owned());
            }
            Some(f) if f.is_empty() && bytes.is_empty() => {}
            Some(f) => {
                let file = UploadFile::new(f, bytes.to_vec());
                match name.as_str() {
                    "archive" => form.archive = Some(file),
                    "image" => form.image = Some(file),
                    _ => form.files.push(file),
                }
            }
        }
    }
    Ok(form)
}
