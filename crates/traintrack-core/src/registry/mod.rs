//! Enumerates stored datasets and models.
//!
//! Two interchangeable backends implement [`Registry`]: flat `info.json`
//! files ([`FsRegistry`]) and SQLite rows ([`SqliteRegistry`]). Backend
//! failures surface as [`TrainTrackError::RegistryUnavailable`] so callers can
//! tell "nothing stored" apart from "could not look".

mod fs;
mod sqlite;

pub use fs::FsRegistry;
pub use sqlite::SqliteRegistry;

use crate::artifact::{self, ArtifactRecord, ListingRecord, Metadata, SortKey};
use crate::error::{Result, TrainTrackError};
use crate::types::ArtifactKind;
use std::path::Path;

pub trait Registry: Send + Sync {
    fn list(&self, kind: ArtifactKind) -> Result<Vec<ArtifactRecord>>;

    fn get(&self, kind: ArtifactKind, id: &str) -> Result<Option<ArtifactRecord>>;

    /// Persist a record without a storage path and allocate its identifier.
    fn create_provisional(&self, kind: ArtifactKind, metadata: Metadata) -> Result<ArtifactRecord>;

    fn set_path(&self, kind: ArtifactKind, id: &str, path: &Path) -> Result<()>;

    /// Remove a record. Returns the number of records removed; 0 is not an error.
    fn delete(&self, kind: ArtifactKind, id: &str) -> Result<u64>;
}

/// All artifacts of `kind` as listing entries.
pub fn list_artifacts(
    registry: &dyn Registry,
    kind: ArtifactKind,
    sort: Option<SortKey>,
) -> Result<Vec<ListingRecord>> {
    let records = registry.list(kind)?;
    Ok(artifact::listings(&records, sort))
}

/// Full metadata for one artifact, or `ArtifactNotFound`.
pub fn get_artifact(registry: &dyn Registry, kind: ArtifactKind, id: &str) -> Result<ArtifactRecord> {
    crate::paths::validate_id(id)?;
    registry
        .get(kind, id)?
        .ok_or_else(|| TrainTrackError::ArtifactNotFound {
            kind: kind.to_string(),
            id: id.to_string(),
        })
}

fn unavailable(e: impl std::fmt::Display) -> TrainTrackError {
    TrainTrackError::RegistryUnavailable(e.to_string())
}

/// Order numeric identifiers numerically, everything else after them by name.
fn sort_by_id(records: &mut [ArtifactRecord]) {
    records.sort_by(|a, b| {
        let key = |r: &ArtifactRecord| (r.id.parse::<u64>().map_err(|_| ()), r.id.clone());
        key(a).cmp(&key(b))
    });
}
