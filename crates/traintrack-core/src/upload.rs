//! Creating and removing datasets and models.
//!
//! An upload allocates a registry record, materializes the payload into the
//! record's directory, then points the record at that directory. When any step
//! after allocation fails, the directory and the record are removed again
//! before the error is returned.

use crate::artifact::Metadata;
use crate::error::{Result, TrainTrackError};
use crate::paths;
use crate::registry::Registry;
use crate::types::ArtifactKind;
use std::collections::BTreeMap;
use std::io::Cursor;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

/// Metadata key holding the cover image file name.
pub const COVER_IMAGE_KEY: &str = "cover_image";

#[derive(Debug, Clone)]
pub struct UploadFile {
    /// File name as sent by the client.
    pub name: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }
}

/// A decoded upload form.
#[derive(Debug, Clone, Default)]
pub struct UploadForm {
    pub fields: BTreeMap<String, String>,
    pub files: Vec<UploadFile>,
    pub archive: Option<UploadFile>,
    pub image: Option<UploadFile>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UploadOutcome {
    pub id: String,
    pub path: PathBuf,
}

/// Outcome of a lenient delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteOutcome {
    pub records_removed: u64,
    pub dir_removed: bool,
}

pub struct UploadPipeline {
    root: PathBuf,
    registry: Arc<dyn Registry>,
    required_fields: Vec<String>,
}

/// Upload contents that passed validation.
struct Prepared {
    metadata: Metadata,
    files: Vec<(String, Vec<u8>)>,
    archive: Option<Vec<u8>>,
    image: Option<Vec<u8>>,
}

impl UploadPipeline {
    pub fn new(root: &Path, registry: Arc<dyn Registry>, required_fields: Vec<String>) -> Self {
        Self {
            root: root.to_path_buf(),
            registry,
            required_fields,
        }
    }

    pub fn upload(&self, kind: ArtifactKind, form: UploadForm) -> Result<UploadOutcome> {
        let mut prepared = self.prepare(form)?;

        let metadata = std::mem::take(&mut prepared.metadata);
        let record = self.registry.create_provisional(kind, metadata)?;
        let dir = paths::artifact_dir(&self.root, kind, &record.id);

        match self.materialize(kind, &record.id, &dir, &prepared) {
            Ok(()) => {
                tracing::info!(kind = %kind, id = %record.id, "artifact uploaded");
                Ok(UploadOutcome { id: record.id, path: dir })
            }
            Err(e) => {
                tracing::warn!(kind = %kind, id = %record.id, error = %e, "upload failed, rolling back");
                self.compensate(kind, &record.id, &dir);
                Err(e)
            }
        }
    }

    /// Remove an artifact's record and directory. Missing pieces are not errors.
    pub fn delete(&self, kind: ArtifactKind, id: &str) -> Result<DeleteOutcome> {
        paths::validate_id(id)?;
        let records_removed = self.registry.delete(kind, id)?;
        let dir_removed = crate::io::remove_dir_if_exists(&paths::artifact_dir(&self.root, kind, id))?;
        tracing::info!(kind = %kind, id, records_removed, dir_removed, "artifact deleted");
        Ok(DeleteOutcome {
            records_removed,
            dir_removed,
        })
    }

    // -----------------------------------------------------------------------
    // Steps
    // -----------------------------------------------------------------------

    fn prepare(&self, form: UploadForm) -> Result<Prepared> {
        for name in &self.required_fields {
            let present = form
                .fields
                .get(name)
                .is_some_and(|v| !v.trim().is_empty());
            if !present {
                return Err(TrainTrackError::MissingField(name.clone()));
            }
        }
        if form.files.is_empty() && form.archive.is_none() {
            return Err(TrainTrackError::EmptyUpload);
        }

        let mut files = Vec::with_capacity(form.files.len());
        for file in form.files {
            let name = payload_name(&file.name)?;
            files.push((name, file.bytes));
        }

        let archive = match form.archive {
            Some(file) => {
                let name = paths::sanitize_file_name(&file.name)?;
                let is_zip = Path::new(&name)
                    .extension()
                    .is_some_and(|e| e.eq_ignore_ascii_case("zip"));
                if !is_zip {
                    return Err(TrainTrackError::Archive(format!(
                        "'{name}' is not a .zip archive"
                    )));
                }
                check_archive(&file.bytes)?;
                Some(file.bytes)
            }
            None => None,
        };

        let mut metadata: Metadata = form
            .fields
            .into_iter()
            .map(|(k, v)| (k, serde_json::Value::String(v)))
            .collect();
        if form.image.is_some() {
            metadata.insert(
                COVER_IMAGE_KEY.to_string(),
                serde_json::Value::String(paths::COVER_IMAGE_FILE.to_string()),
            );
        }

        Ok(Prepared {
            metadata,
            files,
            archive,
            image: form.image.map(|f| f.bytes),
        })
    }

    fn materialize(&self, kind: ArtifactKind, id: &str, dir: &Path, prepared: &Prepared) -> Result<()> {
        crate::io::ensure_dir(dir)?;
        for (name, bytes) in &prepared.files {
            std::fs::write(dir.join(name), bytes)?;
        }
        if let Some(bytes) = &prepared.archive {
            let mut archive = zip::ZipArchive::new(Cursor::new(bytes.as_slice()))
                .map_err(|e| TrainTrackError::Archive(e.to_string()))?;
            archive
                .extract(dir)
                .map_err(|e| TrainTrackError::Archive(e.to_string()))?;
        }
        if let Some(bytes) = &prepared.image {
            std::fs::write(dir.join(paths::COVER_IMAGE_FILE), bytes)?;
        }
        self.registry.set_path(kind, id, dir)
    }

    fn compensate(&self, kind: ArtifactKind, id: &str, dir: &Path) {
        if let Err(e) = self.registry.delete(kind, id) {
            tracing::warn!(kind = %kind, id, error = %e, "could not remove provisional record");
        }
        if let Err(e) = crate::io::remove_dir_if_exists(dir) {
            tracing::warn!(kind = %kind, id, error = %e, "could not remove upload directory");
        }
    }
}

/// Base name of a payload file. The metadata file name is reserved.
fn payload_name(raw: &str) -> Result<String> {
    let name = paths::sanitize_file_name(raw)?;
    if name == paths::INFO_FILE {
        return Err(TrainTrackError::InvalidFileName(name));
    }
    Ok(name)
}

/// Every entry must be a regular file or directory that stays inside the
/// target directory and leaves `info.json` alone.
fn check_archive(bytes: &[u8]) -> Result<()> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| TrainTrackError::Archive(e.to_string()))?;
    for i in 0..archive.len() {
        let entry = archive
            .by_index(i)
            .map_err(|e| TrainTrackError::Archive(e.to_string()))?;
        if entry.is_symlink() {
            return Err(TrainTrackError::Archive(format!(
                "'{}' is a symbolic link",
                entry.name()
            )));
        }
        let rejected = || TrainTrackError::InvalidFileName(entry.name().to_string());
        let path = entry.enclosed_name().ok_or_else(rejected)?;
        let mut normal = Vec::new();
        for component in path.components() {
            match component {
                Component::Normal(part) => normal.push(part),
                Component::CurDir => {}
                _ => return Err(rejected()),
            }
        }
        if normal.len() == 1 && normal[0] == paths::INFO_FILE {
            return Err(rejected());
        }
    }
    Ok(())
}
