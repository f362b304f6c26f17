use super::{sort_by_id, unavailable, Registry};
use crate::artifact::{ArtifactRecord, Metadata};
use crate::error::Result;
use crate::paths;
use crate::types::ArtifactKind;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Registry backed by one `info.json` per artifact directory.
///
/// Directories written by older deployments hold bare metadata objects in
/// `info.json`; those are read with the directory name as identifier.
pub struct FsRegistry {
    root: PathBuf,
    /// Serializes identifier allocation.
    alloc: Mutex<()>,
}

impl FsRegistry {
    pub fn open(root: &Path) -> Result<Self> {
        for kind in ArtifactKind::all() {
            crate::io::ensure_dir(&paths::kind_dir(root, *kind))?;
        }
        Ok(Self {
            root: root.to_path_buf(),
            alloc: Mutex::new(()),
        })
    }

    fn read_record(&self, kind: ArtifactKind, id: &str) -> Result<Option<ArtifactRecord>> {
        let info = paths::info_path(&self.root, kind, id);
        let data = match std::fs::read(&info) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(unavailable(format!("{}: {e}", info.display()))),
        };
        parse_info(kind, id, &self.root, &data, modified_at(&info))
            .map(Some)
            .map_err(|e| unavailable(format!("{}: {e}", info.display())))
    }

    fn write_record(&self, record: &ArtifactRecord) -> Result<()> {
        let info = paths::info_path(&self.root, record.kind, &record.id);
        let data = serde_json::to_vec_pretty(record)?;
        crate::io::atomic_write(&info, &data).map_err(unavailable)
    }

    fn next_id(&self, kind: ArtifactKind) -> Result<u64> {
        let dir = paths::kind_dir(&self.root, kind);
        let mut max = 0u64;
        for entry in std::fs::read_dir(&dir).map_err(unavailable)? {
            let entry = entry.map_err(unavailable)?;
            if let Ok(n) = entry.file_name().to_string_lossy().parse::<u64>() {
                max = max.max(n);
            }
        }
        Ok(max + 1)
    }
}

fn modified_at(path: &Path) -> DateTime<Utc> {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| Utc::now())
}

/// A stored record must name the directory it lives in.
fn parse_info(
    kind: ArtifactKind,
    id: &str,
    root: &Path,
    data: &[u8],
    fallback_created: DateTime<Utc>,
) -> std::result::Result<ArtifactRecord, String> {
    if let Ok(record) = serde_json::from_slice::<ArtifactRecord>(data) {
        if record.id != id || record.kind != kind {
            return Err(format!(
                "record names {} '{}' but is stored as {kind} '{id}'",
                record.kind, record.id
            ));
        }
        return Ok(record);
    }
    let metadata: Metadata = serde_json::from_slice(data).map_err(|e| e.to_string())?;
    Ok(ArtifactRecord {
        id: id.to_string(),
        kind,
        metadata,
        path: Some(paths::artifact_dir(root, kind, id)),
        created_at: fallback_created,
    })
}

impl Registry for FsRegistry {
    fn list(&self, kind: ArtifactKind) -> Result<Vec<ArtifactRecord>> {
        let dir = paths::kind_dir(&self.root, kind);
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(unavailable(format!("{}: {e}", dir.display()))),
        };

        let mut records = Vec::new();
        for entry in entries {
            let entry = entry.map_err(unavailable)?;
            if !entry.file_type().map_err(unavailable)?.is_dir() {
                continue;
            }
            let id = entry.file_name().to_string_lossy().into_owned();
            if paths::validate_id(&id).is_err() {
                continue;
            }
            match self.read_record(kind, &id) {
                Ok(Some(record)) => records.push(record),
                Ok(None) => {}
                Err(e) => tracing::warn!(kind = %kind, id = %id, error = %e, "skipping unreadable artifact"),
            }
        }
        sort_by_id(&mut records);
        Ok(records)
    }

    fn get(&self, kind: ArtifactKind, id: &str) -> Result<Option<ArtifactRecord>> {
        if paths::validate_id(id).is_err() {
            return Ok(None);
        }
        self.read_record(kind, id)
    }

    fn create_provisional(&self, kind: ArtifactKind, metadata: Metadata) -> Result<ArtifactRecord> {
        let _guard = self.alloc.lock().unwrap_or_else(|e| e.into_inner());
        let mut n = self.next_id(kind)?;
        loop {
            let dir = paths::artifact_dir(&self.root, kind, &n.to_string());
            match std::fs::create_dir(&dir) {
                Ok(()) => break,
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => n += 1,
                Err(e) => return Err(unavailable(format!("{}: {e}", dir.display()))),
            }
        }
        let record = ArtifactRecord::new(kind, n.to_string(), metadata);
        self.write_record(&record)?;
        Ok(record)
    }

    fn set_path(&self, kind: ArtifactKind, id: &str, path: &Path) -> Result<()> {
        paths::validate_id(id)?;
        let mut record = self.read_record(kind, id)?.ok_or_else(|| {
            crate::error::TrainTrackError::ArtifactNotFound {
                kind: kind.to_string(),
                id: id.to_string(),
            }
        })?;
        record.id = id.to_string();
        record.kind = kind;
        record.path = Some(path.to_path_buf());
        self.write_record(&record)
    }

    fn delete(&self, kind: ArtifactKind, id: &str) -> Result<u64> {
        if paths::validate_id(id).is_err() {
            return Ok(0);
        }
        match std::fs::remove_file(paths::info_path(&self.root, kind, id)) {
            Ok(()) => Ok(1),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(unavailable(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn ids_continue_after_existing_numeric_dirs() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("datasets/4")).unwrap();
        std::fs::create_dir_all(dir.path().join("datasets/notes")).unwrap();
        let registry = FsRegistry::open(dir.path()).unwrap();
        let record = registry
            .create_provisional(ArtifactKind::Dataset, Metadata::new())
            .unwrap();
        assert_eq!(record.id, "5");
        assert!(dir.path().join("datasets/5/info.json").exists());
    }

    #[test]
    fn legacy_info_json_is_read_as_metadata() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("ml-models/m1")).unwrap();
        std::fs::write(
            dir.path().join("ml-models/m1/info.json"),
            r#"{"heading":"Digits CNN","author":"Ada"}"#,
        )
        .unwrap();
        let registry = FsRegistry::open(dir.path()).unwrap();

        let models = registry.list(ArtifactKind::Model).unwrap();
        assert_eq!(models.len(), 1);
        assert_eq!(models[0].id, "m1");
        assert_eq!(models[0].field("heading"), Some("Digits CNN"));
        assert_eq!(
            models[0].path.as_deref(),
            Some(dir.path().join("ml-models/m1").as_path())
        );
    }

    #[test]
    fn corrupt_entry_is_skipped_in_listing_but_reported_on_get() {
        let dir = TempDir::new().unwrap();
        let registry = FsRegistry::open(dir.path()).unwrap();
        registry
            .create_provisional(ArtifactKind::Dataset, Metadata::new())
            .unwrap();
        std::fs::create_dir_all(dir.path().join("datasets/9")).unwrap();
        std::fs::write(dir.path().join("datasets/9/info.json"), "{not json").unwrap();

        assert_eq!(registry.list(ArtifactKind::Dataset).unwrap().len(), 1);
        assert!(matches!(
            registry.get(ArtifactKind::Dataset, "9"),
            Err(crate::error::TrainTrackError::RegistryUnavailable(_))
        ));
    }

    #[test]
    fn record_naming_another_directory_is_refused() {
        let dir = TempDir::new().unwrap();
        let registry = FsRegistry::open(dir.path()).unwrap();
        let mut metadata = Metadata::new();
        metadata.insert("heading".into(), serde_json::json!("Victim"));
        let victim = registry
            .create_provisional(ArtifactKind::Dataset, metadata)
            .unwrap();
        std::fs::create_dir_all(dir.path().join("datasets/2")).unwrap();
        std::fs::write(
            dir.path().join("datasets/2/info.json"),
            format!(
                r#"{{"id":"{}","kind":"dataset","metadata":{{"heading":"Forged"}},"created_at":"2024-01-01T00:00:00Z"}}"#,
                victim.id
            ),
        )
        .unwrap();

        let listed = registry.list(ArtifactKind::Dataset).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].field("heading"), Some("Victim"));
        assert!(matches!(
            registry.get(ArtifactKind::Dataset, "2"),
            Err(crate::error::TrainTrackError::RegistryUnavailable(_))
        ));
        assert!(registry
            .set_path(ArtifactKind::Dataset, "2", &dir.path().join("datasets/2"))
            .is_err());
        let victim = registry.get(ArtifactKind::Dataset, &victim.id).unwrap().unwrap();
        assert_eq!(victim.field("heading"), Some("Victim"));
    }

    #[test]
    fn set_path_rejects_traversal_ids() {
        let dir = TempDir::new().unwrap();
        let registry = FsRegistry::open(dir.path()).unwrap();
        assert!(matches!(
            registry.set_path(ArtifactKind::Dataset, "../x", dir.path()),
            Err(crate::error::TrainTrackError::InvalidId(_))
        ));
    }

    #[test]
    fn directories_without_info_are_ignored() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("datasets/3")).unwrap();
        let registry = FsRegistry::open(dir.path()).unwrap();
        assert!(registry.list(ArtifactKind::Dataset).unwrap().is_empty());
        assert!(registry.get(ArtifactKind::Dataset, "3").unwrap().is_none());
    }
}
