use crate::error::{Result, TrainTrackError};
use crate::types::ArtifactKind;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const DATASETS_DIR: &str = "datasets";
pub const MODELS_DIR: &str = "ml-models";
pub const STATE_DIR: &str = ".traintrack";

pub const CONFIG_FILE: &str = "traintrack.yaml";
pub const INFO_FILE: &str = "info.json";
pub const STATUS_DB_FILE: &str = ".traintrack/status.redb";

/// Uploaded cover images are always stored under this name.
pub const COVER_IMAGE_FILE: &str = "cover.png";

/// URL prefix under which stored artifact files are served.
pub const FILES_URL_PREFIX: &str = "/files";

/// Shown for artifacts uploaded without a cover image.
pub const PLACEHOLDER_IMAGE: &str = "/images/placeholder.png";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn kind_dir(root: &Path, kind: ArtifactKind) -> PathBuf {
    root.join(kind.dir_name())
}

pub fn artifact_dir(root: &Path, kind: ArtifactKind, id: &str) -> PathBuf {
    kind_dir(root, kind).join(id)
}

pub fn info_path(root: &Path, kind: ArtifactKind, id: &str) -> PathBuf {
    artifact_dir(root, kind, id).join(INFO_FILE)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn status_db_path(root: &Path) -> PathBuf {
    root.join(STATUS_DB_FILE)
}

/// Public URL of a file stored inside an artifact directory.
pub fn file_url(kind: ArtifactKind, id: &str, file_name: &str) -> String {
    format!("{FILES_URL_PREFIX}/{}/{id}/{file_name}", kind.dir_name())
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

static ID_RE: OnceLock<Regex> = OnceLock::new();

fn id_re() -> &'static Regex {
    ID_RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_\-]+$").unwrap())
}

/// Artifact and model identifiers become directory names, so they are
/// restricted to a single safe path component.
pub fn validate_id(id: &str) -> Result<()> {
    if id.is_empty() || id.len() > 64 || !id_re().is_match(id) {
        return Err(TrainTrackError::InvalidId(id.to_string()));
    }
    Ok(())
}

/// Reduce a client-supplied file name to its final component.
///
/// Browsers may send full paths (`C:\data\x.csv`); only the base name is kept.
pub fn sanitize_file_name(name: &str) -> Result<String> {
    let base = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or("")
        .trim();
    if base.is_empty() || base == "." || base == ".." || base.contains('\0') {
        return Err(TrainTrackError::InvalidFileName(name.to_string()));
    }
    Ok(base.to_string())
}

/// Script names must already be a plain file name inside the model directory.
pub fn validate_script_name(name: &str) -> Result<()> {
    if name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0'])
    {
        return Err(TrainTrackError::InvalidFileName(name.to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_ids() {
        for id in ["1", "42", "m1", "model_a", "set-2"] {
            validate_id(id).unwrap_or_else(|_| panic!("expected valid: {id}"));
        }
    }

    #[test]
    fn invalid_ids() {
        for id in ["", "..", "a/b", "a b", "x.y", "../etc"] {
            assert!(validate_id(id).is_err(), "expected invalid: {id}");
        }
    }

    #[test]
    fn sanitize_strips_directories() {
        assert_eq!(sanitize_file_name("x.csv").unwrap(), "x.csv");
        assert_eq!(sanitize_file_name("../../x.csv").unwrap(), "x.csv");
        assert_eq!(sanitize_file_name("C:\\data\\x.csv").unwrap(), "x.csv");
    }

    #[test]
    fn sanitize_rejects_empty_and_dots() {
        for name in ["", "dir/", "..", "."] {
            assert!(sanitize_file_name(name).is_err(), "expected invalid: {name}");
        }
    }

    #[test]
    fn script_names_cannot_traverse() {
        validate_script_name("model.py").unwrap();
        assert!(validate_script_name("../model.py").is_err());
        assert!(validate_script_name("sub/model.py").is_err());
        assert!(validate_script_name("..").is_err());
    }

    #[test]
    fn path_helpers() {
        let root = Path::new("/srv/tt");
        assert_eq!(
            artifact_dir(root, ArtifactKind::Dataset, "7"),
            PathBuf::from("/srv/tt/datasets/7")
        );
        assert_eq!(
            info_path(root, ArtifactKind::Model, "m1"),
            PathBuf::from("/srv/tt/ml-models/m1/info.json")
        );
        assert_eq!(
            file_url(ArtifactKind::Model, "m1", "loss.png"),
            "/files/ml-models/m1/loss.png"
        );
    }
}
