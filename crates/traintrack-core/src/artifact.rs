use crate::error::Result;
use crate::paths;
use crate::types::ArtifactKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::path::{Path, PathBuf};

pub type Metadata = serde_json::Map<String, serde_json::Value>;

// ---------------------------------------------------------------------------
// ArtifactRecord
// ---------------------------------------------------------------------------

/// A stored dataset or model: free-form metadata plus its storage directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    pub id: String,
    pub kind: ArtifactKind,
    #[serde(default)]
    pub metadata: Metadata,
    /// `None` while the record is provisional.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    pub created_at: DateTime<Utc>,
}

impl ArtifactRecord {
    pub fn new(kind: ArtifactKind, id: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            id: id.into(),
            kind,
            metadata,
            path: None,
            created_at: Utc::now(),
        }
    }

    /// String metadata field, if present.
    pub fn field(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(|v| v.as_str())
    }

    pub fn listing(&self) -> ListingRecord {
        ListingRecord::from(self)
    }
}

// ---------------------------------------------------------------------------
// ListingRecord
// ---------------------------------------------------------------------------

/// Uniform shape used by the dataset and model listings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListingRecord {
    pub id: String,
    pub heading: String,
    pub author: String,
    pub description: String,
    pub task_type: String,
    pub image: String,
}

impl From<&ArtifactRecord> for ListingRecord {
    fn from(record: &ArtifactRecord) -> Self {
        let text = |key: &str| record.field(key).unwrap_or_default().to_string();
        let image = match record.field("cover_image") {
            Some(file) if !file.trim().is_empty() => paths::file_url(record.kind, &record.id, file),
            _ => record
                .field("image")
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(paths::PLACEHOLDER_IMAGE)
                .to_string(),
        };
        Self {
            id: record.id.clone(),
            heading: text("heading"),
            author: text("author"),
            description: text("description"),
            task_type: text("task_type"),
            image,
        }
    }
}

// ---------------------------------------------------------------------------
// SortKey
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    HeadingAsc,
    HeadingDesc,
    AuthorAsc,
    AuthorDesc,
}

impl SortKey {
    pub fn as_str(self) -> &'static str {
        match self {
            SortKey::HeadingAsc => "headingAsc",
            SortKey::HeadingDesc => "headingDesc",
            SortKey::AuthorAsc => "authorAsc",
            SortKey::AuthorDesc => "authorDesc",
        }
    }

    fn compare(self, a: &ListingRecord, b: &ListingRecord) -> Ordering {
        let (x, y) = match self {
            SortKey::HeadingAsc | SortKey::HeadingDesc => (&a.heading, &b.heading),
            SortKey::AuthorAsc | SortKey::AuthorDesc => (&a.author, &b.author),
        };
        let ord = x.to_lowercase().cmp(&y.to_lowercase());
        match self {
            SortKey::HeadingAsc | SortKey::AuthorAsc => ord,
            SortKey::HeadingDesc | SortKey::AuthorDesc => ord.reverse(),
        }
    }
}

impl std::str::FromStr for SortKey {
    type Err = crate::error::TrainTrackError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "headingAsc" => Ok(SortKey::HeadingAsc),
            "headingDesc" => Ok(SortKey::HeadingDesc),
            "authorAsc" => Ok(SortKey::AuthorAsc),
            "authorDesc" => Ok(SortKey::AuthorDesc),
            _ => Err(crate::error::TrainTrackError::InvalidSortKey(s.to_string())),
        }
    }
}

/// Normalize records into listing entries, optionally sorted.
///
/// Without a sort key the registry's order is kept.
pub fn listings(records: &[ArtifactRecord], sort: Option<SortKey>) -> Vec<ListingRecord> {
    let mut out: Vec<ListingRecord> = records.iter().map(ListingRecord::from).collect();
    if let Some(key) = sort {
        out.sort_by(|a, b| key.compare(a, b));
    }
    out
}

// ---------------------------------------------------------------------------
// ModelDetail
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metric {
    pub path: String,
    pub content: String,
}

/// A model with its visualizations (`*.png`) and metrics (`*.txt`).
#[derive(Debug, Clone, Serialize)]
pub struct ModelDetail {
    #[serde(flatten)]
    pub record: ArtifactRecord,
    pub visuals: Vec<String>,
    pub metrics: Vec<Metric>,
}

impl ModelDetail {
    /// Collect the files a model run leaves behind in `dir`.
    pub fn load(record: ArtifactRecord, dir: &Path) -> Result<Self> {
        let visuals = crate::io::files_with_extension(dir, "png")?
            .into_iter()
            .filter(|name| name != paths::COVER_IMAGE_FILE)
            .map(|name| paths::file_url(record.kind, &record.id, &name))
            .collect();
        let mut metrics = Vec::new();
        for name in crate::io::files_with_extension(dir, "txt")? {
            let content = String::from_utf8_lossy(&std::fs::read(dir.join(&name))?).into_owned();
            metrics.push(Metric {
                path: paths::file_url(record.kind, &record.id, &name),
                content,
            });
        }
        Ok(Self {
            record,
            visuals,
            metrics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(id: &str, heading: &str, author: &str) -> ArtifactRecord {
        let metadata = json!({ "heading": heading, "author": author })
            .as_object()
            .cloned()
            .unwrap();
        ArtifactRecord::new(ArtifactKind::Dataset, id, metadata)
    }

    #[test]
    fn listing_uses_placeholder_without_image() {
        let entry = record("1", "Iris", "Fisher").listing();
        assert_eq!(entry.image, paths::PLACEHOLDER_IMAGE);
        assert_eq!(entry.heading, "Iris");
        assert_eq!(entry.description, "");
    }

    #[test]
    fn listing_points_at_uploaded_cover() {
        let mut r = record("1", "Iris", "Fisher");
        r.metadata.insert("cover_image".into(), json!("cover.png"));
        assert_eq!(r.listing().image, "/files/datasets/1/cover.png");
    }

    #[test]
    fn listing_keeps_external_image_reference() {
        let mut r = record("1", "Iris", "Fisher");
        r.metadata
            .insert("image".into(), json!("https://example.com/iris.png"));
        assert_eq!(r.listing().image, "https://example.com/iris.png");
    }

    #[test]
    fn sort_keys_are_case_insensitive() {
        let records = vec![
            record("1", "beta", "Zoe"),
            record("2", "Alpha", "amir"),
            record("3", "gamma", "Max"),
        ];
        let ids = |sort| -> Vec<String> {
            listings(&records, Some(sort))
                .into_iter()
                .map(|l| l.id)
                .collect()
        };
        assert_eq!(ids(SortKey::HeadingAsc), vec!["2", "1", "3"]);
        assert_eq!(ids(SortKey::HeadingDesc), vec!["3", "1", "2"]);
        assert_eq!(ids(SortKey::AuthorAsc), vec!["2", "3", "1"]);
        assert_eq!(ids(SortKey::AuthorDesc), vec!["1", "3", "2"]);
    }

    #[test]
    fn unsorted_listing_keeps_order() {
        let records = vec![record("9", "z", "z"), record("1", "a", "a")];
        let ids: Vec<String> = listings(&records, None).into_iter().map(|l| l.id).collect();
        assert_eq!(ids, vec!["9", "1"]);
    }

    #[test]
    fn sort_key_parses_client_values() {
        for key in [
            SortKey::HeadingAsc,
            SortKey::HeadingDesc,
            SortKey::AuthorAsc,
            SortKey::AuthorDesc,
        ] {
            assert_eq!(key.as_str().parse::<SortKey>().unwrap(), key);
        }
        assert!("dateAsc".parse::<SortKey>().is_err());
    }

    #[test]
    fn model_detail_tolerates_non_utf8_metrics() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("report.txt"), b"acc \xff\xfe 0.9").unwrap();

        let mut r = record("m1", "Net", "Ada");
        r.kind = ArtifactKind::Model;
        let detail = ModelDetail::load(r, dir.path()).unwrap();
        assert_eq!(detail.metrics.len(), 1);
        assert!(detail.metrics[0].content.starts_with("acc "));
        assert!(detail.metrics[0].content.ends_with(" 0.9"));
    }

    #[test]
    fn model_detail_reads_visuals_and_metrics() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("loss.png"), b"png").unwrap();
        std::fs::write(dir.path().join("cover.png"), b"png").unwrap();
        std::fs::write(dir.path().join("accuracy.txt"), "0.93").unwrap();
        std::fs::write(dir.path().join("model.py"), "print(1)").unwrap();

        let mut r = record("m1", "Net", "Ada");
        r.kind = ArtifactKind::Model;
        let detail = ModelDetail::load(r, dir.path()).unwrap();
        assert_eq!(detail.visuals, vec!["/files/ml-models/m1/loss.png"]);
        assert_eq!(
            detail.metrics,
            vec![Metric {
                path: "/files/ml-models/m1/accuracy.txt".into(),
                content: "0.93".into(),
            }]
        );
    }
}
