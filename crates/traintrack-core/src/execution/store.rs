//! Where execution statuses live between requests.
//!
//! The tracker only sees the [`StatusStore`] trait. [`MemoryStatusStore`]
//! keeps statuses for the life of the process; [`RedbStatusStore`] keeps them
//! in a redb file under the data root so they survive restarts.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use redb::{Database, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};

use super::ExecutionStatus;
use crate::error::{Result, TrainTrackError};

pub trait StatusStore: Send + Sync {
    /// Last recorded status, `None` if the model was never executed.
    fn get(&self, model_id: &str) -> Result<Option<ExecutionStatus>>;

    fn set(&self, model_id: &str, status: ExecutionStatus) -> Result<()>;
}

// ---------------------------------------------------------------------------
// MemoryStatusStore
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryStatusStore {
    statuses: Mutex<HashMap<String, ExecutionStatus>>,
}

impl MemoryStatusStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StatusStore for MemoryStatusStore {
    fn get(&self, model_id: &str) -> Result<Option<ExecutionStatus>> {
        let statuses = self.statuses.lock().unwrap_or_else(|e| e.into_inner());
        Ok(statuses.get(model_id).copied())
    }

    fn set(&self, model_id: &str, status: ExecutionStatus) -> Result<()> {
        let mut statuses = self.statuses.lock().unwrap_or_else(|e| e.into_inner());
        statuses.insert(model_id.to_string(), status);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// RedbStatusStore
// ---------------------------------------------------------------------------

/// Key: model id. Value: JSON-encoded `StatusEntry`.
const STATUSES: TableDefinition<&str, &[u8]> = TableDefinition::new("execution_status");

#[derive(Debug, Serialize, Deserialize)]
struct StatusEntry {
    status: ExecutionStatus,
    updated_at: DateTime<Utc>,
}

fn store_err(e: impl std::fmt::Display) -> TrainTrackError {
    TrainTrackError::StatusStore(e.to_string())
}

pub struct RedbStatusStore {
    db: Database,
    /// Opened for inspection only: nothing is written.
    read_only: bool,
}

impl RedbStatusStore {
    /// Open or create the status database at `path`.
    ///
    /// Entries left `running` by a previous process can never finish, so they
    /// are marked `error` before the store is handed out.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            crate::io::ensure_dir(parent)?;
        }
        let db = Database::create(path).map_err(store_err)?;
        let wt = db.begin_write().map_err(store_err)?;
        wt.open_table(STATUSES).map_err(store_err)?;
        wt.commit().map_err(store_err)?;

        let store = Self {
            db,
            read_only: false,
        };
        let recovered = store.startup_recovery()?;
        if recovered > 0 {
            tracing::warn!(recovered, "marked interrupted executions as error");
        }
        Ok(store)
    }

    /// Open an existing status database for inspection.
    ///
    /// No process can hold the database while it is open here, so a
    /// `running` entry is reported as `error` without being rewritten.
    pub fn open_read_only(path: &Path) -> Result<Self> {
        let db = Database::open(path).map_err(store_err)?;
        Ok(Self {
            db,
            read_only: true,
        })
    }

    fn startup_recovery(&self) -> Result<u32> {
        let stale: Vec<String> = self
            .entries()?
            .into_iter()
            .filter(|(_, entry)| entry.status == ExecutionStatus::Running)
            .map(|(id, _)| id)
            .collect();
        for id in &stale {
            self.set(id, ExecutionStatus::Error)?;
        }
        Ok(stale.len() as u32)
    }

    fn entries(&self) -> Result<Vec<(String, StatusEntry)>> {
        let rt = self.db.begin_read().map_err(store_err)?;
        let table = rt.open_table(STATUSES).map_err(store_err)?;
        let mut out = Vec::new();
        for entry in table.iter().map_err(store_err)? {
            let (k, v) = entry.map_err(store_err)?;
            let parsed: StatusEntry = serde_json::from_slice(v.value()).map_err(store_err)?;
            out.push((k.value().to_string(), parsed));
        }
        Ok(out)
    }
}

impl StatusStore for RedbStatusStore {
    fn get(&self, model_id: &str) -> Result<Option<ExecutionStatus>> {
        let rt = self.db.begin_read().map_err(store_err)?;
        let table = match rt.open_table(STATUSES) {
            Ok(table) => table,
            Err(redb::TableError::TableDoesNotExist(_)) => return Ok(None),
            Err(e) => return Err(store_err(e)),
        };
        let Some(value) = table.get(model_id).map_err(store_err)? else {
            return Ok(None);
        };
        let entry: StatusEntry = serde_json::from_slice(value.value()).map_err(store_err)?;
        if self.read_only && entry.status == ExecutionStatus::Running {
            return Ok(Some(ExecutionStatus::Error));
        }
        Ok(Some(entry.status))
    }

    fn set(&self, model_id: &str, status: ExecutionStatus) -> Result<()> {
        if self.read_only {
            return Err(TrainTrackError::StatusStore(
                "status store is open read-only".into(),
            ));
        }
        let value = serde_json::to_vec(&StatusEntry {
            status,
            updated_at: Utc::now(),
        })?;
        let wt = self.db.begin_write().map_err(store_err)?;
        {
            let mut table = wt.open_table(STATUSES).map_err(store_err)?;
            table
                .insert(model_id, value.as_slice())
                .map_err(store_err)?;
        }
        wt.commit().map_err(store_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn memory_store_last_write_wins() {
        let store = MemoryStatusStore::new();
        assert_eq!(store.get("m1").unwrap(), None);
        store.set("m1", ExecutionStatus::Running).unwrap();
        store.set("m1", ExecutionStatus::Finished).unwrap();
        assert_eq!(store.get("m1").unwrap(), Some(ExecutionStatus::Finished));
        assert_eq!(store.get("m2").unwrap(), None);
    }

    #[test]
    fn redb_store_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".traintrack/status.redb");
        {
            let store = RedbStatusStore::open(&path).unwrap();
            store.set("m1", ExecutionStatus::Finished).unwrap();
        }
        let store = RedbStatusStore::open(&path).unwrap();
        assert_eq!(store.get("m1").unwrap(), Some(ExecutionStatus::Finished));
    }

    #[test]
    fn reopen_marks_running_as_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("status.redb");
        {
            let store = RedbStatusStore::open(&path).unwrap();
            store.set("m1", ExecutionStatus::Running).unwrap();
            store.set("m2", ExecutionStatus::NotFound).unwrap();
        }
        let store = RedbStatusStore::open(&path).unwrap();
        assert_eq!(store.get("m1").unwrap(), Some(ExecutionStatus::Error));
        assert_eq!(store.get("m2").unwrap(), Some(ExecutionStatus::NotFound));
    }

    #[test]
    fn read_only_open_leaves_running_entries_untouched() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("status.redb");
        {
            let store = RedbStatusStore::open(&path).unwrap();
            store.set("m1", ExecutionStatus::Running).unwrap();
            store.set("m2", ExecutionStatus::Finished).unwrap();
        }

        let store = RedbStatusStore::open_read_only(&path).unwrap();
        assert_eq!(store.get("m1").unwrap(), Some(ExecutionStatus::Error));
        assert_eq!(store.get("m2").unwrap(), Some(ExecutionStatus::Finished));
        assert_eq!(store.get("m3").unwrap(), None);
        assert!(store.set("m1", ExecutionStatus::Finished).is_err());

        let stored: Vec<(String, ExecutionStatus)> = store
            .entries()
            .unwrap()
            .into_iter()
            .map(|(id, entry)| (id, entry.status))
            .collect();
        assert!(stored.contains(&("m1".to_string(), ExecutionStatus::Running)));
    }

    #[test]
    fn read_only_open_requires_existing_database() {
        let dir = TempDir::new().unwrap();
        assert!(RedbStatusStore::open_read_only(&dir.path().join("missing.redb")).is_err());
    }
}
