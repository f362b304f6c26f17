use super::{unavailable, Registry};
use crate::artifact::{ArtifactRecord, Metadata};
use crate::error::{Result, TrainTrackError};
use crate::types::ArtifactKind;
use chrono::DateTime;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS datasets (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    metadata   TEXT NOT NULL,
    path       TEXT,
    created_at INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS models (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    metadata   TEXT NOT NULL,
    path       TEXT,
    created_at INTEGER NOT NULL
);
";

/// Registry backed by `datasets` / `models` tables in SQLite.
pub struct SqliteRegistry {
    conn: Mutex<Connection>,
}

type Row = (i64, String, Option<String>, i64);

impl SqliteRegistry {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            crate::io::ensure_dir(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Database ids are integers; anything else cannot name a row.
fn row_id(id: &str) -> Option<i64> {
    id.parse::<i64>().ok()
}

fn to_record(kind: ArtifactKind, (id, metadata, path, created_at): Row) -> Result<ArtifactRecord> {
    let metadata: Metadata = serde_json::from_str(&metadata).map_err(unavailable)?;
    Ok(ArtifactRecord {
        id: id.to_string(),
        kind,
        metadata,
        path: path.map(PathBuf::from),
        created_at: DateTime::from_timestamp_millis(created_at).unwrap_or_default(),
    })
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Row> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

impl Registry for SqliteRegistry {
    fn list(&self, kind: ArtifactKind) -> Result<Vec<ArtifactRecord>> {
        let conn = self.conn();
        let sql = format!(
            "SELECT id, metadata, path, created_at FROM {} ORDER BY id",
            kind.table()
        );
        let mut stmt = conn.prepare(&sql).map_err(unavailable)?;
        let rows = stmt.query_map([], read_row).map_err(unavailable)?;
        let mut records = Vec::new();
        for row in rows {
            records.push(to_record(kind, row.map_err(unavailable)?)?);
        }
        Ok(records)
    }

    fn get(&self, kind: ArtifactKind, id: &str) -> Result<Option<ArtifactRecord>> {
        let Some(row_id) = row_id(id) else {
            return Ok(None);
        };
        let sql = format!(
            "SELECT id, metadata, path, created_at FROM {} WHERE id = ?1",
            kind.table()
        );
        let row = self
            .conn()
            .query_row(&sql, params![row_id], read_row)
            .optional()
            .map_err(unavailable)?;
        row.map(|r| to_record(kind, r)).transpose()
    }

    fn create_provisional(&self, kind: ArtifactKind, metadata: Metadata) -> Result<ArtifactRecord> {
        let record = ArtifactRecord::new(kind, "", metadata);
        let json = serde_json::to_string(&record.metadata)?;
        let conn = self.conn();
        conn.execute(
            &format!(
                "INSERT INTO {} (metadata, path, created_at) VALUES (?1, NULL, ?2)",
                kind.table()
            ),
            params![json, record.created_at.timestamp_millis()],
        )
        .map_err(unavailable)?;
        Ok(ArtifactRecord {
            id: conn.last_insert_rowid().to_string(),
            ..record
        })
    }

    fn set_path(&self, kind: ArtifactKind, id: &str, path: &Path) -> Result<()> {
        let not_found = || TrainTrackError::ArtifactNotFound {
            kind: kind.to_string(),
            id: id.to_string(),
        };
        let row_id = row_id(id).ok_or_else(not_found)?;
        let affected = self
            .conn()
            .execute(
                &format!("UPDATE {} SET path = ?1 WHERE id = ?2", kind.table()),
                params![path.to_string_lossy().into_owned(), row_id],
            )
            .map_err(unavailable)?;
        if affected == 0 {
            return Err(not_found());
        }
        Ok(())
    }

    fn delete(&self, kind: ArtifactKind, id: &str) -> Result<u64> {
        let Some(row_id) = row_id(id) else {
            return Ok(0);
        };
        let affected = self
            .conn()
            .execute(
                &format!("DELETE FROM {} WHERE id = ?1", kind.table()),
                params![row_id],
            )
            .map_err(unavailable)?;
        Ok(affected as u64)
    }
}
