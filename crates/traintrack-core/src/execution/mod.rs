//! Running model scripts and tracking their status.
//!
//! One execution per model at a time: a second request for a model whose
//! script is still running is refused with `ExecutionInProgress` rather than
//! racing the first on the status store.

mod store;

pub use store::{MemoryStatusStore, RedbStatusStore, StatusStore};

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::process::Command;

use crate::error::{Result, TrainTrackError};
use crate::paths;
use crate::types::ArtifactKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    NotStarted,
    Running,
    Finished,
    Error,
    NotFound,
}

impl ExecutionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ExecutionStatus::NotStarted => "not_started",
            ExecutionStatus::Running => "running",
            ExecutionStatus::Finished => "finished",
            ExecutionStatus::Error => "error",
            ExecutionStatus::NotFound => "not_found",
        }
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionReport {
    pub model_id: String,
    pub script: String,
    pub status: ExecutionStatus,
    pub stdout: String,
}

// ---------------------------------------------------------------------------
// ExecutionTracker
// ---------------------------------------------------------------------------

pub struct ExecutionTracker {
    root: PathBuf,
    interpreter: PathBuf,
    timeout: Option<Duration>,
    store: Arc<dyn StatusStore>,
    in_flight: Mutex<HashSet<String>>,
}

/// Holds a model's in-flight slot until dropped.
struct InFlight<'a> {
    set: &'a Mutex<HashSet<String>>,
    model_id: String,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut set = self.set.lock().unwrap_or_else(|e| e.into_inner());
        set.remove(&self.model_id);
    }
}

impl ExecutionTracker {
    pub fn new(root: &Path, interpreter: impl Into<PathBuf>, store: Arc<dyn StatusStore>) -> Self {
        Self {
            root: root.to_path_buf(),
            interpreter: interpreter.into(),
            timeout: None,
            store,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Last recorded status, `not_started` if the model was never executed.
    pub fn get_status(&self, model_id: &str) -> Result<ExecutionStatus> {
        paths::validate_id(model_id)?;
        Ok(self
            .store
            .get(model_id)?
            .unwrap_or(ExecutionStatus::NotStarted))
    }

    /// Run `script` from the model's directory with the configured interpreter.
    pub async fn execute(&self, model_id: &str, script: &str) -> Result<ExecutionReport> {
        paths::validate_id(model_id)?;
        paths::validate_script_name(script)?;
        let _slot = self.claim(model_id)?;

        self.store.set(model_id, ExecutionStatus::Running)?;

        let dir = paths::artifact_dir(&self.root, ArtifactKind::Model, model_id);
        if !dir.join(script).is_file() {
            self.store.set(model_id, ExecutionStatus::NotFound)?;
            tracing::warn!(model_id, script, "script not found");
            return Err(TrainTrackError::ScriptNotFound(script.to_string()));
        }

        tracing::info!(model_id, script, interpreter = %self.interpreter.display(), "running script");
        match self.run(&dir, script).await {
            Ok(stdout) => {
                self.store.set(model_id, ExecutionStatus::Finished)?;
                tracing::info!(model_id, script, "script finished");
                Ok(ExecutionReport {
                    model_id: model_id.to_string(),
                    script: script.to_string(),
                    status: ExecutionStatus::Finished,
                    stdout,
                })
            }
            Err(diagnostic) => {
                self.store.set(model_id, ExecutionStatus::Error)?;
                tracing::error!(model_id, script, %diagnostic, "script failed");
                Err(TrainTrackError::ScriptFailed(diagnostic))
            }
        }
    }

    fn claim(&self, model_id: &str) -> Result<InFlight<'_>> {
        let mut set = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        if !set.insert(model_id.to_string()) {
            return Err(TrainTrackError::ExecutionInProgress(model_id.to_string()));
        }
        Ok(InFlight {
            set: &self.in_flight,
            model_id: model_id.to_string(),
        })
    }

    /// Returns stdout on a zero exit, otherwise the diagnostic text.
    async fn run(&self, dir: &Path, script: &str) -> std::result::Result<String, String> {
        let mut cmd = Command::new(&self.interpreter);
        cmd.arg(script)
            .current_dir(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, cmd.output()).await {
                Ok(result) => result,
                Err(_) => return Err(format!("timed out after {limit:?}")),
            },
            None => cmd.output().await,
        };
        let output = output.map_err(|e| {
            format!("failed to start {}: {e}", self.interpreter.display())
        })?;

        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
        }
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if stderr.is_empty() {
            Err(format!("script exited with {}", output.status))
        } else {
            Err(stderr)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn model_with_script(root: &Path, id: &str, name: &str, body: &str) {
        let dir = paths::artifact_dir(root, ArtifactKind::Model, id);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(name), body).unwrap();
    }

    fn tracker(root: &Path) -> ExecutionTracker {
        ExecutionTracker::new(root, "sh", Arc::new(MemoryStatusStore::new()))
    }

    #[test]
    fn status_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&ExecutionStatus::NotStarted).unwrap(),
            "\"not_started\""
        );
        assert_eq!(ExecutionStatus::NotFound.to_string(), "not_found");
    }

    #[test]
    fn unknown_model_is_not_started() {
        let dir = TempDir::new().unwrap();
        assert_eq!(
            tracker(dir.path()).get_status("m1").unwrap(),
            ExecutionStatus::NotStarted
        );
    }

    #[tokio::test]
    async fn successful_script_finishes() {
        let dir = TempDir::new().unwrap();
        model_with_script(dir.path(), "m1", "model.sh", "echo trained > metrics.txt\necho done\n");
        let tracker = tracker(dir.path());

        let report = tracker.execute("m1", "model.sh").await.unwrap();
        assert_eq!(report.status, ExecutionStatus::Finished);
        assert_eq!(report.stdout.trim(), "done");
        assert_eq!(tracker.get_status("m1").unwrap(), ExecutionStatus::Finished);
        // Runs inside the model directory.
        assert!(dir.path().join("ml-models/m1/metrics.txt").is_file());
    }

    #[tokio::test]
    async fn missing_script_is_not_found() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("ml-models/m1")).unwrap();
        let tracker = tracker(dir.path());

        let err = tracker.execute("m1", "missing.py").await.unwrap_err();
        assert!(matches!(err, TrainTrackError::ScriptNotFound(_)));
        assert_eq!(tracker.get_status("m1").unwrap(), ExecutionStatus::NotFound);
    }

    #[tokio::test]
    async fn failing_script_reports_stderr() {
        let dir = TempDir::new().unwrap();
        model_with_script(dir.path(), "m1", "model.sh", "echo boom >&2\nexit 3\n");
        let tracker = tracker(dir.path());

        let err = tracker.execute("m1", "model.sh").await.unwrap_err();
        match err {
            TrainTrackError::ScriptFailed(diagnostic) => assert_eq!(diagnostic, "boom"),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(tracker.get_status("m1").unwrap(), ExecutionStatus::Error);
    }

    #[tokio::test]
    async fn missing_interpreter_is_an_error() {
        let dir = TempDir::new().unwrap();
        model_with_script(dir.path(), "m1", "model.py", "print(1)");
        let tracker = ExecutionTracker::new(
            dir.path(),
            dir.path().join("no-such-python"),
            Arc::new(MemoryStatusStore::new()),
        );

        let err = tracker.execute("m1", "model.py").await.unwrap_err();
        assert!(matches!(err, TrainTrackError::ScriptFailed(ref d) if d.contains("failed to start")));
        assert_eq!(tracker.get_status("m1").unwrap(), ExecutionStatus::Error);
    }

    #[tokio::test]
    async fn sequential_runs_keep_latest_status() {
        let dir = TempDir::new().unwrap();
        model_with_script(dir.path(), "m1", "ok.sh", "exit 0\n");
        model_with_script(dir.path(), "m1", "bad.sh", "exit 1\n");
        let tracker = tracker(dir.path());

        tracker.execute("m1", "ok.sh").await.unwrap();
        tracker.execute("m1", "bad.sh").await.unwrap_err();
        assert_eq!(tracker.get_status("m1").unwrap(), ExecutionStatus::Error);

        tracker.execute("m1", "ok.sh").await.unwrap();
        assert_eq!(tracker.get_status("m1").unwrap(), ExecutionStatus::Finished);
    }

    #[tokio::test]
    async fn concurrent_run_for_same_model_is_refused() {
        let dir = TempDir::new().unwrap();
        model_with_script(dir.path(), "m1", "slow.sh", "sleep 1\n");
        model_with_script(dir.path(), "m2", "slow.sh", "sleep 1\n");
        let tracker = Arc::new(tracker(dir.path()));

        let first = {
            let tracker = tracker.clone();
            tokio::spawn(async move { tracker.execute("m1", "slow.sh").await })
        };
        // Wait until the first run holds the slot.
        while tracker.get_status("m1").unwrap() != ExecutionStatus::Running {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let err = tracker.execute("m1", "slow.sh").await.unwrap_err();
        assert!(matches!(err, TrainTrackError::ExecutionInProgress(_)));
        assert_eq!(tracker.get_status("m1").unwrap(), ExecutionStatus::Running);

        // Other models are unaffected.
        tracker.execute("m2", "slow.sh").await.unwrap();

        first.await.unwrap().unwrap();
        assert_eq!(tracker.get_status("m1").unwrap(), ExecutionStatus::Finished);
        // The slot is released once the run ends.
        tracker.execute("m1", "slow.sh").await.unwrap();
    }

    #[tokio::test]
    async fn timeout_kills_script() {
        let dir = TempDir::new().unwrap();
        model_with_script(dir.path(), "m1", "hang.sh", "sleep 30\n");
        let tracker = tracker(dir.path()).with_timeout(Some(Duration::from_millis(200)));

        let err = tracker.execute("m1", "hang.sh").await.unwrap_err();
        assert!(matches!(err, TrainTrackError::ScriptFailed(ref d) if d.contains("timed out")));
        assert_eq!(tracker.get_status("m1").unwrap(), ExecutionStatus::Error);
    }

    #[tokio::test]
    async fn script_names_cannot_leave_model_dir() {
        let dir = TempDir::new().unwrap();
        let tracker = tracker(dir.path());
        let err = tracker.execute("m1", "../../evil.sh").await.unwrap_err();
        assert!(matches!(err, TrainTrackError::InvalidFileName(_)));
        assert_eq!(tracker.get_status("m1").unwrap(), ExecutionStatus::NotStarted);
    }
}
