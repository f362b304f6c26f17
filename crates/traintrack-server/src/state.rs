use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use traintrack_core::accounts::{AccountBackend, LocalAccounts};
use traintrack_core::config::{Config, RegistryBackend, StatusStoreKind};
use traintrack_core::execution::{ExecutionTracker, MemoryStatusStore, RedbStatusStore, StatusStore};
use traintrack_core::paths;
use traintrack_core::registry::{FsRegistry, Registry, SqliteRegistry};
use traintrack_core::token::{CredentialVerifier, JwtAuthority};
use traintrack_core::upload::UploadPipeline;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub root: PathBuf,
    pub config: Arc<Config>,
    pub registry: Arc<dyn Registry>,
    pub uploads: Arc<UploadPipeline>,
    pub tracker: Arc<ExecutionTracker>,
    pub accounts: Arc<dyn AccountBackend>,
    pub tokens: Arc<JwtAuthority>,
    pub verifier: Arc<dyn CredentialVerifier>,
}

impl AppState {
    /// Open every backend the configuration selects under `root`.
    ///
    /// `secret` signs and verifies session tokens; without one every caller
    /// is anonymous.
    pub fn open(root: &Path, config: Config, secret: Option<String>) -> anyhow::Result<Self> {
        let database = config.database_path(root);

        let registry: Arc<dyn Registry> = match config.registry.backend {
            RegistryBackend::Files => Arc::new(FsRegistry::open(root)?),
            RegistryBackend::Database => Arc::new(SqliteRegistry::open(&database)?),
        };

        let store: Arc<dyn StatusStore> = match config.execution.status_store {
            StatusStoreKind::Persistent => Arc::new(RedbStatusStore::open(&paths::status_db_path(root))?),
            StatusStoreKind::Memory => Arc::new(MemoryStatusStore::new()),
        };
        let tracker = ExecutionTracker::new(root, &config.execution.interpreter, store)
            .with_timeout(config.execution.timeout_secs.map(Duration::from_secs));

        let uploads = UploadPipeline::new(
            root,
            registry.clone(),
            config.upload.required_fields.clone(),
        );
        let accounts = LocalAccounts::open(&database)?;
        let tokens = Arc::new(JwtAuthority::new(secret, config.auth.token_ttl_minutes));

        tracing::debug!(root = %root.display(), backend = ?config.registry.backend, "state opened");

        Ok(Self {
            root: root.to_path_buf(),
            config: Arc::new(config),
            registry,
            uploads: Arc::new(uploads),
            tracker: Arc::new(tracker),
            accounts: Arc::new(accounts),
            verifier: tokens.clone(),
            tokens,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_creates_artifact_dirs() {
        let dir = tempfile::TempDir::new().unwrap();
        let state = AppState::open(dir.path(), Config::default(), None).unwrap();
        assert_eq!(state.root, dir.path());
        assert!(dir.path().join("datasets").is_dir());
        assert!(dir.path().join("ml-models").is_dir());
        assert!(dir.path().join(".traintrack/status.redb").is_file());
        assert!(!state.tokens.has_secret());
    }

    #[test]
    fn database_backend_uses_configured_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut config = Config::default();
        config.registry.backend = RegistryBackend::Database;
        config.registry.database = "meta.db".into();
        AppState::open(dir.path(), config, None).unwrap();
        assert!(dir.path().join("meta.db").is_file());
    }
}
