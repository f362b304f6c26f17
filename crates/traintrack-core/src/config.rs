use crate::error::Result;
use crate::paths;
use serde::{Deserialize, Serialize};
use std::path::Path;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// ServerConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 {
    3000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
        }
    }
}

// ---------------------------------------------------------------------------
// RegistryConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistryBackend {
    /// One `info.json` per artifact directory.
    Files,
    /// Metadata rows in the SQLite database.
    Database,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    #[serde(default = "default_registry_backend")]
    pub backend: RegistryBackend,
    /// SQLite file, relative to the data root. Also holds local accounts.
    #[serde(default = "default_database")]
    pub database: String,
}

fn default_registry_backend() -> RegistryBackend {
    RegistryBackend::Files
}

fn default_database() -> String {
    "traintrack.db".to_string()
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            backend: default_registry_backend(),
            database: default_database(),
        }
    }
}

// ---------------------------------------------------------------------------
// AuthConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    #[serde(default = "default_token_ttl")]
    pub token_ttl_minutes: u32,
    /// Environment variable holding the token signing secret.
    #[serde(default = "default_secret_env")]
    pub secret_env: String,
}

fn default_cookie_name() -> String {
    "token".to_string()
}

fn default_token_ttl() -> u32 {
    60
}

fn default_secret_env() -> String {
    "JWT_SECRET".to_string()
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            cookie_name: default_cookie_name(),
            token_ttl_minutes: default_token_ttl(),
            secret_env: default_secret_env(),
        }
    }
}

impl AuthConfig {
    /// Read the signing secret from the configured environment variable.
    pub fn secret_from_env(&self) -> Option<String> {
        std::env::var(&self.secret_env)
            .ok()
            .filter(|s| !s.is_empty())
    }
}

// ---------------------------------------------------------------------------
// ExecutionConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusStoreKind {
    /// Survives restarts (redb file under `.traintrack/`).
    Persistent,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    #[serde(default = "default_interpreter")]
    pub interpreter: String,
    #[serde(default = "default_script")]
    pub default_script: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    #[serde(default = "default_status_store")]
    pub status_store: StatusStoreKind,
}

fn default_interpreter() -> String {
    "/usr/bin/python3".to_string()
}

fn default_script() -> String {
    "model.py".to_string()
}

fn default_status_store() -> StatusStoreKind {
    StatusStoreKind::Persistent
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            interpreter: default_interpreter(),
            default_script: default_script(),
            timeout_secs: None,
            status_store: default_status_store(),
        }
    }
}

// ---------------------------------------------------------------------------
// UploadConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    #[serde(default = "default_required_fields")]
    pub required_fields: Vec<String>,
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,
}

fn default_required_fields() -> Vec<String> {
    vec!["heading".to_string()]
}

fn default_max_bytes() -> usize {
    512 * 1024 * 1024
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            required_fields: default_required_fields(),
            max_bytes: default_max_bytes(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub upload: UploadConfig,
}

impl Config {
    /// Load `traintrack.yaml` from `root`. A missing file yields defaults.
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    pub fn database_path(&self, root: &Path) -> std::path::PathBuf {
        root.join(&self.registry.database)
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.auth.secret_from_env().is_none() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: format!(
                    "{} is not set: every session will be treated as anonymous",
                    self.auth.secret_env
                ),
            });
        }

        if !Path::new(&self.execution.interpreter).is_absolute() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "execution.interpreter '{}' is not an absolute path; it will be resolved via PATH",
                    self.execution.interpreter
                ),
            });
        }

        if self.upload.required_fields.iter().any(|f| f.trim().is_empty()) {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "upload.required_fields contains an empty entry".to_string(),
            });
        }

        if self.auth.token_ttl_minutes == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "auth.token_ttl_minutes is 0: issued tokens expire immediately"
                    .to_string(),
            });
        }

        warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let cfg = Config::load(dir.path()).unwrap();
        assert_eq!(cfg.server.port, 3000);
        assert_eq!(cfg.registry.backend, RegistryBackend::Files);
        assert_eq!(cfg.auth.cookie_name, "token");
        assert_eq!(cfg.execution.interpreter, "/usr/bin/python3");
        assert_eq!(cfg.upload.required_fields, vec!["heading".to_string()]);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("traintrack.yaml"),
            "registry:\n  backend: database\nexecution:\n  timeout_secs: 30\n",
        )
        .unwrap();
        let cfg = Config::load(dir.path()).unwrap();
        assert_eq!(cfg.registry.backend, RegistryBackend::Database);
        assert_eq!(cfg.registry.database, "traintrack.db");
        assert_eq!(cfg.execution.timeout_secs, Some(30));
        assert_eq!(cfg.execution.default_script, "model.py");
    }

    #[test]
    fn save_then_load() {
        let dir = TempDir::new().unwrap();
        let mut cfg = Config::default();
        cfg.server.port = 8080;
        cfg.execution.status_store = StatusStoreKind::Memory;
        cfg.save(dir.path()).unwrap();

        let loaded = Config::load(dir.path()).unwrap();
        assert_eq!(loaded.server.port, 8080);
        assert_eq!(loaded.execution.status_store, StatusStoreKind::Memory);
    }

    #[test]
    fn validate_flags_relative_interpreter_and_zero_ttl() {
        let mut cfg = Config::default();
        cfg.auth.secret_env = "TRAINTRACK_TEST_UNSET_SECRET".to_string();
        cfg.execution.interpreter = "python3".to_string();
        cfg.auth.token_ttl_minutes = 0;
        let warnings = cfg.validate();
        assert!(warnings
            .iter()
            .any(|w| w.message.contains("TRAINTRACK_TEST_UNSET_SECRET")));
        assert!(warnings.iter().any(|w| w.message.contains("python3")));
        assert!(warnings.iter().any(|w| w.message.contains("token_ttl_minutes")));
    }
}
