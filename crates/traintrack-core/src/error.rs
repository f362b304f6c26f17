use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrainTrackError {
    #[error("invalid identifier '{0}': must be letters, digits, hyphens or underscores")]
    InvalidId(String),

    #[error("invalid file name '{0}'")]
    InvalidFileName(String),

    #[error("missing required field: {0}")]
    MissingField(String),

    #[error("unknown sort key '{0}'")]
    InvalidSortKey(String),

    #[error("upload contains no files")]
    EmptyUpload,

    #[error("{kind} not found: {id}")]
    ArtifactNotFound { kind: String, id: String },

    #[error("registry unavailable: {0}")]
    RegistryUnavailable(String),

    #[error("script not found: {0}")]
    ScriptNotFound(String),

    #[error("script failed: {0}")]
    ScriptFailed(String),

    #[error("execution already in progress for model '{0}'")]
    ExecutionInProgress(String),

    #[error("user already exists: {0}")]
    UserExists(String),

    #[error("user not found: {0}")]
    UserNotFound(String),

    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("invalid user type: {0}")]
    InvalidRole(String),

    #[error("token signing secret is not configured")]
    SecretMissing,

    #[error("token error: {0}")]
    Token(String),

    #[error("password hashing failed: {0}")]
    PasswordHash(String),

    #[error("archive error: {0}")]
    Archive(String),

    #[error("status store error: {0}")]
    StatusStore(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, TrainTrackError>;
