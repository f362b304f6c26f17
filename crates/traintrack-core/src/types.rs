use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Regular,
    Premium,
    Admin,
}

impl Role {
    pub fn all() -> &'static [Role] {
        &[Role::Regular, Role::Premium, Role::Admin]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Regular => "regular",
            Role::Premium => "premium",
            Role::Admin => "admin",
        }
    }

    /// Premium and admin accounts.
    pub fn is_elevated(self) -> bool {
        matches!(self, Role::Premium | Role::Admin)
    }

    /// Position in administrative user listings: admins first, regular last.
    pub fn listing_rank(self) -> u8 {
        match self {
            Role::Admin => 1,
            Role::Premium => 2,
            Role::Regular => 3,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = crate::error::TrainTrackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "regular" => Ok(Role::Regular),
            "premium" => Ok(Role::Premium),
            "admin" => Ok(Role::Admin),
            _ => Err(crate::error::TrainTrackError::InvalidRole(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// The caller resolved from a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub username: String,
    pub email: String,
    pub role: Role,
}

// ---------------------------------------------------------------------------
// ArtifactKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Dataset,
    Model,
}

impl ArtifactKind {
    pub fn all() -> &'static [ArtifactKind] {
        &[ArtifactKind::Dataset, ArtifactKind::Model]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ArtifactKind::Dataset => "dataset",
            ArtifactKind::Model => "model",
        }
    }

    /// Directory under the data root that holds artifacts of this kind.
    pub fn dir_name(self) -> &'static str {
        match self {
            ArtifactKind::Dataset => crate::paths::DATASETS_DIR,
            ArtifactKind::Model => crate::paths::MODELS_DIR,
        }
    }

    /// Table name used by the database registry.
    pub fn table(self) -> &'static str {
        match self {
            ArtifactKind::Dataset => "datasets",
            ArtifactKind::Model => "models",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ArtifactKind {
    type Err = crate::error::TrainTrackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dataset" | "datasets" => Ok(ArtifactKind::Dataset),
            "model" | "models" => Ok(ArtifactKind::Model),
            _ => Err(crate::error::TrainTrackError::InvalidId(s.to_string())),
        }
    }
}
