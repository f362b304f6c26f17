//! Role-based access policy.
//!
//! Every gated route asks [`authorize`] for a decision instead of inspecting
//! roles itself. The three denial shapes are deliberately different so the
//! HTTP layer can answer each failure the way users expect:
//!
//! - not signed in: redirect to the login page with a reason,
//! - signed in but not premium: re-render the current page with an error,
//! - signed in but not admin: a structured 403.

use crate::types::{Identity, Role};
use serde::Serialize;

pub const LOGIN_PATH: &str = "/users/login";

pub const NOT_LOGGED_IN: &str = "You are not logged in.";
pub const UPGRADE_REQUIRED: &str = "Access denied, upgrade to premium.";
pub const ADMINS_ONLY: &str = "Access denied. Admins only.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    /// Any signed-in account.
    Authenticated,
    /// Premium or admin accounts.
    Elevated,
    Admin,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Denial {
    Redirect { location: String, message: String },
    RenderInPlace { message: String },
    Forbidden { message: String },
}

impl Denial {
    pub fn message(&self) -> &str {
        match self {
            Denial::Redirect { message, .. }
            | Denial::RenderInPlace { message }
            | Denial::Forbidden { message } => message,
        }
    }
}

impl std::fmt::Display for Denial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

impl std::error::Error for Denial {}

pub fn authorize(identity: Option<&Identity>, level: AccessLevel) -> Result<(), Denial> {
    authorize_with_reason(identity, level, NOT_LOGGED_IN)
}

/// Like [`authorize`], with a custom message for the not-signed-in redirect.
pub fn authorize_with_reason(
    identity: Option<&Identity>,
    level: AccessLevel,
    login_reason: &str,
) -> Result<(), Denial> {
    let Some(identity) = identity else {
        return Err(Denial::Redirect {
            location: LOGIN_PATH.to_string(),
            message: non_empty(login_reason, NOT_LOGGED_IN),
        });
    };

    match level {
        AccessLevel::Authenticated => Ok(()),
        AccessLevel::Elevated if identity.role.is_elevated() => Ok(()),
        AccessLevel::Elevated => Err(Denial::RenderInPlace {
            message: UPGRADE_REQUIRED.to_string(),
        }),
        AccessLevel::Admin if identity.role == Role::Admin => Ok(()),
        AccessLevel::Admin => Err(Denial::Forbidden {
            message: ADMINS_ONLY.to_string(),
        }),
    }
}

fn non_empty(reason: &str, fallback: &str) -> String {
    if reason.trim().is_empty() {
        fallback.to_string()
    } else {
        reason.to_string()
    }
}
