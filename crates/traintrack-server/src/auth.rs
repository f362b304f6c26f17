//! Session cookies and the per-request caller identity.
//!
//! [`identity_middleware`] resolves the session cookie once per request and
//! stores the result as a [`Caller`] extension. Handlers extract `Caller` and
//! ask it for the access level they need.

use std::convert::Infallible;

use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use traintrack_core::access::{self, AccessLevel};
use traintrack_core::types::Identity;

use crate::error::AppError;
use crate::state::AppState;

/// The identity behind the current request, if any.
#[derive(Debug, Clone, Default)]
pub struct Caller(pub Option<Identity>);

impl Caller {
    pub fn identity(&self) -> Option<&Identity> {
        self.0.as_ref()
    }

    /// Deny the request unless the caller meets `level`.
    pub fn require(&self, level: AccessLevel) -> Result<(), AppError> {
        access::authorize(self.identity(), level)?;
        Ok(())
    }
}

impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<Caller>().cloned().unwrap_or_default())
    }
}

/// Resolve the session cookie to a [`Caller`] for downstream handlers.
///
/// Never rejects: a missing or unverifiable token leaves the caller anonymous.
pub async fn identity_middleware(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let identity = cookie_value(req.headers(), &state.config.auth.cookie_name)
        .and_then(|token| state.verifier.verify(&token));
    req.extensions_mut().insert(Caller(identity));
    next.run(req).await
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all("cookie")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .find_map(|part| {
            let (k, v) = part.trim().split_once('=')?;
            (k == name && !v.is_empty()).then(|| v.to_string())
        })
}

pub fn session_cookie(name: &str, token: &str, ttl_minutes: u32) -> String {
    let max_age = u64::from(ttl_minutes) * 60;
    format!("{name}={token}; HttpOnly; SameSite=Lax; Path=/; Max-Age={max_age}")
}

pub fn cleared_cookie(name: &str) -> String {
    format!("{name}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn cookie_value_finds_named_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert("cookie", HeaderValue::from_static("theme=dark; token=abc.def; x=1"));
        assert_eq!(cookie_value(&headers, "token").as_deref(), Some("abc.def"));
        assert_eq!(cookie_value(&headers, "missing"), None);
    }

    #[test]
    fn cookie_value_ignores_empty_and_prefix_matches() {
        let mut headers = HeaderMap::new();
        headers.insert("cookie", HeaderValue::from_static("tokenx=1; token="));
        assert_eq!(cookie_value(&headers, "token"), None);
    }

    #[test]
    fn session_cookie_is_http_only() {
        let cookie = session_cookie("token", "t", 60);
        assert_eq!(cookie, "token=t; HttpOnly; SameSite=Lax; Path=/; Max-Age=3600");
        assert!(cleared_cookie("token").ends_with("Max-Age=0"));
    }

    #[test]
    fn anonymous_caller_is_denied() {
        let caller = Caller::default();
        assert!(caller.require(AccessLevel::Authenticated).is_err());
    }
}
