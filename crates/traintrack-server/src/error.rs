use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use traintrack_core::access::Denial;
use traintrack_core::error::TrainTrackError;

use crate::views;

// ---------------------------------------------------------------------------
// Internal sentinel for explicit 400 Bad Request errors
// ---------------------------------------------------------------------------

/// Carries an explicit HTTP 400 through the `anyhow::Error` chain without
/// touching the `TrainTrackError` enum.
#[derive(Debug)]
struct BadRequestError(String);

impl std::fmt::Display for BadRequestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for BadRequestError {}

// ---------------------------------------------------------------------------
// AppError: unified error type for HTTP responses
// ---------------------------------------------------------------------------

/// Unified error type for HTTP responses.
#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl AppError {
    /// Construct a 400 Bad Request error with the given message.
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self(BadRequestError(msg.into()).into())
    }

    pub fn join(err: tokio::task::JoinError) -> Self {
        Self(anyhow::anyhow!("task join error: {err}"))
    }
}

fn json_error(status: StatusCode, message: &str) -> Response {
    let body = serde_json::json!({ "error": message });
    (status, axum::Json(body)).into_response()
}

/// Where an unauthenticated caller is sent, with the reason in `?error=`.
pub fn login_redirect(location: &str, message: &str) -> Response {
    let query = serde_urlencoded::to_string([("error", message)]).unwrap_or_default();
    (
        StatusCode::SEE_OTHER,
        [(header::LOCATION, format!("{location}?{query}"))],
    )
        .into_response()
}

fn denial_response(denial: &Denial) -> Response {
    match denial {
        Denial::Redirect { location, message } => login_redirect(location, message),
        Denial::RenderInPlace { message } => {
            (StatusCode::FORBIDDEN, views::home(None, Some(message.as_str()))).into_response()
        }
        Denial::Forbidden { message } => json_error(StatusCode::FORBIDDEN, message),
    }
}

fn status_for(e: &TrainTrackError) -> StatusCode {
    match e {
        TrainTrackError::InvalidId(_)
        | TrainTrackError::InvalidFileName(_)
        | TrainTrackError::InvalidSortKey(_)
        | TrainTrackError::MissingField(_)
        | TrainTrackError::EmptyUpload
        | TrainTrackError::InvalidRole(_)
        | TrainTrackError::Archive(_) => StatusCode::BAD_REQUEST,
        TrainTrackError::InvalidCredentials => StatusCode::UNAUTHORIZED,
        TrainTrackError::ArtifactNotFound { .. }
        | TrainTrackError::ScriptNotFound(_)
        | TrainTrackError::UserNotFound(_) => StatusCode::NOT_FOUND,
        TrainTrackError::ExecutionInProgress(_) | TrainTrackError::UserExists(_) => {
            StatusCode::CONFLICT
        }
        TrainTrackError::RegistryUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        TrainTrackError::ScriptFailed(_)
        | TrainTrackError::SecretMissing
        | TrainTrackError::Token(_)
        | TrainTrackError::PasswordHash(_)
        | TrainTrackError::StatusStore(_)
        | TrainTrackError::Io(_)
        | TrainTrackError::Yaml(_)
        | TrainTrackError::Json(_)
        | TrainTrackError::Sqlite(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let Some(denial) = self.0.downcast_ref::<Denial>() {
            return denial_response(denial);
        }
        if let Some(b) = self.0.downcast_ref::<BadRequestError>() {
            return json_error(StatusCode::BAD_REQUEST, &b.0);
        }

        let Some(e) = self.0.downcast_ref::<TrainTrackError>() else {
            tracing::error!(error = %format!("{:#}", self.0), "request failed");
            return json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal server error");
        };

        let status = status_for(e);
        match e {
            // The script's own diagnostic output is what the caller needs.
            TrainTrackError::ScriptFailed(diagnostic) => {
                json_error(status, &format!("script failed: {diagnostic}"))
            }
            TrainTrackError::RegistryUnavailable(detail) => {
                tracing::error!(%detail, "registry unavailable");
                json_error(status, "registry unavailable")
            }
            _ if status == StatusCode::INTERNAL_SERVER_ERROR => {
                tracing::error!(error = %e, "request failed");
                json_error(status, "internal server error")
            }
            _ => json_error(status, &e.to_string()),
        }
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
