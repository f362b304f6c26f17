use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::{Form, Json};
use serde::{Deserialize, Serialize};
use traintrack_core::access::{AccessLevel, LOGIN_PATH};
use traintrack_core::accounts::Registration;
use traintrack_core::error::TrainTrackError;
use traintrack_core::types::Role;

use super::home::MessageQuery;
use crate::auth::{cleared_cookie, session_cookie, Caller};
use crate::error::AppError;
use crate::state::AppState;
use crate::views;

const ALL_FIELDS_REQUIRED: &str = "All fields are required.";
const CREDENTIALS_REQUIRED: &str = "Both username and password are required.";
const INVALID_LOGIN: &str = "Invalid username or password.";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RegisterBody {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// POST /users/register: new accounts start as `regular`.
pub async fn register(
    State(app): State<AppState>,
    Form(body): Form<RegisterBody>,
) -> Result<Response, AppError> {
    let registration = Registration {
        username: body.username,
        email: body.email,
        password: body.password,
    };
    let accounts = app.accounts.clone();
    let result = tokio::task::spawn_blocking(move || accounts.register(&registration))
        .await
        .map_err(AppError::join)?;
    match result {
        Ok(_) => Ok(Redirect::to(LOGIN_PATH).into_response()),
        Err(TrainTrackError::MissingField(_)) => {
            Ok((StatusCode::BAD_REQUEST, views::login(Some(ALL_FIELDS_REQUIRED))).into_response())
        }
        Err(e @ TrainTrackError::UserExists(_)) => {
            Ok((StatusCode::CONFLICT, views::login(Some(&e.to_string()))).into_response())
        }
        Err(e) => Err(e.into()),
    }
}

/// GET /users/login
pub async fn login_page(Query(query): Query<MessageQuery>) -> impl IntoResponse {
    views::login(query.error.as_deref())
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginBody {
    pub username: String,
    pub password: String,
}

/// POST /users/login: sets the session cookie and returns to the home page.
pub async fn login(
    State(app): State<AppState>,
    Form(body): Form<LoginBody>,
) -> Result<Response, AppError> {
    if body.username.trim().is_empty() || body.password.is_empty() {
        return Ok((StatusCode::BAD_REQUEST, views::login(Some(CREDENTIALS_REQUIRED))).into_response());
    }
    let accounts = app.accounts.clone();
    let result = tokio::task::spawn_blocking(move || {
        accounts.authenticate(&body.username, &body.password)
    })
    .await
    .map_err(AppError::join)?;
    let identity = match result {
        Ok(identity) => identity,
        Err(TrainTrackError::InvalidCredentials) => {
            return Ok((StatusCode::UNAUTHORIZED, views::login(Some(INVALID_LOGIN))).into_response());
        }
        Err(e) => return Err(e.into()),
    };

    let token = app.tokens.issue(&identity)?;
    let auth = &app.config.auth;
    tracing::info!(username = %identity.username, "signed in");
    Ok((
        [(header::SET_COOKIE, session_cookie(&auth.cookie_name, &token, auth.token_ttl_minutes))],
        Redirect::to("/"),
    )
        .into_response())
}

/// GET /users/logout
pub async fn logout(State(app): State<AppState>) -> Response {
    (
        [(header::SET_COOKIE, cleared_cookie(&app.config.auth.cookie_name))],
        Redirect::to(LOGIN_PATH),
    )
        .into_response()
}

#[derive(Debug, Serialize)]
pub struct UserEntry {
    pub username: String,
    pub email: String,
    pub user_type: Role,
}

/// GET /users/list: admins, then premium, then regular accounts.
pub async fn list_users(
    State(app): State<AppState>,
    caller: Caller,
) -> Result<Json<Vec<UserEntry>>, AppError> {
    caller.require(AccessLevel::Admin)?;
    let accounts = app.accounts.clone();
    let users = tokio::task::spawn_blocking(move || accounts.list())
        .await
        .map_err(AppError::join)??;
    Ok(Json(
        users
            .into_iter()
            .map(|u| UserEntry {
                username: u.username,
                email: u.email,
                user_type: u.role,
            })
            .collect(),
    ))
}

/// POST /users/delete/{username}
pub async fn delete_user(
    State(app): State<AppState>,
    caller: Caller,
    Path(username): Path<String>,
) -> Result<Redirect, AppError> {
    caller.require(AccessLevel::Admin)?;
    let accounts = app.accounts.clone();
    tokio::task::spawn_blocking(move || accounts.delete(&username))
        .await
        .map_err(AppError::join)??;
    Ok(Redirect::to("/users/list"))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ChangeTypeBody {
    pub user_type: String,
}

/// POST /users/changeType/{username}
pub async fn change_type(
    State(app): State<AppState>,
    caller: Caller,
    Path(username): Path<String>,
    Form(body): Form<ChangeTypeBody>,
) -> Result<Redirect, AppError> {
    caller.require(AccessLevel::Admin)?;
    let role: Role = body.user_type.parse()?;
    let accounts = app.accounts.clone();
    tokio::task::spawn_blocking(move || accounts.change_role(&username, role))
        .await
        .map_err(AppError::join)??;
    Ok(Redirect::to("/users/list"))
}
