use axum::extract::Query;
use axum::response::Html;
use serde::Deserialize;

use crate::auth::Caller;
use crate::views;

#[derive(Debug, Default, Deserialize)]
pub struct MessageQuery {
    pub error: Option<String>,
}

/// GET /health
pub async fn health() -> &'static str {
    "OK"
}

/// GET /
pub async fn home(caller: Caller, Query(query): Query<MessageQuery>) -> Html<String> {
    views::home(caller.identity(), query.error.as_deref())
}
