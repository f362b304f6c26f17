pub mod auth;
pub mod error;
pub mod routes;
pub mod state;
pub mod views;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::{middleware, Router};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use traintrack_core::paths;
use traintrack_core::types::ArtifactKind;

pub use state::AppState;

/// Build the axum Router with all routes and middleware.
/// Used by `serve()` and available for integration testing.
pub fn build_router(app_state: AppState) -> Router {
    let body_limit = app_state.config.upload.max_bytes;

    let mut router = Router::new()
        .route("/health", get(routes::home::health))
        .route("/", get(routes::home::home))
        // Datasets
        .route("/datasets", get(routes::datasets::list_datasets))
        .route("/datasets/upload", post(routes::datasets::upload_dataset))
        .route("/datasets/{id}/info", get(routes::datasets::dataset_info))
        .route("/datasets/{id}/delete", post(routes::datasets::delete_dataset))
        // Models
        .route("/models", get(routes::models::list_models))
        .route("/models/upload", post(routes::models::upload_model))
        .route("/models/{id}", get(routes::models::get_model))
        .route("/models/{id}/info", get(routes::models::model_info))
        .route("/models/{id}/delete", post(routes::models::delete_model))
        .route("/models/{id}/execute", post(routes::models::execute_model))
        .route("/models/{id}/status", get(routes::models::model_status))
        // Users
        .route("/users/register", post(routes::users::register))
        .route(
            "/users/login",
            get(routes::users::login_page).post(routes::users::login),
        )
        .route("/users/logout", get(routes::users::logout))
        .route("/users/list", get(routes::users::list_users))
        .route("/users/delete/{username}", post(routes::users::delete_user))
        .route("/users/changeType/{username}", post(routes::users::change_type));

    // Stored files, one tree per artifact kind. The data root itself also
    // holds the database and status store, so it is never served whole.
    for kind in ArtifactKind::all() {
        let prefix = format!("{}/{}", paths::FILES_URL_PREFIX, kind.dir_name());
        router = router.nest_service(&prefix, ServeDir::new(paths::kind_dir(&app_state.root, *kind)));
    }

    router
        .layer(middleware::from_fn_with_state(
            app_state.clone(),
            auth::identity_middleware,
        ))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

/// Start the TrainTrack server.
pub async fn serve(app_state: AppState, port: u16) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    serve_on(app_state, listener).await
}

/// Start the server on a pre-bound listener.
///
/// Unlike `serve`, this accepts a `TcpListener` that was already bound so the
/// caller can read the actual port before starting (useful when `port = 0` and
/// the OS picks a free port).
pub async fn serve_on(app_state: AppState, listener: tokio::net::TcpListener) -> anyhow::Result<()> {
    let actual_port = listener.local_addr()?.port();
    let app = build_router(app_state);

    tracing::info!("TrainTrack server listening on http://localhost:{actual_port}");

    axum::serve(listener, app).await?;
    Ok(())
}
