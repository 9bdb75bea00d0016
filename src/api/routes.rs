//! API route definitions

use std::path::Path;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tower_http::services::{ServeDir, ServeFile};

use super::handlers;
use super::server::AppState;

/// Create the router: `/api`, `/health`, and static files for the rest
pub fn create_router(state: AppState, static_dir: &str) -> Router {
    // Unknown paths get 404.html with a 404 status
    let not_found_page = ServeFile::new(Path::new(static_dir).join("404.html"));
    let static_files = ServeDir::new(static_dir).not_found_service(not_found_page);

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .nest("/api", api_routes())
        .fallback_service(static_files)
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/proxies",
            get(handlers::proxy::list_proxies).post(handlers::proxy::replace_proxies),
        )
        .route("/proxies/refresh", post(handlers::refresh::refresh))
        .route("/proxies/sweep", post(handlers::refresh::sweep))
        .route("/proxies/import", post(handlers::refresh::import))
        .route("/proxies/online", get(handlers::proxy::online_proxies))
        .route("/proxies/countries", get(handlers::proxy::countries))
        .route("/dashboard/stats", get(handlers::dashboard::get_stats))
        .route("/status", get(handlers::health::status))
        .fallback(endpoint_not_found)
}

async fn endpoint_not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "Endpoint not found" })),
    )
}
