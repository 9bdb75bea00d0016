//! Liveness and orchestrator status

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::api::server::AppState;
use crate::health::STALENESS_TTL;

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "vigil"
        })),
    )
}

/// Cycle state and the last cycle report
pub async fn status(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "cycleInProgress": state.orchestrator.is_cycle_in_progress(),
        "lastCycle": state.orchestrator.last_report(),
        "records": state.store.len(),
        "storeBackend": state.store.backend_name(),
        "stalenessTtlSecs": STALENESS_TTL.as_secs(),
        "uptimeSecs": state.started_at.elapsed().as_secs(),
    }))
}
