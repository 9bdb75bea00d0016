//! Cycle triggers
//!
//! Each handler answers as soon as the cycle is accepted; the cycle itself
//! runs on its own task.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use tracing::info;

use crate::api::server::AppState;
use crate::error::VigilError;
use crate::health::CycleHandle;
use crate::models::CycleKind;

fn accepted(handle: CycleHandle) -> impl IntoResponse {
    info!(
        cycle = %handle.started.cycle,
        candidates = handle.started.candidates,
        "Cycle started"
    );
    (StatusCode::ACCEPTED, Json(handle.started))
}

/// Start a manual refresh of every record
pub async fn refresh(State(state): State<AppState>) -> Result<impl IntoResponse, VigilError> {
    let handle = state.orchestrator.spawn(CycleKind::Manual)?;
    Ok(accepted(handle))
}

/// Start a sweep of stale records
pub async fn sweep(State(state): State<AppState>) -> Result<impl IntoResponse, VigilError> {
    let handle = state.orchestrator.spawn(CycleKind::BackgroundSweep)?;
    Ok(accepted(handle))
}

#[derive(Debug, Deserialize)]
pub struct ImportRequest {
    pub url: String,
}

/// Replace the collection from a remote list, then refresh it
pub async fn import(
    State(state): State<AppState>,
    body: Result<Json<ImportRequest>, JsonRejection>,
) -> Result<impl IntoResponse, VigilError> {
    let Json(req) = body.map_err(|e| VigilError::InvalidRequest(e.body_text()))?;
    if req.url.trim().is_empty() {
        return Err(VigilError::InvalidRequest("url is required".to_string()));
    }

    let handle = state
        .orchestrator
        .import_and_refresh(state.importer.as_ref(), &req.url)
        .await?;

    Ok(accepted(handle))
}
