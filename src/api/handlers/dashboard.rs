//! Dashboard handlers

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;

use crate::api::server::AppState;
use crate::error::VigilError;
use crate::models::DashboardStats;

/// Counts by derived status
pub async fn get_stats(State(state): State<AppState>) -> Result<impl IntoResponse, VigilError> {
    let stats = DashboardStats::from_records(
        &state.store.snapshot(),
        Utc::now(),
        state.orchestrator.is_cycle_in_progress(),
    );
    Ok(Json(stats))
}
