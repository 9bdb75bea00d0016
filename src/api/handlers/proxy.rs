//! Proxy collection handlers

use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::api::server::AppState;
use crate::error::VigilError;
use crate::health::selection;
use crate::models::{ProxyListParams, ProxyRecord};

/// Upper bound on records returned by one `/proxies/online` call
pub const MAX_ONLINE_PICK: usize = 100;

/// List the collection, optionally filtered
pub async fn list_proxies(
    State(state): State<AppState>,
    Query(params): Query<ProxyListParams>,
) -> Result<impl IntoResponse, VigilError> {
    let now = Utc::now();
    let records: Vec<ProxyRecord> = state
        .store
        .snapshot()
        .into_iter()
        .filter(|r| params.matches(r, now))
        .collect();

    Ok(Json(records))
}

/// Replace the whole collection and persist it
pub async fn replace_proxies(
    State(state): State<AppState>,
    body: Result<Json<Vec<ProxyRecord>>, JsonRejection>,
) -> Result<impl IntoResponse, VigilError> {
    let Json(records) = body.map_err(|e| VigilError::InvalidRequest(e.body_text()))?;
    let count = records.len();

    state.store.replace_all(records);
    state.store.try_persist().await?;

    info!(count = count, "Replaced proxy collection");

    Ok(Json(json!({
        "success": true,
        "message": format!("Saved {} proxies", count),
    })))
}

#[derive(Debug, Deserialize, Default)]
pub struct OnlineQuery {
    pub country: Option<String>,
    pub count: Option<usize>,
}

/// Random picks from the currently-online records
pub async fn online_proxies(
    State(state): State<AppState>,
    Query(query): Query<OnlineQuery>,
) -> Result<impl IntoResponse, VigilError> {
    let count = query.count.unwrap_or(1);
    if count == 0 || count > MAX_ONLINE_PICK {
        return Err(VigilError::InvalidRequest(format!(
            "count must be between 1 and {}",
            MAX_ONLINE_PICK
        )));
    }

    let country = query.country.as_deref().filter(|c| !c.is_empty());
    let records = state.store.snapshot();
    let picks = selection::pick_online(
        &records,
        country,
        count,
        Utc::now(),
        &mut rand::thread_rng(),
    );

    if picks.is_empty() {
        return Err(VigilError::NotFound(match country {
            Some(c) => format!("No online proxies for country {}", c),
            None => "No online proxies".to_string(),
        }));
    }

    Ok(Json(picks))
}

/// Distinct countries present in the collection
pub async fn countries(State(state): State<AppState>) -> Result<impl IntoResponse, VigilError> {
    Ok(Json(selection::countries(&state.store.snapshot())))
}
