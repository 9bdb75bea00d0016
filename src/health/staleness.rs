//! Freshness rules for last-known probe results
//!
//! Every consumer (cycle candidate selection, list filtering, dashboard counts,
//! online selection) decides freshness through this module, against the single
//! `STALENESS_TTL` constant.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::models::ProxyStatus;

/// How long a probe result is trusted
pub const STALENESS_TTL: Duration = Duration::from_secs(10 * 60);

/// Returns true when `last_checked` is present and younger than `ttl` at `now`.
///
/// A timestamp in the future relative to `now` counts as fresh.
pub fn is_fresh(last_checked: Option<DateTime<Utc>>, now: DateTime<Utc>, ttl: Duration) -> bool {
    let Some(last_checked) = last_checked else {
        return false;
    };

    match (now - last_checked).to_std() {
        Ok(elapsed) => elapsed < ttl,
        Err(_) => true,
    }
}

/// Status a consumer must act on: the stored status while fresh, `Unknown` once stale.
pub fn derived_status(
    status: ProxyStatus,
    last_checked: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> ProxyStatus {
    if is_fresh(last_checked, now, STALENESS_TTL) {
        status
    } else {
        ProxyStatus::Unknown
    }
}
