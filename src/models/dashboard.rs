use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ProxyRecord, ProxyStatus};

/// Dashboard statistics
///
/// Every count except `testing` is based on the derived status.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    /// Total number of proxies
    pub total: usize,
    /// Checked online within the staleness window
    pub online: usize,
    /// Checked offline within the staleness window
    pub offline: usize,
    /// Never checked, or last checked too long ago
    pub unknown: usize,
    /// Currently being probed
    pub testing: usize,
    pub cycle_in_progress: bool,
}

impl DashboardStats {
    pub fn from_records(records: &[ProxyRecord], now: DateTime<Utc>, cycle_in_progress: bool) -> Self {
        let mut stats = DashboardStats {
            total: records.len(),
            cycle_in_progress,
            ..Default::default()
        };

        for record in records {
            if record.status == ProxyStatus::Testing {
                stats.testing += 1;
            }
            match record.derived_status(now) {
                ProxyStatus::Online => stats.online += 1,
                ProxyStatus::Offline => stats.offline += 1,
                ProxyStatus::Unknown => stats.unknown += 1,
                ProxyStatus::Testing => {}
            }
        }

        stats
    }
}
