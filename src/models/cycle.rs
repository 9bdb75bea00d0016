use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What started a health check cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleKind {
    /// Every record is a candidate
    Manual,
    /// Only stale records are candidates
    BackgroundSweep,
}

impl CycleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CycleKind::Manual => "manual",
            CycleKind::BackgroundSweep => "background_sweep",
        }
    }
}

impl std::fmt::Display for CycleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Summary of one completed cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleReport {
    pub kind: CycleKind,
    pub candidates: usize,
    pub batches: usize,
    pub online: usize,
    pub offline: usize,
    /// Records left in `testing` after the last batch and forced offline
    pub settled: usize,
    pub persist_failures: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl CycleReport {
    pub fn begin(kind: CycleKind, candidates: usize) -> Self {
        let now = Utc::now();
        Self {
            kind,
            candidates,
            batches: 0,
            online: 0,
            offline: 0,
            settled: 0,
            persist_failures: 0,
            started_at: now,
            finished_at: now,
        }
    }
}

/// Response body for a cycle that was accepted and started
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleStarted {
    pub cycle: CycleKind,
    pub candidates: usize,
}
