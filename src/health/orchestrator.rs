//! Health check cycles
//!
//! A cycle picks its candidates, marks them `testing`, then walks the
//! candidates batch by batch: probe, merge into the store, persist. Only one
//! cycle may run at a time; the slot is claimed with [`RefreshOrchestrator::try_begin`]
//! and released when the returned [`CyclePermit`] drops.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::error::{Result, VigilError};
use crate::models::{CycleKind, CycleReport, CycleStarted, ProxyRecord};
use crate::repository::ProxyRecordStore;

use super::batch::BatchProber;
use super::import::{parse_proxy_list, ImportSource};

/// Exclusive right to run one cycle
pub struct CyclePermit {
    flag: Arc<AtomicBool>,
}

impl Drop for CyclePermit {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Cycle whose candidates are chosen and already marked `testing`
pub struct PreparedCycle {
    kind: CycleKind,
    candidates: Vec<ProxyRecord>,
    _permit: CyclePermit,
}

impl PreparedCycle {
    pub fn kind(&self) -> CycleKind {
        self.kind
    }

    pub fn candidate_count(&self) -> usize {
        self.candidates.len()
    }
}

/// A cycle running on its own task
pub struct CycleHandle {
    pub started: CycleStarted,
    pub task: JoinHandle<CycleReport>,
}

pub struct RefreshOrchestrator {
    store: Arc<ProxyRecordStore>,
    prober: BatchProber,
    in_progress: Arc<AtomicBool>,
    last_report: Mutex<Option<CycleReport>>,
}

impl RefreshOrchestrator {
    pub fn new(store: Arc<ProxyRecordStore>, prober: BatchProber) -> Self {
        Self {
            store,
            prober,
            in_progress: Arc::new(AtomicBool::new(false)),
            last_report: Mutex::new(None),
        }
    }

    pub fn store(&self) -> &Arc<ProxyRecordStore> {
        &self.store
    }

    pub fn is_cycle_in_progress(&self) -> bool {
        self.in_progress.load(Ordering::Acquire)
    }

    pub fn last_report(&self) -> Option<CycleReport> {
        self.last_report.lock().clone()
    }

    /// Claim the cycle slot, or fail with `ConcurrentCycleRejected`
    pub fn try_begin(&self) -> Result<CyclePermit> {
        self.in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| VigilError::ConcurrentCycleRejected)?;

        Ok(CyclePermit {
            flag: self.in_progress.clone(),
        })
    }

    /// Choose candidates for `kind` and mark them `testing`
    pub fn prepare(&self, kind: CycleKind, permit: CyclePermit) -> PreparedCycle {
        let candidates = match kind {
            CycleKind::Manual => {
                self.store.mark_all_testing();
                self.store.snapshot()
            }
            CycleKind::BackgroundSweep => {
                let now = Utc::now();
                let stale: Vec<ProxyRecord> = self
                    .store
                    .snapshot()
                    .into_iter()
                    .filter(|r| !r.is_fresh(now))
                    .collect();
                let ids: HashSet<String> = stale.iter().map(|r| r.id.clone()).collect();
                self.store.mark_testing(&ids);
                stale
            }
        };

        PreparedCycle {
            kind,
            candidates,
            _permit: permit,
        }
    }

    /// Full refresh of every record, run to completion
    pub async fn trigger_manual(&self) -> Result<CycleReport> {
        let permit = self.try_begin()?;
        Ok(self.execute(self.prepare(CycleKind::Manual, permit)).await)
    }

    /// Refresh of stale records only, run to completion
    pub async fn trigger_background_sweep(&self) -> Result<CycleReport> {
        let permit = self.try_begin()?;
        Ok(self.execute(self.prepare(CycleKind::BackgroundSweep, permit)).await)
    }

    /// Start a cycle of `kind` on a new task.
    ///
    /// Rejection and `testing` marks happen before this returns.
    pub fn spawn(self: &Arc<Self>, kind: CycleKind) -> Result<CycleHandle> {
        let permit = self.try_begin()?;
        Ok(self.spawn_prepared(self.prepare(kind, permit)))
    }

    pub fn spawn_prepared(self: &Arc<Self>, cycle: PreparedCycle) -> CycleHandle {
        let started = CycleStarted {
            cycle: cycle.kind(),
            candidates: cycle.candidate_count(),
        };

        let this = Arc::clone(self);
        let task = tokio::spawn(async move { this.execute(cycle).await });

        CycleHandle { started, task }
    }

    /// Replace the collection with the records listed at `url`, then start a
    /// manual refresh.
    ///
    /// The cycle slot is held from before the fetch, so nothing else runs
    /// against the collection in between. On any failure the collection is
    /// left as it was.
    pub async fn import_and_refresh(
        self: &Arc<Self>,
        source: &dyn ImportSource,
        url: &str,
    ) -> Result<CycleHandle> {
        let permit = self.try_begin()?;

        let text = source.fetch_list(url).await?;
        let records = parse_proxy_list(&text);
        if records.is_empty() {
            return Err(VigilError::ImportFailure(
                "no valid proxies found".to_string(),
            ));
        }

        info!(count = records.len(), url = url, "Imported proxy list");
        self.store.replace_all(records);

        Ok(self.spawn_prepared(self.prepare(CycleKind::Manual, permit)))
    }

    /// Probe, merge and persist batch by batch. The permit is released on return.
    #[instrument(skip(self, cycle), fields(kind = %cycle.kind, candidates = cycle.candidates.len()))]
    pub async fn execute(&self, cycle: PreparedCycle) -> CycleReport {
        let mut report = CycleReport::begin(cycle.kind, cycle.candidates.len());

        if cycle.candidates.is_empty() {
            debug!("No candidates, nothing to check");
        } else {
            info!("Starting health check cycle");
        }

        for (index, batch) in self.prober.batches(&cycle.candidates).enumerate() {
            let outcomes = self.prober.probe_batch(batch).await;

            for outcome in &outcomes {
                if outcome.success {
                    report.online += 1;
                } else {
                    report.offline += 1;
                }
                self.store.apply_result(outcome);
            }
            report.batches += 1;

            if !self.store.persist().await {
                report.persist_failures += 1;
                warn!(batch = index, "Batch results kept in memory only");
            }
        }

        report.settled = self.store.settle_in_flight();
        if report.settled > 0 {
            warn!(settled = report.settled, "Records left in flight were marked offline");
            if !self.store.persist().await {
                report.persist_failures += 1;
            }
        }

        report.finished_at = Utc::now();

        if !cycle.candidates.is_empty() {
            info!(
                batches = report.batches,
                online = report.online,
                offline = report.offline,
                persist_failures = report.persist_failures,
                "Health check cycle complete"
            );
        }

        *self.last_report.lock() = Some(report.clone());
        report
    }
}
