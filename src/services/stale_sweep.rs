//! Background stale sweep
//!
//! Periodically re-probes records whose last check is older than the
//! staleness TTL. A tick that lands while another cycle runs is skipped.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, instrument};

use crate::error::VigilError;
use crate::health::RefreshOrchestrator;

pub struct StaleSweepService {
    orchestrator: Arc<RefreshOrchestrator>,
    interval: Duration,
}

impl StaleSweepService {
    pub fn new(orchestrator: Arc<RefreshOrchestrator>, interval: Duration) -> Self {
        Self {
            orchestrator,
            interval,
        }
    }

    /// Run until `shutdown` flips to true. A sweep already underway is
    /// finished before the loop exits.
    #[instrument(skip(self, shutdown))]
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "Starting stale sweep service (interval: {}s)",
            self.interval.as_secs()
        );

        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker.tick().await; // Skip immediate tick

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep_once().await;
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("Stale sweep service shutting down");
                        break;
                    }
                }
            }
        }
    }

    async fn sweep_once(&self) {
        match self.orchestrator.trigger_background_sweep().await {
            Ok(report) if report.candidates > 0 => {
                debug!(
                    candidates = report.candidates,
                    online = report.online,
                    "Stale sweep finished"
                );
            }
            Ok(_) => debug!("Nothing stale"),
            Err(VigilError::ConcurrentCycleRejected) => {
                debug!("Cycle already running, sweep skipped");
            }
            Err(e) => error!("Stale sweep failed: {}", e),
        }
    }
}

/// Handle for stopping the stale sweep service
pub struct StaleSweepHandle {
    shutdown_tx: watch::Sender<bool>,
}

impl StaleSweepHandle {
    pub fn new() -> (Self, watch::Receiver<bool>) {
        let (tx, rx) = watch::channel(false);
        (Self { shutdown_tx: tx }, rx)
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::batch::testing::ScriptedProbe;
    use crate::health::batch::DEFAULT_PROBE_TIMEOUT;
    use crate::health::BatchProber;
    use crate::models::{ProxyRecord, ProxyStatus};
    use crate::repository::{MemoryKvStore, ProxyRecordStore};

    fn orchestrator(records: Vec<ProxyRecord>, probe: Arc<ScriptedProbe>) -> Arc<RefreshOrchestrator> {
        let kv = Arc::new(MemoryKvStore::new());
        let store = Arc::new(ProxyRecordStore::new(kv, "all_proxies_list"));
        store.replace_all(records);
        let prober = BatchProber::new(probe, 300, DEFAULT_PROBE_TIMEOUT);
        Arc::new(RefreshOrchestrator::new(store, prober))
    }

    #[tokio::test]
    async fn test_sweep_runs_on_tick_and_stops_on_shutdown() {
        let probe = Arc::new(ScriptedProbe::default());
        let orchestrator = orchestrator(
            vec![ProxyRecord::new("1.2.3.4", "443", None, None)],
            probe.clone(),
        );
        let service = StaleSweepService::new(orchestrator.clone(), Duration::from_millis(20));
        let (handle, shutdown) = StaleSweepHandle::new();

        let task = tokio::spawn(async move { service.run(shutdown).await });
        tokio::time::sleep(Duration::from_millis(200)).await;
        handle.shutdown();
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("service stops after shutdown")
            .unwrap();

        // The record was stale only until the first sweep checked it
        assert_eq!(probe.probed(), vec!["1.2.3.4:443".to_string()]);
        assert_eq!(
            orchestrator.store().snapshot()[0].status,
            ProxyStatus::Online
        );
    }

    #[tokio::test]
    async fn test_sweep_skipped_while_cycle_runs() {
        let probe = Arc::new(ScriptedProbe::default());
        let orchestrator = orchestrator(
            vec![ProxyRecord::new("1.2.3.4", "443", None, None)],
            probe.clone(),
        );
        let _permit = orchestrator.try_begin().unwrap();

        let service = StaleSweepService::new(orchestrator.clone(), Duration::from_secs(60));
        service.sweep_once().await;

        assert!(probe.probed().is_empty());
        assert_eq!(
            orchestrator.store().snapshot()[0].status,
            ProxyStatus::Unknown
        );
    }
}
