//! Batched fan-out of probes
//!
//! A batch is the unit of concurrency: every probe in a batch is in flight at
//! once and the batch settles when all of them have. Callers walk batches one
//! after another.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::time::timeout;
use tracing::{debug, instrument, warn};

use crate::models::{ProbeOutcome, ProxyRecord};

use super::probe::HealthProbe;

/// Default number of records probed together
pub const DEFAULT_BATCH_SIZE: usize = 300;

/// Default deadline for a single probe
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct BatchProber {
    probe: Arc<dyn HealthProbe>,
    batch_size: usize,
    probe_timeout: Duration,
}

impl BatchProber {
    pub fn new(probe: Arc<dyn HealthProbe>, batch_size: usize, probe_timeout: Duration) -> Self {
        Self {
            probe,
            batch_size: batch_size.max(1),
            probe_timeout,
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Ordered, bounded-size slices of `records`
    pub fn batches<'a>(&self, records: &'a [ProxyRecord]) -> std::slice::Chunks<'a, ProxyRecord> {
        records.chunks(self.batch_size)
    }

    /// Probe every record of one batch concurrently.
    ///
    /// Always returns one outcome per record, in input order; failures are
    /// already normalized to offline.
    #[instrument(skip(self, batch), fields(size = batch.len()))]
    pub async fn probe_batch(&self, batch: &[ProxyRecord]) -> Vec<ProbeOutcome> {
        let outcomes = join_all(batch.iter().map(|record| self.probe_one(record.address()))).await;

        let online = outcomes.iter().filter(|o| o.success).count();
        debug!(
            online = online,
            offline = outcomes.len() - online,
            "Batch settled"
        );

        outcomes
    }

    async fn probe_one(&self, address: String) -> ProbeOutcome {
        match timeout(self.probe_timeout, self.probe.probe(&address)).await {
            Ok(Ok(response)) if response.success => {
                ProbeOutcome::online(address, response.latency_millis())
            }
            Ok(Ok(_)) => {
                debug!(address = %address, "Proxy reported offline");
                ProbeOutcome::offline(address)
            }
            Ok(Err(e)) => {
                warn!(address = %address, "Probe failed: {}", e);
                ProbeOutcome::offline(address)
            }
            Err(_) => {
                warn!(
                    address = %address,
                    "Probe timed out after {}ms",
                    self.probe_timeout.as_millis()
                );
                ProbeOutcome::offline(address)
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted probe shared by the health module tests

    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use crate::error::{Result, VigilError};
    use crate::health::probe::{HealthProbe, ProbeResponse};

    /// Answers from a table; unlisted addresses are online with 10ms latency
    #[derive(Default)]
    pub struct ScriptedProbe {
        pub latencies: HashMap<String, f64>,
        pub offline: HashSet<String>,
        pub erroring: HashSet<String>,
        pub hanging: HashSet<String>,
        pub delay: Duration,
        pub calls: Mutex<Vec<String>>,
        pub in_flight: AtomicUsize,
        pub max_in_flight: AtomicUsize,
    }

    impl ScriptedProbe {
        pub fn probed(&self) -> Vec<String> {
            self.calls.lock().clone()
        }

        pub fn peak_concurrency(&self) -> usize {
            self.max_in_flight.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl HealthProbe for ScriptedProbe {
        async fn probe(&self, address: &str) -> Result<ProbeResponse> {
            self.calls.lock().push(address.to_string());
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            if self.hanging.contains(address) {
                tokio::time::sleep(Duration::from_secs(30)).await;
            } else if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.erroring.contains(address) {
                return Err(VigilError::ProbeFailure {
                    address: address.to_string(),
                    reason: "HTTP error 502 Bad Gateway".to_string(),
                });
            }

            Ok(ProbeResponse {
                success: !self.offline.contains(address),
                proxy: Some(address.to_string()),
                latency_ms: self.latencies.get(address).copied().unwrap_or(10.0),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::ScriptedProbe;
    use super::*;
    use std::collections::HashSet;

    fn records(n: usize) -> Vec<ProxyRecord> {
        (0..n)
            .map(|i| ProxyRecord::new(format!("10.0.{}.{}", i / 256, i % 256), "443", None, None))
            .collect()
    }

    #[test]
    fn test_batches_partition_in_order() {
        let prober = BatchProber::new(Arc::new(ScriptedProbe::default()), 300, DEFAULT_PROBE_TIMEOUT);
        let all = records(301 + 300);

        let sizes: Vec<usize> = prober.batches(&all).map(|b| b.len()).collect();
        assert_eq!(sizes, vec![300, 300, 1]);

        let flattened: Vec<String> = prober.batches(&all).flatten().map(|r| r.id.clone()).collect();
        let original: Vec<String> = all.iter().map(|r| r.id.clone()).collect();
        assert_eq!(flattened, original);
    }

    #[test]
    fn test_zero_batch_size_is_clamped() {
        let prober = BatchProber::new(Arc::new(ScriptedProbe::default()), 0, DEFAULT_PROBE_TIMEOUT);
        assert_eq!(prober.batch_size(), 1);
    }

    #[tokio::test]
    async fn test_probe_batch_runs_concurrently() {
        let probe = Arc::new(ScriptedProbe {
            delay: Duration::from_millis(50),
            ..Default::default()
        });
        let prober = BatchProber::new(probe.clone(), 20, DEFAULT_PROBE_TIMEOUT);
        let batch = records(20);

        let outcomes = prober.probe_batch(&batch).await;

        assert_eq!(outcomes.len(), 20);
        assert!(outcomes.iter().all(|o| o.success && o.latency_ms == 10));
        assert_eq!(probe.peak_concurrency(), 20);
    }

    #[tokio::test]
    async fn test_failures_do_not_affect_siblings() {
        let batch = records(4);
        let erroring = batch[1].address();
        let hanging = batch[2].address();
        let offline = batch[3].address();

        let probe = Arc::new(ScriptedProbe {
            erroring: HashSet::from([erroring.clone()]),
            hanging: HashSet::from([hanging.clone()]),
            offline: HashSet::from([offline.clone()]),
            ..Default::default()
        });
        let prober = BatchProber::new(probe, 300, Duration::from_millis(100));

        let outcomes = prober.probe_batch(&batch).await;

        assert_eq!(outcomes[0], ProbeOutcome::online(batch[0].address(), 10));
        assert_eq!(outcomes[1], ProbeOutcome::offline(erroring));
        assert_eq!(outcomes[2], ProbeOutcome::offline(hanging));
        assert_eq!(outcomes[3], ProbeOutcome::offline(offline));
    }

    #[tokio::test]
    async fn test_offline_answer_zeroes_reported_latency() {
        let batch = records(1);
        let address = batch[0].address();
        let probe = Arc::new(ScriptedProbe {
            offline: HashSet::from([address.clone()]),
            latencies: [(address.clone(), 250.0)].into_iter().collect(),
            ..Default::default()
        });
        let prober = BatchProber::new(probe, 300, DEFAULT_PROBE_TIMEOUT);

        let outcomes = prober.probe_batch(&batch).await;
        assert_eq!(outcomes, vec![ProbeOutcome::offline(address)]);
    }
}
