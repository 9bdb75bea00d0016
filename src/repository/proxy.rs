use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::error::{Result, VigilError};
use crate::models::{ProbeOutcome, ProxyRecord, ProxyStatus};

use super::KvStore;

/// In-memory authoritative proxy collection, mirrored to a [`KvStore`]
///
/// All mutation goes through the methods below. Readers get owned snapshots.
pub struct ProxyRecordStore {
    records: RwLock<Vec<ProxyRecord>>,
    kv: Arc<dyn KvStore>,
    key: String,
}

impl ProxyRecordStore {
    /// Empty store that persists under `key`
    pub fn new(kv: Arc<dyn KvStore>, key: impl Into<String>) -> Self {
        Self {
            records: RwLock::new(Vec::new()),
            kv,
            key: key.into(),
        }
    }

    /// Store seeded from the persisted copy; an absent key means an empty collection
    ///
    /// Records persisted while still `testing` are settled as at cycle end.
    pub async fn load(kv: Arc<dyn KvStore>, key: impl Into<String>) -> Result<Self> {
        let store = Self::new(kv, key);

        if let Some(raw) = store.kv.get(&store.key).await? {
            let mut records: Vec<ProxyRecord> = serde_json::from_str(&raw)?;
            let settled = settle_records(&mut records);
            if settled > 0 {
                warn!(settled, "Settled records left testing by an interrupted cycle");
            }
            info!(
                count = records.len(),
                backend = store.kv.backend_name(),
                "Loaded proxy list"
            );
            *store.records.write() = records;
        } else {
            info!(backend = store.kv.backend_name(), "No stored proxy list, starting empty");
        }

        Ok(store)
    }

    pub fn backend_name(&self) -> &'static str {
        self.kv.backend_name()
    }

    /// Overwrite the whole collection. Duplicate addresses are kept.
    pub fn replace_all(&self, records: Vec<ProxyRecord>) {
        let count = records.len();
        *self.records.write() = records;
        debug!(count = count, "Replaced proxy collection");
    }

    /// Record a probe outcome on every record at `outcome.address`.
    ///
    /// Returns the number of records updated; zero means the address is no
    /// longer in the collection and the outcome was dropped.
    pub fn apply_result(&self, outcome: &ProbeOutcome) -> usize {
        self.apply_result_at(outcome, Utc::now())
    }

    pub(crate) fn apply_result_at(&self, outcome: &ProbeOutcome, now: DateTime<Utc>) -> usize {
        let mut records = self.records.write();
        let mut matched = 0;

        for record in records
            .iter_mut()
            .filter(|r| r.has_address(&outcome.address))
        {
            record.status = outcome.status();
            record.latency = if outcome.success { outcome.latency_ms } else { 0 };
            record.last_checked = Some(now);
            matched += 1;
        }

        if matched == 0 {
            debug!(address = %outcome.address, "Dropping result for address no longer present");
        }

        matched
    }

    /// Current collection by value
    pub fn snapshot(&self) -> Vec<ProxyRecord> {
        self.records.read().clone()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Flag every record as in flight
    pub fn mark_all_testing(&self) -> usize {
        let mut records = self.records.write();
        for record in records.iter_mut() {
            record.status = ProxyStatus::Testing;
        }
        records.len()
    }

    /// Flag the records with the given ids as in flight
    pub fn mark_testing(&self, ids: &HashSet<String>) -> usize {
        let mut records = self.records.write();
        let mut marked = 0;
        for record in records.iter_mut().filter(|r| ids.contains(&r.id)) {
            record.status = ProxyStatus::Testing;
            marked += 1;
        }
        marked
    }

    /// Force any record still `testing` to `offline` with zero latency.
    ///
    /// No probe result was observed for these, so `last_checked` is cleared:
    /// they read as unknown and are candidates for the next sweep.
    pub fn settle_in_flight(&self) -> usize {
        settle_records(&mut self.records.write())
    }

    /// Serialize the whole collection and overwrite the remote copy
    pub async fn try_persist(&self) -> Result<()> {
        let payload = {
            let records = self.records.read();
            serde_json::to_string(&*records)?
        };

        self.kv
            .put(&self.key, payload)
            .await
            .map_err(|e| VigilError::PersistFailure(e.to_string()))
    }

    /// Like [`try_persist`](Self::try_persist), but failures are logged and
    /// swallowed. Returns whether the write succeeded.
    pub async fn persist(&self) -> bool {
        match self.try_persist().await {
            Ok(()) => true,
            Err(e) => {
                warn!(key = %self.key, "Persisting proxy list failed: {}", e);
                false
            }
        }
    }
}

fn settle_records(records: &mut [ProxyRecord]) -> usize {
    let mut settled = 0;
    for record in records
        .iter_mut()
        .filter(|r| r.status == ProxyStatus::Testing)
    {
        record.status = ProxyStatus::Offline;
        record.latency = 0;
        record.last_checked = None;
        settled += 1;
    }
    settled
}
