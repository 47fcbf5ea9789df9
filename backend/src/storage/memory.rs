//! In-process settlement store.
//!
//! Used when no remote store is configured and by the test suites. It keeps
//! call counters, can inject latency so concurrent callers overlap, and can
//! fail selected calls on demand.

use async_trait::async_trait;
use log::{debug, info};
use shared::{DailyRecord, Identity, SettlementMode, SettlementSummaryRecord};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use super::error::{StoreError, StoreResult};
use super::traits::{DailyRecordSource, IdentitySource, NotificationSink, SettlementSummaryStore};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
pub struct MemoryStore {
    identities: Mutex<Vec<Identity>>,
    records: Mutex<HashMap<String, Vec<DailyRecord>>>,
    summaries: Mutex<HashMap<(String, SettlementMode), SettlementSummaryRecord>>,
    notifications: Mutex<Vec<SettlementSummaryRecord>>,
    /// Every attempted summary write, failed ones included, in arrival order
    write_log: Mutex<Vec<SettlementSummaryRecord>>,
    latency: Mutex<Duration>,

    identity_fetches: AtomicUsize,
    record_fetches: AtomicUsize,
    init_calls: AtomicUsize,
    summary_reads: AtomicUsize,
    active_writes: AtomicUsize,
    max_active_writes: AtomicUsize,

    fail_identities: AtomicBool,
    fail_records: AtomicBool,
    fail_summaries: AtomicBool,
    fail_notifications: AtomicBool,
    /// 1-based write attempt numbers that should fail
    failing_writes: Mutex<HashSet<usize>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_identities(identities: Vec<Identity>) -> Self {
        let store = Self::new();
        *lock(&store.identities) = identities;
        store
    }

    /// Delay applied to every call, so overlapping callers can be observed
    pub fn set_latency(&self, latency: Duration) {
        *lock(&self.latency) = latency;
    }

    pub fn set_identities(&self, identities: Vec<Identity>) {
        *lock(&self.identities) = identities;
    }

    pub fn insert_records(&self, date: &str, records: Vec<DailyRecord>) {
        lock(&self.records).insert(date.to_string(), records);
    }

    pub fn insert_summary(&self, record: SettlementSummaryRecord) {
        let mode = record.mode.unwrap_or(SettlementMode::Start);
        lock(&self.summaries).insert((record.date.clone(), mode), record);
    }

    pub fn summary(&self, date: &str, mode: SettlementMode) -> Option<SettlementSummaryRecord> {
        lock(&self.summaries).get(&(date.to_string(), mode)).cloned()
    }

    pub fn fail_identity_fetches(&self, fail: bool) {
        self.fail_identities.store(fail, Ordering::SeqCst);
    }

    pub fn fail_record_fetches(&self, fail: bool) {
        self.fail_records.store(fail, Ordering::SeqCst);
    }

    pub fn fail_summary_reads(&self, fail: bool) {
        self.fail_summaries.store(fail, Ordering::SeqCst);
    }

    pub fn fail_notifications(&self, fail: bool) {
        self.fail_notifications.store(fail, Ordering::SeqCst);
    }

    /// Make the given write attempt (1-based) fail
    pub fn fail_write_attempt(&self, attempt: usize) {
        lock(&self.failing_writes).insert(attempt);
    }

    pub fn write_log(&self) -> Vec<SettlementSummaryRecord> {
        lock(&self.write_log).clone()
    }

    pub fn notifications(&self) -> Vec<SettlementSummaryRecord> {
        lock(&self.notifications).clone()
    }

    pub fn identity_fetch_count(&self) -> usize {
        self.identity_fetches.load(Ordering::SeqCst)
    }

    pub fn record_fetch_count(&self) -> usize {
        self.record_fetches.load(Ordering::SeqCst)
    }

    pub fn init_call_count(&self) -> usize {
        self.init_calls.load(Ordering::SeqCst)
    }

    pub fn summary_read_count(&self) -> usize {
        self.summary_reads.load(Ordering::SeqCst)
    }

    /// Highest number of summary writes that were ever in flight at once
    pub fn max_concurrent_writes(&self) -> usize {
        self.max_active_writes.load(Ordering::SeqCst)
    }

    async fn simulate_latency(&self) {
        let latency = *lock(&self.latency);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl IdentitySource for MemoryStore {
    async fn list_identities(&self) -> StoreResult<Vec<Identity>> {
        self.identity_fetches.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;
        if self.fail_identities.load(Ordering::SeqCst) {
            return Err(StoreError::Network("identity source unavailable".to_string()));
        }
        Ok(lock(&self.identities).clone())
    }
}

#[async_trait]
impl DailyRecordSource for MemoryStore {
    async fn list_records(&self, date: &str) -> StoreResult<Vec<DailyRecord>> {
        self.record_fetches.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;
        if self.fail_records.load(Ordering::SeqCst) {
            return Err(StoreError::Network("record source unavailable".to_string()));
        }
        Ok(lock(&self.records).get(date).cloned().unwrap_or_default())
    }

    async fn init_records(&self, date: &str) -> StoreResult<()> {
        self.init_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;

        let identities = lock(&self.identities).clone();
        let mut records = lock(&self.records);
        if records.get(date).map_or(false, |existing| !existing.is_empty()) {
            debug!("Records for {} already exist, init is a no-op", date);
            return Ok(());
        }

        let fresh: Vec<DailyRecord> = identities
            .iter()
            .enumerate()
            .map(|(index, identity)| DailyRecord {
                id: format!("record::{}::{}", date, identity.id),
                identity_id: Some(identity.id.clone()),
                record_date: date.to_string(),
                display_order: index as i32,
                ..DailyRecord::default()
            })
            .collect();
        info!("Initialized {} empty records for {}", fresh.len(), date);
        records.insert(date.to_string(), fresh);
        Ok(())
    }
}

#[async_trait]
impl SettlementSummaryStore for MemoryStore {
    async fn get_summary(
        &self,
        date: &str,
        mode: SettlementMode,
    ) -> StoreResult<Option<SettlementSummaryRecord>> {
        self.summary_reads.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;
        if self.fail_summaries.load(Ordering::SeqCst) {
            return Err(StoreError::Network("summary store unavailable".to_string()));
        }
        Ok(self.summary(date, mode))
    }

    async fn put_summary(&self, record: &SettlementSummaryRecord) -> StoreResult<()> {
        let active = self.active_writes.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active_writes.fetch_max(active, Ordering::SeqCst);

        let attempt = {
            let mut log = lock(&self.write_log);
            log.push(record.clone());
            log.len()
        };
        self.simulate_latency().await;

        let result = if lock(&self.failing_writes).contains(&attempt) {
            Err(StoreError::Rejected(format!("write attempt {} refused", attempt)))
        } else {
            self.insert_summary(record.clone());
            Ok(())
        };

        self.active_writes.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

#[async_trait]
impl NotificationSink for MemoryStore {
    async fn send_summary(&self, record: &SettlementSummaryRecord) -> StoreResult<()> {
        self.simulate_latency().await;
        if self.fail_notifications.load(Ordering::SeqCst) {
            return Err(StoreError::Network("notification sink unavailable".to_string()));
        }
        lock(&self.notifications).push(record.clone());
        Ok(())
    }
}
