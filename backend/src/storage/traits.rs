//! # Storage Traits
//!
//! The settlement core treats every collaborator as an opaque remote service.
//! These traits describe only the request/response shapes, so the domain
//! layer works the same against the HTTP store and the in-process store.

use async_trait::async_trait;
use shared::{DailyRecord, Identity, SettlementMode, SettlementSummaryRecord};

use super::error::StoreResult;

/// Read-only source of reference data (the identity list)
#[async_trait]
pub trait IdentitySource: Send + Sync {
    /// List every identity known to the operation
    async fn list_identities(&self) -> StoreResult<Vec<Identity>>;
}

/// Source of raw per-day records
#[async_trait]
pub trait DailyRecordSource: Send + Sync {
    /// List all records for a date, across identities, in no particular order
    async fn list_records(&self, date: &str) -> StoreResult<Vec<DailyRecord>>;

    /// Create the records for a day that has none yet.
    /// Callers re-fetch with `list_records` afterwards.
    async fn init_records(&self, date: &str) -> StoreResult<()>;
}

/// Store of settlement summary rows keyed by (date, mode)
#[async_trait]
pub trait SettlementSummaryStore: Send + Sync {
    /// Read the current row, `None` when the store has nothing for the key
    async fn get_summary(
        &self,
        date: &str,
        mode: SettlementMode,
    ) -> StoreResult<Option<SettlementSummaryRecord>>;

    /// Whole-row upsert
    async fn put_summary(&self, record: &SettlementSummaryRecord) -> StoreResult<()>;
}

/// Outbound delivery of a settlement summary
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send_summary(&self, record: &SettlementSummaryRecord) -> StoreResult<()>;
}

/// A store that provides every collaborator the settlement core needs
pub trait SettlementStore:
    IdentitySource + DailyRecordSource + SettlementSummaryStore + NotificationSink
{
}

impl<T> SettlementStore for T where
    T: IdentitySource + DailyRecordSource + SettlementSummaryStore + NotificationSink
{
}
