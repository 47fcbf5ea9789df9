//! Load pipeline for one settlement date.
//!
//! A load pulls the identity list through the reference cache, fetches the
//! date's raw records (initializing the day first if it has none), derives
//! every identity chain and its margins, and reads both settlement
//! summaries. Concurrent loads for one date share a single pipeline run.
//!
//! `SettlementSession` tracks which date is selected so a load that finishes
//! after the selection moved on can be dropped instead of displayed.

use log::{debug, info, warn};
use shared::{DailyRecord, SettlementMode};
use std::sync::{Arc, Mutex, PoisonError};

use crate::domain::commands::ledger::SettlementView;
use crate::domain::errors::{normalize_record_date, SettlementError, SettlementResult};
use crate::domain::load_dedup::LoadDeduplicator;
use crate::domain::margin_aggregator::{grand_total, group_by_identity, sum_day_margins, sum_margins_by_identity};
use crate::domain::models::SummaryKey;
use crate::domain::record_chain::{DerivedRecord, RecordChain};
use crate::domain::reference_cache::ReferenceDataCache;
use crate::domain::settlement_service::SettlementService;
use crate::storage::{DailyRecordSource, StoreResult};

#[derive(Clone)]
pub struct DailyLedgerService {
    reference: Arc<ReferenceDataCache>,
    records: Arc<dyn DailyRecordSource>,
    settlement: SettlementService,
    loads: Arc<LoadDeduplicator<String, SettlementView>>,
}

impl DailyLedgerService {
    pub fn new(
        reference: Arc<ReferenceDataCache>,
        records: Arc<dyn DailyRecordSource>,
        settlement: SettlementService,
    ) -> Self {
        Self {
            reference,
            records,
            settlement,
            loads: Arc::new(LoadDeduplicator::new()),
        }
    }

    /// Load and derive everything for `date`, joining a load already in
    /// flight for the same date
    pub async fn load_day(&self, date: &str) -> SettlementResult<SettlementView> {
        let date = normalize_record_date(date)?;

        let reference = self.reference.clone();
        let records = self.records.clone();
        let settlement = self.settlement.clone();
        let pipeline_date = date.clone();

        self.loads
            .load(date, move || run_pipeline(reference, records, settlement, pipeline_date))
            .await
            .map_err(SettlementError::from)
    }

    pub fn is_loading(&self, date: &str) -> bool {
        self.loads.is_loading(&date.to_string())
    }
}

async fn run_pipeline(
    reference: Arc<ReferenceDataCache>,
    source: Arc<dyn DailyRecordSource>,
    settlement: SettlementService,
    date: String,
) -> StoreResult<SettlementView> {
    info!("Loading settlement view for {}", date);

    let identities = match reference.get().await {
        Ok(identities) => identities,
        Err(e) => {
            warn!("Identity list unavailable for {}, continuing without it: {}", date, e);
            Arc::new(Vec::new())
        }
    };

    let records = fetch_or_init(source.as_ref(), &date).await?;
    let derived = derive_by_identity(&records);
    let identity_margins = sum_margins_by_identity(&records);
    let margin_total = grand_total(&identity_margins);
    let day_chain_margin_total = sum_day_margins(&records);

    let start_key = SummaryKey::new(date.clone(), SettlementMode::Start);
    let finish_key = SummaryKey::new(date.clone(), SettlementMode::Finish);
    let (start_summary, finish_summary) =
        tokio::join!(settlement.load_summary(&start_key), settlement.load_summary(&finish_key));

    info!(
        "Loaded {} records across {} identities for {}",
        derived.len(),
        identity_margins.len(),
        date
    );

    Ok(SettlementView {
        date,
        identities,
        records: derived,
        identity_margins,
        margin_total,
        day_chain_margin_total,
        start_summary,
        finish_summary,
    })
}

/// Fetch a date's records, creating the day in the store when it has none
async fn fetch_or_init(source: &dyn DailyRecordSource, date: &str) -> StoreResult<Vec<DailyRecord>> {
    let records = source.list_records(date).await?;
    if !records.is_empty() {
        return Ok(records);
    }

    info!("No records for {}, initializing the day", date);
    source.init_records(date).await?;
    source.list_records(date).await
}

fn derive_by_identity(records: &[DailyRecord]) -> Vec<DerivedRecord> {
    group_by_identity(records)
        .into_values()
        .flat_map(|group| RecordChain::from_records(&group).derive())
        .collect()
}

/// The date the user is looking at
pub struct SettlementSession {
    ledger: DailyLedgerService,
    selected: Mutex<Option<String>>,
}

impl SettlementSession {
    pub fn new(ledger: DailyLedgerService) -> Self {
        Self {
            ledger,
            selected: Mutex::new(None),
        }
    }

    /// Change the selected date, returning it normalized
    pub fn select(&self, date: &str) -> SettlementResult<String> {
        let date = normalize_record_date(date)?;
        *self.selected.lock().unwrap_or_else(PoisonError::into_inner) = Some(date.clone());
        Ok(date)
    }

    pub fn selected(&self) -> Option<String> {
        self.selected.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn is_current(&self, date: &str) -> bool {
        self.selected().as_deref() == Some(date)
    }

    /// Load the selected date. `Ok(None)` when nothing is selected, or when
    /// the selection changed while the load was running.
    pub async fn load_selected(&self) -> SettlementResult<Option<SettlementView>> {
        let Some(date) = self.selected() else {
            return Ok(None);
        };

        let view = self.ledger.load_day(&date).await?;
        if self.is_current(&date) {
            Ok(Some(view))
        } else {
            debug!("Selection moved away from {}, dropping its view", date);
            Ok(None)
        }
    }
}
