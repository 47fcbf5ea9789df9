//! Settlement summary service.
//!
//! Owns the client-side copy of each `(date, mode)` summary and every edit
//! made to it. Edits are applied to the local copy first, then persisted
//! through the summary's save queue as a read-merge-write: the task re-reads
//! the stored row right before writing and changes only the fields its own
//! edit touched.
//!
//! ## Business Rules
//!
//! - Manual withdrawals get a fresh UUID v4 id and a bare record date
//! - Withdrawal amounts may not be negative
//! - A failed withdrawal removal reloads the stored summary once the queue
//!   behind it has drained
//! - A summary that cannot be read is shown as an empty default

use log::{debug, error, info, warn};
use shared::ManualWithdrawal;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::domain::commands::summary::{
    AddManualWithdrawalCommand, ManualWithdrawalEdit, NotifyResult, SummaryEdit, UpdateManualWithdrawalCommand,
    UpdateSummaryCommand,
};
use crate::domain::errors::{normalize_record_date, SettlementError, SettlementResult};
use crate::domain::models::{SettlementSummary, SummaryKey};
use crate::domain::save_queue::{QueueStatus, WriteCoalescer, WriteTicket};
use crate::storage::{NotificationSink, SettlementSummaryStore, StoreResult};

#[derive(Default)]
struct LocalSummaries {
    summaries: HashMap<SummaryKey, SettlementSummary>,
    /// Bumped on every local edit of a key
    edits: HashMap<SummaryKey, u64>,
}

impl LocalSummaries {
    fn edit_generation(&self, key: &SummaryKey) -> u64 {
        self.edits.get(key).copied().unwrap_or(0)
    }
}

#[derive(Clone)]
pub struct SettlementService {
    store: Arc<dyn SettlementSummaryStore>,
    notifier: Arc<dyn NotificationSink>,
    local: Arc<Mutex<LocalSummaries>>,
    coalescer: Arc<WriteCoalescer<SummaryKey>>,
}

impl SettlementService {
    pub fn new(store: Arc<dyn SettlementSummaryStore>, notifier: Arc<dyn NotificationSink>) -> Self {
        Self {
            store,
            notifier,
            local: Arc::new(Mutex::new(LocalSummaries::default())),
            coalescer: Arc::new(WriteCoalescer::new()),
        }
    }

    fn local(&self) -> MutexGuard<'_, LocalSummaries> {
        self.local.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn fetch(store: &Arc<dyn SettlementSummaryStore>, key: &SummaryKey) -> StoreResult<SettlementSummary> {
        Ok(match store.get_summary(&key.date, key.mode).await? {
            Some(record) => SettlementSummary::from_record(key.clone(), &record),
            None => SettlementSummary::empty(key.clone()),
        })
    }

    /// Read a summary from the store into the local copy.
    ///
    /// The local copy is returned unchanged when it was edited while the read
    /// was in flight, or while writes for the key are still queued. A failed
    /// read yields the local copy if there is one, otherwise an empty summary.
    pub async fn load_summary(&self, key: &SummaryKey) -> SettlementSummary {
        let generation = self.local().edit_generation(key);

        match Self::fetch(&self.store, key).await {
            Ok(fetched) => {
                let mut local = self.local();
                let edited = local.edit_generation(key) != generation;
                if edited || self.coalescer.status(key) == QueueStatus::Draining {
                    if let Some(pending) = local.summaries.get(key) {
                        debug!("Keeping local summary {} over the stored row", key);
                        return pending.clone();
                    }
                }
                local.summaries.insert(key.clone(), fetched.clone());
                fetched
            }
            Err(e) => {
                warn!("Failed to load summary {}, falling back to defaults: {}", key, e);
                self.cached(key).unwrap_or_else(|| SettlementSummary::empty(key.clone()))
            }
        }
    }

    /// Replace the local copy with whatever the store holds now, unless it
    /// was edited while the read was in flight
    async fn reload_summary(&self, key: &SummaryKey) {
        let generation = self.local().edit_generation(key);

        match Self::fetch(&self.store, key).await {
            Ok(fetched) => {
                let mut local = self.local();
                if local.edit_generation(key) != generation {
                    debug!("Summary {} was edited during reload, keeping the local copy", key);
                    return;
                }
                info!("Reloaded summary {} from the store", key);
                local.summaries.insert(key.clone(), fetched);
            }
            Err(e) => error!("Failed to reload summary {}: {}", key, e),
        }
    }

    /// The local copy, if the summary was loaded or edited before
    pub fn cached(&self, key: &SummaryKey) -> Option<SettlementSummary> {
        self.local().summaries.get(key).cloned()
    }

    async fn ensure_loaded(&self, key: &SummaryKey) -> SettlementSummary {
        match self.cached(key) {
            Some(summary) => summary,
            None => self.load_summary(key).await,
        }
    }

    /// Apply `merge` to the local copy now, and queue a write that applies
    /// the same `merge` to a fresh read of the stored row.
    fn edit_and_enqueue<F>(&self, key: &SummaryKey, label: &str, merge: F) -> (SettlementSummary, WriteTicket)
    where
        F: Fn(&mut SettlementSummary) + Send + 'static,
    {
        let optimistic = {
            let mut local = self.local();
            *local.edits.entry(key.clone()).or_insert(0) += 1;
            let summary = local
                .summaries
                .entry(key.clone())
                .or_insert_with(|| SettlementSummary::empty(key.clone()));
            merge(summary);
            summary.clone()
        };

        let store = self.store.clone();
        let target = key.clone();
        let ticket = self.coalescer.enqueue(key, label, async move {
            let mut current = Self::fetch(&store, &target).await?;
            merge(&mut current);
            store.put_summary(&current.to_record()).await
        });

        (optimistic, ticket)
    }

    /// Update scalar fields of a summary
    pub async fn update_fields(&self, key: &SummaryKey, command: UpdateSummaryCommand) -> SummaryEdit {
        info!("Updating summary {}: {:?}", key, command);
        self.ensure_loaded(key).await;

        let (summary, ticket) = self.edit_and_enqueue(key, "update fields", move |summary| command.apply(summary));
        SummaryEdit { summary, ticket }
    }

    pub async fn add_manual_withdrawal(
        &self,
        key: &SummaryKey,
        command: AddManualWithdrawalCommand,
    ) -> SettlementResult<ManualWithdrawalEdit> {
        info!("Adding manual withdrawal to {}: {:?}", key, command);

        if command.amount < 0 {
            return Err(SettlementError::InvalidAmount(format!(
                "withdrawal amount must not be negative, got {}",
                command.amount
            )));
        }
        let record_date = normalize_record_date(command.record_date.as_deref().unwrap_or(&key.date))?;

        let withdrawal = ManualWithdrawal {
            id: Uuid::new_v4().to_string(),
            identity: command.identity,
            site: command.site,
            amount: command.amount,
            record_date,
        };

        self.ensure_loaded(key).await;
        let added = withdrawal.clone();
        let (summary, ticket) = self.edit_and_enqueue(key, "add manual withdrawal", move |summary| {
            if !summary.manual_withdrawals.iter().any(|w| w.id == added.id) {
                summary.manual_withdrawals.push(added.clone());
            }
        });

        Ok(ManualWithdrawalEdit {
            withdrawal,
            summary,
            ticket,
        })
    }

    pub async fn update_manual_withdrawal(
        &self,
        key: &SummaryKey,
        command: UpdateManualWithdrawalCommand,
    ) -> SettlementResult<ManualWithdrawalEdit> {
        info!("Updating manual withdrawal in {}: {:?}", key, command);

        if let Some(amount) = command.amount {
            if amount < 0 {
                return Err(SettlementError::InvalidAmount(format!(
                    "withdrawal amount must not be negative, got {}",
                    amount
                )));
            }
        }

        let current = self.ensure_loaded(key).await;
        if !current.manual_withdrawals.iter().any(|w| w.id == command.withdrawal_id) {
            return Err(SettlementError::UnknownWithdrawal(command.withdrawal_id));
        }

        let withdrawal_id = command.withdrawal_id.clone();
        let (summary, ticket) = self.edit_and_enqueue(key, "update manual withdrawal", move |summary| {
            if let Some(withdrawal) = summary
                .manual_withdrawals
                .iter_mut()
                .find(|w| w.id == command.withdrawal_id)
            {
                command.apply(withdrawal);
            }
        });

        let withdrawal = summary
            .manual_withdrawals
            .iter()
            .find(|w| w.id == withdrawal_id)
            .cloned()
            .ok_or_else(|| SettlementError::UnknownWithdrawal(withdrawal_id.clone()))?;

        Ok(ManualWithdrawalEdit {
            withdrawal,
            summary,
            ticket,
        })
    }

    /// Remove a withdrawal. If the write fails, the local copy is replaced by
    /// the stored summary once every write queued behind it has run, and
    /// before the ticket resolves.
    pub async fn remove_manual_withdrawal(&self, key: &SummaryKey, withdrawal_id: &str) -> SettlementResult<SummaryEdit> {
        info!("Removing manual withdrawal {} from {}", withdrawal_id, key);

        let current = self.ensure_loaded(key).await;
        if !current.manual_withdrawals.iter().any(|w| w.id == withdrawal_id) {
            return Err(SettlementError::UnknownWithdrawal(withdrawal_id.to_string()));
        }

        let removed = withdrawal_id.to_string();
        let (summary, write) = self.edit_and_enqueue(key, "remove manual withdrawal", move |summary| {
            summary.manual_withdrawals.retain(|w| w.id != removed);
        });

        let (done, receiver) = oneshot::channel();
        let service = self.clone();
        let target = key.clone();
        tokio::spawn(async move {
            let outcome = write.outcome().await;
            if outcome.is_err() {
                warn!("Removal from {} was not saved, restoring the stored summary", target);
                service.coalescer.wait_idle(&target).await;
                service.reload_summary(&target).await;
            }
            let _ = done.send(outcome);
        });

        Ok(SummaryEdit {
            summary,
            ticket: WriteTicket::from_receiver(receiver),
        })
    }

    /// Send the current summary to the notification sink, once
    pub async fn notify(&self, key: &SummaryKey) -> NotifyResult {
        let summary = self.ensure_loaded(key).await;

        match self.notifier.send_summary(&summary.to_record()).await {
            Ok(()) => {
                info!("Sent settlement summary {}", key);
                NotifyResult {
                    success: true,
                    message: format!("Settlement summary for {} sent", key),
                }
            }
            Err(e) => {
                error!("Failed to send settlement summary {}: {}", key, e);
                NotifyResult {
                    success: false,
                    message: format!("Failed to send settlement summary for {}: {}", key, e),
                }
            }
        }
    }

    pub async fn wait_idle(&self, key: &SummaryKey) {
        self.coalescer.wait_idle(key).await;
    }

    /// Wait until every summary's queued writes have run
    pub async fn wait_all_idle(&self) {
        self.coalescer.wait_all_idle().await;
    }
}
