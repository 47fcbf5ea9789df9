//! Domain-level command and result types.
//! Services take these instead of the public DTOs in `shared`; the REST layer
//! maps between the two.

pub mod summary {
    use crate::domain::models::SettlementSummary;
    use crate::domain::save_queue::WriteTicket;
    use shared::ManualWithdrawal;

    /// Partial update of a summary's scalar fields. `None` keeps the value
    /// already stored.
    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct UpdateSummaryCommand {
        pub cash_on_hand: Option<i64>,
        pub yesterday_balance: Option<i64>,
        pub coin_wallet: Option<i64>,
        pub start_amount_total: Option<i64>,
    }

    impl UpdateSummaryCommand {
        pub fn is_empty(&self) -> bool {
            self.cash_on_hand.is_none()
                && self.yesterday_balance.is_none()
                && self.coin_wallet.is_none()
                && self.start_amount_total.is_none()
        }

        /// Apply only the fields this command carries
        pub fn apply(&self, summary: &mut SettlementSummary) {
            if let Some(value) = self.cash_on_hand {
                summary.cash_on_hand = value;
            }
            if let Some(value) = self.yesterday_balance {
                summary.yesterday_balance = value;
            }
            if let Some(value) = self.coin_wallet {
                summary.coin_wallet = value;
            }
            if let Some(value) = self.start_amount_total {
                summary.start_amount_total = value;
            }
        }
    }

    #[derive(Debug, Clone)]
    pub struct AddManualWithdrawalCommand {
        pub identity: String,
        pub site: String,
        pub amount: i64,
        /// Defaults to the summary's date; any time component is dropped
        pub record_date: Option<String>,
    }

    #[derive(Debug, Clone, Default)]
    pub struct UpdateManualWithdrawalCommand {
        pub withdrawal_id: String,
        pub identity: Option<String>,
        pub site: Option<String>,
        pub amount: Option<i64>,
    }

    impl UpdateManualWithdrawalCommand {
        pub fn apply(&self, withdrawal: &mut ManualWithdrawal) {
            if let Some(identity) = &self.identity {
                withdrawal.identity = identity.clone();
            }
            if let Some(site) = &self.site {
                withdrawal.site = site.clone();
            }
            if let Some(amount) = self.amount {
                withdrawal.amount = amount;
            }
        }
    }

    /// Optimistic state after a local edit, plus the ticket for its write
    pub struct SummaryEdit {
        pub summary: SettlementSummary,
        pub ticket: WriteTicket,
    }

    pub struct ManualWithdrawalEdit {
        pub withdrawal: ManualWithdrawal,
        pub summary: SettlementSummary,
        pub ticket: WriteTicket,
    }

    /// Outcome of handing a summary to the notification sink
    #[derive(Debug, Clone, PartialEq)]
    pub struct NotifyResult {
        pub success: bool,
        pub message: String,
    }
}

pub mod ledger {
    use crate::domain::margin_aggregator::IdentityMarginTotal;
    use crate::domain::models::SettlementSummary;
    use crate::domain::record_chain::DerivedRecord;
    use shared::Identity;
    use std::sync::Arc;

    /// Everything derived for one settlement date
    #[derive(Debug, Clone, PartialEq)]
    pub struct SettlementView {
        pub date: String,
        pub identities: Arc<Vec<Identity>>,
        /// Derived rows, grouped by identity and in chain order within a group
        pub records: Vec<DerivedRecord>,
        pub identity_margins: Vec<IdentityMarginTotal>,
        /// Sum of the per-identity chain totals
        pub margin_total: i64,
        /// The whole day summed as one chain across identities
        pub day_chain_margin_total: i64,
        pub start_summary: SettlementSummary,
        pub finish_summary: SettlementSummary,
    }
}
