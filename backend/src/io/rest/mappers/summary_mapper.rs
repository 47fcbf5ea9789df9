//! Mappers between settlement summary domain types and shared DTOs.

use crate::domain::commands::summary::{
    AddManualWithdrawalCommand, NotifyResult, UpdateManualWithdrawalCommand, UpdateSummaryCommand,
};
use crate::domain::models::SettlementSummary;
use shared::{
    AddManualWithdrawalRequest, NotifyResponse, SettlementSummaryView, UpdateManualWithdrawalRequest,
    UpdateSummaryRequest,
};

pub struct SummaryMapper;

impl SummaryMapper {
    pub fn to_dto(summary: &SettlementSummary) -> SettlementSummaryView {
        SettlementSummaryView {
            date: summary.key.date.clone(),
            mode: summary.key.mode,
            cash_on_hand: summary.cash_on_hand,
            yesterday_balance: summary.yesterday_balance,
            coin_wallet: summary.coin_wallet,
            start_amount_total: summary.start_amount_total,
            manual_withdrawals: summary.manual_withdrawals.clone(),
            manual_withdrawal_total: summary.manual_withdrawal_total(),
        }
    }

    pub fn to_update_command(request: UpdateSummaryRequest) -> UpdateSummaryCommand {
        UpdateSummaryCommand {
            cash_on_hand: request.cash_on_hand,
            yesterday_balance: request.yesterday_balance,
            coin_wallet: request.coin_wallet,
            start_amount_total: request.start_amount_total,
        }
    }

    pub fn to_add_withdrawal_command(request: AddManualWithdrawalRequest) -> AddManualWithdrawalCommand {
        AddManualWithdrawalCommand {
            identity: request.identity,
            site: request.site,
            amount: request.amount,
            record_date: request.record_date,
        }
    }

    pub fn to_update_withdrawal_command(
        withdrawal_id: String,
        request: UpdateManualWithdrawalRequest,
    ) -> UpdateManualWithdrawalCommand {
        UpdateManualWithdrawalCommand {
            withdrawal_id,
            identity: request.identity,
            site: request.site,
            amount: request.amount,
        }
    }

    pub fn to_notify_response(result: NotifyResult) -> NotifyResponse {
        NotifyResponse {
            success: result.success,
            message: result.message,
        }
    }
}
