use log::warn;
use shared::{ManualWithdrawal, SettlementMode, SettlementSummaryRecord};

use crate::domain::text_field_parser::accumulate;

/// Identifies one settlement summary row, and therefore one write target
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SummaryKey {
    pub date: String,
    pub mode: SettlementMode,
}

impl SummaryKey {
    pub fn new(date: impl Into<String>, mode: SettlementMode) -> Self {
        Self {
            date: date.into(),
            mode,
        }
    }
}

impl std::fmt::Display for SummaryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.date, self.mode)
    }
}

/// Settlement summary with the manual withdrawal list decoded
#[derive(Debug, Clone, PartialEq)]
pub struct SettlementSummary {
    pub key: SummaryKey,
    pub cash_on_hand: i64,
    pub yesterday_balance: i64,
    pub coin_wallet: i64,
    pub start_amount_total: i64,
    pub manual_withdrawals: Vec<ManualWithdrawal>,
}

impl SettlementSummary {
    /// The row a key has before the store holds anything for it
    pub fn empty(key: SummaryKey) -> Self {
        Self {
            key,
            cash_on_hand: 0,
            yesterday_balance: 0,
            coin_wallet: 0,
            start_amount_total: 0,
            manual_withdrawals: Vec::new(),
        }
    }

    /// Decode a stored row. A malformed withdrawal list is logged and read
    /// as empty rather than failing the whole summary.
    pub fn from_record(key: SummaryKey, record: &SettlementSummaryRecord) -> Self {
        let manual_withdrawals = decode_withdrawals(&record.manual_withdrawals).unwrap_or_else(|e| {
            warn!("Ignoring unreadable manual withdrawals for {}: {}", key, e);
            Vec::new()
        });

        Self {
            key,
            cash_on_hand: record.cash_on_hand,
            yesterday_balance: record.yesterday_balance,
            coin_wallet: record.coin_wallet,
            start_amount_total: record.start_amount_total,
            manual_withdrawals,
        }
    }

    pub fn to_record(&self) -> SettlementSummaryRecord {
        SettlementSummaryRecord {
            date: self.key.date.clone(),
            mode: Some(self.key.mode),
            cash_on_hand: self.cash_on_hand,
            yesterday_balance: self.yesterday_balance,
            coin_wallet: self.coin_wallet,
            manual_withdrawals: encode_withdrawals(&self.manual_withdrawals),
            start_amount_total: self.start_amount_total,
        }
    }

    pub fn manual_withdrawal_total(&self) -> i64 {
        self.manual_withdrawals.iter().map(|w| w.amount).fold(0, accumulate)
    }
}

fn decode_withdrawals(serialized: &str) -> serde_json::Result<Vec<ManualWithdrawal>> {
    if serialized.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(serialized)
}

fn encode_withdrawals(withdrawals: &[ManualWithdrawal]) -> String {
    // a Vec of plain structs always serializes
    serde_json::to_string(withdrawals).unwrap_or_else(|_| "[]".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn withdrawal(id: &str, amount: i64) -> ManualWithdrawal {
        ManualWithdrawal {
            id: id.to_string(),
            identity: "alpha".to_string(),
            site: "site-1".to_string(),
            amount,
            record_date: "2024-05-01".to_string(),
        }
    }

    #[test]
    fn test_record_conversion_keeps_every_field() {
        let mut summary = SettlementSummary::empty(SummaryKey::new("2024-05-01", SettlementMode::Finish));
        summary.cash_on_hand = 1;
        summary.yesterday_balance = 2;
        summary.coin_wallet = 3;
        summary.start_amount_total = 4;
        summary.manual_withdrawals = vec![withdrawal("w1", 50_000)];

        let record = summary.to_record();
        assert_eq!(record.mode, Some(SettlementMode::Finish));

        let decoded = SettlementSummary::from_record(summary.key.clone(), &record);
        assert_eq!(decoded, summary);
    }

    #[test]
    fn test_malformed_withdrawal_list_reads_as_empty() {
        let record = SettlementSummaryRecord {
            date: "2024-05-01".to_string(),
            cash_on_hand: 7,
            manual_withdrawals: "{not json".to_string(),
            ..SettlementSummaryRecord::default()
        };
        let summary = SettlementSummary::from_record(SummaryKey::new("2024-05-01", SettlementMode::Start), &record);

        assert!(summary.manual_withdrawals.is_empty());
        assert_eq!(summary.cash_on_hand, 7);
    }

    #[test]
    fn test_manual_withdrawal_total() {
        let mut summary = SettlementSummary::empty(SummaryKey::new("2024-05-01", SettlementMode::Start));
        summary.manual_withdrawals = vec![withdrawal("a", 10_000), withdrawal("b", 25_000)];
        assert_eq!(summary.manual_withdrawal_total(), 35_000);
    }
}
