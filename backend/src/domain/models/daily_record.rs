use shared::{ChargeWithdraw, DailyRecord, SlotEncoding};
use std::cmp::Ordering;

use crate::domain::text_field_parser::{accumulate, parse_notes_adjustments, parse_slots};

/// One decoded transaction slot
pub type TransactionSlot = ChargeWithdraw;

/// A daily record with its text fields decoded once, at ingestion.
///
/// Charges and withdraws each come from exactly one encoding: the explicit
/// slots when they carry a positive total in that direction, the legacy
/// slots otherwise. The two encodings are never mixed within a direction.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRecord {
    pub id: String,
    pub identity_id: Option<String>,
    pub record_date: String,
    pub display_order: i32,
    pub slots: [TransactionSlot; 4],
    pub charge_encoding: SlotEncoding,
    pub withdraw_encoding: SlotEncoding,
    pub notes: ChargeWithdraw,
    pub drbet_amount: i64,
    /// Zero when the day is not finalized
    pub total_amount: i64,
    pub rate_amount: i64,
}

fn charge_total(slots: &[TransactionSlot; 4]) -> i64 {
    slots.iter().map(|s| s.charge).fold(0, accumulate)
}

fn withdraw_total(slots: &[TransactionSlot; 4]) -> i64 {
    slots.iter().map(|s| s.withdraw).fold(0, accumulate)
}

impl NormalizedRecord {
    pub fn from_dto(record: &DailyRecord) -> Self {
        let explicit = parse_slots(record.explicit_slots());
        let legacy = parse_slots(record.legacy_slots());

        let (charges, charge_encoding) = if charge_total(&explicit) > 0 {
            (explicit, SlotEncoding::Explicit)
        } else {
            (legacy, SlotEncoding::Legacy)
        };
        let (withdraws, withdraw_encoding) = if withdraw_total(&explicit) > 0 {
            (explicit, SlotEncoding::Explicit)
        } else {
            (legacy, SlotEncoding::Legacy)
        };

        let slots = std::array::from_fn(|i| TransactionSlot {
            charge: charges[i].charge,
            withdraw: withdraws[i].withdraw,
        });

        Self {
            id: record.id.clone(),
            identity_id: record.identity_id.clone(),
            record_date: record.record_date.clone(),
            display_order: record.display_order,
            slots,
            charge_encoding,
            withdraw_encoding,
            notes: parse_notes_adjustments(record.notes.as_deref()),
            drbet_amount: record.drbet_amount.unwrap_or(0),
            total_amount: record.total_amount.unwrap_or(0),
            rate_amount: record.rate_amount.unwrap_or(0),
        }
    }

    /// Sum of the four slot charges
    pub fn charge_total(&self) -> i64 {
        charge_total(&self.slots)
    }

    /// Sum of the four slot withdraws
    pub fn withdraw_total(&self) -> i64 {
        withdraw_total(&self.slots)
    }

    /// A day with no reported total has not been finalized yet
    pub fn is_finalized(&self) -> bool {
        self.total_amount != 0
    }

    /// Chain order: `record_date` then `display_order`, ascending
    pub fn chain_order(&self, other: &Self) -> Ordering {
        self.record_date
            .cmp(&other.record_date)
            .then(self.display_order.cmp(&other.display_order))
    }
}

/// Decode and sort raw records into chain order
pub fn normalize_chain(records: &[DailyRecord]) -> Vec<NormalizedRecord> {
    let mut chain: Vec<NormalizedRecord> = records.iter().map(NormalizedRecord::from_dto).collect();
    chain.sort_by(|a, b| a.chain_order(b));
    chain
}
