//! Day-over-day recurrence for the settlement chain.
//!
//! Each record's opening balance is carried from the record before it in
//! `(record_date, display_order)` order:
//!
//! ```text
//! head:  carried = drbet_amount + notes.charge - notes.withdraw
//! i > 0: carried = prev.total_amount - prev.withdraws + prev.rate_amount
//!                  + notes.charge - notes.withdraw
//! margin = total_amount - (carried + private)   (0 while unfinalized)
//! ```
//!
//! Every addition goes through `accumulate`, so an unrepresentable term is
//! dropped instead of poisoning the rest of the chain.

use shared::DailyRecord;

use crate::domain::models::{normalize_chain, NormalizedRecord};
use crate::domain::text_field_parser::accumulate;

/// The record's own charge total from its four slots
pub fn private_amount(record: &NormalizedRecord) -> i64 {
    record.charge_total()
}

/// Opening balance carried into `record` from `previous`
pub fn carried_amount(record: &NormalizedRecord, previous: Option<&NormalizedRecord>) -> i64 {
    let base = match previous {
        None => record.drbet_amount,
        Some(prev) => {
            let after_withdraws = accumulate(prev.total_amount, prev.withdraw_total().checked_neg().unwrap_or(0));
            accumulate(after_withdraws, prev.rate_amount)
        }
    };
    with_notes(base, record)
}

/// Apply the record's own notes adjustments to a carried base
pub(crate) fn with_notes(base: i64, record: &NormalizedRecord) -> i64 {
    let charged = accumulate(base, record.notes.charge);
    accumulate(charged, record.notes.withdraw.checked_neg().unwrap_or(0))
}

/// Margin for a record given its total charge.
/// Unfinalized days (no reported total) always have margin 0.
pub fn margin(record: &NormalizedRecord, total_charge: i64) -> i64 {
    if !record.is_finalized() {
        return 0;
    }
    record.total_amount.checked_sub(total_charge).unwrap_or(0)
}

/// Derived figures for one record
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedRecord {
    pub record: NormalizedRecord,
    pub carried_amount: i64,
    pub private_amount: i64,
    pub total_charge: i64,
    pub margin: i64,
}

/// A sorted sequence of normalized records for one identity group
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordChain {
    records: Vec<NormalizedRecord>,
}

impl RecordChain {
    /// Decode and order raw records
    pub fn from_records(records: &[DailyRecord]) -> Self {
        Self {
            records: normalize_chain(records),
        }
    }

    /// Build from already-normalized records, restoring chain order
    pub fn from_normalized(mut records: Vec<NormalizedRecord>) -> Self {
        records.sort_by(|a, b| a.chain_order(b));
        Self { records }
    }

    pub fn records(&self) -> &[NormalizedRecord] {
        &self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Derive every record, each against its predecessor
    pub fn derive(&self) -> Vec<DerivedRecord> {
        let mut previous: Option<&NormalizedRecord> = None;
        let mut derived = Vec::with_capacity(self.records.len());

        for record in &self.records {
            let carried = carried_amount(record, previous);
            let private = private_amount(record);
            let total_charge = accumulate(carried, private);
            derived.push(DerivedRecord {
                record: record.clone(),
                carried_amount: carried,
                private_amount: private,
                total_charge,
                margin: margin(record, total_charge),
            });
            previous = Some(record);
        }

        derived
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dto(id: &str, date: &str, order: i32) -> DailyRecord {
        DailyRecord {
            id: id.to_string(),
            record_date: date.to_string(),
            display_order: order,
            ..DailyRecord::default()
        }
    }

    fn normalized(record: DailyRecord) -> NormalizedRecord {
        NormalizedRecord::from_dto(&record)
    }

    #[test]
    fn test_head_carried_amount_is_drbet_amount() {
        let head = normalized(DailyRecord {
            drbet_amount: Some(100_000),
            ..dto("r1", "2024-05-01", 0)
        });
        assert_eq!(carried_amount(&head, None), 100_000);
    }

    #[test]
    fn test_head_carried_amount_applies_notes() {
        let head = normalized(DailyRecord {
            drbet_amount: Some(100_000),
            notes: Some("3충 1환".to_string()),
            ..dto("r1", "2024-05-01", 0)
        });
        assert_eq!(carried_amount(&head, None), 100_000 + 30_000 - 10_000);
    }

    #[test]
    fn test_carried_amount_from_previous_record() {
        let previous = normalized(DailyRecord {
            total_amount: Some(1_000_000),
            rate_amount: Some(5_000),
            charge_withdraw1: Some("10 20".to_string()),
            charge_withdraw2: Some("0 5".to_string()),
            ..dto("r1", "2024-05-01", 0)
        });
        let record = normalized(DailyRecord {
            drbet_amount: Some(999_999),
            notes: Some("2환".to_string()),
            ..dto("r2", "2024-05-02", 0)
        });

        // 1_000_000 - 250_000 + 5_000 - 20_000; drbet is ignored off the head
        assert_eq!(carried_amount(&record, Some(&previous)), 735_000);
    }

    #[test]
    fn test_previous_withdraws_fall_back_to_legacy() {
        let previous = normalized(DailyRecord {
            total_amount: Some(500_000),
            charge_withdraw1: Some("3 0".to_string()),
            site1: Some("9 4".to_string()),
            ..dto("r1", "2024-05-01", 0)
        });
        let record = normalized(dto("r2", "2024-05-02", 0));

        assert_eq!(carried_amount(&record, Some(&previous)), 500_000 - 40_000);
    }

    #[test]
    fn test_private_amount_legacy_fallback() {
        let record = normalized(DailyRecord {
            charge_withdraw1: Some("0".to_string()),
            site1: Some("5 3".to_string()),
            ..dto("r1", "2024-05-01", 0)
        });
        assert_eq!(private_amount(&record), 50_000);
    }

    #[test]
    fn test_private_amount_never_merges_encodings() {
        let record = normalized(DailyRecord {
            charge_withdraw1: Some("2".to_string()),
            site2: Some("5".to_string()),
            ..dto("r1", "2024-05-01", 0)
        });
        assert_eq!(private_amount(&record), 20_000);
    }

    #[test]
    fn test_unfinalized_day_has_zero_margin() {
        let record = normalized(DailyRecord {
            total_amount: Some(0),
            ..dto("r1", "2024-05-01", 0)
        });
        assert_eq!(margin(&record, 123_456), 0);
        assert_eq!(margin(&record, -5), 0);

        let absent = normalized(dto("r2", "2024-05-01", 1));
        assert_eq!(margin(&absent, 1), 0);
    }

    #[test]
    fn test_margin_of_finalized_day() {
        let record = normalized(DailyRecord {
            total_amount: Some(300_000),
            ..dto("r1", "2024-05-01", 0)
        });
        assert_eq!(margin(&record, 250_000), 50_000);
        assert_eq!(margin(&record, 350_000), -50_000);
    }

    #[test]
    fn test_malformed_text_never_breaks_the_chain() {
        let chain = RecordChain::from_records(&[
            DailyRecord {
                site1: Some("??".to_string()),
                charge_withdraw3: Some("--".to_string()),
                notes: Some("충환".to_string()),
                drbet_amount: Some(10_000),
                total_amount: Some(10_000),
                ..dto("r1", "2024-05-01", 0)
            },
            DailyRecord {
                site1: Some("not a number".to_string()),
                ..dto("r2", "2024-05-02", 0)
            },
        ]);
        let derived = chain.derive();

        assert_eq!(derived[0].margin, 0);
        assert_eq!(derived[1].carried_amount, 10_000);
        assert_eq!(derived[1].private_amount, 0);
    }

    #[test]
    fn test_derive_walks_records_in_chain_order() {
        let chain = RecordChain::from_records(&[
            DailyRecord {
                total_amount: Some(900_000),
                charge_withdraw1: Some("20 10".to_string()),
                ..dto("second", "2024-05-02", 0)
            },
            DailyRecord {
                drbet_amount: Some(500_000),
                total_amount: Some(800_000),
                charge_withdraw1: Some("10 5".to_string()),
                rate_amount: Some(1_000),
                ..dto("first", "2024-05-01", 0)
            },
        ]);
        let derived = chain.derive();

        assert_eq!(derived[0].record.id, "first");
        assert_eq!(derived[0].carried_amount, 500_000);
        assert_eq!(derived[0].total_charge, 600_000);
        assert_eq!(derived[0].margin, 200_000);

        assert_eq!(derived[1].record.id, "second");
        // 800_000 - 50_000 + 1_000
        assert_eq!(derived[1].carried_amount, 751_000);
        assert_eq!(derived[1].total_charge, 951_000);
        assert_eq!(derived[1].margin, -51_000);
    }

    #[test]
    fn test_empty_chain_derives_nothing() {
        let chain = RecordChain::from_records(&[]);
        assert!(chain.is_empty());
        assert!(chain.derive().is_empty());
    }
}
