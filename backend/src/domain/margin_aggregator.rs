//! Reduction of a record chain into a single margin total.
//!
//! The settlement view chains records per identity. `sum_day_margins` keeps
//! the day-wide figure, where every record of the date forms one chain.

use shared::DailyRecord;
use std::collections::BTreeMap;

use crate::domain::models::{normalize_chain, NormalizedRecord};
use crate::domain::record_chain::{carried_amount, margin, private_amount, RecordChain};
use crate::domain::text_field_parser::accumulate;

/// Sum `margin + rate_amount` over records already in chain order.
///
/// The head record's carried amount is its raw `drbet_amount`, without the
/// notes adjustments `carried_amount` applies to a head record. Every other
/// record uses the regular two-record recurrence. Empty input sums to 0.
pub fn sum_margins(records: &[NormalizedRecord]) -> i64 {
    let mut total = 0i64;

    for (index, record) in records.iter().enumerate() {
        let carried = if index == 0 {
            record.drbet_amount
        } else {
            carried_amount(record, Some(&records[index - 1]))
        };
        let total_charge = accumulate(carried, private_amount(record));
        let day = accumulate(margin(record, total_charge), record.rate_amount);
        total = accumulate(total, day);
    }

    total
}

/// Sum every record of a day as a single chain, across identities
pub fn sum_day_margins(records: &[DailyRecord]) -> i64 {
    sum_margins(RecordChain::from_records(records).records())
}

/// Margin total of one identity's chain
#[derive(Debug, Clone, PartialEq)]
pub struct IdentityMarginTotal {
    pub identity_id: Option<String>,
    pub margin_total: i64,
}

/// Split raw records into identity groups, ordered by identity id with
/// unassigned records first
pub(crate) fn group_by_identity(records: &[DailyRecord]) -> BTreeMap<Option<String>, Vec<DailyRecord>> {
    let mut groups: BTreeMap<Option<String>, Vec<DailyRecord>> = BTreeMap::new();
    for record in records {
        groups
            .entry(record.identity_id.clone())
            .or_default()
            .push(record.clone());
    }
    groups
}

/// Group raw records by identity, order each group into a chain and sum it.
/// Groups come back in `group_by_identity` order.
pub fn sum_margins_by_identity(records: &[DailyRecord]) -> Vec<IdentityMarginTotal> {
    group_by_identity(records)
        .into_iter()
        .map(|(identity_id, group)| IdentityMarginTotal {
            identity_id,
            margin_total: sum_margins(&normalize_chain(&group)),
        })
        .collect()
}

/// Grand total across identity groups
pub fn grand_total(totals: &[IdentityMarginTotal]) -> i64 {
    totals.iter().map(|t| t.margin_total).fold(0, accumulate)
}
