//! Mappers from derived settlement results to the shared view DTOs.

use std::collections::HashMap;

use crate::domain::commands::ledger::SettlementView;
use crate::domain::record_chain::DerivedRecord;
use crate::io::rest::mappers::summary_mapper::SummaryMapper;
use shared::{DerivedRecordRow, IdentityMargin, SettlementViewResponse};

pub struct RecordMapper;

impl RecordMapper {
    pub fn to_row(derived: &DerivedRecord) -> DerivedRecordRow {
        let record = &derived.record;
        DerivedRecordRow {
            record_id: record.id.clone(),
            identity_id: record.identity_id.clone(),
            record_date: record.record_date.clone(),
            display_order: record.display_order,
            carried_amount: derived.carried_amount,
            private_amount: derived.private_amount,
            total_charge: derived.total_charge,
            margin: derived.margin,
            rate_amount: record.rate_amount,
            charge_encoding: record.charge_encoding,
            withdraw_encoding: record.withdraw_encoding,
        }
    }

    /// Identity names are resolved from the view's identity list; groups
    /// whose identity is unknown keep `identity_name: None`
    pub fn to_view_response(view: SettlementView) -> SettlementViewResponse {
        let names: HashMap<&str, &str> = view
            .identities
            .iter()
            .map(|identity| (identity.id.as_str(), identity.name.as_str()))
            .collect();

        let identity_margins = view
            .identity_margins
            .iter()
            .map(|total| IdentityMargin {
                identity_id: total.identity_id.clone(),
                identity_name: total
                    .identity_id
                    .as_deref()
                    .and_then(|id| names.get(id))
                    .map(|name| name.to_string()),
                margin_total: total.margin_total,
            })
            .collect();

        SettlementViewResponse {
            date: view.date.clone(),
            identities: view.identities.as_ref().clone(),
            records: view.records.iter().map(Self::to_row).collect(),
            identity_margins,
            margin_total: view.margin_total,
            day_chain_margin_total: view.day_chain_margin_total,
            start_summary: SummaryMapper::to_dto(&view.start_summary),
            finish_summary: SummaryMapper::to_dto(&view.finish_summary),
        }
    }
}
