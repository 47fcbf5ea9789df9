use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An operating sub-account under which sites and daily records are grouped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Durable identifier assigned by the reference data source
    pub id: String,
    pub name: String,
}

/// Raw per-day record as returned by the daily record source.
///
/// Money fields are integers in the minor currency unit. The four slot pairs
/// exist in two historical encodings: `site1..4` (legacy) and
/// `charge_withdraw1..4` (explicit). Both carry text shaped like "10 20".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DailyRecord {
    pub id: String,
    /// Identity group this record belongs to
    pub identity_id: Option<String>,
    /// Calendar date (YYYY-MM-DD)
    pub record_date: String,
    /// Tie-break for records sharing a date
    pub display_order: i32,
    pub site1: Option<String>,
    pub site2: Option<String>,
    pub site3: Option<String>,
    pub site4: Option<String>,
    pub charge_withdraw1: Option<String>,
    pub charge_withdraw2: Option<String>,
    pub charge_withdraw3: Option<String>,
    pub charge_withdraw4: Option<String>,
    /// Baseline carry-in, only used when the record has no predecessor
    pub drbet_amount: Option<i64>,
    /// Reported gross total; zero or absent means the day is not finalized
    pub total_amount: Option<i64>,
    /// Flat adjustment added to the day's margin
    pub rate_amount: Option<i64>,
    /// Free text that may embed "NN충" / "NN환" adjustments
    pub notes: Option<String>,
}

impl DailyRecord {
    pub fn legacy_slots(&self) -> [Option<&str>; 4] {
        [
            self.site1.as_deref(),
            self.site2.as_deref(),
            self.site3.as_deref(),
            self.site4.as_deref(),
        ]
    }

    pub fn explicit_slots(&self) -> [Option<&str>; 4] {
        [
            self.charge_withdraw1.as_deref(),
            self.charge_withdraw2.as_deref(),
            self.charge_withdraw3.as_deref(),
            self.charge_withdraw4.as_deref(),
        ]
    }
}

/// A decoded charge/withdraw pair in minor units
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargeWithdraw {
    pub charge: i64,
    pub withdraw: i64,
}

/// Which slot encoding supplied a record's amounts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotEncoding {
    /// `charge_withdraw1..4`
    Explicit,
    /// `site1..4`
    Legacy,
}

/// Settlement summaries exist once per date for each mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettlementMode {
    Start,
    Finish,
}

impl SettlementMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SettlementMode::Start => "start",
            SettlementMode::Finish => "finish",
        }
    }
}

impl fmt::Display for SettlementMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SettlementMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "start" => Ok(SettlementMode::Start),
            "finish" => Ok(SettlementMode::Finish),
            other => Err(format!("Unknown settlement mode: {}", other)),
        }
    }
}

/// A user-entered correction row, scoped to one settlement date
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualWithdrawal {
    pub id: String,
    pub identity: String,
    pub site: String,
    pub amount: i64,
    /// Bare date (YYYY-MM-DD), never carries a time component
    pub record_date: String,
}

/// Settlement summary row exactly as the summary store reads and writes it.
/// Writes are whole-row upserts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettlementSummaryRecord {
    pub date: String,
    pub mode: Option<SettlementMode>,
    pub cash_on_hand: i64,
    pub yesterday_balance: i64,
    pub coin_wallet: i64,
    /// Serialized JSON list of `ManualWithdrawal`
    pub manual_withdrawals: String,
    pub start_amount_total: i64,
}

/// Request body for initializing a missing day in the record source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitRecordsRequest {
    pub date: String,
}

/// Settlement summary with its manual withdrawals decoded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementSummaryView {
    pub date: String,
    pub mode: SettlementMode,
    pub cash_on_hand: i64,
    pub yesterday_balance: i64,
    pub coin_wallet: i64,
    pub start_amount_total: i64,
    pub manual_withdrawals: Vec<ManualWithdrawal>,
    /// Sum of all manual withdrawal amounts
    pub manual_withdrawal_total: i64,
}

/// Derived figures for one record in its chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedRecordRow {
    pub record_id: String,
    pub identity_id: Option<String>,
    pub record_date: String,
    pub display_order: i32,
    /// Opening balance carried from the previous record
    pub carried_amount: i64,
    /// The record's own charge total from its four slots
    pub private_amount: i64,
    pub total_charge: i64,
    pub margin: i64,
    pub rate_amount: i64,
    pub charge_encoding: SlotEncoding,
    pub withdraw_encoding: SlotEncoding,
}

/// Margin total for one identity's record chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityMargin {
    pub identity_id: Option<String>,
    pub identity_name: Option<String>,
    pub margin_total: i64,
}

/// Everything the settlement screen needs for one date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementViewResponse {
    pub date: String,
    pub identities: Vec<Identity>,
    pub records: Vec<DerivedRecordRow>,
    pub identity_margins: Vec<IdentityMargin>,
    pub margin_total: i64,
    /// Margin of every record of the date chained together, ignoring identities
    pub day_chain_margin_total: i64,
    pub start_summary: SettlementSummaryView,
    pub finish_summary: SettlementSummaryView,
}

/// Partial summary update; absent fields keep the store's current value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateSummaryRequest {
    pub cash_on_hand: Option<i64>,
    pub yesterday_balance: Option<i64>,
    pub coin_wallet: Option<i64>,
    pub start_amount_total: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddManualWithdrawalRequest {
    pub identity: String,
    pub site: String,
    pub amount: i64,
    /// Optional date override; defaults to the summary's date
    pub record_date: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateManualWithdrawalRequest {
    pub identity: Option<String>,
    pub site: Option<String>,
    pub amount: Option<i64>,
}

/// Outcome of handing a summary to the notification sink
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotifyResponse {
    pub success: bool,
    pub message: String,
}

/// Free text submitted to the parser preview endpoints
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseTextRequest {
    pub input: Option<String>,
}
