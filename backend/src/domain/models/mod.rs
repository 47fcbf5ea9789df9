pub mod daily_record;
pub mod settlement_summary;

pub use daily_record::{normalize_chain, NormalizedRecord, TransactionSlot};
pub use settlement_summary::{SettlementSummary, SummaryKey};
