//! # Domain Module
//!
//! Business logic of the settlement reconciliation engine. Nothing here
//! knows about HTTP; collaborators are reached through the storage traits.
//!
//! ## Module Organization
//!
//! - **text_field_parser**: decodes "10 20" slots and "NN충/NN환" notes into minor units
//! - **models**: normalized records and settlement summaries
//! - **record_chain**: day-over-day carried balance and margin
//! - **margin_aggregator**: margin totals per chain and per identity
//! - **reference_cache**: single-flight, TTL-bounded identity list
//! - **load_dedup**: one in-flight load pipeline per key
//! - **save_queue**: one write at a time per settlement summary
//! - **settlement_service**: optimistic summary edits and manual withdrawals
//! - **daily_ledger_service**: the per-date load pipeline and selection tracking
//!
//! ## Core Concepts
//!
//! - **Identity**: an operating sub-account; records are chained per identity
//! - **Carried amount**: the opening balance a record inherits from its predecessor
//! - **Margin**: reported total minus carried balance and own charges, 0 until finalized
//! - **Summary**: the start or finish settlement row for a date

pub mod commands;
pub mod daily_ledger_service;
pub mod errors;
pub mod load_dedup;
pub mod margin_aggregator;
pub mod models;
pub mod record_chain;
pub mod reference_cache;
pub mod save_queue;
pub mod settlement_service;
pub mod text_field_parser;

pub use daily_ledger_service::{DailyLedgerService, SettlementSession};
pub use errors::{SettlementError, SettlementResult};
pub use reference_cache::{Clock, ManualClock, ReferenceDataCache, SystemClock, DEFAULT_REFERENCE_TTL};
pub use settlement_service::SettlementService;
