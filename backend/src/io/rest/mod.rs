//! # REST API
//!
//! Axum handlers grouped by concern, each module exposing a `router()`
//! that `create_router` nests under `/api`.

pub mod manual_withdrawal_apis;
pub mod mappers;
pub mod parser_apis;
pub mod reference_apis;
pub mod settlement_apis;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use shared::SettlementMode;

use crate::domain::errors::{normalize_record_date, SettlementError, SettlementResult};
use crate::domain::models::SummaryKey;
use crate::storage::StoreError;

/// Build the summary key for a `/:date/:mode` path
pub(crate) fn summary_key(date: &str, mode: SettlementMode) -> SettlementResult<SummaryKey> {
    Ok(SummaryKey::new(normalize_record_date(date)?, mode))
}

pub(crate) fn status_for(error: &SettlementError) -> StatusCode {
    match error {
        SettlementError::InvalidDate(_) | SettlementError::InvalidAmount(_) => StatusCode::BAD_REQUEST,
        SettlementError::UnknownWithdrawal(_) => StatusCode::NOT_FOUND,
        SettlementError::Store(StoreError::NotFound(_)) => StatusCode::NOT_FOUND,
        SettlementError::Store(StoreError::Rejected(_)) => StatusCode::CONFLICT,
        SettlementError::Store(_) => StatusCode::BAD_GATEWAY,
    }
}

pub(crate) fn error_response(error: SettlementError) -> Response {
    (status_for(&error), error.to_string()).into_response()
}
