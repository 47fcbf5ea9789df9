//! Domain errors for settlement operations.

use chrono::NaiveDate;

use crate::storage::StoreError;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SettlementError {
    #[error("Invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Manual withdrawal not found: {0}")]
    UnknownWithdrawal(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type SettlementResult<T> = Result<T, SettlementError>;

/// Reduce a date or timestamp to a bare `YYYY-MM-DD` date.
///
/// `2024-05-01T13:00:00` and `2024-05-01 13:00` both become `2024-05-01`.
pub fn normalize_record_date(input: &str) -> SettlementResult<String> {
    let trimmed = input.trim();
    let date_part = trimmed
        .split(|c: char| c == 'T' || c.is_whitespace())
        .next()
        .unwrap_or(trimmed);

    NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .map(|date| date.format("%Y-%m-%d").to_string())
        .map_err(|_| SettlementError::InvalidDate(input.to_string()))
}
