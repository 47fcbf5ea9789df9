//! Errors raised by the external stores.
//!
//! `StoreError` is `Clone` because single-flight loads hand the same outcome
//! to every waiting caller.

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("Store returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Failed to decode store response: {0}")]
    Decode(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Store rejected the request: {0}")]
    Rejected(String),
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            StoreError::Decode(err.to_string())
        } else {
            StoreError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Decode(err.to_string())
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
