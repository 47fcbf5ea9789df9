//! # Storage Module
//!
//! Adapters for the external services the settlement core depends on.
//! Storage semantics belong to the remote store; this module only carries
//! requests and responses.
//!
//! - **traits**: async interfaces the domain layer is written against
//! - **http**: JSON-over-HTTP client for the remote store
//! - **memory**: in-process store for local runs and tests

pub mod error;
pub mod http;
pub mod memory;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use http::HttpStore;
pub use memory::MemoryStore;
pub use traits::*;
