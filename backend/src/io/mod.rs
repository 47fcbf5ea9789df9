//! # IO Module
//!
//! Interface layer exposing the settlement engine over HTTP. Handlers map
//! shared DTOs to domain commands and domain results back to DTOs; no
//! business rules live here.

pub mod rest;
