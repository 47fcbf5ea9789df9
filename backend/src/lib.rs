//! # Settlement Backend
//!
//! Daily cash-settlement reconciliation for a multi-identity operation.
//!
//! The crate is layered the usual way:
//! ```text
//! IO Layer (REST API, handlers)
//!     ↓
//! Domain Layer (parsers, record chains, save queues, services)
//!     ↓
//! Storage Layer (HTTP store, in-process store)
//! ```
//!
//! Storage semantics belong to the remote store; this crate derives margins
//! and balances from what it reads and serializes the edits it writes back.

pub mod config;
pub mod domain;
pub mod io;
pub mod storage;

use anyhow::{Context, Result};
use axum::{
    http::{HeaderValue, Method},
    Router,
};
use log::{info, warn};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};

use crate::config::{SettlementConfig, StoreKind};
use crate::domain::{Clock, DailyLedgerService, ReferenceDataCache, SettlementService, SystemClock};
use crate::io::rest::{manual_withdrawal_apis, parser_apis, reference_apis, settlement_apis};
use crate::storage::{HttpStore, MemoryStore, SettlementStore};

/// Main application state that holds all services
#[derive(Clone)]
pub struct AppState {
    pub ledger_service: DailyLedgerService,
    pub settlement_service: SettlementService,
    pub reference_cache: Arc<ReferenceDataCache>,
}

impl AppState {
    /// Wire every service to one store
    pub fn from_store<S>(store: Arc<S>, clock: Arc<dyn Clock>, reference_ttl: Duration) -> Self
    where
        S: SettlementStore + 'static,
    {
        let reference_cache = Arc::new(ReferenceDataCache::new(store.clone(), clock, reference_ttl));
        let settlement_service = SettlementService::new(store.clone(), store.clone());
        let ledger_service = DailyLedgerService::new(reference_cache.clone(), store, settlement_service.clone());

        Self {
            ledger_service,
            settlement_service,
            reference_cache,
        }
    }
}

/// Initialize the backend with all required services
pub async fn initialize_backend(config: &SettlementConfig) -> Result<AppState> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let reference_ttl = config.cache.reference_ttl();

    info!("Setting up store");
    let app_state = match config.store.kind {
        StoreKind::Http => {
            let base_url = config
                .store
                .base_url
                .as_deref()
                .context("store.base_url is required when store.kind is http")?;
            info!("Using settlement store at {}", base_url);
            let store = Arc::new(HttpStore::new(base_url, config.store.timeout())?);
            AppState::from_store(store, clock, reference_ttl)
        }
        StoreKind::Memory => {
            warn!("Using the in-process store, nothing is persisted across restarts");
            AppState::from_store(Arc::new(MemoryStore::new()), clock, reference_ttl)
        }
    };

    Ok(app_state)
}

/// Create the Axum router with all routes configured
pub fn create_router(app_state: AppState, allowed_origin: &str) -> Result<Router> {
    let origin = HeaderValue::from_str(allowed_origin)
        .with_context(|| format!("Invalid allowed origin '{}'", allowed_origin))?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE])
        .allow_headers(Any);

    let api_routes = Router::new()
        .nest(
            "/settlement",
            settlement_apis::router().merge(manual_withdrawal_apis::router()),
        )
        .nest("/reference", reference_apis::router())
        .nest("/parse", parser_apis::router());

    Ok(Router::new()
        .nest("/api", api_routes)
        .layer(cors)
        .with_state(app_state))
}
