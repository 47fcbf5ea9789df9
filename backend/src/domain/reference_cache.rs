//! TTL-bounded, single-flight cache for the identity list.
//!
//! One `ReferenceDataCache` is built at startup and shared by reference.
//! Concurrent callers that miss the cache all await the same fetch. The
//! fetch runs on its own tokio task and records the result and clears the
//! in-flight marker itself, so it completes even if every caller stops
//! waiting.

use futures::future::{BoxFuture, FutureExt, Shared};
use log::{debug, info, warn};
use shared::Identity;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

use crate::storage::{IdentitySource, StoreError, StoreResult};

/// Default freshness window for reference data
pub const DEFAULT_REFERENCE_TTL: Duration = Duration::from_millis(60_000);

/// Source of "now" for TTL checks
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall clock backed by the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut offset = self.offset.lock().unwrap_or_else(PoisonError::into_inner);
        *offset += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + *self.offset.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

type SharedFetch = Shared<BoxFuture<'static, StoreResult<Arc<Vec<Identity>>>>>;

#[derive(Default)]
struct CacheState {
    value: Option<Arc<Vec<Identity>>>,
    fetched_at: Option<Instant>,
    inflight: Option<SharedFetch>,
}

pub struct ReferenceDataCache {
    source: Arc<dyn IdentitySource>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    state: Arc<Mutex<CacheState>>,
}

impl ReferenceDataCache {
    pub fn new(source: Arc<dyn IdentitySource>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            source,
            clock,
            ttl,
            state: Arc::new(Mutex::new(CacheState::default())),
        }
    }

    fn state(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Return the identity list, fetching it at most once per TTL window.
    /// A failed fetch is reported to every caller that was waiting on it.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn get(&self) -> StoreResult<Arc<Vec<Identity>>> {
        let fetch = {
            let mut state = self.state();

            if let (Some(value), Some(fetched_at)) = (&state.value, state.fetched_at) {
                if self.clock.now().saturating_duration_since(fetched_at) < self.ttl {
                    return Ok(value.clone());
                }
            }

            match &state.inflight {
                Some(inflight) => {
                    debug!("Joining in-flight identity fetch");
                    inflight.clone()
                }
                None => {
                    let fetch = self.start_fetch();
                    state.inflight = Some(fetch.clone());
                    fetch
                }
            }
        };

        fetch.await
    }

    fn start_fetch(&self) -> SharedFetch {
        let source = self.source.clone();
        let clock = self.clock.clone();
        let state = self.state.clone();
        info!("Fetching identity list");

        let handle = tokio::spawn(async move {
            let result = source.list_identities().await.map(Arc::new);

            let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
            state.inflight = None;
            match &result {
                Ok(identities) => {
                    info!("Cached {} identities", identities.len());
                    state.value = Some(identities.clone());
                    state.fetched_at = Some(clock.now());
                }
                Err(e) => warn!("Identity fetch failed: {}", e),
            }
            result
        });

        async move {
            handle
                .await
                .unwrap_or_else(|e| Err(StoreError::Rejected(format!("identity fetch aborted: {}", e))))
        }
        .boxed()
        .shared()
    }

    pub fn is_fetching(&self) -> bool {
        self.state().inflight.is_some()
    }

    /// Drop the cached value so the next `get` refetches.
    /// A fetch already in flight is left alone.
    pub fn invalidate(&self) {
        let mut state = self.state();
        state.value = None;
        state.fetched_at = None;
        info!("Identity cache invalidated");
    }
}
