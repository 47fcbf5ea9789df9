//! Per-key sharing of in-flight load pipelines.
//!
//! A load for a key that is already running awaits the running pipeline
//! instead of starting a second one. The entry is removed as soon as the
//! pipeline settles, whatever the outcome, so the next load starts fresh.
//!
//! Pipelines run on their own tokio task. A caller that stops waiting does
//! not stop the pipeline or leave its entry behind.

use futures::future::{BoxFuture, FutureExt, Shared};
use log::debug;
use std::collections::HashMap;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::storage::{StoreError, StoreResult};

type SharedLoad<V> = Shared<BoxFuture<'static, StoreResult<V>>>;

struct InflightLoad<V> {
    /// Distinguishes this pipeline from a later one for the same key
    generation: u64,
    load: SharedLoad<V>,
}

type InflightMap<K, V> = Arc<Mutex<HashMap<K, InflightLoad<V>>>>;

fn lock<K, V>(map: &InflightMap<K, V>) -> MutexGuard<'_, HashMap<K, InflightLoad<V>>> {
    map.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct LoadDeduplicator<K, V> {
    inflight: InflightMap<K, V>,
    next_generation: AtomicU64,
}

impl<K, V> LoadDeduplicator<K, V>
where
    K: Hash + Eq + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            inflight: Arc::new(Mutex::new(HashMap::new())),
            next_generation: AtomicU64::new(0),
        }
    }

    /// Run `pipeline` for `key`, or join the run already in flight.
    ///
    /// `pipeline` is only invoked when no load for `key` is running.
    /// Must be called from within a tokio runtime.
    pub async fn load<F, Fut>(&self, key: K, pipeline: F) -> StoreResult<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = StoreResult<V>> + Send + 'static,
    {
        let load = {
            let mut inflight = lock(&self.inflight);
            match inflight.get(&key) {
                Some(existing) => {
                    debug!("Joining in-flight load for {:?}", key);
                    existing.load.clone()
                }
                None => {
                    let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
                    let load = Self::wrap(self.inflight.clone(), key.clone(), generation, pipeline());
                    inflight.insert(
                        key,
                        InflightLoad {
                            generation,
                            load: load.clone(),
                        },
                    );
                    load
                }
            }
        };

        load.await
    }

    fn wrap<Fut>(map: InflightMap<K, V>, key: K, generation: u64, pipeline: Fut) -> SharedLoad<V>
    where
        Fut: Future<Output = StoreResult<V>> + Send + 'static,
    {
        let label = format!("{:?}", key);
        let handle = tokio::spawn(async move {
            let result = match AssertUnwindSafe(pipeline).catch_unwind().await {
                Ok(result) => result,
                Err(_) => Err(StoreError::Rejected(format!("load pipeline for {:?} panicked", key))),
            };
            let mut inflight = lock(&map);
            if inflight.get(&key).map_or(false, |entry| entry.generation == generation) {
                inflight.remove(&key);
            }
            result
        });

        async move {
            handle
                .await
                .unwrap_or_else(|e| Err(StoreError::Rejected(format!("load pipeline for {} aborted: {}", label, e))))
        }
        .boxed()
        .shared()
    }

    pub fn is_loading(&self, key: &K) -> bool {
        lock(&self.inflight).contains_key(key)
    }

    pub fn inflight_count(&self) -> usize {
        lock(&self.inflight).len()
    }
}

impl<K, V> Default for LoadDeduplicator<K, V>
where
    K: Hash + Eq + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
