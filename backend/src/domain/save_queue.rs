//! Serialized persistence per write target.
//!
//! Each target (one settlement summary row) owns a FIFO [`SaveQueue`] with
//! two states, `Idle` and `Draining`. Enqueueing onto an idle queue starts a
//! drainer task that runs the queued writes one at a time until the queue is
//! empty. A failed write is logged and reported through its ticket; it never
//! stops the writes queued behind it.

use futures::future::{BoxFuture, FutureExt};
use log::{debug, warn};
use std::collections::{HashMap, VecDeque};
use std::fmt::Display;
use std::future::Future;
use std::hash::Hash;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{oneshot, watch};

use crate::storage::{StoreError, StoreResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueStatus {
    Idle,
    Draining,
}

struct QueuedWrite {
    label: String,
    task: BoxFuture<'static, StoreResult<()>>,
    done: oneshot::Sender<StoreResult<()>>,
}

/// Receives the outcome of one queued write. Dropping it is fine; the write
/// still runs.
pub struct WriteTicket {
    receiver: oneshot::Receiver<StoreResult<()>>,
}

impl WriteTicket {
    pub(crate) fn from_receiver(receiver: oneshot::Receiver<StoreResult<()>>) -> Self {
        Self { receiver }
    }

    pub async fn outcome(self) -> StoreResult<()> {
        self.receiver
            .await
            .unwrap_or_else(|_| Err(StoreError::Rejected("save queue dropped the write".to_string())))
    }
}

pub struct SaveQueue {
    name: String,
    pending: Mutex<VecDeque<QueuedWrite>>,
    status: watch::Sender<QueueStatus>,
}

impl SaveQueue {
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        let (status, _) = watch::channel(QueueStatus::Idle);
        Arc::new(Self {
            name: name.into(),
            pending: Mutex::new(VecDeque::new()),
            status,
        })
    }

    fn pending(&self) -> MutexGuard<'_, VecDeque<QueuedWrite>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a write. Starts draining if the queue was idle.
    ///
    /// Must be called from within a tokio runtime.
    pub fn enqueue<F>(self: &Arc<Self>, label: impl Into<String>, task: F) -> WriteTicket
    where
        F: Future<Output = StoreResult<()>> + Send + 'static,
    {
        let (done, receiver) = oneshot::channel();
        let label = label.into();

        let start_draining = {
            let mut pending = self.pending();
            debug!("[{}] queued '{}' behind {} write(s)", self.name, label, pending.len());
            pending.push_back(QueuedWrite {
                label,
                task: task.boxed(),
                done,
            });
            if *self.status.borrow() == QueueStatus::Idle {
                self.status.send_replace(QueueStatus::Draining);
                true
            } else {
                false
            }
        };

        if start_draining {
            tokio::spawn(self.clone().drain());
        }

        WriteTicket { receiver }
    }

    async fn drain(self: Arc<Self>) {
        loop {
            let next = {
                let mut pending = self.pending();
                match pending.pop_front() {
                    Some(write) => write,
                    None => {
                        self.status.send_replace(QueueStatus::Idle);
                        debug!("[{}] queue drained", self.name);
                        return;
                    }
                }
            };

            let result = match AssertUnwindSafe(next.task).catch_unwind().await {
                Ok(result) => result,
                Err(_) => Err(StoreError::Rejected(format!("write '{}' panicked", next.label))),
            };

            if let Err(e) = &result {
                warn!("[{}] write '{}' failed, continuing with the queue: {}", self.name, next.label, e);
            }
            // the caller may have dropped its ticket
            let _ = next.done.send(result);
        }
    }

    pub fn status(&self) -> QueueStatus {
        *self.status.borrow()
    }

    /// Writes waiting behind the one currently running
    pub fn pending_len(&self) -> usize {
        self.pending().len()
    }

    /// Resolve once the queue has nothing left to run
    pub async fn wait_idle(&self) {
        let mut status = self.status.subscribe();
        // the sender lives as long as self, so this cannot fail
        let _ = status.wait_for(|s| *s == QueueStatus::Idle).await;
    }
}

/// One [`SaveQueue`] per target key, created on first use.
/// Writes for different targets may overlap; writes for one target never do.
///
/// Creating a queue evicts the ones that are idle and held by nobody else.
pub struct WriteCoalescer<K> {
    queues: Mutex<HashMap<K, Arc<SaveQueue>>>,
}

impl<K> WriteCoalescer<K>
where
    K: Hash + Eq + Clone + Display,
{
    pub fn new() -> Self {
        Self {
            queues: Mutex::new(HashMap::new()),
        }
    }

    pub fn queue(&self, key: &K) -> Arc<SaveQueue> {
        let mut queues = self.queues.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(queue) = queues.get(key) {
            return queue.clone();
        }

        let before = queues.len();
        queues.retain(|_, queue| Arc::strong_count(queue) > 1 || queue.status() == QueueStatus::Draining);
        if queues.len() < before {
            debug!("Evicted {} idle save queue(s)", before - queues.len());
        }

        let queue = SaveQueue::new(key.to_string());
        queues.insert(key.clone(), queue.clone());
        queue
    }

    /// Queues currently tracked
    pub fn queue_count(&self) -> usize {
        self.queues.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn enqueue<F>(&self, key: &K, label: impl Into<String>, task: F) -> WriteTicket
    where
        F: Future<Output = StoreResult<()>> + Send + 'static,
    {
        self.queue(key).enqueue(label, task)
    }

    pub fn status(&self, key: &K) -> QueueStatus {
        let queues = self.queues.lock().unwrap_or_else(PoisonError::into_inner);
        queues.get(key).map_or(QueueStatus::Idle, |queue| queue.status())
    }

    pub async fn wait_idle(&self, key: &K) {
        let queue = self.queue(key);
        queue.wait_idle().await;
    }

    /// Wait for every known queue to drain
    pub async fn wait_all_idle(&self) {
        let queues: Vec<Arc<SaveQueue>> = {
            let queues = self.queues.lock().unwrap_or_else(PoisonError::into_inner);
            queues.values().cloned().collect()
        };
        for queue in queues {
            queue.wait_idle().await;
        }
    }
}

impl<K> Default for WriteCoalescer<K>
where
    K: Hash + Eq + Clone + Display,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStore, SettlementSummaryStore};
    use shared::{SettlementMode, SettlementSummaryRecord};
    use std::time::Duration;

    fn row(cash_on_hand: i64) -> SettlementSummaryRecord {
        SettlementSummaryRecord {
            date: "2024-05-01".to_string(),
            mode: Some(SettlementMode::Finish),
            cash_on_hand,
            ..SettlementSummaryRecord::default()
        }
    }

    fn write(store: &Arc<MemoryStore>, cash_on_hand: i64) -> impl Future<Output = StoreResult<()>> + Send + 'static {
        let store = store.clone();
        async move { store.put_summary(&row(cash_on_hand)).await }
    }

    #[tokio::test]
    async fn test_writes_run_sequentially_in_enqueue_order_despite_failure() {
        let store = Arc::new(MemoryStore::new());
        store.set_latency(Duration::from_millis(10));
        store.fail_write_attempt(3);
        let queue = SaveQueue::new("2024-05-01/finish");

        let first = queue.enqueue("w0", write(&store, 0));
        assert_eq!(queue.status(), QueueStatus::Draining);
        let a = queue.enqueue("w1", write(&store, 1));
        let b = queue.enqueue("w2", write(&store, 2));
        let c = queue.enqueue("w3", write(&store, 3));

        assert!(first.outcome().await.is_ok());
        assert!(a.outcome().await.is_ok());
        assert!(b.outcome().await.is_err());
        assert!(c.outcome().await.is_ok());
        queue.wait_idle().await;

        let order: Vec<i64> = store.write_log().iter().map(|r| r.cash_on_hand).collect();
        assert_eq!(order, vec![0, 1, 2, 3]);
        assert_eq!(store.max_concurrent_writes(), 1);
        assert_eq!(store.summary("2024-05-01", SettlementMode::Finish).unwrap().cash_on_hand, 3);
        assert_eq!(queue.status(), QueueStatus::Idle);
    }

    #[tokio::test]
    async fn test_failing_task_does_not_stop_the_queue() {
        let queue = SaveQueue::new("target");
        let ran = Arc::new(Mutex::new(Vec::new()));

        let failing = queue.enqueue("fails", async { Err(StoreError::Rejected("nope".to_string())) });
        let log = ran.clone();
        let next = queue.enqueue("next", async move {
            log.lock().unwrap().push("next");
            Ok(())
        });

        assert!(failing.outcome().await.is_err());
        assert!(next.outcome().await.is_ok());
        assert_eq!(*ran.lock().unwrap(), vec!["next"]);
    }

    #[tokio::test]
    async fn test_panicking_task_is_reported_and_queue_recovers() {
        let queue = SaveQueue::new("target");

        let panics = queue.enqueue("panics", async {
            if true {
                panic!("boom");
            }
            Ok(())
        });
        let after = queue.enqueue("after", async { Ok(()) });

        assert!(panics.outcome().await.is_err());
        assert!(after.outcome().await.is_ok());
        queue.wait_idle().await;
        assert_eq!(queue.status(), QueueStatus::Idle);
    }

    #[tokio::test]
    async fn test_queue_restarts_after_going_idle() {
        let queue = SaveQueue::new("target");

        queue.enqueue("one", async { Ok(()) }).outcome().await.unwrap();
        queue.wait_idle().await;
        queue.enqueue("two", async { Ok(()) }).outcome().await.unwrap();
        queue.wait_idle().await;

        assert_eq!(queue.pending_len(), 0);
    }

    #[tokio::test]
    async fn test_coalescer_keeps_one_queue_per_target() {
        let coalescer: WriteCoalescer<String> = WriteCoalescer::new();
        let a = coalescer.queue(&"a".to_string());
        let again = coalescer.queue(&"a".to_string());
        let b = coalescer.queue(&"b".to_string());

        assert!(Arc::ptr_eq(&a, &again));
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(coalescer.status(&"missing".to_string()), QueueStatus::Idle);
    }

    #[tokio::test]
    async fn test_idle_queues_are_evicted_when_a_new_target_appears() {
        let coalescer: WriteCoalescer<String> = WriteCoalescer::new();

        coalescer
            .enqueue(&"2024-05-01/start".to_string(), "one", async { Ok(()) })
            .outcome()
            .await
            .unwrap();
        coalescer.wait_idle(&"2024-05-01/start".to_string()).await;
        tokio::task::yield_now().await;

        let held = coalescer.queue(&"2024-05-01/finish".to_string());
        assert_eq!(coalescer.queue_count(), 1);

        let busy = coalescer.enqueue(&"2024-05-02/start".to_string(), "slow", async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(())
        });
        coalescer.queue(&"2024-05-02/finish".to_string());
        // the draining queue survives, and so does the one still held
        assert_eq!(coalescer.queue_count(), 3);
        assert!(Arc::ptr_eq(&held, &coalescer.queue(&"2024-05-01/finish".to_string())));

        busy.outcome().await.unwrap();
    }

    #[tokio::test]
    async fn test_different_targets_may_overlap() {
        let store = Arc::new(MemoryStore::new());
        store.set_latency(Duration::from_millis(30));
        let coalescer: WriteCoalescer<String> = WriteCoalescer::new();

        let a = coalescer.enqueue(&"a".to_string(), "a", write(&store, 1));
        let b = coalescer.enqueue(&"b".to_string(), "b", write(&store, 2));
        a.outcome().await.unwrap();
        b.outcome().await.unwrap();
        coalescer.wait_all_idle().await;

        assert_eq!(store.max_concurrent_writes(), 2);
    }
}
