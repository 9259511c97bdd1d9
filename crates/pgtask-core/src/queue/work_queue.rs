//! In-memory work queue with set semantics.

use std::collections::hash_map::Entry;
use std::collections::{BinaryHeap, HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::Instant;

use super::RateLimiter;
use crate::domain::QueueKey;
use crate::observability::QueueCounts;

/// Delayed key entry for the scheduled heap.
///
/// We use Reverse ordering so BinaryHeap acts as a min-heap (earliest first).
#[derive(Debug, Clone, PartialEq, Eq)]
struct ScheduledKey {
    ready_at: Instant,
    key: QueueKey,
}

impl PartialOrd for ScheduledKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Reverse ordering: earlier times have higher priority
        other
            .ready_at
            .cmp(&self.ready_at)
            .then_with(|| other.key.cmp(&self.key))
    }
}

/// Queue state. Every transition happens under the one lock around this.
///
/// Invariants:
/// - a key is in at most one of `pending_set` / `in_flight`
/// - `dirty` is a subset of `in_flight`
/// - `pending` and `pending_set` hold the same keys
struct WorkQueueState {
    /// Ready keys in FIFO order.
    pending: VecDeque<QueueKey>,
    pending_set: HashSet<QueueKey>,

    /// Keys handed out by `get` and not yet `done`.
    in_flight: HashSet<QueueKey>,

    /// In-flight keys that got another `add` while being processed.
    dirty: HashSet<QueueKey>,

    /// Rate-limited keys waiting for their backoff to elapse.
    /// `waiting` holds the authoritative ready time; heap entries that
    /// disagree with it are stale and skipped.
    delayed: BinaryHeap<ScheduledKey>,
    waiting: HashMap<QueueKey, Instant>,

    rate_limiter: RateLimiter,
    shutting_down: bool,
}

impl WorkQueueState {
    fn new(rate_limiter: RateLimiter) -> Self {
        Self {
            pending: VecDeque::new(),
            pending_set: HashSet::new(),
            in_flight: HashSet::new(),
            dirty: HashSet::new(),
            delayed: BinaryHeap::new(),
            waiting: HashMap::new(),
            rate_limiter,
            shutting_down: false,
        }
    }

    /// Add semantics. Returns true if the key became pending.
    fn insert(&mut self, key: QueueKey) -> bool {
        if self.in_flight.contains(&key) {
            self.dirty.insert(key);
            return false;
        }
        if !self.pending_set.insert(key.clone()) {
            return false;
        }
        self.pending.push_back(key);
        true
    }

    fn take(&mut self) -> Option<QueueKey> {
        let key = self.pending.pop_front()?;
        self.pending_set.remove(&key);
        self.in_flight.insert(key.clone());
        Some(key)
    }

    /// Keep the earliest ready time per key.
    fn schedule(&mut self, key: QueueKey, ready_at: Instant) {
        match self.waiting.entry(key.clone()) {
            Entry::Occupied(mut entry) => {
                if ready_at >= *entry.get() {
                    return;
                }
                entry.insert(ready_at);
            }
            Entry::Vacant(entry) => {
                entry.insert(ready_at);
            }
        }
        self.delayed.push(ScheduledKey { ready_at, key });
    }

    /// Move delayed keys whose time has come into pending.
    fn promote_delayed(&mut self, now: Instant) {
        while let Some(entry) = self.delayed.peek() {
            if entry.ready_at > now {
                break; // Heap is sorted, so we can stop
            }
            let Some(entry) = self.delayed.pop() else {
                break;
            };
            if self.waiting.get(&entry.key) == Some(&entry.ready_at) {
                self.waiting.remove(&entry.key);
                self.insert(entry.key);
            }
        }
    }

    fn next_ready_at(&self) -> Option<Instant> {
        self.delayed.peek().map(|entry| entry.ready_at)
    }

    fn counts(&self) -> QueueCounts {
        QueueCounts {
            pending: self.pending.len(),
            in_flight: self.in_flight.len(),
            dirty: self.dirty.len(),
            delayed: self.waiting.len(),
            shutting_down: self.shutting_down,
        }
    }
}

/// Rate-limited work queue with set semantics.
///
/// Design:
/// - At most one pending-or-in-flight entry per key. An `add` for a key that
///   is being processed marks it dirty; `done` puts it back exactly once.
/// - `get` waits on `Notify`. The lock is never held across an await.
/// - `shut_down` lets `get` drain what is already pending, then report `None`.
pub struct WorkQueue {
    state: Mutex<WorkQueueState>,
    notify: Notify,
}

impl WorkQueue {
    pub fn new(rate_limiter: RateLimiter) -> Self {
        Self {
            state: Mutex::new(WorkQueueState::new(rate_limiter)),
            notify: Notify::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, WorkQueueState> {
        // no code path panics while holding the lock, the state stays consistent
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Submit `key` for processing. No-op after shutdown.
    pub fn add(&self, key: QueueKey) {
        let woke = {
            let mut state = self.lock();
            if state.shutting_down {
                tracing::debug!(%key, "queue shutting down, dropping add");
                return;
            }
            state.insert(key)
        };
        if woke {
            self.notify.notify_one();
        }
    }

    /// Submit `key` once `delay` has elapsed.
    pub fn add_after(&self, key: QueueKey, delay: Duration) {
        if delay.is_zero() {
            self.add(key);
            return;
        }
        {
            let mut state = self.lock();
            if state.shutting_down {
                tracing::debug!(%key, "queue shutting down, dropping delayed add");
                return;
            }
            state.schedule(key, Instant::now() + delay);
        }
        // every idle consumer re-computes its wake-up time
        self.notify.notify_waiters();
    }

    /// Submit `key` after its per-key backoff.
    pub fn add_rate_limited(&self, key: QueueKey) {
        let delay = self.lock().rate_limiter.when(&key);
        self.add_after(key, delay);
    }

    /// Clear the backoff history of `key`.
    pub fn forget(&self, key: &QueueKey) {
        self.lock().rate_limiter.forget(key);
    }

    pub fn num_requeues(&self, key: &QueueKey) -> u32 {
        self.lock().rate_limiter.num_requeues(key)
    }

    /// Wait for the next pending key and mark it in flight.
    ///
    /// Returns `None` once the queue is shut down and nothing is pending.
    /// Every `Some(key)` must be answered with exactly one `done(&key)`.
    pub async fn get(&self) -> Option<QueueKey> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // register before looking at the state so no wake-up is lost
            notified.as_mut().enable();

            let next_wake = {
                let mut state = self.lock();
                state.promote_delayed(Instant::now());

                if let Some(key) = state.take() {
                    let more = !state.pending.is_empty();
                    drop(state);
                    if more {
                        self.notify.notify_one();
                    }
                    return Some(key);
                }

                if state.shutting_down {
                    return None;
                }

                state.next_ready_at()
            };

            // Wait for notification OR next delayed key
            if let Some(wake_at) = next_wake {
                tokio::select! {
                    _ = &mut notified => {},
                    _ = tokio::time::sleep_until(wake_at) => {},
                }
            } else {
                notified.await;
            }
        }
    }

    /// Finish processing `key`. A dirty key goes straight back to pending.
    pub fn done(&self, key: &QueueKey) {
        let requeued = {
            let mut state = self.lock();
            if !state.in_flight.remove(key) {
                tracing::warn!(%key, "done called for a key that is not in flight");
                return;
            }
            if state.dirty.remove(key) {
                state.insert(key.clone())
            } else {
                false
            }
        };
        if requeued {
            self.notify.notify_one();
        }
    }

    /// Stop accepting keys. Pending keys are still handed out; delayed ones are dropped.
    pub fn shut_down(&self) {
        {
            let mut state = self.lock();
            state.shutting_down = true;
            state.delayed.clear();
            state.waiting.clear();
        }
        self.notify.notify_waiters();
    }

    pub fn is_shutting_down(&self) -> bool {
        self.lock().shutting_down
    }

    /// Number of pending keys.
    pub fn len(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn counts(&self) -> QueueCounts {
        self.lock().counts()
    }
}

impl Default for WorkQueue {
    fn default() -> Self {
        Self::new(RateLimiter::default())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn key(name: &str) -> QueueKey {
        QueueKey::new("ns1", name).unwrap()
    }

    async fn get_now(queue: &WorkQueue) -> Option<QueueKey> {
        tokio::time::timeout(Duration::from_millis(100), queue.get())
            .await
            .expect("get should not block")
    }

    #[tokio::test]
    async fn repeated_adds_collapse_into_one_get() {
        let queue = WorkQueue::default();
        queue.add(key("a"));
        queue.add(key("a"));
        queue.add(key("a"));

        assert_eq!(queue.len(), 1);
        assert_eq!(get_now(&queue).await, Some(key("a")));
        queue.done(&key("a"));

        let counts = queue.counts();
        assert_eq!(counts.pending, 0);
        assert_eq!(counts.in_flight, 0);
    }

    #[tokio::test]
    async fn add_while_in_flight_requeues_once_after_done() {
        let queue = WorkQueue::default();
        queue.add(key("a"));
        let got = get_now(&queue).await.unwrap();

        queue.add(key("a"));
        queue.add(key("a"));
        let counts = queue.counts();
        assert_eq!(counts.pending, 0);
        assert_eq!(counts.in_flight, 1);
        assert_eq!(counts.dirty, 1);

        queue.done(&got);
        assert_eq!(queue.len(), 1);
        // already pending again, so another add does not duplicate it
        queue.add(key("a"));
        assert_eq!(queue.len(), 1);
        assert_eq!(get_now(&queue).await, Some(key("a")));
        queue.done(&key("a"));
        assert_eq!(queue.counts(), QueueCounts::default());
    }

    #[tokio::test]
    async fn in_flight_key_is_not_handed_out_twice() {
        let queue = WorkQueue::default();
        queue.add(key("a"));
        queue.add(key("b"));

        let first = get_now(&queue).await.unwrap();
        queue.add(first.clone());
        let second = get_now(&queue).await.unwrap();
        assert_ne!(first, second);

        // only the dirty key is left and it is still in flight
        assert!(
            tokio::time::timeout(Duration::from_millis(50), queue.get())
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn pending_keys_are_fifo() {
        let queue = WorkQueue::default();
        for name in ["a", "b", "c"] {
            queue.add(key(name));
        }
        for name in ["a", "b", "c"] {
            assert_eq!(get_now(&queue).await, Some(key(name)));
        }
    }

    #[tokio::test]
    async fn add_wakes_blocked_get() {
        let queue = Arc::new(WorkQueue::default());
        let waiter = tokio::spawn({
            let queue = Arc::clone(&queue);
            async move { queue.get().await }
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.add(key("a"));

        let got = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(got, Some(key("a")));
    }

    #[tokio::test]
    async fn shut_down_drains_pending_then_reports_none() {
        let queue = WorkQueue::default();
        queue.add(key("a"));
        queue.add(key("b"));
        queue.shut_down();

        assert_eq!(get_now(&queue).await, Some(key("a")));
        assert_eq!(get_now(&queue).await, Some(key("b")));
        assert_eq!(get_now(&queue).await, None);
    }

    #[tokio::test]
    async fn add_after_shut_down_is_ignored() {
        let queue = WorkQueue::default();
        queue.shut_down();
        queue.add(key("a"));
        queue.add_after(key("b"), Duration::from_millis(1));

        assert!(queue.is_shutting_down());
        assert_eq!(queue.counts().pending, 0);
        assert_eq!(queue.counts().delayed, 0);
        assert_eq!(get_now(&queue).await, None);
    }

    #[tokio::test]
    async fn shut_down_wakes_blocked_gets() {
        let queue = Arc::new(WorkQueue::default());
        let waiters: Vec<_> = (0..3)
            .map(|_| {
                let queue = Arc::clone(&queue);
                tokio::spawn(async move { queue.get().await })
            })
            .collect();

        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.shut_down();

        for waiter in waiters {
            let got = tokio::time::timeout(Duration::from_secs(1), waiter)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(got, None);
        }
    }

    #[tokio::test]
    async fn dirty_key_is_requeued_even_while_shutting_down() {
        let queue = WorkQueue::default();
        queue.add(key("a"));
        let got = get_now(&queue).await.unwrap();
        queue.add(key("a"));
        queue.shut_down();

        queue.done(&got);
        assert_eq!(get_now(&queue).await, Some(key("a")));
        queue.done(&key("a"));
        assert_eq!(get_now(&queue).await, None);
    }

    #[tokio::test]
    async fn done_for_unknown_key_is_ignored() {
        let queue = WorkQueue::default();
        queue.done(&key("a"));
        assert_eq!(queue.counts(), QueueCounts::default());
    }

    #[tokio::test]
    async fn add_after_delivers_once_delay_elapses() {
        let queue = WorkQueue::default();
        queue.add_after(key("a"), Duration::from_millis(30));
        assert_eq!(queue.counts().delayed, 1);
        assert_eq!(queue.len(), 0);

        let got = tokio::time::timeout(Duration::from_secs(1), queue.get())
            .await
            .unwrap();
        assert_eq!(got, Some(key("a")));
        assert_eq!(queue.counts().delayed, 0);
    }

    #[tokio::test]
    async fn delayed_key_keeps_earliest_ready_time() {
        let queue = WorkQueue::default();
        queue.add_after(key("a"), Duration::from_secs(60));
        queue.add_after(key("a"), Duration::from_millis(10));
        assert_eq!(queue.counts().delayed, 1);

        let got = tokio::time::timeout(Duration::from_secs(1), queue.get())
            .await
            .unwrap();
        assert_eq!(got, Some(key("a")));
        queue.done(&key("a"));

        // the stale 60s heap entry must not bring the key back
        assert!(
            tokio::time::timeout(Duration::from_millis(50), queue.get())
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn rate_limited_add_counts_requeues_until_forgotten() {
        let queue = WorkQueue::new(RateLimiter::new(
            Duration::from_millis(1),
            Duration::from_millis(10),
        ));
        queue.add_rate_limited(key("a"));
        queue.add_rate_limited(key("a"));
        assert_eq!(queue.num_requeues(&key("a")), 2);

        let got = tokio::time::timeout(Duration::from_secs(1), queue.get())
            .await
            .unwrap();
        assert_eq!(got, Some(key("a")));

        queue.forget(&key("a"));
        assert_eq!(queue.num_requeues(&key("a")), 0);
    }

    #[tokio::test]
    async fn shut_down_drops_delayed_keys() {
        let queue = WorkQueue::default();
        queue.add_after(key("a"), Duration::from_millis(10));
        queue.shut_down();

        assert_eq!(queue.counts().delayed, 0);
        assert_eq!(get_now(&queue).await, None);
    }
}
