//! WorkerLoop - キューを消化するワーカー群
//!
//! # フロー
//! 1. WorkQueue::get() で key 取得（shutdown なら終了）
//! 2. Reconciler::reconcile() で処理
//! 3. WorkQueue::done() で key を解放（成功・失敗に関係なく 1 回だけ）

use std::sync::Arc;

use tokio::task::JoinHandle;

use super::reconcile::{ReconcileOutcome, Reconciler};
use crate::domain::QueueKey;
use crate::queue::WorkQueue;

/// Worker pool handle.
/// - workers stop on their own once the queue reports shutdown
/// - `join()` で全ワーカーの終了を待てる
pub struct WorkerPool {
    joins: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `n` workers.
    pub fn spawn(n: usize, queue: Arc<WorkQueue>, reconciler: Arc<Reconciler>) -> Self {
        let mut joins = Vec::with_capacity(n);
        for worker_id in 0..n {
            let q = Arc::clone(&queue);
            let r = Arc::clone(&reconciler);
            joins.push(tokio::spawn(async move {
                worker_loop(worker_id, q, r).await;
            }));
        }
        Self { joins }
    }

    pub fn len(&self) -> usize {
        self.joins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joins.is_empty()
    }

    /// Wait until every worker has exited.
    pub async fn join(self) {
        for (worker_id, join) in self.joins.into_iter().enumerate() {
            if let Err(err) = join.await {
                tracing::error!(worker = worker_id, error = %err, "worker task ended abnormally");
            }
        }
    }
}

/// Marks the key done when dropped, on every exit path of one unit.
struct DoneGuard<'a> {
    queue: &'a WorkQueue,
    key: &'a QueueKey,
}

impl Drop for DoneGuard<'_> {
    fn drop(&mut self) {
        self.queue.done(self.key);
    }
}

async fn worker_loop(worker_id: usize, queue: Arc<WorkQueue>, reconciler: Arc<Reconciler>) {
    while let Some(key) = queue.get().await {
        let _done = DoneGuard {
            queue: &queue,
            key: &key,
        };
        tracing::debug!(worker = worker_id, %key, "working on key");

        // a panicking handler must not take the worker down with it
        let unit = tokio::spawn({
            let reconciler = Arc::clone(&reconciler);
            let key = key.clone();
            async move { reconciler.reconcile(&key).await }
        });
        match unit.await {
            Ok(Ok(ReconcileOutcome::Dispatched(task_type))) => {
                tracing::info!(worker = worker_id, %key, %task_type, "task dispatched");
            }
            Ok(Ok(outcome)) => {
                tracing::debug!(worker = worker_id, %key, ?outcome, "task reconciled without dispatch");
            }
            Ok(Err(err)) => {
                tracing::error!(worker = worker_id, %key, error = %err, "reconcile aborted");
            }
            Err(err) => {
                tracing::error!(worker = worker_id, %key, error = %err, "reconcile panicked");
            }
        }

        // no retry is wired, so there is no backoff history to keep
        queue.forget(&key);
    }
    tracing::debug!(worker = worker_id, "worker queue has been shut down, exiting");
}
