//! TaskController - queue, workers and the shutdown handshake.

use std::sync::Arc;

use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;

use super::admission::TaskEventHandler;
use super::reconcile::Reconciler;
use super::worker_loop::WorkerPool;
use crate::queue::WorkQueue;

pub struct TaskController {
    queue: Arc<WorkQueue>,
    reconciler: Arc<Reconciler>,
    worker_count: usize,
}

impl TaskController {
    pub(crate) fn new(queue: Arc<WorkQueue>, reconciler: Arc<Reconciler>, worker_count: usize) -> Self {
        Self {
            queue,
            reconciler,
            worker_count,
        }
    }

    pub fn queue(&self) -> &Arc<WorkQueue> {
        &self.queue
    }

    pub fn reconciler(&self) -> &Arc<Reconciler> {
        &self.reconciler
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// The handler to register on the task watch.
    pub fn event_handler(&self) -> Arc<TaskEventHandler> {
        Arc::new(TaskEventHandler::new(Arc::clone(&self.queue)))
    }

    /// Run the worker pool until `stop` fires, then signal `done`.
    ///
    /// A stop request shuts the queue down; workers finish their current key,
    /// drain whatever is still pending, and exit. `done` is sent only after
    /// every worker has exited. Dropping the `stop` sender counts as a stop.
    pub async fn run(&self, stop: watch::Receiver<bool>, done: oneshot::Sender<()>) {
        let bridge = tokio::spawn(wait_for_shutdown(stop, Arc::clone(&self.queue)));

        tracing::info!(workers = self.worker_count, "starting task workers");
        let pool = WorkerPool::spawn(
            self.worker_count,
            Arc::clone(&self.queue),
            Arc::clone(&self.reconciler),
        );
        pool.join().await;

        // workers only exit after shutdown, so the bridge has already fired
        if let Err(err) = bridge.await {
            tracing::error!(error = %err, "shutdown bridge ended abnormally");
        }

        tracing::debug!("all task workers exited, writing to the done channel");
        if done.send(()).is_err() {
            tracing::debug!("done receiver dropped");
        }
    }

    /// Spawn `run` on the runtime and hand back a stop/done handle.
    pub fn start(self: Arc<Self>) -> ControllerHandle {
        let (stop_tx, stop_rx) = watch::channel(false);
        let (done_tx, done_rx) = oneshot::channel();
        let join = tokio::spawn(async move { self.run(stop_rx, done_tx).await });
        ControllerHandle {
            stop_tx,
            done_rx,
            join,
        }
    }
}

/// Waits for the stop signal, then shuts the queue down.
async fn wait_for_shutdown(mut stop: watch::Receiver<bool>, queue: Arc<WorkQueue>) {
    loop {
        if *stop.borrow_and_update() {
            break;
        }
        if stop.changed().await.is_err() {
            break;
        }
    }
    queue.shut_down();
    tracing::debug!("received stop signal, work queue told to shut down");
}

/// Handle to a controller started with `TaskController::start`.
pub struct ControllerHandle {
    stop_tx: watch::Sender<bool>,
    done_rx: oneshot::Receiver<()>,
    join: JoinHandle<()>,
}

impl ControllerHandle {
    /// Request shutdown without waiting.
    pub fn request_shutdown(&self) {
        // ignore send error: the controller may already be gone
        let _ = self.stop_tx.send(true);
    }

    /// Request shutdown and wait for the done signal.
    pub async fn shutdown_and_wait(self) {
        self.request_shutdown();
        if self.done_rx.await.is_err() {
            tracing::warn!("controller exited without signalling done");
        }
        if let Err(err) = self.join.await {
            tracing::error!(error = %err, "controller task ended abnormally");
        }
    }
}
