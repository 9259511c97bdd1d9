//! Admission - turns watch notifications into queue keys.

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{KeyError, QueueKey, TaskResource};
use crate::ports::ResourceEventHandler;
use crate::queue::WorkQueue;

/// What the admission filter did with an Add notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Enqueued(QueueKey),
    /// Already processed, e.g. replayed after a controller restart.
    AlreadyProcessed,
    InvalidKey(KeyError),
}

/// Event handler registered on the task watch.
///
/// Only Add notifications reach the queue. Update and Delete are deliberate
/// no-ops: status patches made by the controller itself arrive as updates and
/// must not re-trigger work.
pub struct TaskEventHandler {
    queue: Arc<WorkQueue>,
}

impl TaskEventHandler {
    pub fn new(queue: Arc<WorkQueue>) -> Self {
        Self { queue }
    }

    /// Decide whether `task` is reconcilable and enqueue its key if so.
    pub fn admit(&self, task: &TaskResource) -> Admission {
        if task.state().is_processed() {
            tracing::debug!(namespace = %task.namespace, name = %task.name, "task already processed");
            return Admission::AlreadyProcessed;
        }

        match QueueKey::for_resource(task) {
            Ok(key) => {
                tracing::debug!(%key, "task putting key in queue");
                self.queue.add(key.clone());
                Admission::Enqueued(key)
            }
            Err(err) => {
                tracing::error!(namespace = %task.namespace, name = %task.name, error = %err, "cannot derive queue key");
                Admission::InvalidKey(err)
            }
        }
    }
}

#[async_trait]
impl ResourceEventHandler for TaskEventHandler {
    async fn on_add(&self, task: &TaskResource) {
        self.admit(task);
    }

    async fn on_update(&self, _old: &TaskResource, _new: &TaskResource) {}

    async fn on_delete(&self, _task: &TaskResource) {}
}
