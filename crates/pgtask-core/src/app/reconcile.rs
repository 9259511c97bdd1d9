//! Reconcile - one unit of work for one queue key.
//!
//! # フロー
//! 1. fetch the live resource by key
//! 2. patch status to Processed (always, before any dispatch)
//! 3. run the idempotency guard of the task type, if it has one
//! 4. dispatch to the registered handler and wait for it

use std::collections::HashMap;
use std::sync::Arc;

use super::guard::IdempotencyGuard;
use super::runtime::HandlerRegistry;
use crate::domain::{
    PROCESSED_MESSAGE, QueueKey, ReconcileError, TaskResource, TaskState, TaskType, WORKFLOW_ID,
};
use crate::ports::{HandlerContext, TaskStore};

/// How a unit of work ended when it got past the status patch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The handler ran and returned Ok.
    Dispatched(TaskType),
    /// The handler ran and returned an error (logged, not retried).
    HandlerFailed(TaskType),
    /// The guard found the operation already started.
    DuplicateSkipped(TaskType),
    /// Known type without a registered handler.
    NoHandler(TaskType),
    /// The resource names a task type this controller does not know.
    UnknownType(String),
}

pub struct Reconciler {
    store: Arc<dyn TaskStore>,
    registry: Arc<HandlerRegistry>,
    guards: HashMap<TaskType, Arc<dyn IdempotencyGuard>>,
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn TaskStore>,
        registry: Arc<HandlerRegistry>,
        guards: HashMap<TaskType, Arc<dyn IdempotencyGuard>>,
    ) -> Self {
        Self {
            store,
            registry,
            guards,
        }
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Process one key. Errors abort the unit; the caller still marks the key done.
    #[tracing::instrument(level = "debug", skip_all, fields(key = %key))]
    pub async fn reconcile(&self, key: &QueueKey) -> Result<ReconcileOutcome, ReconcileError> {
        tracing::debug!(namespace = key.namespace(), name = key.name(), "queue got key");

        let task = self
            .store
            .get(key.namespace(), key.name())
            .await
            .map_err(|source| ReconcileError::Fetch {
                key: key.clone(),
                source,
            })?
            .ok_or_else(|| ReconcileError::NotFound(key.clone()))?;

        // Unconditional: a task that turns out to be a duplicate is still
        // marked Processed, so it will not be admitted again.
        self.store
            .patch_status(&task, TaskState::Processed, PROCESSED_MESSAGE)
            .await
            .map_err(|source| ReconcileError::PatchStatus {
                key: key.clone(),
                source,
            })?;

        let task_type = match task.task_type() {
            Ok(task_type) => task_type,
            Err(err) => {
                tracing::debug!(error = %err, "unknown task type on task added");
                return Ok(ReconcileOutcome::UnknownType(task.spec.task_type.clone()));
            }
        };

        if let Some(guard) = self.guards.get(&task_type)
            && guard.already_started(key).await
        {
            tracing::debug!(%task_type, "skipping duplicate task");
            return Ok(ReconcileOutcome::DuplicateSkipped(task_type));
        }

        Ok(self.dispatch(key, task_type, &task).await)
    }

    async fn dispatch(&self, key: &QueueKey, task_type: TaskType, task: &TaskResource) -> ReconcileOutcome {
        if task_type == TaskType::Workflow {
            tracing::debug!(workflow_id = task.parameter(WORKFLOW_ID).unwrap_or_default(), "workflow task added");
        }

        let Some(handler) = self.registry.get(task_type) else {
            tracing::debug!(%task_type, "no handler registered, nothing to do");
            return ReconcileOutcome::NoHandler(task_type);
        };

        tracing::debug!(%task_type, "task added, dispatching");
        let ctx = HandlerContext {
            namespace: key.namespace().to_string(),
            store: Arc::clone(&self.store),
        };
        match handler.handle(&ctx, task).await {
            Ok(()) => ReconcileOutcome::Dispatched(task_type),
            Err(err) => {
                tracing::error!(%task_type, error = %err, "task handler failed");
                ReconcileOutcome::HandlerFailed(task_type)
            }
        }
    }
}
