//! Idempotency guards for destructive task types.
//!
//! A failover or delete-data handler writes a "started" marker into the
//! resource parameters once it is underway. If the same task is reconciled
//! again while that handler runs, the guard sees the marker and the dispatch
//! is skipped. The marker is advisory and only meaningful inside one
//! controller process.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{DELETE_DATA_STARTED, FAILOVER_STARTED, QueueKey, TaskType};
use crate::ports::TaskStore;

#[async_trait]
pub trait IdempotencyGuard: Send + Sync {
    /// Has the operation for `key` already been started?
    async fn already_started(&self, key: &QueueKey) -> bool;
}

/// Checks a parameter marker on a freshly fetched copy of the resource.
pub struct ParameterMarkerGuard {
    store: Arc<dyn TaskStore>,
    marker: String,
}

impl ParameterMarkerGuard {
    pub fn new(store: Arc<dyn TaskStore>, marker: impl Into<String>) -> Self {
        Self {
            store,
            marker: marker.into(),
        }
    }

    pub fn marker(&self) -> &str {
        &self.marker
    }
}

#[async_trait]
impl IdempotencyGuard for ParameterMarkerGuard {
    async fn already_started(&self, key: &QueueKey) -> bool {
        // A failed fetch must never block legitimate work.
        match self.store.get(key.namespace(), key.name()).await {
            Ok(Some(task)) => task.parameter(&self.marker).is_some(),
            Ok(None) => {
                tracing::error!(%key, marker = %self.marker, "guard could not find task, proceeding");
                false
            }
            Err(err) => {
                tracing::error!(%key, marker = %self.marker, error = %err, "guard fetch failed, proceeding");
                false
            }
        }
    }
}

/// The guards installed unless overridden: failover and delete-data.
pub fn default_guards(store: &Arc<dyn TaskStore>) -> HashMap<TaskType, Arc<dyn IdempotencyGuard>> {
    let mut guards: HashMap<TaskType, Arc<dyn IdempotencyGuard>> = HashMap::new();
    guards.insert(
        TaskType::Failover,
        Arc::new(ParameterMarkerGuard::new(Arc::clone(store), FAILOVER_STARTED)),
    );
    guards.insert(
        TaskType::DeleteData,
        Arc::new(ParameterMarkerGuard::new(Arc::clone(store), DELETE_DATA_STARTED)),
    );
    guards
}
