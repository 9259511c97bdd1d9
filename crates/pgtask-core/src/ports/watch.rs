//! ResourceEventHandler port - the subscription a watch source drives.

use async_trait::async_trait;

use crate::domain::{TaskResource, WatchEvent};

/// Three capability slots, one per notification kind.
#[async_trait]
pub trait ResourceEventHandler: Send + Sync {
    async fn on_add(&self, task: &TaskResource);

    async fn on_update(&self, old: &TaskResource, new: &TaskResource);

    async fn on_delete(&self, task: &TaskResource);
}

/// Route one event to the matching slot.
pub async fn deliver(handler: &dyn ResourceEventHandler, event: &WatchEvent) {
    match event {
        WatchEvent::Added(task) => handler.on_add(task).await,
        WatchEvent::Updated { old, new } => handler.on_update(old, new).await,
        WatchEvent::Deleted(task) => handler.on_delete(task).await,
    }
}
