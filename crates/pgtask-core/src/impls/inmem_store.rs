//! InMemoryTaskStore - 開発用の resource store
//!
//! Holds task resources in a map and broadcasts a `WatchEvent` for every
//! change, which is what the `Informer` listens to.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, broadcast};

use crate::domain::{QueueKey, StoreError, TaskResource, TaskState, WatchEvent};
use crate::ports::{LabelSelector, TaskStore, selector_matches};

const EVENT_BUFFER: usize = 1024;

type ObjectKey = (String, String);

pub struct InMemoryTaskStore {
    tasks: Mutex<BTreeMap<ObjectKey, TaskResource>>,
    events: broadcast::Sender<WatchEvent>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            tasks: Mutex::new(BTreeMap::new()),
            events,
        }
    }

    /// Receive every change made after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<WatchEvent> {
        self.events.subscribe()
    }

    /// Insert a new resource and announce it.
    pub async fn create(&self, task: TaskResource) -> Result<(), StoreError> {
        let key = QueueKey::for_resource(&task)
            .map_err(|e| StoreError::Backend(format!("invalid resource identity: {e}")))?;
        {
            let mut tasks = self.tasks.lock().await;
            let object_key = object_key(key.namespace(), key.name());
            if tasks.contains_key(&object_key) {
                return Err(StoreError::Backend(format!("resource {key} already exists")));
            }
            tasks.insert(object_key, task.clone());
        }
        self.publish(WatchEvent::Added(task));
        Ok(())
    }

    /// Replace an existing resource and announce the change.
    pub async fn update(&self, task: TaskResource) -> Result<(), StoreError> {
        let object_key = object_key(&task.namespace, &task.name);
        let old = {
            let mut tasks = self.tasks.lock().await;
            let Some(slot) = tasks.get_mut(&object_key) else {
                return Err(not_found(&task.namespace, &task.name));
            };
            std::mem::replace(slot, task.clone())
        };
        self.publish(WatchEvent::Updated { old, new: task });
        Ok(())
    }

    pub async fn delete(&self, namespace: &str, name: &str) -> Result<TaskResource, StoreError> {
        let removed = self
            .tasks
            .lock()
            .await
            .remove(&object_key(namespace, name))
            .ok_or_else(|| not_found(namespace, name))?;
        self.publish(WatchEvent::Deleted(removed.clone()));
        Ok(removed)
    }

    pub async fn list(&self) -> Vec<TaskResource> {
        self.tasks.lock().await.values().cloned().collect()
    }

    /// Apply `mutate` to a stored resource and announce the change.
    async fn modify<F>(&self, namespace: &str, name: &str, mutate: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut TaskResource) + Send,
    {
        let (old, new) = {
            let mut tasks = self.tasks.lock().await;
            let Some(slot) = tasks.get_mut(&object_key(namespace, name)) else {
                return Err(not_found(namespace, name));
            };
            let old = slot.clone();
            mutate(slot);
            (old, slot.clone())
        };
        self.publish(WatchEvent::Updated { old, new });
        Ok(())
    }

    fn publish(&self, event: WatchEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }
}

impl Default for InMemoryTaskStore {
    fn default() -> Self {
        Self::new()
    }
}

fn object_key(namespace: &str, name: &str) -> ObjectKey {
    (namespace.to_string(), name.to_string())
}

fn not_found(namespace: &str, name: &str) -> StoreError {
    match QueueKey::new(namespace, name) {
        Ok(key) => StoreError::NotFound(key),
        Err(e) => StoreError::Backend(format!("invalid resource identity: {e}")),
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<TaskResource>, StoreError> {
        Ok(self
            .tasks
            .lock()
            .await
            .get(&object_key(namespace, name))
            .cloned())
    }

    async fn patch_status(
        &self,
        task: &TaskResource,
        state: TaskState,
        message: &str,
    ) -> Result<(), StoreError> {
        let message = message.to_string();
        self.modify(&task.namespace, &task.name, move |stored| {
            stored.status.state = state;
            stored.status.message = message;
            stored.status.updated_at = Some(Utc::now());
        })
        .await
    }

    async fn get_by_selector(
        &self,
        namespace: &str,
        selector: &LabelSelector,
    ) -> Result<Vec<TaskResource>, StoreError> {
        Ok(self
            .tasks
            .lock()
            .await
            .values()
            .filter(|t| t.namespace == namespace && selector_matches(selector, &t.labels))
            .cloned()
            .collect())
    }

    async fn set_parameter(
        &self,
        namespace: &str,
        name: &str,
        key: &str,
        value: &str,
    ) -> Result<(), StoreError> {
        let (key, value) = (key.to_string(), value.to_string());
        self.modify(namespace, name, move |stored| {
            stored.spec.parameters.insert(key, value);
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{PROCESSED_MESSAGE, TaskType};

    #[tokio::test]
    async fn create_then_get() {
        let store = InMemoryTaskStore::new();
        let task = TaskResource::new("ns1", "taskA", TaskType::PgDump);
        store.create(task.clone()).await.unwrap();

        assert_eq!(store.get("ns1", "taskA").await.unwrap(), Some(task));
        assert_eq!(store.get("ns1", "missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn create_rejects_duplicates() {
        let store = InMemoryTaskStore::new();
        let task = TaskResource::new("ns1", "taskA", TaskType::PgDump);
        store.create(task.clone()).await.unwrap();
        assert!(matches!(
            store.create(task).await,
            Err(StoreError::Backend(_))
        ));
    }

    #[tokio::test]
    async fn patch_status_marks_processed() {
        let store = InMemoryTaskStore::new();
        let task = TaskResource::new("ns1", "taskA", TaskType::PgDump);
        store.create(task.clone()).await.unwrap();

        store
            .patch_status(&task, TaskState::Processed, PROCESSED_MESSAGE)
            .await
            .unwrap();

        let stored = store.get("ns1", "taskA").await.unwrap().unwrap();
        assert_eq!(stored.status.state, TaskState::Processed);
        assert_eq!(stored.status.message, PROCESSED_MESSAGE);
        assert!(stored.status.updated_at.is_some());
    }

    #[tokio::test]
    async fn patch_status_of_missing_resource_fails() {
        let store = InMemoryTaskStore::new();
        let task = TaskResource::new("ns1", "gone", TaskType::PgDump);
        let err = store
            .patch_status(&task, TaskState::Processed, PROCESSED_MESSAGE)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn set_parameter_writes_marker() {
        let store = InMemoryTaskStore::new();
        store
            .create(TaskResource::new("ns1", "taskA", TaskType::Failover))
            .await
            .unwrap();
        store
            .set_parameter("ns1", "taskA", "failover-started", "true")
            .await
            .unwrap();

        let stored = store.get("ns1", "taskA").await.unwrap().unwrap();
        assert_eq!(stored.parameter("failover-started"), Some("true"));
    }

    #[tokio::test]
    async fn get_by_selector_filters_namespace_and_labels() {
        let store = InMemoryTaskStore::new();
        store
            .create(TaskResource::new("ns1", "a", TaskType::PgDump).with_label("pg-cluster", "c1"))
            .await
            .unwrap();
        store
            .create(TaskResource::new("ns1", "b", TaskType::PgDump).with_label("pg-cluster", "c2"))
            .await
            .unwrap();
        store
            .create(TaskResource::new("ns2", "c", TaskType::PgDump).with_label("pg-cluster", "c1"))
            .await
            .unwrap();

        let selector: LabelSelector = [("pg-cluster".to_string(), "c1".to_string())].into();
        let found = store.get_by_selector("ns1", &selector).await.unwrap();
        let names: Vec<_> = found.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["a"]);
    }

    #[tokio::test]
    async fn changes_are_broadcast() {
        let store = InMemoryTaskStore::new();
        let mut events = store.subscribe();
        let task = TaskResource::new("ns1", "taskA", TaskType::PgDump);

        store.create(task.clone()).await.unwrap();
        store
            .patch_status(&task, TaskState::Processed, PROCESSED_MESSAGE)
            .await
            .unwrap();
        store.delete("ns1", "taskA").await.unwrap();

        assert!(matches!(events.recv().await.unwrap(), WatchEvent::Added(_)));
        match events.recv().await.unwrap() {
            WatchEvent::Updated { old, new } => {
                assert_eq!(old.state(), TaskState::Submitted);
                assert_eq!(new.state(), TaskState::Processed);
            }
            other => panic!("expected update, got {other:?}"),
        }
        assert!(matches!(events.recv().await.unwrap(), WatchEvent::Deleted(_)));
    }
}
