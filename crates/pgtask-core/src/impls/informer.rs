//! Informer - drives a `ResourceEventHandler` from the in-memory store.
//!
//! # フロー
//! 1. subscribe to live changes
//! 2. replay the current list as `Added` events (restart replay)
//! 3. forward live events until stopped

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;

use super::InMemoryTaskStore;
use crate::domain::WatchEvent;
use crate::ports::{ResourceEventHandler, deliver};

pub struct Informer {
    store: Arc<InMemoryTaskStore>,
}

impl Informer {
    pub fn new(store: Arc<InMemoryTaskStore>) -> Self {
        Self { store }
    }

    /// Run until `stop` flips to true or its sender is dropped.
    pub async fn run(self, handler: Arc<dyn ResourceEventHandler>, mut stop: watch::Receiver<bool>) {
        // subscribe first so nothing created during the replay is missed
        let mut events = self.store.subscribe();
        self.replay(handler.as_ref()).await;
        tracing::debug!("informer synced, watching for changes");

        loop {
            if *stop.borrow_and_update() {
                break;
            }
            tokio::select! {
                changed = stop.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                event = events.recv() => match event {
                    Ok(event) => deliver(handler.as_ref(), &event).await,
                    Err(RecvError::Lagged(missed)) => {
                        tracing::warn!(missed, "informer lagged behind the store, resyncing");
                        self.replay(handler.as_ref()).await;
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }
        tracing::debug!("informer stopped");
    }

    async fn replay(&self, handler: &dyn ResourceEventHandler) {
        for task in self.store.list().await {
            deliver(handler, &WatchEvent::Added(task)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::Mutex;

    use super::*;
    use crate::domain::{TaskResource, TaskType};

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ResourceEventHandler for Recorder {
        async fn on_add(&self, task: &TaskResource) {
            self.seen.lock().await.push(format!("add {}", task.name));
        }

        async fn on_update(&self, _old: &TaskResource, new: &TaskResource) {
            self.seen.lock().await.push(format!("update {}", new.name));
        }

        async fn on_delete(&self, task: &TaskResource) {
            self.seen.lock().await.push(format!("delete {}", task.name));
        }
    }

    #[tokio::test]
    async fn replays_existing_then_forwards_changes() {
        let store = Arc::new(InMemoryTaskStore::new());
        store
            .create(TaskResource::new("ns1", "old", TaskType::PgDump))
            .await
            .unwrap();

        let recorder = Arc::new(Recorder::default());
        let (stop_tx, stop_rx) = watch::channel(false);
        let informer = tokio::spawn(
            Informer::new(Arc::clone(&store)).run(recorder.clone(), stop_rx),
        );

        tokio::time::sleep(Duration::from_millis(20)).await;
        store
            .create(TaskResource::new("ns1", "new", TaskType::PgDump))
            .await
            .unwrap();
        store.delete("ns1", "old").await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        stop_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), informer)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(
            *recorder.seen.lock().await,
            vec!["add old", "add new", "delete old"]
        );
    }

    #[tokio::test]
    async fn stops_when_sender_is_dropped() {
        let store = Arc::new(InMemoryTaskStore::new());
        let (stop_tx, stop_rx) = watch::channel(false);
        let informer = tokio::spawn(
            Informer::new(store).run(Arc::new(Recorder::default()), stop_rx),
        );

        drop(stop_tx);
        tokio::time::timeout(Duration::from_secs(1), informer)
            .await
            .unwrap()
            .unwrap();
    }
}
