//! TaskStore port - the cluster-state store holding task resources.
//!
//! The store is the source of truth. The controller never trusts a cached
//! copy from a notification: every unit of work starts with a fresh `get`.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::domain::{StoreError, TaskResource, TaskState};

/// Equality-based label selector (`key=value,key2=value2`).
pub type LabelSelector = BTreeMap<String, String>;

/// TaskStore reads and patches task resources.
///
/// # 設計原則
/// - Implementations synchronize themselves; callers share one `Arc<dyn TaskStore>`.
/// - Read-then-patch has no optimistic concurrency check. A concurrent edit
///   between `get` and `patch_status` can be overwritten.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Fetch a resource. `Ok(None)` means it does not exist.
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<TaskResource>, StoreError>;

    /// Overwrite the status of `task` with `state` and `message`.
    async fn patch_status(
        &self,
        task: &TaskResource,
        state: TaskState,
        message: &str,
    ) -> Result<(), StoreError>;

    /// List resources in `namespace` whose labels contain every selector pair.
    async fn get_by_selector(
        &self,
        namespace: &str,
        selector: &LabelSelector,
    ) -> Result<Vec<TaskResource>, StoreError>;

    /// Set one parameter on a resource. Handlers use this to write their
    /// "started" markers; the controller itself only reads parameters.
    async fn set_parameter(
        &self,
        namespace: &str,
        name: &str,
        key: &str,
        value: &str,
    ) -> Result<(), StoreError>;
}

/// Does `labels` satisfy every pair in `selector`?
pub fn selector_matches(selector: &LabelSelector, labels: &BTreeMap<String, String>) -> bool {
    selector
        .iter()
        .all(|(k, v)| labels.get(k).is_some_and(|actual| actual == v))
}
