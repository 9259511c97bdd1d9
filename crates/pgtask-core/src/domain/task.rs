use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::TaskType;
use super::task_type::UnknownTaskType;

/// Parameter key a failover handler sets once it has started.
pub const FAILOVER_STARTED: &str = "failover-started";

/// Parameter key a delete-data handler sets once its job has started.
pub const DELETE_DATA_STARTED: &str = "delete-data-started";

/// Parameter carrying the workflow id of a workflow task.
pub const WORKFLOW_ID: &str = "workflowid";

/// Status message written on the Submitted -> Processed transition.
pub const PROCESSED_MESSAGE: &str = "Successfully processed Pgtask by controller";

/// Lifecycle state of a task resource.
///
/// State transitions:
/// - Submitted -> Processed (once, by the controller)
///
/// There is no way back: a Processed task is never re-enqueued.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    #[default]
    Submitted,
    Processed,
}

impl TaskState {
    pub fn is_processed(self) -> bool {
        matches!(self, TaskState::Processed)
    }
}

/// What the submitter asked for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSpec {
    /// Wire name of the task type. Kept as a string so unknown types survive a round trip.
    pub task_type: String,

    /// Handler arguments and dedup markers.
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStatus {
    #[serde(default)]
    pub state: TaskState,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// The task resource under reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskResource {
    pub namespace: String,
    pub name: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    pub spec: TaskSpec,
    #[serde(default)]
    pub status: TaskStatus,
}

impl TaskResource {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>, task_type: TaskType) -> Self {
        Self::with_raw_type(namespace, name, task_type.as_str())
    }

    /// Build a resource whose task type string is not validated.
    pub fn with_raw_type(
        namespace: impl Into<String>,
        name: impl Into<String>,
        task_type: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            labels: BTreeMap::new(),
            spec: TaskSpec {
                task_type: task_type.into(),
                parameters: BTreeMap::new(),
            },
            status: TaskStatus::default(),
        }
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.spec.parameters.insert(key.into(), value.into());
        self
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn with_state(mut self, state: TaskState) -> Self {
        self.status.state = state;
        self
    }

    pub fn task_type(&self) -> Result<TaskType, UnknownTaskType> {
        self.spec.task_type.parse()
    }

    pub fn state(&self) -> TaskState {
        self.status.state
    }

    /// Non-empty parameter value, if any. An empty string counts as unset.
    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.spec
            .parameters
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_resource_starts_submitted() {
        let task = TaskResource::new("ns1", "taskA", TaskType::DeleteData);
        assert_eq!(task.state(), TaskState::Submitted);
        assert_eq!(task.task_type().unwrap(), TaskType::DeleteData);
    }

    #[test]
    fn empty_parameter_counts_as_unset() {
        let task = TaskResource::new("ns1", "taskA", TaskType::Failover)
            .with_parameter(FAILOVER_STARTED, "");
        assert_eq!(task.parameter(FAILOVER_STARTED), None);

        let task = task.with_parameter(FAILOVER_STARTED, "true");
        assert_eq!(task.parameter(FAILOVER_STARTED), Some("true"));
    }

    #[test]
    fn deserializes_camel_case_with_defaults() {
        let json = serde_json::json!({
            "namespace": "ns1",
            "name": "taskA",
            "spec": { "taskType": "pg-dump", "parameters": { "db": "app" } }
        });
        let task: TaskResource = serde_json::from_value(json).unwrap();
        assert_eq!(task.task_type().unwrap(), TaskType::PgDump);
        assert_eq!(task.state(), TaskState::Submitted);
        assert_eq!(task.parameter("db"), Some("app"));
    }

    #[test]
    fn unknown_type_survives_deserialization() {
        let json = serde_json::json!({
            "namespace": "ns1",
            "name": "taskA",
            "spec": { "taskType": "reindex" },
            "status": { "state": "processed", "message": "done" }
        });
        let task: TaskResource = serde_json::from_value(json).unwrap();
        assert!(task.task_type().is_err());
        assert!(task.state().is_processed());
    }
}
