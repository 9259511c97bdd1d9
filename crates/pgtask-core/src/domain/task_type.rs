//! TaskType - the closed set of task kinds the controller routes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// TaskType selects which handler receives a dispatched task.
///
/// The wire form is kebab-case (`"delete-data"`, `"clone-step-2"`), which is
/// what appears in `TaskSpec::task_type`. Parsing happens at dispatch time so
/// that a resource carrying an unknown type can still be fetched and patched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskType {
    MinorUpgrade,
    Failover,
    DeleteData,
    DeleteBackups,
    BackrestBackup,
    BackrestRestore,
    PgDump,
    PgRestore,
    AutoFailover,
    Workflow,
    #[serde(rename = "clone-step-1")]
    CloneStep1,
    #[serde(rename = "clone-step-2")]
    CloneStep2,
    #[serde(rename = "clone-step-3")]
    CloneStep3,
}

impl TaskType {
    pub const ALL: [TaskType; 13] = [
        TaskType::MinorUpgrade,
        TaskType::Failover,
        TaskType::DeleteData,
        TaskType::DeleteBackups,
        TaskType::BackrestBackup,
        TaskType::BackrestRestore,
        TaskType::PgDump,
        TaskType::PgRestore,
        TaskType::AutoFailover,
        TaskType::Workflow,
        TaskType::CloneStep1,
        TaskType::CloneStep2,
        TaskType::CloneStep3,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TaskType::MinorUpgrade => "minor-upgrade",
            TaskType::Failover => "failover",
            TaskType::DeleteData => "delete-data",
            TaskType::DeleteBackups => "delete-backups",
            TaskType::BackrestBackup => "backrest-backup",
            TaskType::BackrestRestore => "backrest-restore",
            TaskType::PgDump => "pg-dump",
            TaskType::PgRestore => "pg-restore",
            TaskType::AutoFailover => "auto-failover",
            TaskType::Workflow => "workflow",
            TaskType::CloneStep1 => "clone-step-1",
            TaskType::CloneStep2 => "clone-step-2",
            TaskType::CloneStep3 => "clone-step-3",
        }
    }

    /// Is this one of the three clone steps?
    pub fn is_clone_step(self) -> bool {
        matches!(
            self,
            TaskType::CloneStep1 | TaskType::CloneStep2 | TaskType::CloneStep3
        )
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a wire string names no known task type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown task type '{0}'")]
pub struct UnknownTaskType(pub String);

impl FromStr for TaskType {
    type Err = UnknownTaskType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownTaskType(s.to_string()))
    }
}
