//! Domain model (task resources, task types, queue keys, errors, events).

pub mod errors;
pub mod events;
pub mod key;
pub mod task;
pub mod task_type;

pub use self::errors::{
    BuildError, HandlerError, KeyError, ReconcileError, RegistryError, StoreError,
};
pub use self::events::WatchEvent;
pub use self::key::QueueKey;
pub use self::task::{
    DELETE_DATA_STARTED, FAILOVER_STARTED, PROCESSED_MESSAGE, TaskResource, TaskSpec, TaskState,
    TaskStatus, WORKFLOW_ID,
};
pub use self::task_type::{TaskType, UnknownTaskType};
