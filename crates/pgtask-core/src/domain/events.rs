//! Events - watch notifications for task resources.

use super::TaskResource;

/// A change notification delivered by a watch source.
#[derive(Debug, Clone, PartialEq)]
pub enum WatchEvent {
    Added(TaskResource),
    Updated {
        old: TaskResource,
        new: TaskResource,
    },
    Deleted(TaskResource),
}

impl WatchEvent {
    /// The resource the event is about (the new version for updates).
    pub fn resource(&self) -> &TaskResource {
        match self {
            WatchEvent::Added(task) | WatchEvent::Deleted(task) => task,
            WatchEvent::Updated { new, .. } => new,
        }
    }
}
