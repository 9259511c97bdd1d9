use serde::{Deserialize, Serialize};

/// Point-in-time view of the work queue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueCounts {
    pub pending: usize,
    pub in_flight: usize,
    pub dirty: usize,
    pub delayed: usize,
    pub shutting_down: bool,
}
