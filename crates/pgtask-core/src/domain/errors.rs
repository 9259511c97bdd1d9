//! Errors - エラー型
//!
//! One enum per concern. None of these ever reach the worker loop: a failed
//! unit of work is logged and the worker moves on to the next key.

use thiserror::Error;

use super::{QueueKey, TaskType};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("{0} '{1}' must not contain '/'")]
    Separator(&'static str, String),

    #[error("malformed queue key '{0}', expected namespace/name")]
    Malformed(String),
}

/// Failure talking to the resource store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("store backend error: {0}")]
    Backend(String),

    #[error("resource {0} not found")]
    NotFound(QueueKey),
}

/// Opaque handler failure. The controller only logs it.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct HandlerError(String);

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Why a unit of work was aborted before dispatch.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("resource {0} not found")]
    NotFound(QueueKey),

    #[error("fetching {key}: {source}")]
    Fetch {
        key: QueueKey,
        #[source]
        source: StoreError,
    },

    #[error("patching status of {key}: {source}")]
    PatchStatus {
        key: QueueKey,
        #[source]
        source: StoreError,
    },
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("handler for task type '{0}' is already registered")]
    AlreadyRegistered(TaskType),
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("missing handlers for task types: {0:?}")]
    MissingHandlers(Vec<TaskType>),

    #[error("worker count must be at least 1")]
    NoWorkers,
}
