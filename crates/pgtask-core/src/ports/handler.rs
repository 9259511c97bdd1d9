//! TaskHandler port - the external operation behind each task type.

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{HandlerError, TaskResource};
use crate::ports::TaskStore;

/// Client context handed to every handler call.
#[derive(Clone)]
pub struct HandlerContext {
    pub namespace: String,
    pub store: Arc<dyn TaskStore>,
}

/// A handler for one or more task types.
///
/// Handlers are long-running domain operations. The worker awaits the call, so
/// a slow handler occupies its worker until it returns. A returned error is
/// logged and nothing else: if a handler wants a retry it has to record that
/// on the resource itself.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn handle(&self, ctx: &HandlerContext, task: &TaskResource) -> Result<(), HandlerError>;
}
