//! ControllerBuilder - wiring of store, handlers, guards and queue.
//!
//! # Fail-fast 設計
//! - expect_handlers() で必須の task type を宣言
//! - build() 時に「期待集合 ⊆ 登録済み集合」をチェック
//! - 不足があれば BuildError を返す

use std::collections::HashMap;
use std::sync::Arc;

use super::controller::TaskController;
use super::guard::{IdempotencyGuard, default_guards};
use super::reconcile::Reconciler;
use super::runtime::HandlerRegistry;
use crate::config::ControllerConfig;
use crate::domain::{BuildError, RegistryError, TaskType};
use crate::ports::{TaskHandler, TaskStore};
use crate::queue::{RateLimiter, WorkQueue};

/// Builds a `TaskController`.
///
/// # 使用例
/// ```ignore
/// let controller = ControllerBuilder::from_config(store, &config)
///     .register(TaskType::PgDump, Arc::new(DumpHandler))?
///     .expect_handlers(&[TaskType::PgDump])
///     .build()?;
/// ```
pub struct ControllerBuilder {
    store: Arc<dyn TaskStore>,
    registry: HandlerRegistry,
    guards: HashMap<TaskType, Arc<dyn IdempotencyGuard>>,
    expected: Option<Vec<TaskType>>,
    worker_count: usize,
    rate_limiter: RateLimiter,
}

impl ControllerBuilder {
    /// One worker, default backoff, failover and delete-data guards installed.
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        let guards = default_guards(&store);
        Self {
            store,
            registry: HandlerRegistry::new(),
            guards,
            expected: None,
            worker_count: 1,
            rate_limiter: RateLimiter::default(),
        }
    }

    pub fn from_config(store: Arc<dyn TaskStore>, config: &ControllerConfig) -> Self {
        Self::new(store)
            .worker_count(config.worker_count)
            .rate_limiter(RateLimiter::from_config(&config.rate_limit))
    }

    pub fn register(
        mut self,
        task_type: TaskType,
        handler: Arc<dyn TaskHandler>,
    ) -> Result<Self, RegistryError> {
        self.registry.register(task_type, handler)?;
        Ok(self)
    }

    pub fn register_all(
        mut self,
        task_types: &[TaskType],
        handler: Arc<dyn TaskHandler>,
    ) -> Result<Self, RegistryError> {
        self.registry.register_all(task_types, handler)?;
        Ok(self)
    }

    /// Replace (or add) the guard of a task type.
    pub fn guard(mut self, task_type: TaskType, guard: Arc<dyn IdempotencyGuard>) -> Self {
        self.guards.insert(task_type, guard);
        self
    }

    pub fn worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    pub fn rate_limiter(mut self, rate_limiter: RateLimiter) -> Self {
        self.rate_limiter = rate_limiter;
        self
    }

    /// Task types that must have a handler for `build` to succeed.
    pub fn expect_handlers(mut self, task_types: &[TaskType]) -> Self {
        self.expected = Some(task_types.to_vec());
        self
    }

    pub fn build(self) -> Result<TaskController, BuildError> {
        if self.worker_count == 0 {
            return Err(BuildError::NoWorkers);
        }
        if let Some(expected) = &self.expected {
            let missing: Vec<TaskType> = expected
                .iter()
                .filter(|t| self.registry.get(**t).is_none())
                .copied()
                .collect();
            if !missing.is_empty() {
                return Err(BuildError::MissingHandlers(missing));
            }
        }

        tracing::debug!(
            handlers = ?self.registry.registered_types(),
            guarded = self.guards.len(),
            workers = self.worker_count,
            "task controller built"
        );
        let reconciler = Reconciler::new(self.store, Arc::new(self.registry), self.guards);
        Ok(TaskController::new(
            Arc::new(WorkQueue::new(self.rate_limiter)),
            Arc::new(reconciler),
            self.worker_count,
        ))
    }
}
