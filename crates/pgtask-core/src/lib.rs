//! pgtask-core
//!
//! Reconciliation core of the pgtask controller: watch notifications become
//! queue keys, a worker pool drains the queue, and every key is reconciled by
//! fetching the task, marking it processed and dispatching it to its handler.
//!
//! # モジュール構成
//! - **domain**: task resource, task type, queue key, errors, watch events
//! - **ports**: TaskStore, TaskHandler, ResourceEventHandler
//! - **queue**: set-semantics WorkQueue + RateLimiter
//! - **app**: admission, reconcile, guards, worker pool, controller, builder
//! - **impls**: InMemoryTaskStore, Informer（開発用）
//! - **config** / **logging** / **observability**: ambient concerns

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod logging;
pub mod observability;
pub mod ports;
pub mod queue;
