//! Ports - 抽象化レイヤー
//!
//! Each trait is a seam to something outside the controller core: the
//! resource store, the task handlers, and the watch subscription.

pub mod handler;
pub mod task_store;
pub mod watch;

pub use self::handler::{HandlerContext, TaskHandler};
pub use self::task_store::{LabelSelector, TaskStore, selector_matches};
pub use self::watch::{ResourceEventHandler, deliver};
