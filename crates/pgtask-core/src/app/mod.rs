//! App - アプリケーション層
//!
//! このモジュールは、ports と queue を組み合わせてコントローラを実装します。
//!
//! # 主要コンポーネント
//! - **TaskEventHandler**: watch 通知の admission filter
//! - **Reconciler**: key 1 件分の処理（fetch → status patch → guard → dispatch）
//! - **WorkerPool**: キューを消化するワーカー群
//! - **TaskController**: 停止シグナルと done シグナルの橋渡し
//! - **ControllerBuilder**: 構築と起動時検証

pub mod admission;
pub mod builder;
pub mod controller;
pub mod guard;
pub mod reconcile;
pub mod runtime;
pub mod worker_loop;

// 主要な型を再エクスポート
pub use self::admission::{Admission, TaskEventHandler};
pub use self::builder::ControllerBuilder;
pub use self::controller::{ControllerHandle, TaskController};
pub use self::guard::{IdempotencyGuard, ParameterMarkerGuard, default_guards};
pub use self::reconcile::{ReconcileOutcome, Reconciler};
pub use self::runtime::HandlerRegistry;
pub use self::worker_loop::WorkerPool;
