//! Impls - 実装（開発用・テスト用）
//!
//! In-memory implementations of the ports. A production deployment plugs a
//! real cluster store and watch in their place.

pub mod informer;
pub mod inmem_store;

pub use self::informer::Informer;
pub use self::inmem_store::InMemoryTaskStore;
