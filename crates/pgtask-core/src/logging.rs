//! Structured logging setup.

use std::sync::OnceLock;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::LogConfig;

static LOGGER_INITIALIZED: OnceLock<bool> = OnceLock::new();

/// Install the global tracing subscriber once.
///
/// `RUST_LOG` wins over `config.level`. If some other subscriber is already
/// installed (tests, an embedding process) it is left in place.
///
/// Returns whether this crate's subscriber is the installed one.
pub fn init_logging(config: &LogConfig) -> bool {
    *LOGGER_INITIALIZED.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&config.level))
            .unwrap_or_else(|_| EnvFilter::new("info"));

        let registry = tracing_subscriber::registry().with(filter);
        let result = if config.json {
            registry
                .with(fmt::layer().json().with_target(true).with_thread_ids(true))
                .try_init()
        } else {
            registry
                .with(fmt::layer().with_target(true).with_thread_ids(true))
                .try_init()
        };

        match result {
            Ok(()) => {
                tracing::info!(level = %config.level, json = config.json, "logging initialized");
                true
            }
            Err(_) => {
                tracing::debug!("global tracing subscriber already initialized, keeping it");
                false
            }
        }
    })
}
