//! Controller configuration.
//!
//! Layered with the `config` crate: built-in defaults, then an optional file
//! (TOML, YAML or JSON, picked by extension), then `PGTASK__*` environment
//! variables, e.g. `PGTASK__WORKER_COUNT=4` or `PGTASK__LOG__LEVEL=debug`.

use std::path::Path;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const ENV_PREFIX: &str = "PGTASK";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("loading configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Number of concurrent reconcile workers.
    pub worker_count: usize,
    pub rate_limit: RateLimitConfig,
    pub log: LogConfig,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            worker_count: 1,
            rate_limit: RateLimitConfig::default(),
            log: LogConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 5,
            max_delay_ms: 1_000_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is not set.
    pub level: String,
    /// Emit JSON lines instead of human readable output.
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl ControllerConfig {
    /// Load defaults, the optional file, and the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_env(path, Environment::with_prefix(ENV_PREFIX).separator("__"))
    }

    /// Same as `load` but with an explicit environment source (handy in tests).
    pub fn load_with_env(path: Option<&Path>, env: Environment) -> Result<Self, ConfigError> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        let config: Self = builder.add_source(env).build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker_count == 0 {
            return Err(ConfigError::Invalid(
                "worker_count must be at least 1".to_string(),
            ));
        }
        if self.rate_limit.base_delay_ms > self.rate_limit.max_delay_ms {
            return Err(ConfigError::Invalid(format!(
                "rate_limit.base_delay_ms ({}) exceeds rate_limit.max_delay_ms ({})",
                self.rate_limit.base_delay_ms, self.rate_limit.max_delay_ms
            )));
        }
        Ok(())
    }
}
