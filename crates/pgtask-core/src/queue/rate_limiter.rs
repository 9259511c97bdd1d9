//! Rate limiter: decides per-key requeue delays.

use std::collections::HashMap;
use std::time::Duration;

use crate::config::RateLimitConfig;
use crate::domain::QueueKey;

/// Per-key exponential failure backoff.
///
/// Every call to `when` counts as one more requeue of that key:
/// delay = base_delay * multiplier^(requeues so far), capped at `max_delay`.
///
/// Example with base_delay=5ms, multiplier=2.0:
/// - 1st requeue: 5ms
/// - 2nd requeue: 10ms
/// - 3rd requeue: 20ms
#[derive(Debug, Clone)]
pub struct RateLimiter {
    /// Delay for the first requeue.
    pub base_delay: Duration,

    /// Backoff multiplier.
    pub multiplier: f64,

    /// Upper bound for any single delay.
    pub max_delay: Duration,

    requeues: HashMap<QueueKey, u32>,
}

impl RateLimiter {
    pub fn new(base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            base_delay,
            multiplier: 2.0,
            max_delay,
            requeues: HashMap::new(),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(
            Duration::from_millis(config.base_delay_ms),
            Duration::from_millis(config.max_delay_ms),
        )
    }

    /// Delay before `key` may run again. Records one more requeue.
    pub fn when(&mut self, key: &QueueKey) -> Duration {
        let requeues = self.requeues.entry(key.clone()).or_insert(0);
        let exponent = *requeues;
        *requeues = requeues.saturating_add(1);
        self.delay_for(exponent)
    }

    /// Drop the requeue history of `key`.
    pub fn forget(&mut self, key: &QueueKey) {
        self.requeues.remove(key);
    }

    pub fn num_requeues(&self, key: &QueueKey) -> u32 {
        self.requeues.get(key).copied().unwrap_or(0)
    }

    fn delay_for(&self, exponent: u32) -> Duration {
        let exponent = i32::try_from(exponent).unwrap_or(i32::MAX);
        let secs = self.base_delay.as_secs_f64() * self.multiplier.powi(exponent);
        // powi overflows to inf long before u32::MAX requeues
        if !secs.is_finite() || secs >= self.max_delay.as_secs_f64() {
            return self.max_delay;
        }
        Duration::from_secs_f64(secs)
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::from_config(&RateLimitConfig::default())
    }
}
