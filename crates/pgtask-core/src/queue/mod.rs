//! Queue module: the set-semantics work queue and its rate limiter.

mod rate_limiter;
mod work_queue;

pub use rate_limiter::RateLimiter;
pub use work_queue::WorkQueue;
