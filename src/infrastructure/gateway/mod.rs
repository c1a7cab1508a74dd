//! Request gateway: rate limiting, retry with backoff, response caching.

pub mod cache;
pub mod gateway;
pub mod rate_limiter;
pub mod retry;

pub use cache::{cache_key, ResponseCache};
pub use gateway::{Gateway, GatewayStats};
pub use rate_limiter::{CallPermit, RateLimiter, RateState};
pub use retry::{BackoffSchedule, RetryPolicy};
