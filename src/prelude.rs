//! Convenient re-exports for common slidegate types.
pub use crate::{
    clock::{Clock, ManualClock, MonotonicClock},
    config::RateLimiterConfig,
    error::{ConfigError, LimitError, RateLimitExceeded},
    limiter::{Limited, RateLimiter, RateLimiterBuilder},
    rate_limit::{Decision, KeyExtractor, RateLimitLayer},
    sleeper::{Sleeper, TokioSleeper},
    telemetry::{LimiterEvent, LogSink, MemorySink, NullSink, TelemetrySink},
};
