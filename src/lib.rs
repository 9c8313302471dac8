#![forbid(unsafe_code)]

//! # slidegate
//!
//! Sliding-window-log rate limiting for async Rust: at most N calls per rolling period,
//! globally or per key, with optional wait-and-retry.
//!
//! ## Features
//!
//! - **Exact sliding window**: every admission instant is recorded; slots reopen one at a time
//!   as individual admissions age out
//! - **Per-key partitions** via a pluggable key extractor
//! - **Auto-retry** that sleeps for exactly the reported wait, a bounded number of times
//! - **Tower middleware** and a named-callable wrapper
//! - **Injectable clock and sleeper** for deterministic tests
//!
//! ## Quick Start
//!
//! ```rust
//! use slidegate::{LimitError, RateLimiter};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let limiter = RateLimiter::builder()
//!         .capacity(2)
//!         .period(Duration::from_secs(1))
//!         .build()
//!         .unwrap();
//!
//!     let fetch = limiter.wrap("fetch", |path: &'static str| async move {
//!         Ok::<_, std::io::Error>(path.len())
//!     });
//!
//!     assert_eq!(fetch.call("/a").await.unwrap(), 2);
//!     assert_eq!(fetch.call("/bc").await.unwrap(), 3);
//!     match fetch.call("/d").await {
//!         Err(LimitError::RateLimited(denied)) => assert!(denied.wait_secs() > 0.0),
//!         other => panic!("expected a denial, got {:?}", other),
//!     }
//! }
//! ```

pub mod clock;
pub mod config;
pub mod error;
pub mod limiter;
pub mod prelude;
pub mod rate_limit;
pub mod sleeper;
pub mod telemetry;

// Re-exports
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::{RateLimiterConfig, DEFAULT_MAX_RETRIES};
pub use error::{ConfigError, LimitError, RateLimitExceeded};
pub use limiter::{Limited, RateLimiter, RateLimiterBuilder};
pub use rate_limit::{Decision, KeyExtractor, RateLimitLayer, RateLimitService, WindowStore};
pub use sleeper::{InstantSleeper, Sleeper, TokioSleeper, TrackingSleeper};
