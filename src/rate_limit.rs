//! Sliding-window-log admission primitives.
//!
//! This module provides the building blocks for rate limiting:
//! - [`Decision`]: The result of one admission attempt (Admitted/Denied).
//! - [`Window`]: Admission instants for one key, oldest first.
//! - [`WindowStore`]: Owns every key's window and makes admission decisions under one lock.
//! - [`KeyExtractor`]: Maps call arguments to a partition key.
//! - [`RateLimitLayer`]: Tower middleware that enforces the limit.
//!
//! # Architecture
//!
//! - **Store**: `WindowStore` is synchronous and never sleeps. Lookup, eviction, the capacity
//!   check and the append all happen in one critical section, so two callers can never both
//!   take the last free slot.
//! - **Policy**: [`RateLimiter`](crate::RateLimiter) turns a denial into either an error or an
//!   async wait-and-retry, always outside the store's lock.
//! - **Middleware**: `RateLimitLayer` wraps any tower service and asks the limiter before each
//!   call.

use std::time::Duration;

pub mod key;
pub mod middleware;
pub mod store;
pub mod window;

pub use key::KeyExtractor;
pub use middleware::{RateLimitLayer, RateLimitService};
pub use store::WindowStore;
pub use window::Window;

/// The decision returned by one admission attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// A slot was reserved for this attempt.
    Admitted {
        /// Free slots left in the window after this admission.
        remaining: usize,
    },
    /// The window is full.
    Denied {
        /// Time until the oldest retained admission expires. Always non-zero.
        wait: Duration,
    },
}

impl Decision {
    /// Helper to check if admitted.
    pub fn is_admitted(&self) -> bool {
        matches!(self, Decision::Admitted { .. })
    }

    /// Helper to check if denied.
    pub fn is_denied(&self) -> bool {
        matches!(self, Decision::Denied { .. })
    }

    /// Wait time if denied.
    pub fn wait(&self) -> Option<Duration> {
        match self {
            Decision::Denied { wait } => Some(*wait),
            Decision::Admitted { .. } => None,
        }
    }

    /// Wait time in fractional seconds if denied.
    pub fn wait_secs(&self) -> Option<f64> {
        self.wait().map(|w| w.as_secs_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decision_helpers() {
        let admitted = Decision::Admitted { remaining: 2 };
        assert!(admitted.is_admitted());
        assert!(!admitted.is_denied());
        assert_eq!(admitted.wait(), None);

        let denied = Decision::Denied { wait: Duration::from_millis(800) };
        assert!(denied.is_denied());
        assert_eq!(denied.wait(), Some(Duration::from_millis(800)));
        assert_eq!(denied.wait_secs(), Some(0.8));
    }
}
