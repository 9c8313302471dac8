//! Error types for the rate limiter
use std::fmt;
use std::time::Duration;

/// No admission slot was available and the retry budget (if any) is spent.
///
/// The wait is the time until the oldest admission in the key's window expires, measured at
/// the final denied attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Rate limit exceeded! Try again in {:.2} seconds.", .wait.as_secs_f64())]
pub struct RateLimitExceeded {
    wait: Duration,
    attempts: usize,
}

impl RateLimitExceeded {
    /// Denial after `attempts` admission attempts, the last one reporting `wait`.
    pub fn new(wait: Duration, attempts: usize) -> Self {
        Self { wait, attempts }
    }

    /// Time until a slot opens.
    pub fn wait(&self) -> Duration {
        self.wait
    }

    /// [`wait`](Self::wait) in fractional seconds.
    pub fn wait_secs(&self) -> f64 {
        self.wait.as_secs_f64()
    }

    /// Admission attempts made before giving up (initial try included).
    pub fn attempts(&self) -> usize {
        self.attempts
    }
}

/// Outcome error of a rate-limited invocation.
#[derive(Debug, Clone)]
pub enum LimitError<E> {
    /// Admission was denied; the operation never ran.
    RateLimited(RateLimitExceeded),
    /// The operation ran and failed. Carried verbatim.
    Inner(E),
}

impl<E: fmt::Display> fmt::Display for LimitError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RateLimited(denied) => write!(f, "{}", denied),
            Self::Inner(e) => write!(f, "{}", e),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for LimitError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Inner(e) => Some(e),
            Self::RateLimited(_) => None,
        }
    }
}

impl<E> From<RateLimitExceeded> for LimitError<E> {
    fn from(denied: RateLimitExceeded) -> Self {
        Self::RateLimited(denied)
    }
}

impl<E> LimitError<E> {
    /// Check if this error is a rate limit denial
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited(_))
    }
    /// Check if this error wraps an inner error.
    pub fn is_inner(&self) -> bool {
        matches!(self, Self::Inner(_))
    }
    /// Denial details, if this is a denial.
    pub fn rate_limit(&self) -> Option<&RateLimitExceeded> {
        match self {
            Self::RateLimited(denied) => Some(denied),
            Self::Inner(_) => None,
        }
    }
    /// Shortcut for the denial wait time.
    pub fn wait(&self) -> Option<Duration> {
        self.rate_limit().map(RateLimitExceeded::wait)
    }
    /// Get the inner error if this is an Inner variant
    pub fn into_inner(self) -> Option<E> {
        match self {
            Self::Inner(e) => Some(e),
            Self::RateLimited(_) => None,
        }
    }
    /// Borrow the inner error if present.
    pub fn as_inner(&self) -> Option<&E> {
        match self {
            Self::Inner(e) => Some(e),
            Self::RateLimited(_) => None,
        }
    }
}

/// Errors produced when validating limiter configuration.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// Capacity must be > 0.
    #[error("capacity must be > 0 (got {provided})")]
    InvalidCapacity {
        /// Value provided by caller.
        provided: usize,
    },
    /// Period must be non-zero.
    #[error("period must be > 0")]
    ZeroPeriod,
    /// Period in seconds was negative, zero, NaN or too large.
    #[error("period must be a positive, finite number of seconds (got {0})")]
    InvalidPeriodSecs(f64),
}
