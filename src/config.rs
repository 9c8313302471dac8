//! Limiter configuration.

use crate::error::ConfigError;
use std::time::Duration;

/// Retry budget used when none is configured.
pub const DEFAULT_MAX_RETRIES: usize = 3;

/// Validated, immutable settings for one limiter.
///
/// `max_retries` only matters when `auto_retry` is on; see [`max_attempts`](Self::max_attempts).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "RawConfig"))]
pub struct RateLimiterConfig {
    capacity: usize,
    period: Duration,
    auto_retry: bool,
    max_retries: usize,
}

impl RateLimiterConfig {
    /// At most `capacity` admissions per rolling `period`. Retry disabled.
    pub fn new(capacity: usize, period: Duration) -> Result<Self, ConfigError> {
        let cfg = Self { capacity, period, auto_retry: false, max_retries: DEFAULT_MAX_RETRIES };
        cfg.validate()?;
        Ok(cfg)
    }

    /// Like [`new`](Self::new) with the period given in fractional seconds.
    pub fn from_secs(capacity: usize, period_secs: f64) -> Result<Self, ConfigError> {
        let period = Duration::try_from_secs_f64(period_secs)
            .map_err(|_| ConfigError::InvalidPeriodSecs(period_secs))?;
        if period.is_zero() {
            return Err(ConfigError::InvalidPeriodSecs(period_secs));
        }
        Self::new(capacity, period)
    }

    /// Enable or disable waiting and retrying on denial.
    pub fn with_auto_retry(mut self, auto_retry: bool) -> Self {
        self.auto_retry = auto_retry;
        self
    }

    /// Number of retries after the initial attempt.
    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    // Builder setters; `validate` runs at build time.
    pub(crate) fn with_capacity_unchecked(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub(crate) fn with_period_unchecked(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::InvalidCapacity { provided: self.capacity });
        }
        if self.period.is_zero() {
            return Err(ConfigError::ZeroPeriod);
        }
        Ok(())
    }

    /// Max admissions per period.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Rolling window length.
    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn auto_retry(&self) -> bool {
        self.auto_retry
    }

    pub fn max_retries(&self) -> usize {
        self.max_retries
    }

    /// Admission attempts per invocation: `max_retries + 1` with auto-retry, otherwise 1.
    pub fn max_attempts(&self) -> usize {
        if self.auto_retry {
            self.max_retries.saturating_add(1)
        } else {
            1
        }
    }
}

impl Default for RateLimiterConfig {
    /// One call per minute, no retry.
    fn default() -> Self {
        Self {
            capacity: 1,
            period: Duration::from_secs(60),
            auto_retry: false,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

#[cfg(feature = "serde")]
#[derive(serde::Deserialize)]
struct RawConfig {
    capacity: usize,
    period_secs: f64,
    #[serde(default)]
    auto_retry: bool,
    #[serde(default = "default_max_retries")]
    max_retries: usize,
}

#[cfg(feature = "serde")]
fn default_max_retries() -> usize {
    DEFAULT_MAX_RETRIES
}

#[cfg(feature = "serde")]
impl TryFrom<RawConfig> for RateLimiterConfig {
    type Error = ConfigError;

    fn try_from(raw: RawConfig) -> Result<Self, Self::Error> {
        Ok(Self::from_secs(raw.capacity, raw.period_secs)?
            .with_auto_retry(raw.auto_retry)
            .with_max_retries(raw.max_retries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_capacity() {
        let err = RateLimiterConfig::new(0, Duration::from_secs(1)).unwrap_err();
        assert_eq!(err, ConfigError::InvalidCapacity { provided: 0 });
    }

    #[test]
    fn rejects_zero_period() {
        let err = RateLimiterConfig::new(1, Duration::ZERO).unwrap_err();
        assert_eq!(err, ConfigError::ZeroPeriod);
    }

    #[test]
    fn rejects_nonsensical_float_periods() {
        for secs in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let result = RateLimiterConfig::from_secs(2, secs);
            assert!(
                matches!(result, Err(ConfigError::InvalidPeriodSecs(_))),
                "period {secs} should be rejected"
            );
        }
    }

    #[test]
    fn float_period_is_accepted() {
        let cfg = RateLimiterConfig::from_secs(5, 0.25).unwrap();
        assert_eq!(cfg.period(), Duration::from_millis(250));
        assert_eq!(cfg.capacity(), 5);
    }

    #[test]
    fn default_is_one_call_per_minute() {
        let cfg = RateLimiterConfig::default();
        assert_eq!(cfg.capacity(), 1);
        assert_eq!(cfg.period(), Duration::from_secs(60));
        assert!(!cfg.auto_retry());
        assert_eq!(cfg.max_retries(), DEFAULT_MAX_RETRIES);
    }

    #[test]
    fn max_attempts_depends_on_auto_retry() {
        let cfg = RateLimiterConfig::new(1, Duration::from_secs(1)).unwrap().with_max_retries(4);
        assert_eq!(cfg.max_attempts(), 1);
        assert_eq!(cfg.clone().with_auto_retry(true).max_attempts(), 5);
        assert_eq!(cfg.with_auto_retry(true).with_max_retries(0).max_attempts(), 1);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn deserializes_with_validation() {
        let cfg: RateLimiterConfig =
            serde_json::from_str(r#"{"capacity": 3, "period_secs": 1.5, "auto_retry": true}"#)
                .unwrap();
        assert_eq!(cfg.capacity(), 3);
        assert_eq!(cfg.period(), Duration::from_millis(1500));
        assert!(cfg.auto_retry());
        assert_eq!(cfg.max_retries(), DEFAULT_MAX_RETRIES);

        let bad = serde_json::from_str::<RateLimiterConfig>(r#"{"capacity": 0, "period_secs": 1}"#);
        assert!(bad.is_err());
    }
}
