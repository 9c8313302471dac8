//! Rate-limited invocation.
//!
//! [`RateLimiter`] ties a [`WindowStore`] to a key extractor and a retry policy.
//!
//! Semantics:
//! - Each admission attempt either reserves a slot or reports how long until one opens.
//! - A reserved slot is consumed even if the operation then fails.
//! - With `auto_retry`, a denied attempt sleeps for exactly the reported wait and tries again,
//!   up to `max_retries` times. The wait is recomputed on every denial.
//! - Operation errors are returned verbatim as [`LimitError::Inner`] and never retried.
//!
//! Invariants:
//! - Attempts per invocation never exceed `max_retries + 1` (1 without `auto_retry`).
//! - Sleeping happens outside the store's lock.
//!
//! Example
//! ```rust
//! use slidegate::{LimitError, RateLimiter};
//! use std::time::Duration;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let limiter = RateLimiter::builder()
//!     .capacity(1)
//!     .period(Duration::from_secs(1))
//!     .per_key(|user: &u64| *user)
//!     .build()
//!     .unwrap();
//!
//! let ok = limiter.execute(7, |user| async move { Ok::<_, std::io::Error>(user * 2) }).await;
//! assert_eq!(ok.unwrap(), 14);
//!
//! let denied = limiter.execute(7, |user| async move { Ok::<_, std::io::Error>(user) }).await;
//! assert!(matches!(denied, Err(LimitError::RateLimited(_))));
//! # });
//! ```

use crate::clock::{Clock, MonotonicClock};
use crate::config::RateLimiterConfig;
use crate::error::{ConfigError, LimitError, RateLimitExceeded};
use crate::rate_limit::{Decision, KeyExtractor, RateLimitLayer, WindowStore};
use crate::sleeper::{Sleeper, TokioSleeper};
use crate::telemetry::{emit_best_effort, LimiterEvent, NullSink, TelemetrySink};
use std::borrow::Cow;
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

/// Admission limit over calls taking arguments `A`, partitioned by key `K`.
///
/// Clones share the same windows via `Arc`, so every handle counts against the same limit.
/// Independent limiters never share state or contend on a lock.
pub struct RateLimiter<A, K = (), S = NullSink> {
    config: RateLimiterConfig,
    store: Arc<WindowStore<K>>,
    key: KeyExtractor<A, K>,
    clock: Arc<dyn Clock>,
    sleeper: Arc<dyn Sleeper>,
    sink: S,
}

impl<A, K, S: Clone> Clone for RateLimiter<A, K, S> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            store: self.store.clone(),
            key: self.key.clone(),
            clock: self.clock.clone(),
            sleeper: self.sleeper.clone(),
            sink: self.sink.clone(),
        }
    }
}

impl<A, K, S> fmt::Debug for RateLimiter<A, K, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimiter")
            .field("config", &self.config)
            .field("clock", &self.clock)
            .field("sleeper", &self.sleeper)
            .field("key", &"<extractor>")
            .field("sink", &"<sink>")
            .finish()
    }
}

impl<A: 'static> RateLimiter<A> {
    /// Builder with the default settings: one call per 60 seconds, global key, no retry.
    pub fn builder() -> RateLimiterBuilder<A> {
        RateLimiterBuilder::new()
    }

    /// Global limiter from a validated config.
    pub fn new(config: RateLimiterConfig) -> Self {
        Self::from_parts(
            config,
            KeyExtractor::global(),
            Arc::new(MonotonicClock::default()),
            Arc::new(TokioSleeper),
            NullSink,
        )
    }
}

impl<A, K, S> RateLimiter<A, K, S>
where
    K: Hash + Eq,
{
    fn from_parts(
        config: RateLimiterConfig,
        key: KeyExtractor<A, K>,
        clock: Arc<dyn Clock>,
        sleeper: Arc<dyn Sleeper>,
        sink: S,
    ) -> Self {
        let store = Arc::new(WindowStore::new(&config));
        Self { config, store, key, clock, sleeper, sink }
    }

    pub fn config(&self) -> &RateLimiterConfig {
        &self.config
    }

    /// The underlying store, for inspection.
    pub fn store(&self) -> &WindowStore<K> {
        &self.store
    }

    /// Key `args` would be counted under.
    pub fn key_for(&self, args: &A) -> K {
        self.key.extract(args)
    }

    /// Preview the admission decision for `args` without reserving a slot.
    pub fn check(&self, args: &A) -> Decision {
        self.store.peek(&self.key.extract(args), self.clock.now())
    }

    /// Forget the history of the key `args` maps to.
    pub fn reset(&self, args: &A) -> bool {
        self.store.reset(&self.key.extract(args))
    }

    /// Drop keys whose windows have fully expired. Returns the number dropped.
    pub fn purge_idle(&self) -> usize {
        self.store.purge_idle(self.clock.now())
    }

    /// Number of keys currently tracked.
    pub fn tracked_keys(&self) -> usize {
        self.store.len()
    }
}

impl<A, K, S> RateLimiter<A, K, S>
where
    K: Hash + Eq + Clone + Send,
    S: TelemetrySink + Sync,
    S::Future: Send + 'static,
{
    /// Reserve a slot for the key `args` map to, waiting and retrying if configured.
    pub async fn acquire(&self, args: &A) -> Result<(), RateLimitExceeded> {
        let key = self.key.extract(args);
        self.acquire_key(key).await
    }

    /// Reserve a slot for `key`, waiting and retrying if configured.
    pub async fn acquire_key(&self, key: K) -> Result<(), RateLimitExceeded> {
        let max_attempts = self.config.max_attempts();
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.store.admit_with(key.clone(), self.clock.as_ref()) {
                Decision::Admitted { remaining } => {
                    tracing::trace!(attempt, remaining, "admitted");
                    self.emit(LimiterEvent::Admitted { attempt, remaining }).await;
                    return Ok(());
                }
                Decision::Denied { wait } if attempt >= max_attempts => {
                    tracing::debug!(
                        attempts = attempt,
                        wait_ms = millis(wait),
                        "rate limit exceeded"
                    );
                    self.emit(LimiterEvent::Rejected { attempts: attempt, wait }).await;
                    return Err(RateLimitExceeded::new(wait, attempt));
                }
                Decision::Denied { wait } => {
                    tracing::debug!(
                        attempt,
                        wait_ms = millis(wait),
                        "rate limited; waiting to retry"
                    );
                    self.emit(LimiterEvent::Throttled { attempt, wait }).await;
                    self.sleeper.sleep(wait).await;
                }
            }
        }
    }

    /// Run `operation(args)` once a slot is reserved.
    ///
    /// The operation's value is returned unchanged; its error comes back as
    /// [`LimitError::Inner`]. A denial means the operation never ran.
    pub async fn execute<T, E, Fut, Op>(&self, args: A, operation: Op) -> Result<T, LimitError<E>>
    where
        Op: FnOnce(A) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.acquire(&args).await?;
        operation(args).await.map_err(LimitError::Inner)
    }

    /// Wrap `f` so every call goes through this limiter. `name` is kept for introspection.
    pub fn wrap<F>(&self, name: impl Into<Cow<'static, str>>, f: F) -> Limited<A, K, S, F> {
        Limited { name: name.into(), limiter: self.clone(), f }
    }

    /// Tower layer enforcing this limiter, keyed by the request.
    pub fn layer(&self) -> RateLimitLayer<A, K, S> {
        RateLimitLayer::new(self.clone())
    }

    async fn emit(&self, event: LimiterEvent) {
        emit_best_effort(self.sink.clone(), event).await;
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// A callable bound to a [`RateLimiter`], produced by [`RateLimiter::wrap`].
pub struct Limited<A, K, S, F> {
    name: Cow<'static, str>,
    limiter: RateLimiter<A, K, S>,
    f: F,
}

impl<A, K, S, F> Limited<A, K, S, F> {
    /// Name of the wrapped callable.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn limiter(&self) -> &RateLimiter<A, K, S> {
        &self.limiter
    }

    /// The wrapped callable itself, bypassing the limit.
    pub fn inner(&self) -> &F {
        &self.f
    }
}

impl<A, K, S, F, Fut, T, E> Limited<A, K, S, F>
where
    K: Hash + Eq + Clone + Send,
    S: TelemetrySink + Sync,
    S::Future: Send + 'static,
    F: Fn(A) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    /// Call the wrapped function with `args` under the limit.
    pub async fn call(&self, args: A) -> Result<T, LimitError<E>> {
        self.limiter.execute(args, &self.f).await
    }
}

impl<A, K, S: Clone, F: Clone> Clone for Limited<A, K, S, F> {
    fn clone(&self) -> Self {
        Self { name: self.name.clone(), limiter: self.limiter.clone(), f: self.f.clone() }
    }
}

impl<A, K, S, F> fmt::Debug for Limited<A, K, S, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Limited").field("name", &self.name).field("limiter", &self.limiter).finish()
    }
}

/// Builder for [`RateLimiter`].
pub struct RateLimiterBuilder<A, K = (), S = NullSink> {
    config: RateLimiterConfig,
    key: KeyExtractor<A, K>,
    clock: Arc<dyn Clock>,
    sleeper: Arc<dyn Sleeper>,
    sink: S,
}

impl<A: 'static> RateLimiterBuilder<A> {
    /// Create a builder with the defaults: 1 call per 60 s, global key, no retry.
    pub fn new() -> Self {
        Self {
            config: RateLimiterConfig::default(),
            key: KeyExtractor::global(),
            clock: Arc::new(MonotonicClock::default()),
            sleeper: Arc::new(TokioSleeper),
            sink: NullSink,
        }
    }
}

impl<A: 'static> Default for RateLimiterBuilder<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A, K, S> RateLimiterBuilder<A, K, S> {
    /// Max admissions per period. Must be > 0.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.config = self.config.with_capacity_unchecked(capacity);
        self
    }

    /// Rolling window length. Must be > 0.
    pub fn period(mut self, period: Duration) -> Self {
        self.config = self.config.with_period_unchecked(period);
        self
    }

    /// Wait and retry on denial instead of failing immediately.
    pub fn auto_retry(mut self, auto_retry: bool) -> Self {
        self.config = self.config.with_auto_retry(auto_retry);
        self
    }

    /// Retries after the initial attempt when `auto_retry` is on.
    pub fn max_retries(mut self, max_retries: usize) -> Self {
        self.config = self.config.with_max_retries(max_retries);
        self
    }

    /// Replace every setting with `config`.
    pub fn config(mut self, config: RateLimiterConfig) -> Self {
        self.config = config;
        self
    }

    /// Partition the limit by a key derived from the call's arguments.
    pub fn per_key<K2, F>(self, extract: F) -> RateLimiterBuilder<A, K2, S>
    where
        F: Fn(&A) -> K2 + Send + Sync + 'static,
    {
        self.key_extractor(KeyExtractor::new(extract))
    }

    /// Use a prepared extractor.
    pub fn key_extractor<K2>(self, key: KeyExtractor<A, K2>) -> RateLimiterBuilder<A, K2, S> {
        RateLimiterBuilder {
            config: self.config,
            key,
            clock: self.clock,
            sleeper: self.sleeper,
            sink: self.sink,
        }
    }

    /// Provide a custom clock implementation.
    pub fn with_clock<C>(mut self, clock: C) -> Self
    where
        C: Clock + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }

    /// Provide a custom sleeper implementation.
    pub fn with_sleeper<Z>(mut self, sleeper: Z) -> Self
    where
        Z: Sleeper + 'static,
    {
        self.sleeper = Arc::new(sleeper);
        self
    }

    /// Send limiter events to `sink`.
    pub fn with_sink<S2>(self, sink: S2) -> RateLimiterBuilder<A, K, S2>
    where
        S2: TelemetrySink,
    {
        RateLimiterBuilder {
            config: self.config,
            key: self.key,
            clock: self.clock,
            sleeper: self.sleeper,
            sink,
        }
    }

    /// Build the limiter, validating capacity and period.
    pub fn build(self) -> Result<RateLimiter<A, K, S>, ConfigError>
    where
        K: Hash + Eq,
    {
        self.config.validate()?;
        Ok(RateLimiter::from_parts(self.config, self.key, self.clock, self.sleeper, self.sink))
    }
}

impl<A, K, S> fmt::Debug for RateLimiterBuilder<A, K, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimiterBuilder")
            .field("config", &self.config)
            .field("clock", &self.clock)
            .field("sleeper", &self.sleeper)
            .finish()
    }
}
