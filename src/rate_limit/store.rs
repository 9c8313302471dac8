use crate::clock::Clock;
use crate::config::RateLimiterConfig;
use crate::rate_limit::window::expiry;
use crate::rate_limit::{Decision, Window};
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Per-key sliding-window log.
///
/// All windows live behind one mutex. Each admission runs lookup, lazy window creation,
/// eviction, the capacity check and the append as a single critical section. No sleeping and
/// no user code ever runs under the lock.
///
/// Windows are created on first use and kept for the lifetime of the store; call
/// [`purge_idle`](Self::purge_idle) to drop keys whose windows have fully expired.
#[derive(Debug)]
pub struct WindowStore<K> {
    capacity: usize,
    period: Duration,
    windows: Mutex<HashMap<K, Window>>,
}

impl<K> WindowStore<K>
where
    K: Hash + Eq,
{
    /// Store admitting at most `capacity` per rolling `period`.
    ///
    /// Takes a validated config, so capacity and period are known to be non-zero.
    pub fn new(config: &RateLimiterConfig) -> Self {
        Self {
            capacity: config.capacity(),
            period: config.period(),
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Try to reserve a slot for `key` at `now`.
    ///
    /// On admission the slot is consumed immediately, whatever the caller does next.
    pub fn admit(&self, key: K, now: Duration) -> Decision {
        let mut windows = self.lock();
        self.admit_locked(&mut windows, key, now)
    }

    /// Like [`admit`](Self::admit), reading `clock` while holding the lock so instants
    /// recorded for a key follow lock order.
    pub fn admit_with<C>(&self, key: K, clock: &C) -> Decision
    where
        C: Clock + ?Sized,
    {
        let mut windows = self.lock();
        let now = clock.now();
        self.admit_locked(&mut windows, key, now)
    }

    fn admit_locked(&self, windows: &mut HashMap<K, Window>, key: K, now: Duration) -> Decision {
        let window = windows.entry(key).or_default();
        window.evict(now, self.period);

        if window.len() < self.capacity {
            window.record(now);
            return Decision::Admitted { remaining: self.capacity - window.len() };
        }

        // Full window after eviction means the oldest entry is newer than `now - period`.
        let wait = window.wait_from(now, self.period).unwrap_or(self.period);
        Decision::Denied { wait }
    }

    /// What [`admit`](Self::admit) would answer at `now`, without reserving anything.
    pub fn peek(&self, key: &K, now: Duration) -> Decision {
        let windows = self.lock();
        let Some(window) = windows.get(key) else {
            return Decision::Admitted { remaining: self.capacity };
        };
        let live = window.live(now, self.period);
        if live < self.capacity {
            return Decision::Admitted { remaining: self.capacity - live };
        }
        let skipped = window.len() - live;
        let oldest_live = window.iter().nth(skipped).unwrap_or(now);
        Decision::Denied { wait: expiry(oldest_live, self.period).saturating_sub(now) }
    }

    /// Admissions for `key` still inside the window at `now`.
    pub fn in_window(&self, key: &K, now: Duration) -> usize {
        self.lock().get(key).map_or(0, |w| w.live(now, self.period))
    }

    /// Forget `key`'s history. Returns whether the key was tracked.
    pub fn reset(&self, key: &K) -> bool {
        self.lock().remove(key).is_some()
    }

    /// Evict expired admissions in every window and drop the windows left empty.
    ///
    /// Returns the number of keys dropped. Never called implicitly.
    pub fn purge_idle(&self, now: Duration) -> usize {
        let mut windows = self.lock();
        let before = windows.len();
        windows.retain(|_, window| {
            window.evict(now, self.period);
            !window.is_empty()
        });
        let purged = before - windows.len();
        if purged > 0 {
            tracing::debug!(purged, remaining = windows.len(), "purged idle rate limit windows");
        }
        purged
    }

    /// Number of tracked keys.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<K, Window>> {
        self.windows.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn store(capacity: usize, period_ms: u64) -> WindowStore<&'static str> {
        let cfg = RateLimiterConfig::new(capacity, Duration::from_millis(period_ms)).unwrap();
        WindowStore::new(&cfg)
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn admits_up_to_capacity_then_denies() {
        let s = store(2, 1000);
        assert_eq!(s.admit("k", ms(0)), Decision::Admitted { remaining: 1 });
        assert_eq!(s.admit("k", ms(100)), Decision::Admitted { remaining: 0 });
        assert_eq!(s.admit("k", ms(200)), Decision::Denied { wait: ms(800) });
    }

    #[test]
    fn wait_is_recomputed_as_time_advances() {
        let s = store(1, 1000);
        assert!(s.admit("k", ms(0)).is_admitted());
        assert_eq!(s.admit("k", ms(300)).wait(), Some(ms(700)));
        assert_eq!(s.admit("k", ms(900)).wait(), Some(ms(100)));
    }

    #[test]
    fn denial_does_not_consume_a_slot() {
        let s = store(1, 1000);
        assert!(s.admit("k", ms(0)).is_admitted());
        for t in [100, 200, 300] {
            assert!(s.admit("k", ms(t)).is_denied());
        }
        assert_eq!(s.in_window(&"k", ms(300)), 1);
        assert!(s.admit("k", ms(1000)).is_admitted());
    }

    #[test]
    fn slots_open_one_at_a_time() {
        let s = store(3, 500);
        for t in [0, 200, 400] {
            assert!(s.admit("k", ms(t)).is_admitted());
        }
        assert!(s.admit("k", ms(450)).is_denied());
        assert!(s.admit("k", ms(550)).is_admitted());
        assert_eq!(s.admit("k", ms(560)), Decision::Denied { wait: ms(140) });
    }

    #[test]
    fn all_slots_return_after_full_period() {
        let s = store(5, 500);
        for _ in 0..5 {
            assert!(s.admit("k", ms(0)).is_admitted());
        }
        for _ in 0..5 {
            assert!(s.admit("k", ms(600)).is_admitted());
        }
        assert!(s.admit("k", ms(600)).is_denied());
    }

    #[test]
    fn keys_are_independent() {
        let s = store(1, 1000);
        assert!(s.admit("a", ms(0)).is_admitted());
        assert!(s.admit("b", ms(0)).is_admitted());
        assert!(s.admit("a", ms(1)).is_denied());
        assert!(s.admit("b", ms(1)).is_denied());
        assert_eq!(s.len(), 2);
    }

    #[test]
    fn structurally_equal_keys_share_a_window() {
        let cfg = RateLimiterConfig::new(1, Duration::from_secs(1)).unwrap();
        let s: WindowStore<(String, u32)> = WindowStore::new(&cfg);
        assert!(s.admit(("user".to_string(), 7), ms(0)).is_admitted());
        assert!(s.admit((String::from("us") + "er", 7), ms(1)).is_denied());
    }

    #[test]
    fn huge_capacity_needs_no_special_casing() {
        let s = store(usize::MAX, 1000);
        assert_eq!(s.admit("k", ms(0)), Decision::Admitted { remaining: usize::MAX - 1 });
    }

    #[test]
    fn unbounded_period_denies_without_overflow() {
        let cfg = RateLimiterConfig::new(1, Duration::MAX).unwrap();
        let s = WindowStore::new(&cfg);
        assert!(s.admit((), ms(1)).is_admitted());
        assert_eq!(s.admit((), ms(2)), Decision::Denied { wait: Duration::MAX - ms(2) });
        assert_eq!(s.peek(&(), ms(2)), Decision::Denied { wait: Duration::MAX - ms(2) });
        assert_eq!(s.in_window(&(), ms(3)), 1);
    }

    #[test]
    fn admit_with_reads_clock() {
        let s = store(1, 1000);
        let clock = ManualClock::new();
        assert!(s.admit_with("k", &clock).is_admitted());
        clock.advance(ms(250));
        assert_eq!(s.admit_with("k", &clock).wait(), Some(ms(750)));
    }

    #[test]
    fn peek_does_not_reserve() {
        let s = store(2, 1000);
        assert_eq!(s.peek(&"k", ms(0)), Decision::Admitted { remaining: 2 });
        assert!(s.admit("k", ms(0)).is_admitted());
        assert!(s.admit("k", ms(100)).is_admitted());
        assert_eq!(s.peek(&"k", ms(200)), Decision::Denied { wait: ms(800) });
        assert_eq!(s.peek(&"k", ms(1000)), Decision::Admitted { remaining: 1 });
        assert_eq!(s.in_window(&"k", ms(200)), 2);
        assert_eq!(s.in_window(&"k", ms(1000)), 1);
    }

    #[test]
    fn reset_forgets_history() {
        let s = store(1, 1000);
        assert!(s.admit("k", ms(0)).is_admitted());
        assert!(s.reset(&"k"));
        assert!(!s.reset(&"k"));
        assert!(s.admit("k", ms(1)).is_admitted());
    }

    #[test]
    fn purge_idle_drops_only_expired_windows() {
        let s = store(2, 1000);
        assert!(s.admit("old", ms(0)).is_admitted());
        assert!(s.admit("fresh", ms(800)).is_admitted());
        assert_eq!(s.purge_idle(ms(1200)), 1);
        assert_eq!(s.len(), 1);
        assert_eq!(s.in_window(&"fresh", ms(1200)), 1);
    }

    #[test]
    fn windows_persist_without_purge() {
        let s = store(1, 10);
        for key in ["a", "b", "c"] {
            assert!(s.admit(key, ms(0)).is_admitted());
        }
        assert!(s.admit("a", ms(10_000)).is_admitted());
        assert_eq!(s.len(), 3);
    }
}
