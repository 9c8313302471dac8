use std::collections::VecDeque;
use std::time::Duration;

/// Admission instants for one key, oldest first.
///
/// Entries are non-decreasing. After [`evict`](Self::evict) every entry is strictly newer than
/// `now - period`.
#[derive(Debug, Clone, Default)]
pub struct Window {
    stamps: VecDeque<Duration>,
}

impl Window {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of retained admissions.
    pub fn len(&self) -> usize {
        self.stamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stamps.is_empty()
    }

    /// Oldest retained admission.
    pub fn oldest(&self) -> Option<Duration> {
        self.stamps.front().copied()
    }

    /// Newest retained admission.
    pub fn newest(&self) -> Option<Duration> {
        self.stamps.back().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = Duration> + '_ {
        self.stamps.iter().copied()
    }

    /// Drop every admission at or before `now - period`. Returns how many were dropped.
    ///
    /// An admission exactly `period` old is expired.
    pub(crate) fn evict(&mut self, now: Duration, period: Duration) -> usize {
        let Some(cutoff) = now.checked_sub(period) else {
            return 0;
        };
        let before = self.stamps.len();
        while self.stamps.front().is_some_and(|&t| t <= cutoff) {
            self.stamps.pop_front();
        }
        before - self.stamps.len()
    }

    /// Admissions that would survive eviction at `now`, without mutating.
    pub(crate) fn live(&self, now: Duration, period: Duration) -> usize {
        match now.checked_sub(period) {
            Some(cutoff) => self.stamps.iter().filter(|&&t| t > cutoff).count(),
            None => self.stamps.len(),
        }
    }

    /// Append an admission. A stale `at` is clamped to the newest entry to keep order.
    pub(crate) fn record(&mut self, at: Duration) {
        let at = match self.newest() {
            Some(newest) if newest > at => newest,
            _ => at,
        };
        self.stamps.push_back(at);
    }

    /// Time from `now` until the oldest live admission expires.
    pub(crate) fn wait_from(&self, now: Duration, period: Duration) -> Option<Duration> {
        self.oldest().map(|oldest| expiry(oldest, period).saturating_sub(now))
    }
}

/// Instant at which an admission made at `stamp` leaves the window. Saturates at `Duration::MAX`.
pub(crate) fn expiry(stamp: Duration, period: Duration) -> Duration {
    stamp.checked_add(period).unwrap_or(Duration::MAX)
}
