//! Bounded, time-ordered outcome history
//!
//! [`History`] is the sliding window behind the adaptive breaker. It is
//! bounded twice: by `capacity`, where the oldest record is dropped on
//! overflow, and by `retention`, where records older than the window are
//! evicted from the front on each [`History::evict`].
//!
//! Records are stored oldest-first and timestamps never decrease, so eviction
//! only needs to scan the prefix that has aged out.

use std::collections::VecDeque;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

/// Outcome of one admitted call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutcomeRecord {
    /// Instant the call was admitted, raised to the newest stored timestamp
    /// when the call finishes after a later-admitted one
    ///
    /// A raised record stays in the window longer than its admission time
    /// alone would allow: it expires `retention` after the record it was
    /// raised to, not after its own admission.
    pub timestamp: Instant,
    /// Whether the call completed successfully
    pub succeeded: bool,
}

impl OutcomeRecord {
    /// Age of the record relative to `now`, zero if `now` precedes it
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.timestamp)
    }
}

/// Fixed-capacity, retention-bounded record of call outcomes
#[derive(Debug, Clone)]
pub struct History {
    records: VecDeque<OutcomeRecord>,
    capacity: NonZeroUsize,
    retention: Duration,
}

impl History {
    /// Create an empty history
    pub fn new(capacity: NonZeroUsize, retention: Duration) -> Self {
        Self { records: VecDeque::with_capacity(capacity.get()), capacity, retention }
    }

    /// Drop every leading record older than `retention` at `now`
    ///
    /// Returns how many records were removed. Calling it again with the same
    /// `now` removes nothing.
    pub fn evict(&mut self, now: Instant) -> usize {
        let mut evicted = 0;
        while let Some(oldest) = self.records.front() {
            if oldest.age(now) <= self.retention {
                break;
            }
            self.records.pop_front();
            evicted += 1;
        }
        evicted
    }

    /// Append an outcome, dropping the oldest record when full
    ///
    /// A timestamp older than the newest stored one is raised to it, which
    /// keeps the sequence ordered when concurrent calls finish out of
    /// admission order.
    pub fn record(&mut self, now: Instant, succeeded: bool) {
        let timestamp = match self.records.back() {
            Some(newest) if newest.timestamp > now => newest.timestamp,
            _ => now,
        };

        if self.records.len() >= self.capacity.get() {
            self.records.pop_front();
        }
        self.records.push_back(OutcomeRecord { timestamp, succeeded });
    }

    /// Owned copy of the records, oldest first
    pub fn snapshot(&self) -> Vec<OutcomeRecord> {
        self.records.iter().copied().collect()
    }

    /// Iterate records oldest first
    pub fn iter(&self) -> impl Iterator<Item = &OutcomeRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn capacity(&self) -> NonZeroUsize {
        self.capacity
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// Number of successful records
    pub fn successes(&self) -> usize {
        self.records.iter().filter(|r| r.succeeded).count()
    }

    /// Number of failed records
    pub fn failures(&self) -> usize {
        self.len() - self.successes()
    }

    /// Remove every record
    pub fn clear(&mut self) {
        self.records.clear();
    }
}

impl<'a> IntoIterator for &'a History {
    type Item = &'a OutcomeRecord;
    type IntoIter = std::collections::vec_deque::Iter<'a, OutcomeRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history(capacity: usize, retention_ms: u64) -> History {
        History::new(
            NonZeroUsize::new(capacity).expect("test capacity must be non-zero"),
            Duration::from_millis(retention_ms),
        )
    }

    #[test]
    fn test_new_history_is_empty() {
        let h = history(5, 3_000);
        assert!(h.is_empty());
        assert_eq!(h.len(), 0);
        assert_eq!(h.capacity().get(), 5);
        assert_eq!(h.retention(), Duration::from_secs(3));
    }

    /// Overflow drops the oldest record first.
    #[test]
    fn test_record_overflow_drops_oldest() {
        let mut h = history(3, 3_000);
        let t0 = Instant::now();

        h.record(t0, false);
        h.record(t0 + Duration::from_millis(1), true);
        h.record(t0 + Duration::from_millis(2), true);
        h.record(t0 + Duration::from_millis(3), true);

        assert_eq!(h.len(), 3);
        assert_eq!(h.failures(), 0);
        assert_eq!(h.snapshot()[0].timestamp, t0 + Duration::from_millis(1));
    }

    /// Size never exceeds capacity for any sequence of records.
    #[test]
    fn test_capacity_bound_holds() {
        let mut h = history(4, 60_000);
        let t0 = Instant::now();

        for i in 0..50u64 {
            h.record(t0 + Duration::from_millis(i), i % 3 == 0);
            assert!(h.len() <= 4);
        }
        assert_eq!(h.len(), 4);
    }

    /// After eviction every record is within retention of `now`.
    #[test]
    fn test_evict_enforces_window() {
        let mut h = history(10, 1_000);
        let t0 = Instant::now();

        for i in 0..5u64 {
            h.record(t0 + Duration::from_millis(i * 400), true);
        }
        let now = t0 + Duration::from_millis(2_000);

        let evicted = h.evict(now);

        // ages 2000, 1600, 1200 exceed the window; 800 and 400 remain
        assert_eq!(evicted, 3);
        assert_eq!(h.len(), 2);
        assert!(h.iter().all(|r| r.age(now) <= Duration::from_millis(1_000)));
    }

    /// A record exactly `retention` old is kept; one tick older is evicted.
    #[test]
    fn test_evict_boundary_is_inclusive() {
        let mut h = history(5, 3_000);
        let t0 = Instant::now();
        h.record(t0, false);

        assert_eq!(h.evict(t0 + Duration::from_secs(3)), 0);
        assert_eq!(h.len(), 1);

        assert_eq!(h.evict(t0 + Duration::from_millis(3_001)), 1);
        assert!(h.is_empty());
    }

    #[test]
    fn test_evict_is_idempotent() {
        let mut h = history(5, 1_000);
        let t0 = Instant::now();
        h.record(t0, true);
        h.record(t0 + Duration::from_millis(800), false);
        let now = t0 + Duration::from_millis(1_500);

        h.evict(now);
        let first = h.snapshot();
        assert_eq!(h.evict(now), 0);

        assert_eq!(first, h.snapshot());
    }

    /// Late completions never break timestamp ordering.
    #[test]
    fn test_record_keeps_timestamps_ordered() {
        let mut h = history(5, 3_000);
        let t0 = Instant::now();
        let later = t0 + Duration::from_millis(50);

        h.record(later, true);
        h.record(t0, false);

        let records = h.snapshot();
        assert_eq!(records[1].timestamp, later);
        assert!(records.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }

    /// A raised late record expires with the record it was raised to.
    #[test]
    fn test_raised_record_expires_with_newer_record() {
        let mut h = history(5, 3_000);
        let t0 = Instant::now();
        let newer = t0 + Duration::from_millis(2_900);

        h.record(newer, true);
        h.record(t0, false);

        // 3.5s after the slow call was admitted, 0.6s after the newer one
        assert_eq!(h.evict(t0 + Duration::from_millis(3_500)), 0);
        assert_eq!(h.failures(), 1);

        assert_eq!(h.evict(newer + Duration::from_millis(3_001)), 2);
        assert!(h.is_empty());
    }

    #[test]
    fn test_success_and_failure_counts() {
        let mut h = history(5, 3_000);
        let t0 = Instant::now();
        h.record(t0, true);
        h.record(t0, false);
        h.record(t0, true);

        assert_eq!(h.successes(), 2);
        assert_eq!(h.failures(), 1);

        h.clear();
        assert!(h.is_empty());
        assert_eq!(h.successes(), 0);
    }
}
