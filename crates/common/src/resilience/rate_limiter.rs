//! Rolling-window call limiter
//!
//! Caps how many calls may start within any `period`. The limiter keeps the
//! admission instants of the last `max_calls` calls; a new call is skipped
//! when that queue is full and its oldest entry is still inside the period.
//! Skipped calls leave no trace.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{Clock, ConfigError, ConfigResult, SystemClock};
use crate::utils::serde::duration_millis;

/// Configuration for the call limiter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimiterConfig {
    /// Maximum number of calls allowed within one period
    pub max_calls: usize,
    /// Length of the rolling period
    #[serde(with = "duration_millis")]
    pub period: Duration,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self { max_calls: 10, period: Duration::from_secs(1) }
    }
}

impl RateLimiterConfig {
    /// Create a configuration builder
    pub fn builder() -> RateLimiterConfigBuilder {
        RateLimiterConfigBuilder::new()
    }

    /// Validate the configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_calls == 0 {
            return Err(ConfigError::invalid("max_calls must be greater than 0"));
        }
        if self.period.is_zero() {
            return Err(ConfigError::invalid("period must be greater than zero"));
        }
        Ok(())
    }
}

/// Builder for [`RateLimiterConfig`]
#[derive(Debug)]
pub struct RateLimiterConfigBuilder {
    config: RateLimiterConfig,
}

impl Default for RateLimiterConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiterConfigBuilder {
    pub fn new() -> Self {
        Self { config: RateLimiterConfig::default() }
    }

    pub fn max_calls(mut self, max_calls: usize) -> Self {
        self.config.max_calls = max_calls;
        self
    }

    pub fn period(mut self, period: Duration) -> Self {
        self.config.period = period;
        self
    }

    pub fn build(self) -> ConfigResult<RateLimiterConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Rolling-window limiter
///
/// A slot is reserved under the lock before the operation runs, so
/// concurrent callers cannot exceed `max_calls` between them.
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
///
/// use probgate_common::resilience::{CallLimiter, RateLimiterConfig};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = RateLimiterConfig::builder().max_calls(2).period(Duration::from_secs(1)).build()?;
/// let limiter = CallLimiter::new(config)?;
///
/// assert_eq!(limiter.call(|| 1), Some(1));
/// assert_eq!(limiter.call(|| 2), Some(2));
/// assert_eq!(limiter.call(|| 3), None);
/// # Ok(())
/// # }
/// ```
pub struct CallLimiter<C: Clock = SystemClock> {
    config: RateLimiterConfig,
    calls: Arc<Mutex<VecDeque<Instant>>>,
    clock: Arc<C>,
}

impl<C: Clock> Clone for CallLimiter<C> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            calls: Arc::clone(&self.calls),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl CallLimiter<SystemClock> {
    /// Create a limiter on the system clock
    pub fn new(config: RateLimiterConfig) -> ConfigResult<Self> {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock> CallLimiter<C> {
    /// Create a limiter with a custom clock
    pub fn with_clock(config: RateLimiterConfig, clock: C) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Self {
            calls: Arc::new(Mutex::new(VecDeque::with_capacity(config.max_calls))),
            config,
            clock: Arc::new(clock),
        })
    }

    /// Run `operation` if the budget allows, otherwise return `None`
    pub fn call<F, T>(&self, operation: F) -> Option<T>
    where
        F: FnOnce() -> T,
    {
        if !self.try_reserve() {
            debug!(max_calls = self.config.max_calls, "Call limit reached, skipping call");
            return None;
        }
        Some(operation())
    }

    /// Async variant of [`call`](Self::call)
    pub async fn execute<F, Fut, T>(&self, operation: F) -> Option<T>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = T>,
    {
        if !self.try_reserve() {
            debug!(max_calls = self.config.max_calls, "Call limit reached, skipping call");
            return None;
        }
        Some(operation().await)
    }

    /// Number of calls that would be admitted right now
    pub fn remaining(&self) -> usize {
        let calls = self.lock_calls();
        let now = self.clock.now();
        let in_window = calls
            .iter()
            .filter(|&&started| now.saturating_duration_since(started) < self.config.period)
            .count();
        self.config.max_calls.saturating_sub(in_window)
    }

    pub fn config(&self) -> &RateLimiterConfig {
        &self.config
    }

    fn try_reserve(&self) -> bool {
        let mut calls = self.lock_calls();
        let now = self.clock.now();

        if calls.len() >= self.config.max_calls {
            let within_period = calls
                .front()
                .is_some_and(|&oldest| now.saturating_duration_since(oldest) < self.config.period);
            if within_period {
                return false;
            }
            calls.pop_front();
        }
        calls.push_back(now);
        true
    }

    fn lock_calls(&self) -> MutexGuard<'_, VecDeque<Instant>> {
        match self.calls.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("Call limiter lock poisoned");
                poisoned.into_inner()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use crate::resilience::MockClock;

    fn limiter(max_calls: usize, period_ms: u64) -> (CallLimiter<MockClock>, MockClock) {
        let clock = MockClock::new();
        let config = RateLimiterConfig::builder()
            .max_calls(max_calls)
            .period(Duration::from_millis(period_ms))
            .build()
            .expect("valid config");
        (CallLimiter::with_clock(config, clock.clone()).expect("valid limiter"), clock)
    }

    #[test]
    fn test_rate_limiter_config_validation() {
        assert!(RateLimiterConfig::default().validate().is_ok());
        assert!(RateLimiterConfig::builder().max_calls(0).build().is_err());
        assert!(RateLimiterConfig::builder().period(Duration::ZERO).build().is_err());
    }

    /// Calls over budget are skipped without running the operation.
    #[test]
    fn test_call_limiter_skips_over_budget() {
        let (limiter, _clock) = limiter(3, 1_000);
        let mut ran = 0;

        for _ in 0..5 {
            limiter.call(|| ran += 1);
        }

        assert_eq!(ran, 3);
        assert_eq!(limiter.remaining(), 0);
    }

    #[test]
    fn test_call_limiter_frees_slots_after_period() {
        let (limiter, clock) = limiter(2, 1_000);
        assert_eq!(limiter.call(|| "a"), Some("a"));
        clock.advance_millis(400);
        assert_eq!(limiter.call(|| "b"), Some("b"));
        assert_eq!(limiter.call(|| "c"), None);

        // first slot expires, second is still in the window
        clock.advance_millis(600);
        assert_eq!(limiter.remaining(), 1);
        assert_eq!(limiter.call(|| "d"), Some("d"));
        assert_eq!(limiter.call(|| "e"), None);
    }

    /// Skipped calls do not push the window forward.
    #[test]
    fn test_skipped_calls_leave_no_trace() {
        let (limiter, clock) = limiter(1, 1_000);
        limiter.call(|| ());

        for _ in 0..10 {
            clock.advance_millis(90);
            assert!(limiter.call(|| ()).is_none());
        }

        clock.advance_millis(100);
        assert!(limiter.call(|| ()).is_some());
    }

    #[tokio::test]
    async fn test_call_limiter_execute() {
        let (limiter, _clock) = limiter(1, 1_000);
        assert_eq!(limiter.execute(|| async { 7 }).await, Some(7));
        assert_eq!(limiter.execute(|| async { 8 }).await, None);
    }

    #[test]
    fn test_call_limiter_concurrent_budget() {
        let (limiter, _clock) = limiter(16, 60_000);
        let admitted = std::sync::atomic::AtomicUsize::new(0);

        thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    for _ in 0..10 {
                        if limiter.call(|| ()).is_some() {
                            admitted.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                        }
                    }
                });
            }
        });

        assert_eq!(admitted.load(std::sync::atomic::Ordering::SeqCst), 16);
    }
}
