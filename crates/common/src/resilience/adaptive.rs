//! Adaptive circuit breaker with probabilistic admission
//!
//! Instead of switching between discrete open/half-open/closed states, this
//! breaker keeps a short, time-bounded history of call outcomes and admits
//! each call with a probability derived from it (see
//! [`admission_probability`]). Failures lower the probability one slot at a
//! time; recovery happens on its own as failures age out of the retention
//! window or are pushed out by newer outcomes.
//!
//! Failures of the wrapped operation are recorded and then absorbed: callers
//! get `None` both when a call was rejected and when it was admitted but
//! failed. [`AdaptiveBreaker::metrics`] and [`AdaptiveBreaker::history`]
//! expose the detail for callers that need it.
//!
//! # Examples
//!
//! ```rust
//! use std::time::Duration;
//!
//! use probgate_common::resilience::{AdaptiveBreaker, AdaptiveBreakerConfig};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AdaptiveBreakerConfig::builder()
//!     .capacity(5)
//!     .retention(Duration::from_secs(3))
//!     .build()?;
//! let breaker = AdaptiveBreaker::new(config)?;
//!
//! let value = breaker.call(|| Ok::<_, std::io::Error>(42));
//! assert_eq!(value, Some(42));
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use super::history::{History, OutcomeRecord};
use super::policy::{admission_probability, AdmissionRegime};
use super::random::{RandomSource, ThreadRandom};
use super::{Clock, ConfigError, ConfigResult, SystemClock};
use crate::utils::serde::duration_millis;

/// Configuration for the adaptive breaker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptiveBreakerConfig {
    /// Maximum number of outcomes remembered
    pub capacity: usize,
    /// Maximum age of a remembered outcome
    #[serde(with = "duration_millis")]
    pub retention: Duration,
}

impl Default for AdaptiveBreakerConfig {
    fn default() -> Self {
        Self { capacity: 5, retention: Duration::from_secs(3) }
    }
}

impl AdaptiveBreakerConfig {
    /// Create a configuration builder
    pub fn builder() -> AdaptiveBreakerConfigBuilder {
        AdaptiveBreakerConfigBuilder::new()
    }

    /// Validate the configuration
    pub fn validate(&self) -> ConfigResult<()> {
        self.non_zero_capacity()?;
        if self.retention.is_zero() {
            return Err(ConfigError::invalid("retention must be greater than zero"));
        }
        Ok(())
    }

    fn non_zero_capacity(&self) -> ConfigResult<NonZeroUsize> {
        NonZeroUsize::new(self.capacity)
            .ok_or_else(|| ConfigError::invalid("capacity must be greater than 0"))
    }
}

/// Builder for [`AdaptiveBreakerConfig`]
#[derive(Debug)]
pub struct AdaptiveBreakerConfigBuilder {
    config: AdaptiveBreakerConfig,
}

impl Default for AdaptiveBreakerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AdaptiveBreakerConfigBuilder {
    pub fn new() -> Self {
        Self { config: AdaptiveBreakerConfig::default() }
    }

    pub fn capacity(mut self, capacity: usize) -> Self {
        self.config.capacity = capacity;
        self
    }

    pub fn retention(mut self, retention: Duration) -> Self {
        self.config.retention = retention;
        self
    }

    /// Use a custom clock; the returned builder produces a breaker directly
    pub fn clock<C: Clock>(self, clock: C) -> AdaptiveBreakerBuilder<C, ThreadRandom> {
        AdaptiveBreakerBuilder { config: self.config, clock, random: ThreadRandom }
    }

    /// Use a custom random source; the returned builder produces a breaker
    /// directly
    pub fn random<R: RandomSource>(self, random: R) -> AdaptiveBreakerBuilder<SystemClock, R> {
        AdaptiveBreakerBuilder { config: self.config, clock: SystemClock, random }
    }

    pub fn build(self) -> ConfigResult<AdaptiveBreakerConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Builder carrying an injected clock and random source
pub struct AdaptiveBreakerBuilder<C: Clock, R: RandomSource> {
    config: AdaptiveBreakerConfig,
    clock: C,
    random: R,
}

impl<C: Clock, R: RandomSource> AdaptiveBreakerBuilder<C, R> {
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.config.capacity = capacity;
        self
    }

    pub fn retention(mut self, retention: Duration) -> Self {
        self.config.retention = retention;
        self
    }

    pub fn clock<C2: Clock>(self, clock: C2) -> AdaptiveBreakerBuilder<C2, R> {
        AdaptiveBreakerBuilder { config: self.config, clock, random: self.random }
    }

    pub fn random<R2: RandomSource>(self, random: R2) -> AdaptiveBreakerBuilder<C, R2> {
        AdaptiveBreakerBuilder { config: self.config, clock: self.clock, random }
    }

    pub fn build(self) -> ConfigResult<AdaptiveBreaker<C, R>> {
        AdaptiveBreaker::with_parts(self.config, self.clock, self.random)
    }
}

/// Point-in-time view of a breaker for monitoring
///
/// Counters are read under the history lock, so `admitted_calls +
/// rejected_calls == total_calls` holds in every snapshot. Calls still in
/// flight are admitted but neither succeeded nor failed yet.
#[derive(Debug, Clone, PartialEq)]
pub struct AdaptiveBreakerMetrics {
    pub regime: AdmissionRegime,
    pub admission_probability: f64,
    pub history_len: usize,
    pub capacity: usize,
    pub total_calls: u64,
    pub admitted_calls: u64,
    pub rejected_calls: u64,
    pub succeeded_calls: u64,
    pub failed_calls: u64,
}

impl AdaptiveBreakerMetrics {
    /// Get a human-readable status message
    pub fn status_message(&self) -> String {
        format!(
            "Adaptive breaker: {} (p={:.2}) - {}/{} outcomes, {} admitted, {} rejected, {} failed",
            self.regime,
            self.admission_probability,
            self.history_len,
            self.capacity,
            self.admitted_calls,
            self.rejected_calls,
            self.failed_calls
        )
    }
}

/// Probabilistic admission gate around an unreliable operation
///
/// Cloning returns another handle to the same breaker; history and counters
/// are shared, never copied.
pub struct AdaptiveBreaker<C: Clock = SystemClock, R: RandomSource = ThreadRandom> {
    config: AdaptiveBreakerConfig,
    history: Arc<Mutex<History>>,
    clock: Arc<C>,
    random: Arc<R>,
    total_calls: Arc<AtomicU64>,
    admitted_calls: Arc<AtomicU64>,
    rejected_calls: Arc<AtomicU64>,
    succeeded_calls: Arc<AtomicU64>,
    failed_calls: Arc<AtomicU64>,
}

impl<C: Clock, R: RandomSource> fmt::Debug for AdaptiveBreaker<C, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdaptiveBreaker")
            .field("config", &self.config)
            .field("history_len", &self.lock_history().len())
            .field("total_calls", &self.total_calls.load(Ordering::Acquire))
            .finish()
    }
}

impl<C: Clock, R: RandomSource> Clone for AdaptiveBreaker<C, R> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            history: Arc::clone(&self.history),
            clock: Arc::clone(&self.clock),
            random: Arc::clone(&self.random),
            total_calls: Arc::clone(&self.total_calls),
            admitted_calls: Arc::clone(&self.admitted_calls),
            rejected_calls: Arc::clone(&self.rejected_calls),
            succeeded_calls: Arc::clone(&self.succeeded_calls),
            failed_calls: Arc::clone(&self.failed_calls),
        }
    }
}

impl AdaptiveBreaker<SystemClock, ThreadRandom> {
    /// Create a breaker on the system clock and thread-local RNG
    pub fn new(config: AdaptiveBreakerConfig) -> ConfigResult<Self> {
        Self::with_parts(config, SystemClock, ThreadRandom)
    }

    /// Create a breaker using the builder pattern
    pub fn builder() -> AdaptiveBreakerConfigBuilder {
        AdaptiveBreakerConfigBuilder::new()
    }
}

impl<C: Clock, R: RandomSource> AdaptiveBreaker<C, R> {
    /// Create a breaker with an injected clock and random source
    pub fn with_parts(config: AdaptiveBreakerConfig, clock: C, random: R) -> ConfigResult<Self> {
        config.validate()?;
        let capacity = config.non_zero_capacity()?;

        Ok(Self {
            history: Arc::new(Mutex::new(History::new(capacity, config.retention))),
            config,
            clock: Arc::new(clock),
            random: Arc::new(random),
            total_calls: Arc::new(AtomicU64::new(0)),
            admitted_calls: Arc::new(AtomicU64::new(0)),
            rejected_calls: Arc::new(AtomicU64::new(0)),
            succeeded_calls: Arc::new(AtomicU64::new(0)),
            failed_calls: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Run a synchronous operation through the breaker
    ///
    /// Returns `Some` with the operation's value when it was admitted and
    /// succeeded, `None` when it was rejected or failed. The operation runs
    /// outside the history lock. If it panics, the call is recorded as a
    /// failure while unwinding.
    #[instrument(skip(self, operation), fields(capacity = self.config.capacity))]
    pub fn call<F, T, E>(&self, operation: F) -> Option<T>
    where
        F: FnOnce() -> Result<T, E>,
        E: fmt::Debug,
    {
        let admitted = self.try_admit()?;
        admitted.complete(operation())
    }

    /// Run an asynchronous operation through the breaker
    ///
    /// Same contract as [`call`](Self::call). The history lock is released
    /// before the future is polled. Dropping the returned future after
    /// admission, for example on a timeout, records the call as a failure.
    #[instrument(skip(self, operation), fields(capacity = self.config.capacity))]
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> Option<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Debug,
    {
        let admitted = self.try_admit()?;
        let outcome = operation().await;
        admitted.complete(outcome)
    }

    /// Evict, compute the probability, draw and count, all under the history
    /// lock
    fn try_admit(&self) -> Option<AdmittedCall<'_, C, R>> {
        let mut history = self.lock_history();
        let now = self.clock.now();
        let evicted = history.evict(now);
        if evicted > 0 {
            debug!(evicted, "Adaptive breaker: forgot stale outcomes");
        }
        let probability = admission_probability(&*history, history.capacity());
        let draw = self.random.next_unit();

        self.total_calls.fetch_add(1, Ordering::Relaxed);
        if draw < probability {
            self.admitted_calls.fetch_add(1, Ordering::Relaxed);
            Some(AdmittedCall { breaker: self, admitted_at: now, settled: false })
        } else {
            self.rejected_calls.fetch_add(1, Ordering::Relaxed);
            drop(history);
            debug!(probability, draw, "Adaptive breaker: skipping call");
            None
        }
    }

    fn record_outcome(&self, admitted_at: Instant, succeeded: bool) {
        let mut history = self.lock_history();
        history.record(admitted_at, succeeded);
        if succeeded {
            self.succeeded_calls.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed_calls.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Current admission probability after evicting stale outcomes
    pub fn admission_probability(&self) -> f64 {
        let mut history = self.lock_history();
        history.evict(self.clock.now());
        admission_probability(&*history, history.capacity())
    }

    /// Current regime after evicting stale outcomes
    pub fn regime(&self) -> AdmissionRegime {
        AdmissionRegime::from_probability(self.admission_probability())
    }

    /// Snapshot of the remembered outcomes, oldest first
    pub fn history(&self) -> Vec<OutcomeRecord> {
        let mut history = self.lock_history();
        history.evict(self.clock.now());
        history.snapshot()
    }

    /// Get breaker metrics
    pub fn metrics(&self) -> AdaptiveBreakerMetrics {
        let mut history = self.lock_history();
        history.evict(self.clock.now());
        let probability = admission_probability(&*history, history.capacity());

        AdaptiveBreakerMetrics {
            regime: AdmissionRegime::from_probability(probability),
            admission_probability: probability,
            history_len: history.len(),
            capacity: self.config.capacity,
            total_calls: self.total_calls.load(Ordering::Acquire),
            admitted_calls: self.admitted_calls.load(Ordering::Acquire),
            rejected_calls: self.rejected_calls.load(Ordering::Acquire),
            succeeded_calls: self.succeeded_calls.load(Ordering::Acquire),
            failed_calls: self.failed_calls.load(Ordering::Acquire),
        }
    }

    /// Forget every remembered outcome; counters are kept
    pub fn reset(&self) {
        self.lock_history().clear();
        info!("Adaptive breaker history manually reset");
    }

    pub fn config(&self) -> &AdaptiveBreakerConfig {
        &self.config
    }

    fn lock_history(&self) -> MutexGuard<'_, History> {
        match self.history.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("Adaptive breaker history lock poisoned");
                poisoned.into_inner()
            }
        }
    }
}

/// Admission ticket for one call
///
/// Settled by [`complete`](Self::complete). A ticket dropped unsettled (the
/// operation panicked or its future was dropped) records a failure.
struct AdmittedCall<'a, C: Clock, R: RandomSource> {
    breaker: &'a AdaptiveBreaker<C, R>,
    admitted_at: Instant,
    settled: bool,
}

impl<C: Clock, R: RandomSource> AdmittedCall<'_, C, R> {
    fn complete<T, E: fmt::Debug>(mut self, outcome: Result<T, E>) -> Option<T> {
        self.settled = true;
        self.breaker.record_outcome(self.admitted_at, outcome.is_ok());

        match outcome {
            Ok(value) => {
                debug!("Adaptive breaker: operation succeeded");
                Some(value)
            }
            Err(error) => {
                warn!(?error, "Adaptive breaker: operation failed, result suppressed");
                None
            }
        }
    }
}

impl<C: Clock, R: RandomSource> Drop for AdmittedCall<'_, C, R> {
    fn drop(&mut self) {
        if !self.settled {
            self.breaker.record_outcome(self.admitted_at, false);
            warn!("Adaptive breaker: admitted call abandoned, recorded as failure");
        }
    }
}
