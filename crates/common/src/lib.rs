//! Adaptive admission control for unreliable operations.
//!
//! The crate's core is [`resilience::AdaptiveBreaker`], a circuit breaker
//! that throttles calls probabilistically from a sliding window of recent
//! outcomes. Retry, call-limiting and timeout wrappers live next to it in
//! [`resilience`].
//!
//! # Feature Tiers
//!
//! - `runtime` (default): tokio-backed async pieces (async retry pauses,
//!   [`resilience::TimeoutGuard`])

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod resilience;
pub mod utils;

pub use resilience::{
    admission_probability, AdaptiveBreaker, AdaptiveBreakerConfig, AdaptiveBreakerMetrics,
    AdmissionRegime, CallLimiter, Clock, ConfigError, ConfigResult, MockClock, OutcomeRecord,
    RandomSource, RateLimiterConfig, ResilienceError, ResilienceResult, Retry, RetryConfig,
    ScriptedRandom, SeededRandom, SystemClock, ThreadRandom,
};
#[cfg(feature = "runtime")]
pub use resilience::{TimeoutConfig, TimeoutGuard};
pub use utils::serde::duration_millis;
