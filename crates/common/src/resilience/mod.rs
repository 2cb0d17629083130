//! Resilience patterns for calling unreliable operations
//!
//! The centrepiece is the [`AdaptiveBreaker`]: a circuit breaker that admits
//! calls with a probability derived from a short, time-bounded outcome
//! history instead of flipping between discrete states. Around it sit three
//! smaller wrappers:
//! - **Retry**: fixed-pause re-invocation that surfaces the last failure
//! - **Call limiter**: rolling-window cap on call starts
//! - **Timeout guard**: deadline for async operations (feature `runtime`)
//!
//! ## Failure surfacing
//!
//! | Primitive | On operation failure | On refusal |
//! |-----------|----------------------|------------|
//! | `AdaptiveBreaker` | recorded, returns `None` | returns `None` |
//! | `Retry` | retried, then `RetriesExhausted` | n/a |
//! | `CallLimiter` | passed through in `T` | returns `None` |
//! | `TimeoutGuard` | `OperationFailed` | `Timeout` |
//!
//! Time and randomness are injected through [`Clock`] and [`RandomSource`]
//! so every primitive can be driven deterministically in tests.

pub mod adaptive;
pub mod clock;
pub mod error;
pub mod history;
pub mod policy;
pub mod random;
pub mod rate_limiter;
pub mod retry;
#[cfg(feature = "runtime")]
pub mod timeout;

pub use adaptive::{
    AdaptiveBreaker, AdaptiveBreakerBuilder, AdaptiveBreakerConfig, AdaptiveBreakerConfigBuilder,
    AdaptiveBreakerMetrics,
};
pub use clock::{Clock, MockClock, SystemClock};
pub use error::{ConfigError, ConfigResult, ResilienceError, ResilienceResult};
pub use history::{History, OutcomeRecord};
pub use policy::{admission_probability, AdmissionRegime};
pub use random::{RandomSource, ScriptedRandom, SeededRandom, ThreadRandom};
pub use rate_limiter::{CallLimiter, RateLimiterConfig, RateLimiterConfigBuilder};
pub use retry::{Retry, RetryConfig, RetryConfigBuilder};
#[cfg(feature = "runtime")]
pub use timeout::{TimeoutConfig, TimeoutConfigBuilder, TimeoutGuard};
