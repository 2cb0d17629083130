//! Deadline guard for async operations
//!
//! Bounds how long a single invocation may take. On expiry the operation's
//! future is dropped at its current await point and
//! [`ResilienceError::Timeout`] is returned.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};

use super::{ConfigError, ConfigResult, ResilienceError, ResilienceResult};
use crate::utils::serde::duration_millis;

/// Configuration for the timeout guard
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    #[serde(with = "duration_millis")]
    pub duration: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { duration: Duration::from_secs(10) }
    }
}

impl TimeoutConfig {
    /// Create a configuration builder
    pub fn builder() -> TimeoutConfigBuilder {
        TimeoutConfigBuilder::new()
    }

    /// Validate the configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if self.duration.is_zero() {
            return Err(ConfigError::invalid("duration must be greater than zero"));
        }
        Ok(())
    }
}

/// Builder for [`TimeoutConfig`]
#[derive(Debug, Default)]
pub struct TimeoutConfigBuilder {
    config: TimeoutConfig,
}

impl TimeoutConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn duration(mut self, duration: Duration) -> Self {
        self.config.duration = duration;
        self
    }

    pub fn build(self) -> ConfigResult<TimeoutConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Async deadline guard
#[derive(Debug, Clone)]
pub struct TimeoutGuard {
    config: TimeoutConfig,
}

impl TimeoutGuard {
    /// Create a guard from a configuration
    pub fn new(config: TimeoutConfig) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Create a guard for `duration`
    pub fn with_duration(duration: Duration) -> ConfigResult<Self> {
        Self::new(TimeoutConfig { duration })
    }

    pub fn duration(&self) -> Duration {
        self.config.duration
    }

    /// Run `operation`, failing with a timeout error if it does not finish in
    /// time
    #[instrument(skip(self, operation), fields(timeout = ?self.config.duration))]
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> ResilienceResult<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + Send + Sync + 'static,
    {
        match tokio::time::timeout(self.config.duration, operation()).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(source)) => Err(ResilienceError::OperationFailed { source }),
            Err(_elapsed) => {
                warn!("Operation timed out after {:?}", self.config.duration);
                Err(ResilienceError::Timeout { timeout: self.config.duration })
            }
        }
    }
}
