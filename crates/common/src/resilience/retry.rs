//! Fixed-pause retry wrapper
//!
//! Re-invokes a failing operation up to `max_attempts` times, pausing a fixed
//! duration between attempts. When every attempt fails, the last failure is
//! surfaced as [`ResilienceError::RetriesExhausted`]; unlike the adaptive
//! breaker, retry never swallows errors.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use super::{ConfigError, ConfigResult, ResilienceError, ResilienceResult};
use crate::utils::serde::duration_millis;

/// Configuration for retry behavior
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total number of attempts, including the first one
    pub max_attempts: u32,
    /// Pause between consecutive attempts
    #[serde(with = "duration_millis")]
    pub pause: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { max_attempts: 5, pause: Duration::from_millis(1500) }
    }
}

impl RetryConfig {
    /// Create a configuration builder
    pub fn builder() -> RetryConfigBuilder {
        RetryConfigBuilder::new()
    }

    /// Validate the configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_attempts == 0 {
            return Err(ConfigError::invalid("max_attempts must be greater than 0"));
        }
        Ok(())
    }
}

/// Builder for [`RetryConfig`]
#[derive(Debug)]
pub struct RetryConfigBuilder {
    config: RetryConfig,
}

impl Default for RetryConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RetryConfigBuilder {
    pub fn new() -> Self {
        Self { config: RetryConfig::default() }
    }

    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.max_attempts = attempts;
        self
    }

    pub fn pause(mut self, pause: Duration) -> Self {
        self.config.pause = pause;
        self
    }

    pub fn build(self) -> ConfigResult<RetryConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Retry executor
#[derive(Debug, Clone)]
pub struct Retry {
    config: RetryConfig,
}

impl Retry {
    /// Create a retry executor from a validated configuration
    pub fn new(config: RetryConfig) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Run a synchronous operation, sleeping the thread between attempts
    #[instrument(skip(self, operation), fields(max_attempts = self.config.max_attempts))]
    pub fn call<F, T, E>(&self, mut operation: F) -> ResilienceResult<T, E>
    where
        F: FnMut() -> Result<T, E>,
        E: std::error::Error + Send + Sync + 'static,
    {
        let mut attempt = 1;
        loop {
            match operation() {
                Ok(value) => return Ok(self.succeeded(value, attempt)),
                Err(error) => {
                    if attempt >= self.config.max_attempts {
                        return Err(self.exhausted(error));
                    }
                    warn!(attempt, error = %error, "Operation failed, retrying after {:?}", self.config.pause);
                    std::thread::sleep(self.config.pause);
                    attempt += 1;
                }
            }
        }
    }

    /// Run an asynchronous operation, awaiting a tokio sleep between attempts
    #[cfg(feature = "runtime")]
    #[instrument(skip(self, operation), fields(max_attempts = self.config.max_attempts))]
    pub async fn execute<F, Fut, T, E>(&self, mut operation: F) -> ResilienceResult<T, E>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
        E: std::error::Error + Send + Sync + 'static,
    {
        let mut attempt = 1;
        loop {
            match operation().await {
                Ok(value) => return Ok(self.succeeded(value, attempt)),
                Err(error) => {
                    if attempt >= self.config.max_attempts {
                        return Err(self.exhausted(error));
                    }
                    warn!(attempt, error = %error, "Operation failed, retrying after {:?}", self.config.pause);
                    tokio::time::sleep(self.config.pause).await;
                    attempt += 1;
                }
            }
        }
    }

    fn succeeded<T>(&self, value: T, attempt: u32) -> T {
        if attempt > 1 {
            debug!("Operation succeeded after {} attempts", attempt);
        }
        value
    }

    fn exhausted<E>(&self, error: E) -> ResilienceError<E>
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        warn!(
            "All {} attempts exhausted, last error: {}",
            self.config.max_attempts,
            DisplayError(&error)
        );
        ResilienceError::RetriesExhausted { attempts: self.config.max_attempts, source: error }
    }
}

struct DisplayError<'a, E>(&'a E);

impl<E: std::error::Error> fmt::Display for DisplayError<'_, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)?;
        let mut source = self.0.source();
        while let Some(cause) = source {
            write!(f, ": {cause}")?;
            source = cause.source();
        }
        Ok(())
    }
}
