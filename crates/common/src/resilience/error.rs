//! Error types shared by the resilience primitives

use std::time::Duration;

use thiserror::Error;

/// Configuration error raised when a primitive is built with invalid settings
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

impl ConfigError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid { message: message.into() }
    }
}

/// Configuration result type
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors surfaced by the retry and timeout wrappers
///
/// Generic over the wrapped operation's error `E` so the original failure is
/// preserved as the error source. The adaptive breaker never returns this
/// type; it absorbs operation failures instead.
#[derive(Debug, Error)]
pub enum ResilienceError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    /// Operation did not complete within the allotted duration
    #[error("Operation timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    /// Every retry attempt failed; carries the last failure
    #[error("Failed all {attempts} attempts")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: E,
    },

    /// The wrapped operation failed
    #[error("Operation failed")]
    OperationFailed {
        #[source]
        source: E,
    },
}

impl<E> ResilienceError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    /// Whether this error is a timeout expiry
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Consume the error and return the wrapped operation error, if any
    pub fn into_source(self) -> Option<E> {
        match self {
            Self::Timeout { .. } => None,
            Self::RetriesExhausted { source, .. } | Self::OperationFailed { source } => {
                Some(source)
            }
        }
    }
}

/// Result type for resilience operations
pub type ResilienceResult<T, E> = Result<T, ResilienceError<E>>;
