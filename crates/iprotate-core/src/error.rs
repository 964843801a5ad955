//! Error types for the rotation service
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Result type alias for rotation operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the rotation service
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors (unreadable, malformed or invalid)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Logical instance name not present in the configuration
    #[error("Instance not found: {0}")]
    NotFound(String),

    /// Provider-specific error
    #[error("Provider error ({provider}): {message}")]
    Provider {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a provider-specific error
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Whether this error came from a provider call
    pub fn is_provider(&self) -> bool {
        matches!(self, Self::Provider { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_carries_the_requested_name() {
        let err = Error::not_found(" proxy ");
        assert!(!err.is_provider());
        assert_eq!(err.to_string(), "Instance not found:  proxy ");
    }

    #[test]
    fn provider_error_names_the_provider() {
        let err = Error::provider("lightsail", "quota exceeded");
        assert!(err.is_provider());
        assert_eq!(err.to_string(), "Provider error (lightsail): quota exceeded");
    }
}
