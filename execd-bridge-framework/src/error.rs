//! Error types for the bridge framework.

use thiserror::Error;

/// Result type alias using [`BridgeError`].
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Errors that end a bridge run.
///
/// Stdin reaching end-of-stream is not an error; it is the collector asking
/// the bridge to stop.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration file not found.
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Configuration parse error.
    #[error("Failed to parse configuration: {0}")]
    ConfigParse(String),

    /// Configuration validation error.
    #[error("Configuration validation failed: {0}")]
    ConfigValidation(String),

    /// A yielded point does not meet the wire format requirements.
    #[error("Invalid point: {0}")]
    Validation(String),

    /// The producer raised while being advanced.
    #[error("Producer failed: {0:#}")]
    Producer(anyhow::Error),

    /// The runner already ran to completion.
    #[error("Bridge already stopped")]
    Stopped,

    /// I/O error on stdin or stdout.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl BridgeError {
    /// Create a configuration validation error.
    ///
    /// Invalid points use [`BridgeError::Validation`] instead.
    pub fn config_validation(msg: impl Into<String>) -> Self {
        Self::ConfigValidation(msg.into())
    }

    /// Wrap a producer failure.
    pub fn producer(err: impl Into<anyhow::Error>) -> Self {
        Self::Producer(err.into())
    }

    /// Wrap an error with context.
    pub fn with_context<E>(context: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::WithContext {
            context: context.into(),
            source: Box::new(source),
        }
    }
}

impl From<execd_common::Error> for BridgeError {
    fn from(err: execd_common::Error) -> Self {
        match err {
            execd_common::Error::Validation(msg) => Self::Validation(msg),
            execd_common::Error::Config(msg) => Self::Config(msg),
            execd_common::Error::Io(e) => Self::Io(e),
            other => Self::with_context("Encoding failed", other),
        }
    }
}

impl From<json5::Error> for BridgeError {
    fn from(err: json5::Error) -> Self {
        Self::ConfigParse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_maps_from_common() {
        let err: BridgeError = execd_common::Error::validation("point 'x' has no fields").into();
        assert!(matches!(err, BridgeError::Validation(_)));
        assert_eq!(err.to_string(), "Invalid point: point 'x' has no fields");
    }

    #[test]
    fn test_config_validation_is_not_point_validation() {
        let err = BridgeError::config_validation("timeout_secs must be positive");
        assert!(matches!(err, BridgeError::ConfigValidation(_)));
        assert_eq!(
            err.to_string(),
            "Configuration validation failed: timeout_secs must be positive"
        );
    }

    #[test]
    fn test_producer_display_includes_chain() {
        let inner = std::io::Error::new(std::io::ErrorKind::TimedOut, "inverter did not answer");
        let err = BridgeError::producer(anyhow::Error::new(inner).context("reading runtime data"));
        assert_eq!(
            err.to_string(),
            "Producer failed: reading runtime data: inverter did not answer"
        );
    }
}
