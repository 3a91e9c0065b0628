//! Process-level error handling for the gauge telemetry services
//!
//! Errors defined here are the ones allowed to reach `main`: configuration
//! problems detected at startup, a logger that cannot be installed, and other
//! bootstrap failures. Device and sampling failures never end up here; the
//! link supervisor handles those locally and keeps retrying.

use thiserror::Error;

// ============================================================================
// GaugeError - Main error type
// ============================================================================

/// Main error type for service bootstrap
#[derive(Debug, Error)]
pub enum GaugeError {
    // ======================================
    // Configuration Errors
    // ======================================
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid configuration: {field}: {reason}")]
    InvalidConfig { field: String, reason: String },

    // ======================================
    // Runtime Errors
    // ======================================
    #[error("Logging setup failed: {0}")]
    Logging(String),

    #[error("Serial error: {0}")]
    Serial(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using GaugeError
pub type GaugeResult<T> = Result<T, GaugeError>;

impl GaugeError {
    /// Shorthand for an [`GaugeError::InvalidConfig`] error
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Whether the error comes from configuration (exit code 2 rather than 1)
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::InvalidConfig { .. })
    }

    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        if self.is_configuration() {
            2
        } else {
            1
        }
    }
}

impl From<serde_yaml::Error> for GaugeError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Configuration(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_config_display() {
        let err = GaugeError::invalid_config("serial.baud_rate", "must be greater than zero");
        assert_eq!(
            err.to_string(),
            "Invalid configuration: serial.baud_rate: must be greater than zero"
        );
        assert!(err.is_configuration());
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_runtime_errors_exit_code() {
        let err = GaugeError::Logging("no writer".to_string());
        assert!(!err.is_configuration());
        assert_eq!(err.exit_code(), 1);

        let err: GaugeError = std::io::Error::other("disk full").into();
        assert!(matches!(err, GaugeError::Io(_)));
        assert_eq!(err.exit_code(), 1);
    }
}
