//! Connection-lifecycle errors
//!
//! Every variant except [`LinkError::Cancelled`] is recoverable: the supervisor
//! logs it, closes whatever handle is open and retries after the backoff
//! delay. None of them is allowed to end the process.

use std::fmt;

use thiserror::Error;

/// Phase of a connection attempt, used as log context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkPhase {
    /// Enumerating devices and picking one
    Selecting,
    /// Opening the port and running the init handshake
    Initializing,
    /// Sampling and sending telemetry
    Streaming,
}

impl fmt::Display for LinkPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkPhase::Selecting => write!(f, "selecting"),
            LinkPhase::Initializing => write!(f, "initializing"),
            LinkPhase::Streaming => write!(f, "streaming"),
        }
    }
}

/// Link error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LinkError {
    /// Not enough devices enumerated to pick one
    #[error("No usable serial device ({found} enumerated, {required} required)")]
    NoDeviceFound { found: usize, required: usize },

    /// The enumeration primitive itself failed
    #[error("Serial device enumeration failed: {0}")]
    EnumerationFailed(String),

    /// Device present but could not be opened
    #[error("Failed to open {port}: {reason}")]
    OpenFailed { port: String, reason: String },

    /// Device opened but the init command could not be written
    #[error("Init handshake on {port} failed: {reason}")]
    InitFailed { port: String, reason: String },

    /// No CPU reading this tick
    #[error("Load sample unavailable: {0}")]
    SampleUnavailable(String),

    /// Telemetry write failed mid-stream
    #[error("Send to {port} failed: {reason}")]
    SendFailed { port: String, reason: String },

    /// A wait was interrupted by the shutdown signal
    #[error("Cancelled by shutdown request")]
    Cancelled,
}

/// Result type for link operations
pub type LinkResult<T> = Result<T, LinkError>;

impl LinkError {
    /// Phase in which this error is raised
    pub fn phase(&self) -> Option<LinkPhase> {
        match self {
            Self::NoDeviceFound { .. } | Self::EnumerationFailed(_) => Some(LinkPhase::Selecting),
            Self::OpenFailed { .. } | Self::InitFailed { .. } => Some(LinkPhase::Initializing),
            Self::SampleUnavailable(_) | Self::SendFailed { .. } => Some(LinkPhase::Streaming),
            Self::Cancelled => None,
        }
    }

    /// Port involved, when the error concerns a specific device
    pub fn port(&self) -> Option<&str> {
        match self {
            Self::OpenFailed { port, .. }
            | Self::InitFailed { port, .. }
            | Self::SendFailed { port, .. } => Some(port),
            _ => None,
        }
    }

    /// Whether the service can carry on after this error
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Cancelled)
    }

    /// Whether this error ends the current connection attempt and enters backoff
    ///
    /// `SampleUnavailable` does not: the tick is skipped, the connection kept.
    pub fn triggers_backoff(&self) -> bool {
        matches!(
            self,
            Self::NoDeviceFound { .. }
                | Self::EnumerationFailed(_)
                | Self::OpenFailed { .. }
                | Self::InitFailed { .. }
                | Self::SendFailed { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let err = LinkError::NoDeviceFound {
            found: 0,
            required: 1,
        };
        assert_eq!(err.phase(), Some(LinkPhase::Selecting));
        assert!(err.is_recoverable());
        assert!(err.triggers_backoff());
        assert_eq!(err.port(), None);

        let err = LinkError::SendFailed {
            port: "COM3".to_string(),
            reason: "broken pipe".to_string(),
        };
        assert_eq!(err.phase(), Some(LinkPhase::Streaming));
        assert_eq!(err.port(), Some("COM3"));
        assert!(err.triggers_backoff());

        let err = LinkError::SampleUnavailable("no data".to_string());
        assert!(err.is_recoverable());
        assert!(!err.triggers_backoff());

        assert!(!LinkError::Cancelled.is_recoverable());
        assert!(!LinkError::Cancelled.triggers_backoff());
        assert_eq!(LinkError::Cancelled.phase(), None);
    }

    #[test]
    fn test_display_carries_context() {
        let err = LinkError::InitFailed {
            port: "/dev/ttyACM0".to_string(),
            reason: "Send failed: device removed".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Init handshake on /dev/ttyACM0 failed: Send failed: device removed"
        );
        assert_eq!(LinkPhase::Initializing.to_string(), "initializing");
    }
}
