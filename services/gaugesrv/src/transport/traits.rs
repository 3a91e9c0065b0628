//! Transport Layer Traits
//!
//! The link manager needs four things from the serial layer: list device
//! identifiers, open one with fixed settings, write bytes, close. Nothing is
//! ever read back from the device.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Transport layer error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Device enumeration failed
    #[error("Enumeration failed: {0}")]
    EnumerationFailed(String),

    /// Connection failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Send operation failed
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// Timeout occurred
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Link already closed
    #[error("Not connected: {0}")]
    NotConnected(String),
}

/// Serial parity setting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Parity {
    #[default]
    None,
    Even,
    Odd,
}

impl fmt::Display for Parity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Parity::None => write!(f, "None"),
            Parity::Even => write!(f, "Even"),
            Parity::Odd => write!(f, "Odd"),
        }
    }
}

/// Communication parameters, fixed at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialSettings {
    pub baud_rate: u32,
    pub data_bits: u8,
    pub stop_bits: u8,
    pub parity: Parity,
    /// Upper bound for a single write + flush
    pub write_timeout: Duration,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            baud_rate: 9600,
            data_bits: 8,
            stop_bits: 1,
            parity: Parity::None,
            write_timeout: Duration::from_millis(1000),
        }
    }
}

impl SerialSettings {
    /// Check the parameters against what a UART can do
    pub fn validate(&self) -> Result<(), TransportError> {
        if self.baud_rate == 0 {
            return Err(TransportError::ConfigError(
                "Baud rate must be greater than zero".to_string(),
            ));
        }

        if !(5..=8).contains(&self.data_bits) {
            return Err(TransportError::ConfigError(
                "Data bits must be 5, 6, 7, or 8".to_string(),
            ));
        }

        if ![1, 2].contains(&self.stop_bits) {
            return Err(TransportError::ConfigError(
                "Stop bits must be 1 or 2".to_string(),
            ));
        }

        if self.write_timeout.is_zero() {
            return Err(TransportError::ConfigError(
                "Write timeout must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

/// Per-link transfer statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkStats {
    /// Total bytes written
    pub bytes_sent: u64,
    /// Successful writes
    pub writes: u64,
    /// Failed or timed out writes
    pub failed_writes: u64,
}

impl LinkStats {
    /// Record a successful write
    pub fn record_write(&mut self, bytes: usize) {
        self.writes += 1;
        self.bytes_sent += bytes as u64;
    }

    /// Record a failed write
    pub fn record_failure(&mut self) {
        self.failed_writes += 1;
    }
}

/// An open serial device, exclusively owned by one connection attempt
#[async_trait]
pub trait SerialLink: Send + fmt::Debug {
    /// Device identifier this link was opened on
    fn port(&self) -> &str;

    /// Write all bytes and flush
    async fn write(&mut self, data: &[u8]) -> Result<(), TransportError>;

    /// Release the device; calling it again is a no-op
    async fn close(&mut self) -> Result<(), TransportError>;

    /// Transfer statistics so far
    fn stats(&self) -> LinkStats;
}

/// Device enumeration and open
#[async_trait]
pub trait SerialBackend: Send + Sync + fmt::Debug {
    /// Link type produced by `open`
    type Link: SerialLink + 'static;

    /// Backend name for logs
    fn name(&self) -> &str;

    /// Enumerated device identifiers, in platform order; empty is not an error
    async fn available_ports(&self) -> Result<Vec<String>, TransportError>;

    /// Open a device with the given settings
    async fn open(
        &self,
        port: &str,
        settings: &SerialSettings,
    ) -> Result<Self::Link, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_are_9600_8n1() {
        let settings = SerialSettings::default();
        assert_eq!(settings.baud_rate, 9600);
        assert_eq!(settings.data_bits, 8);
        assert_eq!(settings.stop_bits, 1);
        assert_eq!(settings.parity, Parity::None);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_settings_validation() {
        let settings = SerialSettings {
            baud_rate: 0,
            ..Default::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(TransportError::ConfigError(_))
        ));

        let settings = SerialSettings {
            data_bits: 9,
            ..Default::default()
        };
        assert!(settings.validate().is_err());

        let settings = SerialSettings {
            stop_bits: 3,
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_link_stats() {
        let mut stats = LinkStats::default();
        stats.record_write(2);
        stats.record_write(4);
        stats.record_failure();
        assert_eq!(stats.writes, 2);
        assert_eq!(stats.bytes_sent, 6);
        assert_eq!(stats.failed_writes, 1);
    }
}
