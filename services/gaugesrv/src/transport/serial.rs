//! Serial Transport Implementation
//!
//! tokio-serial backed enumeration, open and write.

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::time::timeout;
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::{debug, info, warn};

use super::traits::{LinkStats, Parity, SerialBackend, SerialLink, SerialSettings, TransportError};

/// Backend over the host's real serial devices
#[derive(Debug, Clone, Default)]
pub struct TokioSerialBackend;

impl TokioSerialBackend {
    /// Create new serial backend
    pub fn new() -> Self {
        Self
    }
}

/// Convert parity to tokio_serial parity
fn parse_parity(parity: Parity) -> tokio_serial::Parity {
    match parity {
        Parity::Even => tokio_serial::Parity::Even,
        Parity::Odd => tokio_serial::Parity::Odd,
        Parity::None => tokio_serial::Parity::None,
    }
}

/// Convert data bits to tokio_serial data bits
fn parse_data_bits(data_bits: u8) -> tokio_serial::DataBits {
    match data_bits {
        5 => tokio_serial::DataBits::Five,
        6 => tokio_serial::DataBits::Six,
        7 => tokio_serial::DataBits::Seven,
        _ => tokio_serial::DataBits::Eight,
    }
}

/// Convert stop bits to tokio_serial stop bits
fn parse_stop_bits(stop_bits: u8) -> tokio_serial::StopBits {
    match stop_bits {
        2 => tokio_serial::StopBits::Two,
        _ => tokio_serial::StopBits::One,
    }
}

#[async_trait]
impl SerialBackend for TokioSerialBackend {
    type Link = TokioSerialLink;

    fn name(&self) -> &str {
        "tokio-serial"
    }

    async fn available_ports(&self) -> Result<Vec<String>, TransportError> {
        // Enumeration walks sysfs / the registry; keep it off the runtime threads
        let ports = tokio::task::spawn_blocking(tokio_serial::available_ports)
            .await
            .map_err(|e| TransportError::EnumerationFailed(e.to_string()))?
            .map_err(|e| TransportError::EnumerationFailed(e.to_string()))?;

        Ok(ports.into_iter().map(|info| info.port_name).collect())
    }

    async fn open(
        &self,
        port: &str,
        settings: &SerialSettings,
    ) -> Result<Self::Link, TransportError> {
        settings.validate()?;

        debug!(port, baud = settings.baud_rate, "Opening serial port");

        let stream = tokio_serial::new(port, settings.baud_rate)
            .data_bits(parse_data_bits(settings.data_bits))
            .parity(parse_parity(settings.parity))
            .stop_bits(parse_stop_bits(settings.stop_bits))
            .flow_control(tokio_serial::FlowControl::None)
            .timeout(settings.write_timeout)
            .open_native_async()
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

        info!(port, "Opened serial port");

        Ok(TokioSerialLink {
            port: port.to_string(),
            stream: Some(stream),
            write_timeout: settings.write_timeout,
            stats: LinkStats::default(),
        })
    }
}

/// Open tokio-serial stream
#[derive(Debug)]
pub struct TokioSerialLink {
    port: String,
    /// `None` once closed
    stream: Option<SerialStream>,
    write_timeout: std::time::Duration,
    stats: LinkStats,
}

#[async_trait]
impl SerialLink for TokioSerialLink {
    fn port(&self) -> &str {
        &self.port
    }

    async fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let Some(stream) = self.stream.as_mut() else {
            return Err(TransportError::NotConnected(self.port.clone()));
        };

        let send_operation = async {
            stream.write_all(data).await?;
            stream.flush().await?;
            Ok::<_, std::io::Error>(data.len())
        };

        match timeout(self.write_timeout, send_operation).await {
            Ok(Ok(bytes_sent)) => {
                self.stats.record_write(bytes_sent);
                Ok(())
            },
            Ok(Err(e)) => {
                self.stats.record_failure();
                Err(TransportError::SendFailed(e.to_string()))
            },
            Err(_) => {
                self.stats.record_failure();
                let error_msg = format!("Write timed out after {:?}", self.write_timeout);
                warn!(port = %self.port, "{error_msg}");
                Err(TransportError::Timeout(error_msg))
            },
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if let Some(mut stream) = self.stream.take() {
            // Best effort; the port is released on drop either way
            if let Err(e) = stream.shutdown().await {
                debug!(port = %self.port, "Shutdown before close failed: {e}");
            }
            info!(port = %self.port, "Closed serial port");
        }
        Ok(())
    }

    fn stats(&self) -> LinkStats {
        self.stats.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameter_conversion() {
        assert_eq!(parse_data_bits(7), tokio_serial::DataBits::Seven);
        assert_eq!(parse_data_bits(8), tokio_serial::DataBits::Eight);
        assert_eq!(parse_stop_bits(2), tokio_serial::StopBits::Two);
        assert_eq!(parse_stop_bits(1), tokio_serial::StopBits::One);
        assert_eq!(parse_parity(Parity::Odd), tokio_serial::Parity::Odd);
        assert_eq!(parse_parity(Parity::None), tokio_serial::Parity::None);
    }

    #[tokio::test]
    async fn test_open_missing_device_fails() {
        let backend = TokioSerialBackend::new();
        let result = backend
            .open("/dev/gaugesrv-does-not-exist", &SerialSettings::default())
            .await;
        assert!(matches!(result, Err(TransportError::ConnectionFailed(_))));
    }

    #[tokio::test]
    async fn test_open_rejects_invalid_settings() {
        let backend = TokioSerialBackend::new();
        let settings = SerialSettings {
            baud_rate: 0,
            ..Default::default()
        };
        let result = backend.open("/dev/ttyUSB0", &settings).await;
        assert!(matches!(result, Err(TransportError::ConfigError(_))));
    }
}
