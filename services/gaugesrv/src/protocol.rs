//! Gauge line protocol
//!
//! A command is "set channel X to value Y", sent as two newline-terminated
//! decimal lines (`"X\n"`, then `"Y\n"`) with a fixed pause after each line.
//! The device parses every line on its own and never answers.

use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::runtime::wait_unless_cancelled;
use crate::transport::{SerialLink, TransportError};

/// Channel driven by the init handshake
pub const INIT_CHANNEL: u8 = 1;

/// Value sent with the init handshake
pub const INIT_VALUE: u8 = 255;

/// Channel carrying the scaled load
pub const TELEMETRY_CHANNEL: u8 = 0;

/// Output byte at 100% load
pub const FULL_SCALE: f64 = 255.0;

/// One "set channel to value" command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command {
    pub channel: u8,
    pub value: u8,
}

impl Command {
    /// Reset/init command sent once per connection
    pub const INIT: Command = Command {
        channel: INIT_CHANNEL,
        value: INIT_VALUE,
    };

    /// Telemetry command for an already scaled value
    pub fn telemetry(value: u8) -> Self {
        Self {
            channel: TELEMETRY_CHANNEL,
            value,
        }
    }

    /// The two wire lines, newline included
    pub fn lines(&self) -> [String; 2] {
        [format!("{}\n", self.channel), format!("{}\n", self.value)]
    }
}

/// Map a load percentage onto the output byte: `clamp(round(p * 2.55), 0, 255)`
///
/// Computed as `p * 255 / 100` so whole percentages land exactly on the .5
/// boundaries (`2.55` itself is not representable). Out-of-range input is
/// clamped; NaN maps to 0.
pub fn scale(percent: f64) -> u8 {
    if percent.is_nan() {
        return 0;
    }
    (percent * FULL_SCALE / 100.0).round().clamp(0.0, FULL_SCALE) as u8
}

/// Command send errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Shutdown requested between the two lines
    #[error("command abandoned on shutdown")]
    Cancelled,
}

/// Write one command: channel line, pause, value line, pause
///
/// A write failure aborts immediately; nothing is retried here. A shutdown
/// request during the pause between the lines abandons the command. The pause
/// after the value line ends early on shutdown but the command counts as sent.
pub async fn send_command<L>(
    link: &mut L,
    command: Command,
    pacing: Duration,
    cancel: &CancellationToken,
) -> Result<(), CommandError>
where
    L: SerialLink + ?Sized,
{
    let [channel, value] = command.lines();

    link.write(channel.as_bytes()).await?;
    if !wait_unless_cancelled(pacing, cancel).await {
        return Err(CommandError::Cancelled);
    }

    link.write(value.as_bytes()).await?;
    trace!(port = link.port(), channel = command.channel, value = command.value, "Command sent");
    wait_unless_cancelled(pacing, cancel).await;

    Ok(())
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use crate::transport::mock::MockSerialBackend;
    use crate::transport::{SerialBackend, SerialSettings};

    #[test]
    fn test_scale_endpoints_and_rounding() {
        assert_eq!(scale(0.0), 0);
        assert_eq!(scale(50.0), 128);
        assert_eq!(scale(90.0), 230);
        assert_eq!(scale(100.0), 255);
        assert_eq!(scale(1.0), 3);
        assert_eq!(scale(0.1), 0);
        assert_eq!(scale(0.2), 1);
    }

    #[test]
    fn test_scale_clamps_noise() {
        assert_eq!(scale(-3.0), 0);
        assert_eq!(scale(100.4), 255);
        assert_eq!(scale(250.0), 255);
        assert_eq!(scale(f64::NAN), 0);
        assert_eq!(scale(f64::INFINITY), 255);
    }

    #[test]
    fn test_scale_is_monotonic() {
        let mut previous = scale(0.0);
        for step in 1..=1000 {
            let current = scale(f64::from(step) / 10.0);
            assert!(current >= previous, "scale dropped at {step}");
            assert!(current - previous <= 1, "scale skipped a value at {step}");
            previous = current;
        }
        assert_eq!(previous, 255);
    }

    #[test]
    fn test_command_lines() {
        assert_eq!(Command::INIT.lines(), ["1\n".to_string(), "255\n".to_string()]);
        assert_eq!(
            Command::telemetry(42).lines(),
            ["0\n".to_string(), "42\n".to_string()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_command_paces_lines() {
        let backend = MockSerialBackend::new(["COM3"]);
        let mut link = backend
            .open("COM3", &SerialSettings::default())
            .await
            .unwrap();
        let cancel = CancellationToken::new();

        let started = tokio::time::Instant::now();
        send_command(&mut link, Command::INIT, Duration::from_millis(100), &cancel)
            .await
            .unwrap();

        assert_eq!(started.elapsed(), Duration::from_millis(200));
        assert_eq!(backend.lines(), vec!["1", "255"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_command_abandoned_between_lines() {
        let backend = MockSerialBackend::new(["COM3"]);
        let mut link = backend
            .open("COM3", &SerialSettings::default())
            .await
            .unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result =
            send_command(&mut link, Command::telemetry(9), Duration::from_millis(100), &cancel)
                .await;

        assert_eq!(result, Err(CommandError::Cancelled));
        assert_eq!(backend.lines(), vec!["0"]);
    }

    #[tokio::test]
    async fn test_send_command_write_failure() {
        let backend = MockSerialBackend::new(["COM3"]);
        backend.fail_writes_after(0);
        let mut link = backend
            .open("COM3", &SerialSettings::default())
            .await
            .unwrap();

        let result = send_command(
            &mut link,
            Command::INIT,
            Duration::from_millis(100),
            &CancellationToken::new(),
        )
        .await;

        assert!(matches!(
            result,
            Err(CommandError::Transport(TransportError::SendFailed(_)))
        ));
        assert!(backend.lines().is_empty());
    }
}
