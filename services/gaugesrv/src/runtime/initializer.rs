//! Link initialization
//!
//! Open the selected device, let it settle, send the init command, then prime
//! the load sampler. The caller owns the link and closes it on failure.

use std::time::Duration;

use common::system_metrics::LoadSampler;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{wait_unless_cancelled, LinkTiming};
use crate::error::{LinkError, LinkResult};
use crate::protocol::{send_command, Command, CommandError};
use crate::transport::{SerialBackend, SerialLink, SerialSettings};

/// Open `port` with the fixed communication parameters
pub async fn open_link<B>(backend: &B, port: &str, settings: &SerialSettings) -> LinkResult<B::Link>
where
    B: SerialBackend + ?Sized,
{
    backend
        .open(port, settings)
        .await
        .map_err(|e| LinkError::OpenFailed {
            port: port.to_string(),
            reason: e.to_string(),
        })
}

/// Settle, send the init command and prime the sampler
///
/// Fails with `InitFailed` if the init command cannot be written, `Cancelled`
/// if shutdown arrives while waiting. Warm-up sampling problems are only logged.
pub async fn handshake<L, S>(
    link: &mut L,
    sampler: &mut S,
    timing: &LinkTiming,
    cancel: &CancellationToken,
) -> LinkResult<()>
where
    L: SerialLink + ?Sized,
    S: LoadSampler + ?Sized,
{
    debug!(port = link.port(), "Waiting {:?} for device to settle", timing.settle_delay);
    if !wait_unless_cancelled(timing.settle_delay, cancel).await {
        return Err(LinkError::Cancelled);
    }

    match send_command(link, Command::INIT, timing.line_pacing, cancel).await {
        Ok(()) => {},
        Err(CommandError::Cancelled) => return Err(LinkError::Cancelled),
        Err(CommandError::Transport(e)) => {
            return Err(LinkError::InitFailed {
                port: link.port().to_string(),
                reason: e.to_string(),
            })
        },
    }
    info!(port = link.port(), "Init command sent");

    // Zero interval primes the averaging window without blocking
    let warmup = tokio::select! {
        biased;
        () = cancel.cancelled() => return Err(LinkError::Cancelled),
        reading = sampler.sample(Duration::ZERO) => reading,
    };
    match warmup {
        Ok(Some(load)) => debug!("Sampler warm-up reading {load:.1}%"),
        Ok(None) => debug!("Sampler primed"),
        Err(e) => warn!(port = link.port(), "Sampler warm-up failed: {e}"),
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use crate::transport::mock::{MockSerialBackend, ScriptedSampler};
    use common::system_metrics::SampleError;
    use tracing_test::traced_test;

    #[tokio::test]
    async fn test_open_failure_carries_port() {
        let backend = MockSerialBackend::new(["COM3"]);
        backend.fail_opens(1);

        let err = open_link(&backend, "COM3", &SerialSettings::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LinkError::OpenFailed { ref port, .. } if port == "COM3"));
        assert_eq!(backend.live_links(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_handshake_order_and_settle() {
        let backend = MockSerialBackend::new(["COM3"]);
        let mut link = open_link(&backend, "COM3", &SerialSettings::default())
            .await
            .unwrap();
        let mut sampler = ScriptedSampler::default();
        let cancel = CancellationToken::new();

        let started = tokio::time::Instant::now();
        handshake(&mut link, &mut sampler, &LinkTiming::default(), &cancel)
            .await
            .unwrap();

        // 5000 ms settle + 2 x 100 ms pacing
        assert_eq!(started.elapsed(), Duration::from_millis(5200));
        assert_eq!(backend.lines(), vec!["1", "255"]);
        assert_eq!(sampler.warmups(), 1);
        assert_eq!(sampler.samples(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_handshake_write_failure() {
        let backend = MockSerialBackend::new(["COM3"]);
        backend.fail_writes_after(0);
        let mut link = open_link(&backend, "COM3", &SerialSettings::default())
            .await
            .unwrap();
        let mut sampler = ScriptedSampler::default();

        let err = handshake(
            &mut link,
            &mut sampler,
            &LinkTiming::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, LinkError::InitFailed { ref port, .. } if port == "COM3"));
        assert_eq!(sampler.warmups(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_handshake_cancelled_during_settle() {
        let backend = MockSerialBackend::new(["COM3"]);
        let mut link = open_link(&backend, "COM3", &SerialSettings::default())
            .await
            .unwrap();
        let mut sampler = ScriptedSampler::default();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = handshake(&mut link, &mut sampler, &LinkTiming::default(), &cancel)
            .await
            .unwrap_err();

        assert_eq!(err, LinkError::Cancelled);
        assert!(backend.lines().is_empty());
    }

    #[tokio::test(start_paused = true)]
    #[traced_test]
    async fn test_warmup_failure_is_not_fatal() {
        #[derive(Debug)]
        struct BrokenSampler;

        #[async_trait::async_trait]
        impl LoadSampler for BrokenSampler {
            async fn sample(&mut self, _interval: Duration) -> Result<Option<f64>, SampleError> {
                Err(SampleError::Failed("counter unavailable".to_string()))
            }
        }

        let backend = MockSerialBackend::new(["COM3"]);
        let mut link = open_link(&backend, "COM3", &SerialSettings::default())
            .await
            .unwrap();

        let result = handshake(
            &mut link,
            &mut BrokenSampler,
            &LinkTiming::default(),
            &CancellationToken::new(),
        )
        .await;

        assert!(result.is_ok());
        assert!(logs_contain("Sampler warm-up failed"));
    }
}
