//! Sample-and-send loop
//!
//! One iteration: sample load over the interval, scale it, send the telemetry
//! command. Runs until a write fails or shutdown is requested.

use common::system_metrics::LoadSampler;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{wait_unless_cancelled, LinkTiming};
use crate::error::{LinkError, LinkResult};
use crate::protocol::{scale, send_command, Command, CommandError};
use crate::transport::SerialLink;

/// Counters kept across one streaming session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamCounters {
    pub commands_sent: u64,
    pub samples_skipped: u64,
}

/// Stream telemetry until failure or shutdown
///
/// Returns `Ok(())` on shutdown and `SendFailed` when the device stops
/// accepting writes. Sampling failures skip the tick and keep the connection.
/// No write is attempted once shutdown has been observed.
pub async fn stream<L, S>(
    link: &mut L,
    sampler: &mut S,
    timing: &LinkTiming,
    log_samples: bool,
    cancel: &CancellationToken,
    counters: &mut StreamCounters,
) -> LinkResult<()>
where
    L: SerialLink + ?Sized,
    S: LoadSampler + ?Sized,
{
    loop {
        if cancel.is_cancelled() {
            debug!(port = link.port(), "Streaming stopped");
            return Ok(());
        }

        let tick_started = Instant::now();
        let reading = tokio::select! {
            biased;
            () = cancel.cancelled() => return Ok(()),
            reading = sampler.sample(timing.sample_interval) => reading,
        };

        let load = match reading {
            Ok(Some(load)) if load.is_finite() => load,
            other => {
                let err = match other {
                    Err(e) => LinkError::SampleUnavailable(e.to_string()),
                    _ => LinkError::SampleUnavailable("no reading".to_string()),
                };
                warn!(port = link.port(), "Skipping tick: {err}");
                counters.samples_skipped += 1;

                // Keep the cadence when the sampler fails fast
                let remaining = timing.sample_interval.saturating_sub(tick_started.elapsed());
                if !remaining.is_zero() && !wait_unless_cancelled(remaining, cancel).await {
                    return Ok(());
                }
                continue;
            },
        };

        let value = scale(load);
        if log_samples {
            info!(load, value, "Percent: {load:.2}");
        } else {
            debug!(load, value, "Percent: {load:.2}");
        }

        match send_command(link, Command::telemetry(value), timing.line_pacing, cancel).await {
            Ok(()) => counters.commands_sent += 1,
            Err(CommandError::Cancelled) => return Ok(()),
            Err(CommandError::Transport(e)) => {
                return Err(LinkError::SendFailed {
                    port: link.port().to_string(),
                    reason: e.to_string(),
                })
            },
        }
    }
}
