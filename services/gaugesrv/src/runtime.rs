//! Runtime Orchestration Layer
//!
//! The telemetry link state machine and the task that runs it: link
//! initialization, the sample-and-send loop, the reconnect supervisor and its
//! service handle.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

pub mod initializer;
pub mod lifecycle;
pub mod streaming;
pub mod supervisor;

// Re-export common types
pub use lifecycle::{LinkService, ServiceHandle};
pub use streaming::StreamCounters;
pub use supervisor::{LinkSettings, LinkState, LinkSupervisor, SupervisorStats};

/// Fixed delays of the connection state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkTiming {
    /// Wait after open before the init command
    pub settle_delay: Duration,
    /// Sampling window per telemetry tick
    pub sample_interval: Duration,
    /// Pause after every protocol line
    pub line_pacing: Duration,
    /// Wait between connection attempts
    pub backoff: Duration,
}

impl Default for LinkTiming {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_millis(5000),
            sample_interval: Duration::from_millis(500),
            line_pacing: Duration::from_millis(100),
            backoff: Duration::from_millis(2000),
        }
    }
}

/// Sleep for `duration` unless shutdown is requested first
///
/// Returns `true` when the full duration elapsed, `false` on cancellation.
/// An already fired token returns immediately.
pub async fn wait_unless_cancelled(duration: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        () = cancel.cancelled() => false,
        () = tokio::time::sleep(duration) => true,
    }
}
