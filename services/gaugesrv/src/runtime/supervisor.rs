//! Reconnect supervisor
//!
//! ```text
//! SELECTING -> INITIALIZING -> STREAMING
//!     ^             |              |
//!     |             v              v
//!     +-------- BACKOFF <----------+
//!
//! any state --shutdown--> STOPPING
//! ```
//!
//! Every failure is local: the open link (if any) is closed, the supervisor
//! waits the backoff delay and starts over. There is no retry limit. At most
//! one link is open at any time and each opened link is closed exactly once.

use std::fmt;

use common::system_metrics::LoadSampler;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::initializer::{handshake, open_link};
use super::streaming::{stream, StreamCounters};
use super::{wait_unless_cancelled, LinkTiming};
use crate::error::{LinkError, LinkResult};
use crate::selector::{select_device, SelectionPolicy};
use crate::transport::{SerialBackend, SerialLink, SerialSettings};

/// Supervisor state, published to observers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Selecting,
    Initializing,
    Streaming,
    Backoff,
    /// Terminal
    Stopping,
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkState::Selecting => write!(f, "SELECTING"),
            LinkState::Initializing => write!(f, "INITIALIZING"),
            LinkState::Streaming => write!(f, "STREAMING"),
            LinkState::Backoff => write!(f, "BACKOFF"),
            LinkState::Stopping => write!(f, "STOPPING"),
        }
    }
}

/// Startup-fixed settings for the supervisor
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkSettings {
    pub serial: SerialSettings,
    pub timing: LinkTiming,
    pub selection: SelectionPolicy,
    /// Log every reading at info level (foreground mode)
    pub log_samples: bool,
}

/// Counters reported when the supervisor stops
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SupervisorStats {
    /// Connection attempts started (each begins with enumeration)
    pub attempts: u64,
    /// Attempts that reached streaming
    pub sessions: u64,
    pub commands_sent: u64,
    pub samples_skipped: u64,
    /// Backoff waits entered
    pub backoffs: u64,
    /// Most recent failure
    pub last_error: Option<LinkError>,
}

impl SupervisorStats {
    fn absorb(&mut self, counters: StreamCounters) {
        self.commands_sent += counters.commands_sent;
        self.samples_skipped += counters.samples_skipped;
    }
}

/// Drives select, initialize, stream and backoff on one task
#[derive(Debug)]
pub struct LinkSupervisor<B, S>
where
    B: SerialBackend,
    S: LoadSampler,
{
    backend: B,
    sampler: S,
    settings: LinkSettings,
    cancel: CancellationToken,
    state_tx: watch::Sender<LinkState>,
    stats: SupervisorStats,
}

impl<B, S> LinkSupervisor<B, S>
where
    B: SerialBackend,
    S: LoadSampler,
{
    /// Create new supervisor with its own shutdown token
    pub fn new(backend: B, sampler: S, settings: LinkSettings) -> Self {
        Self::with_cancellation(backend, sampler, settings, CancellationToken::new())
    }

    /// Create new supervisor observing an existing shutdown token
    pub fn with_cancellation(
        backend: B,
        sampler: S,
        settings: LinkSettings,
        cancel: CancellationToken,
    ) -> Self {
        let (state_tx, _) = watch::channel(LinkState::Selecting);
        Self {
            backend,
            sampler,
            settings,
            cancel,
            state_tx,
            stats: SupervisorStats::default(),
        }
    }

    /// Token that stops the supervisor when fired
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Observe state changes
    pub fn subscribe(&self) -> watch::Receiver<LinkState> {
        self.state_tx.subscribe()
    }

    pub fn settings(&self) -> &LinkSettings {
        &self.settings
    }

    /// Run until shutdown; returns the final counters
    pub async fn run(mut self) -> SupervisorStats {
        info!(
            backend = self.backend.name(),
            baud = self.settings.serial.baud_rate,
            "Link supervisor started"
        );

        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            self.stats.attempts += 1;
            let attempt = self.stats.attempts;

            match self.attempt().await {
                Ok(()) | Err(LinkError::Cancelled) => break,
                Err(err) => self.record_failure(attempt, err),
            }

            self.set_state(LinkState::Backoff);
            self.stats.backoffs += 1;
            debug!("Retrying in {:?}", self.settings.timing.backoff);
            if !wait_unless_cancelled(self.settings.timing.backoff, &self.cancel).await {
                break;
            }
        }

        self.set_state(LinkState::Stopping);
        info!(
            attempts = self.stats.attempts,
            sessions = self.stats.sessions,
            commands = self.stats.commands_sent,
            "Link supervisor stopped"
        );
        self.stats
    }

    /// One pass through select, initialize and stream
    ///
    /// `Ok(())` means shutdown was observed while streaming. Whatever link was
    /// opened is closed before returning.
    async fn attempt(&mut self) -> LinkResult<()> {
        self.set_state(LinkState::Selecting);
        let port = select_device(&self.backend, &self.settings.selection).await?;
        if self.cancel.is_cancelled() {
            return Err(LinkError::Cancelled);
        }

        self.set_state(LinkState::Initializing);
        info!(port = %port, "Selected serial device");
        let mut link = open_link(&self.backend, &port, &self.settings.serial).await?;

        let result = self.drive(&mut link).await;

        if let Err(e) = link.close().await {
            warn!(port = %port, "Close failed: {e}");
        }
        let link_stats = link.stats();
        debug!(
            port = %port,
            writes = link_stats.writes,
            bytes = link_stats.bytes_sent,
            "Link released"
        );

        result
    }

    /// Handshake then stream on an open link
    async fn drive(&mut self, link: &mut B::Link) -> LinkResult<()> {
        handshake(link, &mut self.sampler, &self.settings.timing, &self.cancel).await?;

        self.set_state(LinkState::Streaming);
        self.stats.sessions += 1;
        info!(port = link.port(), "Streaming load telemetry");

        let mut counters = StreamCounters::default();
        let result = stream(
            link,
            &mut self.sampler,
            &self.settings.timing,
            self.settings.log_samples,
            &self.cancel,
            &mut counters,
        )
        .await;
        self.stats.absorb(counters);
        result
    }

    fn record_failure(&mut self, attempt: u64, err: LinkError) {
        let phase = err
            .phase()
            .map_or_else(|| "-".to_string(), |phase| phase.to_string());
        let port = err.port().unwrap_or("-");

        match err {
            LinkError::NoDeviceFound { .. } => {
                info!(%phase, attempt, "{err}");
            },
            _ => {
                warn!(%phase, port, attempt, "Connection attempt failed: {err}");
            },
        }
        self.stats.last_error = Some(err);
    }

    fn set_state(&self, state: LinkState) {
        let previous = self.state_tx.send_replace(state);
        if previous != state {
            debug!(%state, "Link state");
        }
    }
}
