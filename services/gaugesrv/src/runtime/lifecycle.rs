//! Service lifecycle management
//!
//! The supervisor runs on one spawned task. The owner keeps a
//! [`ServiceHandle`]: it fires the shutdown token and waits for the task to
//! finish, at which point no link is open and no write is pending.

use common::system_metrics::LoadSampler;
use errors::{GaugeError, GaugeResult};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::supervisor::{LinkState, LinkSupervisor, SupervisorStats};
use crate::transport::SerialBackend;

/// Starts the link worker
#[derive(Debug)]
pub struct LinkService;

impl LinkService {
    /// Spawn the supervisor on its own task
    ///
    /// Must be called from within a tokio runtime.
    pub fn start<B, S>(supervisor: LinkSupervisor<B, S>) -> ServiceHandle
    where
        B: SerialBackend + 'static,
        S: LoadSampler + 'static,
    {
        let cancel = supervisor.cancel_token();
        let state_rx = supervisor.subscribe();
        let join = tokio::spawn(supervisor.run());

        info!("Link worker spawned");
        ServiceHandle {
            cancel,
            state_rx,
            join,
        }
    }
}

/// Owner side of a running link worker
#[derive(Debug)]
pub struct ServiceHandle {
    cancel: CancellationToken,
    state_rx: watch::Receiver<LinkState>,
    join: JoinHandle<SupervisorStats>,
}

impl ServiceHandle {
    /// Current supervisor state
    pub fn state(&self) -> LinkState {
        *self.state_rx.borrow()
    }

    /// Receiver for state changes
    pub fn subscribe(&self) -> watch::Receiver<LinkState> {
        self.state_rx.clone()
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Whether the worker has exited
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Request shutdown and wait for the worker to exit
    ///
    /// Calling this after the token was already fired elsewhere is fine; it
    /// still waits for the worker.
    pub async fn stop(self) -> GaugeResult<SupervisorStats> {
        self.cancel.cancel();
        self.join.await.map_err(|e| {
            error!("Link worker terminated abnormally: {e}");
            GaugeError::Internal(format!("link worker failed: {e}"))
        })
    }
}
