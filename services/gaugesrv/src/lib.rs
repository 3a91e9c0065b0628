//! Gauge Telemetry Service Library (gaugesrv)
//!
//! Samples host CPU load and streams it, scaled to one byte, to a serial gauge
//! controller. The service survives the device being unplugged or not yet
//! enumerated: every device or sampling failure is handled by reconnecting.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐    ┌─────────────────┐    ┌─────────────────┐
//! │ Device Selector │───►│ Link Initializer│───►│ Sample-and-Send │
//! │ (last port)     │    │ (settle + init) │    │ (500 ms ticks)  │
//! └─────────────────┘    └─────────────────┘    └─────────────────┘
//!          ▲                                             │
//!          │            ┌─────────────────┐              │
//!          └────────────│ Reconnect       │◄─────────────┘
//!                       │ Supervisor      │
//!                       └─────────────────┘
//! ```
//!
//! - **`selector`**: device selection policy
//! - **`protocol`**: two-line command encoding and load scaling
//! - **`transport`**: serial backend traits, tokio-serial implementation, mocks
//! - **`runtime`**: initializer, streaming loop, supervisor state machine, service handle
//! - **`config`**: figment-based configuration

pub mod config;
pub mod error;
pub mod protocol;
pub mod runtime;
pub mod selector;
pub mod transport;

pub use config::GaugeConfig;
pub use error::{LinkError, LinkPhase, LinkResult};
pub use protocol::{scale, Command};
pub use runtime::{
    LinkService, LinkSettings, LinkState, LinkSupervisor, LinkTiming, ServiceHandle,
    SupervisorStats,
};
pub use selector::SelectionPolicy;
pub use transport::{SerialBackend, SerialLink, SerialSettings, TokioSerialBackend};

/// Service name used for logs and the banner
pub const SERVICE_NAME: &str = "gaugesrv";
