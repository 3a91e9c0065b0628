//! Gauge telemetry basic library
//!
//! Provides functions shared by the telemetry services, including:
//! - logging bootstrap
//! - shutdown signal handling
//! - command-line arguments
//! - host CPU load sampling

pub mod bootstrap_args;
pub mod logging;
pub mod service_bootstrap;
pub mod shutdown;
pub mod system_metrics;

pub use bootstrap_args::ServiceArgs;
pub use logging::LogOptions;
pub use service_bootstrap::ServiceInfo;
pub use system_metrics::{LoadSampler, SampleError, SysinfoSampler};

// Re-export common dependencies
pub use tokio;

// Re-export CLI dependencies when cli feature is enabled
#[cfg(feature = "cli")]
pub use clap;

// Re-export clap derive macros separately for proper macro resolution
#[cfg(feature = "cli")]
pub use clap::Parser;
