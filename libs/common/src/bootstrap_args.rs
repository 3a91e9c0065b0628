//! Command-line arguments for the telemetry services
//!
//! Everything here is read once at startup. None of it can be changed while the
//! service is running.

#[cfg(feature = "cli")]
use clap::Parser;

/// Default configuration file, relative to the working directory
pub const DEFAULT_CONFIG_PATH: &str = "config/gaugesrv.yaml";

/// Service startup arguments
#[derive(Debug, Clone)]
#[cfg_attr(feature = "cli", derive(Parser))]
#[cfg_attr(feature = "cli", clap(author, version, about))]
pub struct ServiceArgs {
    /// Configuration file (YAML); skipped when it does not exist
    #[cfg_attr(
        feature = "cli",
        clap(short = 'c', long, default_value = DEFAULT_CONFIG_PATH, env = "GAUGESRV_CONFIG")
    )]
    pub config: String,

    /// Log level override (trace, debug, info, warn, error)
    #[cfg_attr(feature = "cli", clap(short = 'l', long, env = "RUST_LOG"))]
    pub log_level: Option<String>,

    /// Running unattended under a service manager: per-sample readings are
    /// logged at debug level instead of info
    #[cfg_attr(feature = "cli", clap(long))]
    pub service: bool,

    /// Disable colored output (useful for log files)
    #[cfg_attr(feature = "cli", clap(long))]
    pub no_color: bool,

    /// Only validate configuration without starting service
    #[cfg_attr(feature = "cli", clap(long))]
    pub validate: bool,

    /// List the serial devices currently enumerated and exit
    #[cfg_attr(feature = "cli", clap(long))]
    pub list_ports: bool,
}

impl Default for ServiceArgs {
    fn default() -> Self {
        Self {
            config: DEFAULT_CONFIG_PATH.to_string(),
            log_level: None,
            service: false,
            no_color: false,
            validate: false,
            list_ports: false,
        }
    }
}

impl ServiceArgs {
    /// Effective log level: command line first, then the configured one
    pub fn effective_log_level<'a>(&'a self, configured: &'a str) -> &'a str {
        self.log_level
            .as_deref()
            .filter(|level| !level.trim().is_empty())
            .unwrap_or(configured)
    }

    /// Whether the process runs one-shot instead of as the long-lived service
    pub fn is_one_shot(&self) -> bool {
        self.validate || self.list_ports
    }

    /// Whether every sample should be logged at info level
    pub fn log_samples(&self) -> bool {
        !self.service
    }
}
