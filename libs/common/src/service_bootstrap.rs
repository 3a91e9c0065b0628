//! Service bootstrap utilities
//!
//! Startup banner and service metadata shared by the telemetry services.

use tracing::info;

/// Service metadata for startup
#[derive(Debug, Clone)]
pub struct ServiceInfo {
    /// Service name (e.g., "gaugesrv")
    pub name: String,
    /// Service version from Cargo.toml
    pub version: String,
    /// Service description
    pub description: String,
}

impl ServiceInfo {
    /// Create new service info
    ///
    /// The version is the caller's package version, so pass
    /// `env!("CARGO_PKG_VERSION")` from the service crate.
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            description: description.into(),
        }
    }
}

/// Print startup banner for a service
pub fn print_startup_banner(service: &ServiceInfo) {
    let banner = match service.name.as_str() {
        "gaugesrv" => {
            r#"
  ██████╗  █████╗ ██╗   ██╗ ██████╗ ███████╗███████╗██████╗ ██╗   ██╗
 ██╔════╝ ██╔══██╗██║   ██║██╔════╝ ██╔════╝██╔════╝██╔══██╗██║   ██║
 ██║  ███╗███████║██║   ██║██║  ███╗█████╗  ███████╗██████╔╝██║   ██║
 ██║   ██║██╔══██║██║   ██║██║   ██║██╔══╝  ╚════██║██╔══██╗╚██╗ ██╔╝
 ╚██████╔╝██║  ██║╚██████╔╝╚██████╔╝███████╗███████║██║  ██║ ╚████╔╝
  ╚═════╝ ╚═╝  ╚═╝ ╚═════╝  ╚═════╝ ╚══════╝╚══════╝╚═╝  ╚═╝  ╚═══╝
            "#
        },
        _ => "",
    };

    if !banner.is_empty() {
        info!("{}", banner);
    }
    info!(" {} v{}", service.name.to_uppercase(), service.version);
    info!(" {}", service.description);
    info!("");
}
