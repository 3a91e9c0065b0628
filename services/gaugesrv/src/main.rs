//! gaugesrv entry point
//!
//! Loads configuration, installs logging, starts the link worker and waits for
//! Ctrl+C / SIGTERM. Only configuration and bootstrap errors end the process.

use anyhow::Context;
use common::logging::{init_logging, LogOptions};
use common::service_bootstrap::print_startup_banner;
use common::shutdown::wait_for_shutdown;
use common::{Parser, ServiceArgs, ServiceInfo, SysinfoSampler};
use errors::GaugeResult;
use tracing::{error, info};

use gaugesrv::{
    GaugeConfig, LinkService, LinkSupervisor, SerialBackend, TokioSerialBackend, SERVICE_NAME,
};

#[tokio::main]
async fn main() {
    let args = ServiceArgs::parse();

    if let Err(e) = run(args).await {
        error!("{SERVICE_NAME} failed: {e}");
        eprintln!("{SERVICE_NAME}: {e}");
        std::process::exit(e.exit_code());
    }
}

async fn run(args: ServiceArgs) -> GaugeResult<()> {
    let config = GaugeConfig::load(&args.config)?;

    if args.validate {
        println!("Configuration OK ({})", args.config);
        print!("{}", config.to_yaml()?);
        return Ok(());
    }

    let log_options = LogOptions {
        service_name: SERVICE_NAME.to_string(),
        level: args.effective_log_level(&config.logging.level).to_string(),
        log_dir: config.logging.dir.clone(),
        ansi: !args.no_color,
    };
    init_logging(&log_options)?;

    if args.list_ports {
        list_ports(&config).await?;
        return Ok(());
    }

    print_startup_banner(&ServiceInfo::new(
        SERVICE_NAME,
        env!("CARGO_PKG_VERSION"),
        "CPU load telemetry for serial gauges",
    ));
    info!("Configuration: {}", args.config);

    let settings = config.link_settings(args.log_samples());
    let supervisor = LinkSupervisor::new(TokioSerialBackend::new(), SysinfoSampler::new(), settings);
    let handle = LinkService::start(supervisor);

    wait_for_shutdown().await;
    info!("Shutdown requested, stopping link worker");

    let stats = handle.stop().await?;
    info!(
        attempts = stats.attempts,
        sessions = stats.sessions,
        commands = stats.commands_sent,
        skipped = stats.samples_skipped,
        "{SERVICE_NAME} stopped"
    );
    Ok(())
}

/// Print the enumerated devices and the one the selection policy would use
async fn list_ports(config: &GaugeConfig) -> anyhow::Result<()> {
    let backend = TokioSerialBackend::new();
    let ports = backend
        .available_ports()
        .await
        .context("failed to enumerate serial devices")?;

    if ports.is_empty() {
        println!("No serial devices found");
    }
    for (index, port) in ports.iter().enumerate() {
        println!("  [{index}] {port}");
    }

    match config.selection.select(&ports) {
        Ok(port) => println!("Selected: {port}"),
        Err(e) => println!("Selected: none ({e})"),
    }
    Ok(())
}
