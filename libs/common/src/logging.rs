//! Logging bootstrap for the telemetry services
//!
//! Console output always; a daily rolling file when a log directory is
//! configured. `RUST_LOG` takes precedence over the configured level.

use std::path::PathBuf;
use std::sync::OnceLock;

use errors::{GaugeError, GaugeResult};
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{self, format::Writer, FmtContext, FormatEvent, FormatFields},
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

/// Custom format for log level with brackets: `[INFO]`, `[WARN]`, etc.
fn format_level(level: &Level) -> &'static str {
    match *level {
        Level::TRACE => "[TRACE]",
        Level::DEBUG => "[DEBUG]",
        Level::INFO => "[INFO]",
        Level::WARN => "[WARN]",
        Level::ERROR => "[ERROR]",
    }
}

/// Event formatter that outputs: `timestamp [LEVEL] message fields`
///
/// Example output: `2025-12-02T00:50:44.809512Z [INFO] Serial port opened port=COM3`
struct BracketedLevelFormat;

impl<S, N> FormatEvent<S, N> for BracketedLevelFormat
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let now = chrono::Utc::now();
        write!(writer, "{} ", now.format("%Y-%m-%dT%H:%M:%S%.6fZ"))?;

        let level = *event.metadata().level();
        if writer.has_ansi_escapes() {
            let color = match level {
                Level::TRACE => "\x1b[35m",
                Level::DEBUG => "\x1b[34m",
                Level::INFO => "\x1b[32m",
                Level::WARN => "\x1b[33m",
                Level::ERROR => "\x1b[31m",
            };
            write!(writer, "{}{}\x1b[0m ", color, format_level(&level))?;
        } else {
            write!(writer, "{} ", format_level(&level))?;
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;

        writeln!(writer)
    }
}

// Keeps the non-blocking file writer flushing until process exit
static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Logging options resolved from arguments and configuration
#[derive(Debug, Clone)]
pub struct LogOptions {
    /// Service name, used as file prefix and default filter target
    pub service_name: String,
    /// Level directive (`info`, `debug`, or a full filter like `info,gaugesrv=trace`)
    pub level: String,
    /// Directory for the rolling log file; console only when `None`
    pub log_dir: Option<PathBuf>,
    /// Colored console output
    pub ansi: bool,
}

impl LogOptions {
    /// Console-only options at the given level
    pub fn console(service_name: impl Into<String>, level: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            level: level.into(),
            log_dir: None,
            ansi: true,
        }
    }

    /// Build the filter: `RUST_LOG` if set, otherwise the configured level
    pub fn env_filter(&self) -> GaugeResult<EnvFilter> {
        if let Ok(env_str) = std::env::var("RUST_LOG") {
            if !env_str.trim().is_empty() {
                return EnvFilter::try_new(&env_str)
                    .map_err(|e| GaugeError::Logging(format!("invalid RUST_LOG '{env_str}': {e}")));
            }
        }
        parse_filter(&self.level)
    }
}

/// Parse a level or filter directive into an `EnvFilter`
pub fn parse_filter(directive: &str) -> GaugeResult<EnvFilter> {
    let directive = directive.trim();
    if directive.is_empty() {
        return Err(GaugeError::Logging("empty log level".to_string()));
    }
    EnvFilter::try_new(directive)
        .map_err(|e| GaugeError::Logging(format!("invalid log level '{directive}': {e}")))
}

/// Install the global subscriber
///
/// Fails if the level is not a valid filter, the log directory cannot be
/// created, or a subscriber is already installed.
pub fn init_logging(options: &LogOptions) -> GaugeResult<()> {
    let env_filter = options.env_filter()?;

    let registry = tracing_subscriber::registry().with(env_filter);

    let console_layer = fmt::layer()
        .with_ansi(options.ansi)
        .event_format(BracketedLevelFormat)
        .boxed();

    let file_layer = match &options.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let appender =
                tracing_appender::rolling::daily(dir, format!("{}.log", options.service_name));
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            if FILE_GUARD.set(guard).is_err() {
                return Err(GaugeError::Logging(
                    "file logging already initialized".to_string(),
                ));
            }
            Some(
                fmt::layer()
                    .with_writer(non_blocking)
                    .with_ansi(false)
                    .event_format(BracketedLevelFormat)
                    .boxed(),
            )
        },
        None => None,
    };

    registry
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| GaugeError::Logging(e.to_string()))?;

    match &options.log_dir {
        Some(dir) => tracing::info!("Logging: {} @ {:?}", options.service_name, dir),
        None => tracing::debug!("Logging: {} (console only)", options.service_name),
    }

    Ok(())
}
