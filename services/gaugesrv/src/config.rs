//! gaugesrv configuration
//!
//! Loaded once at startup: built-in defaults, then the YAML file (if present),
//! then `GAUGESRV_*` environment variables (`__` separates sections, e.g.
//! `GAUGESRV_TIMING__BACKOFF_MS`). Nothing here changes while the service runs.

use std::path::{Path, PathBuf};
use std::time::Duration;

use errors::{GaugeError, GaugeResult};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::runtime::{LinkSettings, LinkTiming};
use crate::selector::SelectionPolicy;
use crate::transport::{Parity, SerialSettings};

/// Environment variable prefix
pub const ENV_PREFIX: &str = "GAUGESRV_";

/// Serial line parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    pub baud_rate: u32,
    pub data_bits: u8,
    pub stop_bits: u8,
    pub parity: Parity,
    pub write_timeout_ms: u64,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baud_rate: 9600,
            data_bits: 8,
            stop_bits: 1,
            parity: Parity::None,
            write_timeout_ms: 1000,
        }
    }
}

/// Delays of the connection state machine, in milliseconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Wait after open before the first write (the board resets on connect)
    pub settle_delay_ms: u64,
    pub sample_interval_ms: u64,
    /// Pause after each protocol line
    pub line_pacing_ms: u64,
    /// Wait between connection attempts
    pub backoff_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: 5000,
            sample_interval_ms: 500,
            line_pacing_ms: 100,
            backoff_ms: 2000,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Level or filter directive
    pub level: String,
    /// Directory for daily rolling log files; console only when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            dir: None,
        }
    }
}

/// Service configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GaugeConfig {
    pub serial: SerialConfig,
    pub timing: TimingConfig,
    pub selection: SelectionPolicy,
    pub logging: LoggingConfig,
}

impl GaugeConfig {
    /// Load from file and environment, then validate
    ///
    /// A missing file is not an error; defaults and environment still apply.
    pub fn load(path: impl AsRef<Path>) -> GaugeResult<Self> {
        Self::load_with_prefix(path, ENV_PREFIX)
    }

    pub(crate) fn load_with_prefix(path: impl AsRef<Path>, env_prefix: &str) -> GaugeResult<Self> {
        let path = path.as_ref();

        let mut figment = Figment::new().merge(Serialized::defaults(GaugeConfig::default()));

        if path.exists() {
            debug!("Loading configuration from {}", path.display());
            figment = figment.merge(Yaml::file(path));
        } else {
            warn!(
                "Configuration file {} not found, using defaults",
                path.display()
            );
        }

        figment = figment.merge(Env::prefixed(env_prefix).split("__"));

        let config: GaugeConfig = figment
            .extract()
            .map_err(|e| GaugeError::Configuration(format!("Failed to parse config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Parse a YAML document (no environment overrides), then validate
    pub fn from_yaml_str(yaml: &str) -> GaugeResult<Self> {
        let config: GaugeConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Render as YAML
    pub fn to_yaml(&self) -> GaugeResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Reject settings the state machine cannot run with
    pub fn validate(&self) -> GaugeResult<()> {
        self.serial_settings()
            .validate()
            .map_err(|e| GaugeError::invalid_config("serial", e.to_string()))?;

        if self.timing.sample_interval_ms == 0 {
            return Err(GaugeError::invalid_config(
                "timing.sample_interval_ms",
                "must be greater than zero",
            ));
        }

        if self.timing.backoff_ms == 0 {
            return Err(GaugeError::invalid_config(
                "timing.backoff_ms",
                "must be greater than zero",
            ));
        }

        if self.selection.min_candidates == 0 {
            return Err(GaugeError::invalid_config(
                "selection.min_candidates",
                "must be at least 1",
            ));
        }

        if self.logging.level.trim().is_empty() {
            return Err(GaugeError::invalid_config("logging.level", "cannot be empty"));
        }

        Ok(())
    }

    /// Communication parameters for `open`
    pub fn serial_settings(&self) -> SerialSettings {
        SerialSettings {
            baud_rate: self.serial.baud_rate,
            data_bits: self.serial.data_bits,
            stop_bits: self.serial.stop_bits,
            parity: self.serial.parity,
            write_timeout: Duration::from_millis(self.serial.write_timeout_ms),
        }
    }

    pub fn timing(&self) -> LinkTiming {
        LinkTiming {
            settle_delay: Duration::from_millis(self.timing.settle_delay_ms),
            sample_interval: Duration::from_millis(self.timing.sample_interval_ms),
            line_pacing: Duration::from_millis(self.timing.line_pacing_ms),
            backoff: Duration::from_millis(self.timing.backoff_ms),
        }
    }

    /// Everything the supervisor needs
    pub fn link_settings(&self, log_samples: bool) -> LinkSettings {
        LinkSettings {
            serial: self.serial_settings(),
            timing: self.timing(),
            selection: self.selection,
            log_samples,
        }
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_match_reference_behavior() {
        let config = GaugeConfig::default();
        assert!(config.validate().is_ok());

        let timing = config.timing();
        assert_eq!(timing.settle_delay, Duration::from_millis(5000));
        assert_eq!(timing.sample_interval, Duration::from_millis(500));
        assert_eq!(timing.line_pacing, Duration::from_millis(100));
        assert_eq!(timing.backoff, Duration::from_millis(2000));

        let serial = config.serial_settings();
        assert_eq!(serial.baud_rate, 9600);
        assert_eq!(serial.parity, Parity::None);
        assert_eq!(config.selection.min_candidates, 1);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = GaugeConfig::from_yaml_str(
            r#"
serial:
  baud_rate: 115200
  parity: Even
selection:
  min_candidates: 2
"#,
        )
        .unwrap();

        assert_eq!(config.serial.baud_rate, 115200);
        assert_eq!(config.serial.parity, Parity::Even);
        assert_eq!(config.serial.data_bits, 8);
        assert_eq!(config.timing.backoff_ms, 2000);
        assert_eq!(config.selection.min_candidates, 2);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_validation_errors() {
        let mut config = GaugeConfig::default();
        config.serial.baud_rate = 0;
        let err = config.validate().unwrap_err();
        assert!(err.is_configuration());

        let mut config = GaugeConfig::default();
        config.timing.backoff_ms = 0;
        assert!(matches!(
            config.validate(),
            Err(GaugeError::InvalidConfig { field, .. }) if field == "timing.backoff_ms"
        ));

        let mut config = GaugeConfig::default();
        config.timing.sample_interval_ms = 0;
        assert!(config.validate().is_err());

        let mut config = GaugeConfig::default();
        config.selection.min_candidates = 0;
        assert!(config.validate().is_err());

        let mut config = GaugeConfig::default();
        config.serial.stop_bits = 3;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_parity_rejected() {
        let result = GaugeConfig::from_yaml_str("serial:\n  parity: Mark\n");
        assert!(matches!(result, Err(GaugeError::Configuration(_))));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "timing:\n  settle_delay_ms: 1500\n  backoff_ms: 750").unwrap();

        let config = GaugeConfig::load_with_prefix(file.path(), "GAUGESRV_TEST_FILE_").unwrap();
        assert_eq!(config.timing.settle_delay_ms, 1500);
        assert_eq!(config.timing.backoff_ms, 750);
        assert_eq!(config.timing.sample_interval_ms, 500);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = GaugeConfig::load_with_prefix(
            "/nonexistent/gaugesrv/config.yaml",
            "GAUGESRV_TEST_MISSING_",
        )
        .unwrap();
        assert_eq!(config, GaugeConfig::default());
    }

    #[test]
    fn test_environment_overrides_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "serial:\n  baud_rate: 19200").unwrap();

        std::env::set_var("GAUGESRV_TEST_ENV_SERIAL__BAUD_RATE", "57600");
        std::env::set_var("GAUGESRV_TEST_ENV_TIMING__BACKOFF_MS", "5000");
        let config = GaugeConfig::load_with_prefix(file.path(), "GAUGESRV_TEST_ENV_").unwrap();
        std::env::remove_var("GAUGESRV_TEST_ENV_SERIAL__BAUD_RATE");
        std::env::remove_var("GAUGESRV_TEST_ENV_TIMING__BACKOFF_MS");

        assert_eq!(config.serial.baud_rate, 57600);
        assert_eq!(config.timing.backoff_ms, 5000);
    }

    #[test]
    fn test_invalid_file_is_fatal() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "timing:\n  backoff_ms: 0").unwrap();

        let err = GaugeConfig::load_with_prefix(file.path(), "GAUGESRV_TEST_INVALID_").unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_yaml_round_trip_for_validate_flag() {
        let config = GaugeConfig::default();
        let yaml = config.to_yaml().unwrap();
        assert!(yaml.contains("baud_rate: 9600"));
        assert_eq!(GaugeConfig::from_yaml_str(&yaml).unwrap(), config);
    }
}
