//! Host CPU load sampling
//!
//! The telemetry loop only needs one capability from the host: "how busy was
//! the CPU over this interval", as a percentage. [`LoadSampler`] is that seam;
//! [`SysinfoSampler`] implements it with the sysinfo crate.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use sysinfo::System;
use thiserror::Error;
use tracing::debug;

/// Sampling error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SampleError {
    /// The platform has no CPU statistics
    #[error("CPU statistics are not supported on this platform")]
    Unsupported,

    /// The sampling primitive failed
    #[error("CPU sampling failed: {0}")]
    Failed(String),
}

/// Source of CPU utilization readings
#[async_trait]
pub trait LoadSampler: Send + fmt::Debug {
    /// Sample global CPU load over `interval`
    ///
    /// A zero interval reports the load since the previous call without
    /// waiting; the first such call only primes the sampler and may return
    /// `Ok(None)`. A non-zero interval waits that long (on the tokio timer, so
    /// dropping the future stops the wait) and reports the average over it.
    ///
    /// Readings are percentages in `[0, 100]`; `Ok(None)` means no data.
    async fn sample(&mut self, interval: Duration) -> Result<Option<f64>, SampleError>;
}

/// [`LoadSampler`] backed by `sysinfo`
pub struct SysinfoSampler {
    sys: System,
    primed: bool,
}

impl fmt::Debug for SysinfoSampler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SysinfoSampler")
            .field("primed", &self.primed)
            .finish()
    }
}

impl Default for SysinfoSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl SysinfoSampler {
    /// Create an unprimed sampler
    pub fn new() -> Self {
        Self {
            sys: System::new(),
            primed: false,
        }
    }

    /// Number of logical CPUs seen by the last refresh
    pub fn cpu_count(&self) -> usize {
        self.sys.cpus().len()
    }

    fn read(&self) -> Option<f64> {
        let usage = f64::from(self.sys.global_cpu_usage());
        usage.is_finite().then(|| usage.clamp(0.0, 100.0))
    }
}

#[async_trait]
impl LoadSampler for SysinfoSampler {
    async fn sample(&mut self, interval: Duration) -> Result<Option<f64>, SampleError> {
        if !sysinfo::IS_SUPPORTED_SYSTEM {
            return Err(SampleError::Unsupported);
        }

        if interval.is_zero() {
            self.sys.refresh_cpu_usage();
            if !self.primed {
                self.primed = true;
                debug!("CPU sampler primed ({} cpus)", self.cpu_count());
                return Ok(None);
            }
            return Ok(self.read());
        }

        // Usage is computed between two refreshes; sysinfo needs a minimum gap
        self.sys.refresh_cpu_usage();
        tokio::time::sleep(interval.max(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL)).await;
        self.sys.refresh_cpu_usage();
        self.primed = true;

        Ok(self.read())
    }
}
