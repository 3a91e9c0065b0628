//! Mock Transport for Testing
//!
//! Scripted serial backend and load sampler for driving the link manager
//! without hardware. All handles created from one [`MockSerialBackend`] share
//! one [`MockBus`], so a test keeps a clone of the backend and inspects what
//! the supervisor did after the fact.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::system_metrics::{LoadSampler, SampleError};
use parking_lot::Mutex;
use tracing::debug;

use super::traits::{LinkStats, SerialBackend, SerialLink, SerialSettings, TransportError};

/// Shared state behind a mock backend
#[derive(Debug, Default)]
pub struct MockBus {
    /// Rosters returned by successive enumerations; the last one repeats
    rosters: VecDeque<Vec<String>>,
    /// Fail this many enumerations before consulting the rosters
    fail_enumerations: usize,
    /// Fail this many opens
    fail_opens: usize,
    /// Per-link write budget for the next opened links; `Some(n)` fails every
    /// write after `n` successful ones
    write_budgets: VecDeque<Option<usize>>,
    /// Number of enumeration calls
    enumerations: usize,
    /// Ports passed to successful `open` calls, in order
    opened: Vec<String>,
    /// Ports passed to failed `open` calls
    failed_opens: Vec<String>,
    /// `(link id, line)` for every successful write, newline stripped
    lines: Vec<(usize, String)>,
    /// `close` calls per link id
    close_calls: Vec<usize>,
    /// Writes rejected by a link's write budget
    failed_writes: usize,
    /// Writes attempted on an already closed link
    writes_after_close: usize,
    live: usize,
    max_live: usize,
}

impl MockBus {
    fn next_roster(&mut self) -> Vec<String> {
        if self.rosters.len() > 1 {
            self.rosters.pop_front().unwrap_or_default()
        } else {
            self.rosters.front().cloned().unwrap_or_default()
        }
    }
}

/// Scripted serial backend
#[derive(Debug, Clone, Default)]
pub struct MockSerialBackend {
    bus: Arc<Mutex<MockBus>>,
}

impl MockSerialBackend {
    /// Create new mock backend that always enumerates `ports`
    pub fn new<I, S>(ports: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let backend = Self::default();
        backend.push_roster(ports);
        backend
    }

    /// Queue a roster for a later enumeration
    pub fn push_roster<I, S>(&self, ports: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.bus
            .lock()
            .rosters
            .push_back(ports.into_iter().map(Into::into).collect());
    }

    /// Make the next `count` enumerations fail
    pub fn fail_enumerations(&self, count: usize) {
        self.bus.lock().fail_enumerations = count;
    }

    /// Make the next `count` opens fail
    pub fn fail_opens(&self, count: usize) {
        self.bus.lock().fail_opens = count;
    }

    /// The next opened link accepts `writes` writes, then fails every write
    pub fn fail_writes_after(&self, writes: usize) {
        self.bus.lock().write_budgets.push_back(Some(writes));
    }

    /// The next opened link accepts every write
    pub fn healthy_link(&self) {
        self.bus.lock().write_budgets.push_back(None);
    }

    pub fn enumerations(&self) -> usize {
        self.bus.lock().enumerations
    }

    /// Ports successfully opened, in order
    pub fn opened(&self) -> Vec<String> {
        self.bus.lock().opened.clone()
    }

    pub fn failed_opens(&self) -> Vec<String> {
        self.bus.lock().failed_opens.clone()
    }

    /// All written lines, across every link, in order
    pub fn lines(&self) -> Vec<String> {
        self.bus.lock().lines.iter().map(|(_, l)| l.clone()).collect()
    }

    /// Lines written on one link
    pub fn lines_on(&self, link: usize) -> Vec<String> {
        self.bus
            .lock()
            .lines
            .iter()
            .filter(|(id, _)| *id == link)
            .map(|(_, l)| l.clone())
            .collect()
    }

    /// Written lines paired up as `(channel, value)` commands
    pub fn commands(&self) -> Vec<(String, String)> {
        pair_lines(&self.lines())
    }

    /// `close` calls per link id
    pub fn close_calls(&self) -> Vec<usize> {
        self.bus.lock().close_calls.clone()
    }

    pub fn failed_writes(&self) -> usize {
        self.bus.lock().failed_writes
    }

    pub fn writes_after_close(&self) -> usize {
        self.bus.lock().writes_after_close
    }

    /// Links currently open
    pub fn live_links(&self) -> usize {
        self.bus.lock().live
    }

    /// Most links ever open at the same time
    pub fn max_live_links(&self) -> usize {
        self.bus.lock().max_live
    }
}

/// Pair consecutive lines into `(channel, value)`; a trailing odd line is dropped
pub fn pair_lines(lines: &[String]) -> Vec<(String, String)> {
    lines
        .chunks_exact(2)
        .map(|pair| (pair[0].clone(), pair[1].clone()))
        .collect()
}

#[async_trait]
impl SerialBackend for MockSerialBackend {
    type Link = MockLink;

    fn name(&self) -> &str {
        "mock"
    }

    async fn available_ports(&self) -> Result<Vec<String>, TransportError> {
        let mut bus = self.bus.lock();
        bus.enumerations += 1;
        if bus.fail_enumerations > 0 {
            bus.fail_enumerations -= 1;
            return Err(TransportError::EnumerationFailed(
                "mock enumeration failure".to_string(),
            ));
        }
        Ok(bus.next_roster())
    }

    async fn open(
        &self,
        port: &str,
        settings: &SerialSettings,
    ) -> Result<Self::Link, TransportError> {
        settings.validate()?;

        let mut bus = self.bus.lock();
        if bus.fail_opens > 0 {
            bus.fail_opens -= 1;
            bus.failed_opens.push(port.to_string());
            return Err(TransportError::ConnectionFailed(format!(
                "{port}: device busy"
            )));
        }

        let id = bus.opened.len();
        bus.opened.push(port.to_string());
        bus.close_calls.push(0);
        bus.live += 1;
        bus.max_live = bus.max_live.max(bus.live);
        let write_budget = bus.write_budgets.pop_front().flatten();
        debug!(port, id, "Mock link opened");

        Ok(MockLink {
            id,
            port: port.to_string(),
            bus: Arc::clone(&self.bus),
            write_budget,
            closed: false,
            stats: LinkStats::default(),
        })
    }
}

/// Link handed out by [`MockSerialBackend`]
#[derive(Debug)]
pub struct MockLink {
    id: usize,
    port: String,
    bus: Arc<Mutex<MockBus>>,
    write_budget: Option<usize>,
    closed: bool,
    stats: LinkStats,
}

impl MockLink {
    /// Index of this link in the order links were opened
    pub fn id(&self) -> usize {
        self.id
    }
}

#[async_trait]
impl SerialLink for MockLink {
    fn port(&self) -> &str {
        &self.port
    }

    async fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let mut bus = self.bus.lock();
        if self.closed {
            bus.writes_after_close += 1;
            return Err(TransportError::NotConnected(self.port.clone()));
        }

        if let Some(budget) = self.write_budget.as_mut() {
            if *budget == 0 {
                bus.failed_writes += 1;
                self.stats.record_failure();
                return Err(TransportError::SendFailed(format!(
                    "{}: device removed",
                    self.port
                )));
            }
            *budget -= 1;
        }

        let line = String::from_utf8_lossy(data)
            .trim_end_matches('\n')
            .to_string();
        bus.lines.push((self.id, line));
        self.stats.record_write(data.len());
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        let mut bus = self.bus.lock();
        if let Some(calls) = bus.close_calls.get_mut(self.id) {
            *calls += 1;
        }
        if !self.closed {
            self.closed = true;
            bus.live = bus.live.saturating_sub(1);
        }
        Ok(())
    }

    fn stats(&self) -> LinkStats {
        self.stats.clone()
    }
}

#[derive(Debug, Default)]
struct SamplerScript {
    readings: VecDeque<Result<Option<f64>, SampleError>>,
    warmups: usize,
    samples: usize,
}

/// Load sampler replaying a fixed list of readings
///
/// Zero-interval calls count as warm-ups and return `Ok(None)`. Timed calls
/// sleep the interval on the tokio clock, then pop the next reading; once the
/// script runs out every call yields `Ok(None)`.
#[derive(Debug, Clone, Default)]
pub struct ScriptedSampler {
    script: Arc<Mutex<SamplerScript>>,
}

impl ScriptedSampler {
    /// Sampler returning the given percentages in order
    pub fn new<I>(loads: I) -> Self
    where
        I: IntoIterator<Item = f64>,
    {
        let sampler = Self::default();
        for load in loads {
            sampler.push(Ok(Some(load)));
        }
        sampler
    }

    /// Append one scripted result
    pub fn push(&self, reading: Result<Option<f64>, SampleError>) {
        self.script.lock().readings.push_back(reading);
    }

    pub fn warmups(&self) -> usize {
        self.script.lock().warmups
    }

    /// Timed samples taken so far
    pub fn samples(&self) -> usize {
        self.script.lock().samples
    }

    pub fn remaining(&self) -> usize {
        self.script.lock().readings.len()
    }
}

#[async_trait]
impl LoadSampler for ScriptedSampler {
    async fn sample(&mut self, interval: Duration) -> Result<Option<f64>, SampleError> {
        if interval.is_zero() {
            self.script.lock().warmups += 1;
            return Ok(None);
        }

        tokio::time::sleep(interval).await;

        let mut script = self.script.lock();
        script.samples += 1;
        script.readings.pop_front().unwrap_or(Ok(None))
    }
}
