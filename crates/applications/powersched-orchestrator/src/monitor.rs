//! Power sample monitoring
//!
//! Polls a [`PowerSource`] at a fixed interval and yields the readings as a stream.
//! Sources are either a recorded trace (JSON lines, one sample per line) or the
//! synthetic [`PowerTraceGenerator`]:
//!
//! ```text
//! {"battery": 42, "plugged": false}
//! {"battery": 41}
//! {"plugged": true}
//! ```
//!
//! Battery readings can optionally be smoothed with a moving average before they
//! reach the alert state machine.

use std::collections::VecDeque;
use std::path::Path;
use std::pin::Pin;
use std::time::Duration;

use futures::Stream;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use powersched_simulation_engine::power_data::PowerTraceGenerator;
use powersched_simulation_engine::PowerSample;

use crate::config::DEFAULT_MONITOR_INTERVAL_MS;
use crate::error::Result;

/// Something that can be asked for the current power state
pub trait PowerSource: Send {
    /// Next reading, or `None` once the source is exhausted
    fn next_sample(&mut self) -> Option<PowerSample>;
}

impl PowerSource for PowerTraceGenerator {
    fn next_sample(&mut self) -> Option<PowerSample> {
        Some(PowerTraceGenerator::next_sample(self))
    }
}

/// Replays a fixed sequence of samples
#[derive(Debug, Clone, Default)]
pub struct TracePowerSource {
    samples: VecDeque<PowerSample>,
}

impl TracePowerSource {
    pub fn new(samples: Vec<PowerSample>) -> Self {
        Self {
            samples: samples.into(),
        }
    }

    /// Load a JSON-lines trace; blank lines are ignored
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let source = Self::parse(&raw)?;
        info!(path = %path.display(), samples = source.len(), "Loaded power trace");
        Ok(source)
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let samples = raw
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(serde_json::from_str::<PowerSample>)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self::new(samples))
    }

    /// Samples not yet replayed
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl PowerSource for TracePowerSource {
    fn next_sample(&mut self) -> Option<PowerSample> {
        self.samples.pop_front()
    }
}

/// Moving average over the last `window` battery readings
#[derive(Debug, Clone)]
pub struct BatteryHistory {
    window: usize,
    readings: VecDeque<u8>,
}

impl BatteryHistory {
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            window,
            readings: VecDeque::with_capacity(window),
        }
    }

    /// Record a reading and return the rounded average of the window
    pub fn push(&mut self, percent: u8) -> u8 {
        if self.readings.len() == self.window {
            self.readings.pop_front();
        }
        self.readings.push_back(percent);

        let sum: u32 = self.readings.iter().map(|&p| u32::from(p)).sum();
        let count = self.readings.len() as u32;
        ((sum + count / 2) / count) as u8
    }

    /// Replace the sample's battery reading with the smoothed value
    pub fn smooth(&mut self, mut sample: PowerSample) -> PowerSample {
        if let Some(percent) = sample.battery() {
            sample.battery_percent = Some(self.push(percent));
        }
        sample
    }

    pub fn latest(&self) -> Option<u8> {
        self.readings.back().copied()
    }
}

/// Polls a power source at a fixed interval
pub struct PowerMonitor<S> {
    source: S,
    interval: Duration,
    history: BatteryHistory,
}

impl<S: PowerSource + 'static> PowerMonitor<S> {
    /// Monitor with the default polling interval and no smoothing
    pub fn new(source: S) -> Self {
        Self::with_interval(source, Duration::from_millis(DEFAULT_MONITOR_INTERVAL_MS))
    }

    pub fn with_interval(source: S, interval: Duration) -> Self {
        Self {
            source,
            interval,
            history: BatteryHistory::new(1),
        }
    }

    /// Average battery readings over `window` samples (1 disables smoothing)
    pub fn with_smoothing(mut self, window: usize) -> Self {
        self.history = BatteryHistory::new(window);
        self
    }

    /// Start continuous monitoring
    ///
    /// Returns a pinned stream yielding one sample per interval, the first immediately.
    /// The stream ends when the source is exhausted.
    pub fn monitor_stream(self) -> Pin<Box<dyn Stream<Item = PowerSample> + Send>> {
        let PowerMonitor {
            mut source,
            interval: interval_duration,
            mut history,
        } = self;

        Box::pin(async_stream::stream! {
            let mut ticker = interval(interval_duration);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;

                let Some(sample) = source.next_sample() else {
                    debug!("Power source exhausted");
                    break;
                };

                let sample = history.smooth(sample);
                debug!(
                    battery = ?sample.battery_percent,
                    plugged = ?sample.plugged_in,
                    "Power sample"
                );
                yield sample;
            }
        })
    }
}
