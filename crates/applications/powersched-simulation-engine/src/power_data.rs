//! Synthetic power trace generation
//!
//! Models a laptop battery for demos and tests:
//! - Linear drain while unplugged, linear charge while plugged
//! - Gaussian noise on every step (sensor jitter)
//! - Random charger plug/unplug events

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

use crate::error::{Result, SimulationError};
use crate::types::PowerSample;

/// Battery gained per sample while plugged in (percentage points)
const CHARGE_PER_SAMPLE: f64 = 1.5;

/// Standard deviation of per-sample jitter (percentage points)
const NOISE_STD_DEV: f64 = 0.3;

/// Synthetic battery/charger trace generator
pub struct PowerTraceGenerator {
    battery_percent: f64,
    drain_per_sample: f64,
    plug_toggle_probability: f64,
    plugged_in: bool,
    rng: StdRng,
}

impl PowerTraceGenerator {
    /// Create a new trace generator
    ///
    /// # Arguments
    /// * `initial_percent` - Starting battery level (0-100)
    /// * `drain_per_sample` - Battery lost per sample while unplugged (e.g., 0.8)
    /// * `plug_toggle_probability` - Chance per sample that the charger is (un)plugged
    ///
    /// Non-finite arguments are rejected; finite ones are clamped into range.
    pub fn new(initial_percent: f64, drain_per_sample: f64, plug_toggle_probability: f64) -> Result<Self> {
        let finite = |name: &'static str, value: f64| {
            if value.is_finite() {
                Ok(value)
            } else {
                Err(SimulationError::InvalidTraceParameter { name, value })
            }
        };

        Ok(PowerTraceGenerator {
            battery_percent: finite("initial_percent", initial_percent)?.clamp(0.0, 100.0),
            drain_per_sample: finite("drain_per_sample", drain_per_sample)?,
            plug_toggle_probability: finite("plug_toggle_probability", plug_toggle_probability)?.clamp(0.0, 1.0),
            plugged_in: false,
            rng: StdRng::from_entropy(),
        })
    }

    /// Use a fixed seed (reproducible traces)
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Start with the charger connected
    pub fn plugged(mut self, plugged_in: bool) -> Self {
        self.plugged_in = plugged_in;
        self
    }

    /// Produce the next sample
    pub fn next_sample(&mut self) -> PowerSample {
        if self.rng.gen_bool(self.plug_toggle_probability) {
            self.plugged_in = !self.plugged_in;
        }

        let jitter: f64 = self.rng.sample::<f64, _>(StandardNormal) * NOISE_STD_DEV;
        let step = if self.plugged_in {
            CHARGE_PER_SAMPLE
        } else {
            -self.drain_per_sample
        };

        self.battery_percent = (self.battery_percent + step + jitter).clamp(0.0, 100.0);

        PowerSample {
            battery_percent: Some(self.battery_percent.round() as u8),
            plugged_in: Some(self.plugged_in),
        }
    }

    /// Generate `samples` consecutive samples
    pub fn generate(&mut self, samples: usize) -> Vec<PowerSample> {
        (0..samples).map(|_| self.next_sample()).collect()
    }

    /// Generate a simple unplugged discharge (deterministic, for testing)
    pub fn generate_simple(samples: usize, start_percent: u8, drain_per_sample: u8) -> Vec<PowerSample> {
        (0..samples)
            .map(|i| {
                let drained = (i as u32 * drain_per_sample as u32).min(start_percent as u32) as u8;
                PowerSample {
                    battery_percent: Some(start_percent - drained),
                    plugged_in: Some(false),
                }
            })
            .collect()
    }
}
