//! Simulated PPG + temperature sensors.
//!
//! Produces a resting-adult baseline (75 bpm, 98.5 % SpO2, 36.6 °C). Optional
//! jitter and a settle delay make the timing and values look like a real bus.

use std::thread;
use std::time::Duration;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

use crate::domain::VitalSigns;
use crate::ports::{SensorError, VitalsSensor};

pub const BASELINE_HEART_RATE: u32 = 75;
pub const BASELINE_BLOOD_OXYGEN: f64 = 98.5;
pub const BASELINE_TEMPERATURE: f64 = 36.6;

#[derive(Debug)]
pub struct SimulatedVitalsSensor {
    ppg_ready: bool,
    temperature_ready: bool,
    jitter: Option<ChaCha20Rng>,
    settle: Duration,
}

impl SimulatedVitalsSensor {
    /// Sensor returning the exact baseline immediately.
    #[must_use]
    pub fn new() -> Self {
        Self {
            ppg_ready: false,
            temperature_ready: false,
            jitter: None,
            settle: Duration::ZERO,
        }
    }

    /// Add small random variation around the baseline.
    #[must_use]
    pub fn with_jitter(mut self) -> Self {
        self.jitter = Some(ChaCha20Rng::from_entropy());
        self
    }

    /// Block for `settle` on every read, like a PPG integration window.
    #[must_use]
    pub fn with_settle_time(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }
}

impl Default for SimulatedVitalsSensor {
    fn default() -> Self {
        Self::new()
    }
}

impl VitalsSensor for SimulatedVitalsSensor {
    fn init_ppg(&mut self) -> Result<(), SensorError> {
        tracing::debug!("Simulated MAX30102 PPG up");
        self.ppg_ready = true;
        Ok(())
    }

    fn init_temperature(&mut self) -> Result<(), SensorError> {
        tracing::debug!("Simulated DHT22 temperature sensor up");
        self.temperature_ready = true;
        Ok(())
    }

    fn read_all(&mut self) -> Result<VitalSigns, SensorError> {
        if !self.ppg_ready {
            return Err(SensorError::NotInitialized("ppg"));
        }
        if !self.temperature_ready {
            return Err(SensorError::NotInitialized("temperature"));
        }
        if !self.settle.is_zero() {
            thread::sleep(self.settle);
        }

        let vitals = match self.jitter.as_mut() {
            Some(rng) => VitalSigns::new(
                BASELINE_HEART_RATE.saturating_add_signed(rng.gen_range(-6..=6)),
                (BASELINE_BLOOD_OXYGEN + rng.gen_range(-1.0..=1.0)).min(100.0),
                BASELINE_TEMPERATURE + rng.gen_range(-0.2..=0.2),
            ),
            None => VitalSigns::new(
                BASELINE_HEART_RATE,
                BASELINE_BLOOD_OXYGEN,
                BASELINE_TEMPERATURE,
            ),
        };
        Ok(vitals)
    }
}
