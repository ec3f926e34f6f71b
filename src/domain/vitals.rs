//! Biometric vital signs read from the PPG and temperature sensors.

use serde::{Deserialize, Serialize};

/// Immutable snapshot of the vital signs.
///
/// All three readings are taken in one `read_all` call on the sensor driver
/// and stamped with that sampling instant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VitalSigns {
    /// Heart rate in beats per minute (PPG)
    pub heart_rate: u32,

    /// Peripheral blood oxygen saturation in percent (SpO2, 0-100)
    pub blood_oxygen: f64,

    /// Body temperature in degrees Celsius
    pub temperature: f64,

    /// When the sensors were sampled
    pub sampled_at: chrono::DateTime<chrono::Utc>,
}

impl VitalSigns {
    /// Create a snapshot stamped with the current time.
    #[must_use]
    pub fn new(heart_rate: u32, blood_oxygen: f64, temperature: f64) -> Self {
        Self {
            heart_rate,
            blood_oxygen,
            temperature,
            sampled_at: chrono::Utc::now(),
        }
    }

    /// Validate that the readings are physically plausible.
    ///
    /// # Errors
    /// Returns validation errors as a vector of strings.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if !(0.0..=100.0).contains(&self.blood_oxygen) {
            errors.push(format!(
                "Blood oxygen {} out of range [0, 100]",
                self.blood_oxygen
            ));
        }
        if !self.temperature.is_finite() {
            errors.push(format!("Temperature {} is not finite", self.temperature));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
