//! Sensor port: Trait for the PPG and temperature sensor driver.

use crate::domain::VitalSigns;

/// Errors raised while reading vital signs.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SensorError {
    #[error("Sensor read timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Sensor sampling thread disconnected")]
    Disconnected,

    #[error("Sensor not initialized: {0}")]
    NotInitialized(&'static str),

    #[error("Implausible sensor reading: {0}")]
    InvalidReading(String),

    #[error("Sensor bus error: {0}")]
    Bus(String),
}

/// Trait for the biometric sensor driver.
///
/// `read_all` may block while the sensors settle; callers bound it with a
/// timeout.
pub trait VitalsSensor: Send {
    /// Initialize the PPG (heart rate / SpO2) sensor.
    ///
    /// # Errors
    /// Returns `SensorError::Bus` if the sensor does not respond.
    fn init_ppg(&mut self) -> Result<(), SensorError>;

    /// Initialize the temperature sensor.
    ///
    /// # Errors
    /// Returns `SensorError::Bus` if the sensor does not respond.
    fn init_temperature(&mut self) -> Result<(), SensorError>;

    /// Sample all vitals at one instant.
    ///
    /// # Errors
    /// Returns `SensorError` if any sensor fails.
    fn read_all(&mut self) -> Result<VitalSigns, SensorError>;
}
