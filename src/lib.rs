//! # RetinalGuard
//!
//! Edge cardiovascular screening pipeline for a low-power device.
//!
//! One screening cycle captures a retinal fundus image, runs a quantized
//! model to estimate cardiovascular risk, reads the vital-sign sensors,
//! fuses both signals into one score, classifies it and reports the
//! result to the display and the cloud feed.
//!
//! ## Architecture
//!
//! The crate follows Hexagonal Architecture:
//! - `domain`: Core types (PixelBuffer, VitalSigns, ScreeningResult, reports)
//! - `ports`: Trait definitions for the camera, model runtime, sensors, transport, display
//! - `adapters`: Concrete implementations (simulated hardware, signed model, feed, terminal)
//! - `application`: The screening pipeline, its state machine and trigger serialization
//! - `config`: Device configuration from the environment

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

#[cfg(test)]
pub(crate) mod testing;

pub use config::DeviceConfig;
pub use domain::{RiskTier, ScreeningResult, VitalSigns};

/// Result type for RetinalGuard operations
pub type Result<T> = std::result::Result<T, RetinalGuardError>;

/// Main error type for RetinalGuard
#[derive(Debug, thiserror::Error)]
pub enum RetinalGuardError {
    #[error("Image capture failed: {0}")]
    Capture(#[from] ports::CaptureError),

    #[error("Inference failed: {0}")]
    Inference(#[from] ports::InferenceError),

    #[error("Vital signs unavailable: {0}")]
    Sensor(#[from] ports::SensorError),

    #[error("Cloud transport failed: {0}")]
    Transport(#[from] ports::TransportError),

    #[error("Display failed: {0}")]
    Display(#[from] ports::DisplayError),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Screening worker stopped")]
    WorkerStopped,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
