//! Camera port: Trait for the fundus camera driver.

use crate::domain::PixelBuffer;

/// Errors raised while acquiring a fundus image.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CaptureError {
    #[error("Camera not initialized")]
    NotInitialized,

    #[error("Invalid capture dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("Frame buffer allocation failed for {bytes} bytes")]
    Allocation { bytes: usize },

    #[error("Captured frame has {actual} bytes, expected {expected}")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("Camera hardware error: {0}")]
    Hardware(String),
}

/// Trait for the camera driver.
///
/// Capture is one of the few operations allowed to block.
pub trait Camera: Send {
    /// Bring up the camera interface.
    ///
    /// # Errors
    /// Returns `CaptureError::Hardware` if the sensor does not respond.
    fn init(&mut self) -> Result<(), CaptureError>;

    /// Capture one RGB frame of the given dimensions.
    ///
    /// # Errors
    /// Returns `CaptureError` if the frame cannot be acquired or allocated.
    fn capture(&mut self, width: u32, height: u32) -> Result<PixelBuffer, CaptureError>;
}
