//! Image capture step.

use crate::domain::PixelBuffer;
use crate::ports::{Camera, CaptureError};

/// Wraps the camera driver and enforces the frame contract.
///
/// Every buffer handed out is exactly `width * height * 3` bytes.
pub struct ImageCapture<C: Camera> {
    camera: C,
    initialized: bool,
}

impl<C: Camera> ImageCapture<C> {
    #[must_use]
    pub fn new(camera: C) -> Self {
        Self {
            camera,
            initialized: false,
        }
    }

    /// Initialize the camera interface.
    ///
    /// # Errors
    /// Returns `CaptureError` if the driver fails to come up.
    pub fn init(&mut self) -> Result<(), CaptureError> {
        self.camera.init()?;
        self.initialized = true;
        tracing::info!("Camera ready");
        Ok(())
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Capture one fundus frame.
    ///
    /// # Errors
    /// Returns `CaptureError::InvalidDimensions` for a zero dimension,
    /// `CaptureError::NotInitialized` before `init`, and any driver error.
    pub fn capture(&mut self, width: u32, height: u32) -> Result<PixelBuffer, CaptureError> {
        if width == 0 || height == 0 {
            return Err(CaptureError::InvalidDimensions { width, height });
        }
        let expected = PixelBuffer::byte_len(width, height)
            .ok_or(CaptureError::InvalidDimensions { width, height })?;

        if !self.initialized {
            return Err(CaptureError::NotInitialized);
        }

        let frame = self.camera.capture(width, height)?;
        if frame.len() != expected || frame.width() != width || frame.height() != height {
            return Err(CaptureError::SizeMismatch {
                expected,
                actual: frame.len(),
            });
        }

        tracing::debug!(width, height, bytes = frame.len(), "Fundus frame captured");
        Ok(frame)
    }
}
