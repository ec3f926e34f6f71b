//! Simulated fundus camera.
//!
//! Stands in for the DVP camera driver on development hosts. Frames carry a
//! deterministic ramp pattern (`byte[i] = i % 255`).

use crate::domain::PixelBuffer;
use crate::ports::{Camera, CaptureError};

#[derive(Debug, Default)]
pub struct SimulatedCamera {
    ready: bool,
}

impl SimulatedCamera {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Camera for SimulatedCamera {
    fn init(&mut self) -> Result<(), CaptureError> {
        tracing::debug!("Simulated camera interface up");
        self.ready = true;
        Ok(())
    }

    fn capture(&mut self, width: u32, height: u32) -> Result<PixelBuffer, CaptureError> {
        if !self.ready {
            return Err(CaptureError::NotInitialized);
        }
        let bytes = PixelBuffer::byte_len(width, height)
            .ok_or(CaptureError::InvalidDimensions { width, height })?;

        let mut data = Vec::new();
        data.try_reserve_exact(bytes)
            .map_err(|_| CaptureError::Allocation { bytes })?;
        data.extend((0..bytes).map(|i| (i % 255) as u8));

        PixelBuffer::from_raw(width, height, data)
            .ok_or(CaptureError::InvalidDimensions { width, height })
    }
}
