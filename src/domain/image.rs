//! Fundus image buffer captured for a single screening cycle.

use std::fmt;

/// Number of interleaved colour channels (RGB).
pub const CHANNELS: usize = 3;

/// Owned RGB pixel buffer of fixed dimensions.
///
/// The byte length always equals `width * height * 3`. A buffer belongs to
/// exactly one screening cycle and is dropped when that cycle ends.
#[derive(Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
    #[cfg(test)]
    lease: Option<crate::testing::FrameLease>,
}

impl PixelBuffer {
    /// Wrap raw interleaved RGB bytes.
    ///
    /// # Returns
    /// `None` if a dimension is zero or the length does not match.
    #[must_use]
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        let expected = Self::byte_len(width, height)?;
        if width == 0 || height == 0 || data.len() != expected {
            return None;
        }
        Some(Self {
            width,
            height,
            data,
            #[cfg(test)]
            lease: None,
        })
    }

    /// Tie a live-frame count to this buffer's lifetime.
    #[cfg(test)]
    pub(crate) fn with_lease(mut self, lease: crate::testing::FrameLease) -> Self {
        self.lease = Some(lease);
        self
    }

    /// Expected byte length for the given dimensions, `None` on overflow.
    #[must_use]
    pub fn byte_len(width: u32, height: u32) -> Option<usize> {
        (width as usize)
            .checked_mul(height as usize)?
            .checked_mul(CHANNELS)
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

// Pixel data is never printed; a 256x256 frame would flood the logs.
impl fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PixelBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.data.len())
            .finish()
    }
}
