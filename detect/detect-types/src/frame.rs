//! Source frames supplied by the capture collaborator.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TypesError};

/// Channel layout of a frame's pixel buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PixelFormat {
    /// Interleaved 8-bit RGBA (alpha ignored).
    #[default]
    Rgba8,
    /// Interleaved 8-bit RGB.
    Rgb8,
}

impl PixelFormat {
    /// Bytes per pixel.
    #[must_use]
    pub const fn bytes_per_pixel(&self) -> usize {
        match self {
            Self::Rgba8 => 4,
            Self::Rgb8 => 3,
        }
    }
}

/// One source-resolution pixel buffer.
///
/// # Example
///
/// ```
/// use detect_types::Frame;
///
/// let frame = Frame::rgba(42, 1.5, vec![0u8; 640 * 480 * 4], 640, 480);
///
/// assert_eq!(frame.id, 42);
/// assert_eq!(frame.pixel_count(), 640 * 480);
/// assert!(frame.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Unique frame identifier.
    pub id: u64,

    /// Capture timestamp in seconds.
    pub timestamp: f64,

    /// Raw interleaved pixel data.
    pub pixels: Vec<u8>,

    /// Channel layout of `pixels`.
    pub format: PixelFormat,

    /// Image dimensions: `(width, height)`.
    pub size: (u32, u32),
}

impl Frame {
    /// Creates a frame from an RGBA8 buffer.
    #[must_use]
    pub fn rgba(id: u64, timestamp: f64, pixels: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            id,
            timestamp,
            pixels,
            format: PixelFormat::Rgba8,
            size: (width, height),
        }
    }

    /// Creates a frame from an RGB8 buffer.
    #[must_use]
    pub fn rgb(id: u64, timestamp: f64, pixels: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            id,
            timestamp,
            pixels,
            format: PixelFormat::Rgb8,
            size: (width, height),
        }
    }

    /// Returns the image width.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.size.0
    }

    /// Returns the image height.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.size.1
    }

    /// Returns the total number of pixels.
    #[must_use]
    pub const fn pixel_count(&self) -> usize {
        self.size.0 as usize * self.size.1 as usize
    }

    /// Returns the expected buffer size for the declared format.
    #[must_use]
    pub const fn expected_buffer_size(&self) -> usize {
        self.pixel_count() * self.format.bytes_per_pixel()
    }

    /// Checks dimensions and buffer length.
    ///
    /// # Errors
    ///
    /// Returns [`TypesError::InvalidDimensions`] for a zero-sized frame and
    /// [`TypesError::DataSizeMismatch`] when the buffer length is wrong.
    pub fn validate(&self) -> Result<()> {
        if self.size.0 == 0 || self.size.1 == 0 {
            return Err(TypesError::invalid_dimensions(self.size.0, self.size.1));
        }
        let expected = self.expected_buffer_size();
        if self.pixels.len() != expected {
            return Err(TypesError::data_size_mismatch(expected, self.pixels.len()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_dimensions() {
        let frame = Frame::rgba(0, 0.0, vec![0u8; 100 * 50 * 4], 100, 50);
        assert_eq!(frame.width(), 100);
        assert_eq!(frame.height(), 50);
        assert_eq!(frame.pixel_count(), 5000);
        assert_eq!(frame.expected_buffer_size(), 20000);
    }

    #[test]
    fn rgb_buffer_size() {
        let frame = Frame::rgb(0, 0.0, vec![0u8; 10 * 10 * 3], 10, 10);
        assert_eq!(frame.expected_buffer_size(), 300);
        assert!(frame.validate().is_ok());
    }

    #[test]
    fn validate_rejects_wrong_length() {
        let frame = Frame::rgba(0, 0.0, vec![0u8; 100], 640, 480);
        assert_eq!(
            frame.validate(),
            Err(TypesError::data_size_mismatch(640 * 480 * 4, 100))
        );
    }

    #[test]
    fn validate_rejects_zero_size() {
        let frame = Frame::rgba(0, 0.0, Vec::new(), 0, 480);
        assert!(matches!(
            frame.validate(),
            Err(TypesError::InvalidDimensions { width: 0, .. })
        ));
    }
}
