//! Error types for detect-types crate.

use thiserror::Error;

/// Errors that can occur when constructing or validating detection types.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TypesError {
    /// Invalid image dimensions.
    #[error("invalid dimensions: {width}x{height}")]
    InvalidDimensions {
        /// Width in pixels.
        width: u32,
        /// Height in pixels.
        height: u32,
    },

    /// Pixel buffer length does not match the declared dimensions.
    #[error("data size mismatch: expected {expected}, got {actual}")]
    DataSizeMismatch {
        /// Expected size.
        expected: usize,
        /// Actual size.
        actual: usize,
    },

    /// Tensor shape does not match the model contract.
    #[error("invalid tensor shape: expected {expected}, got {actual:?}")]
    InvalidShape {
        /// Human-readable description of the expected shape.
        expected: String,
        /// The shape that was supplied.
        actual: Vec<usize>,
    },

    /// Invalid confidence value.
    #[error("invalid confidence {value}: must be in [0, 1]")]
    InvalidConfidence {
        /// The invalid confidence value.
        value: f32,
    },
}

impl TypesError {
    /// Creates an invalid dimensions error.
    #[must_use]
    pub const fn invalid_dimensions(width: u32, height: u32) -> Self {
        Self::InvalidDimensions { width, height }
    }

    /// Creates a data size mismatch error.
    #[must_use]
    pub const fn data_size_mismatch(expected: usize, actual: usize) -> Self {
        Self::DataSizeMismatch { expected, actual }
    }

    /// Creates an invalid shape error.
    #[must_use]
    pub fn invalid_shape(expected: impl Into<String>, actual: &[usize]) -> Self {
        Self::InvalidShape {
            expected: expected.into(),
            actual: actual.to_vec(),
        }
    }

    /// Creates an invalid confidence error.
    #[must_use]
    pub const fn invalid_confidence(value: f32) -> Self {
        Self::InvalidConfidence { value }
    }
}

/// Result type for detect-types operations.
pub type Result<T> = std::result::Result<T, TypesError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_invalid_dimensions() {
        let err = TypesError::invalid_dimensions(0, 480);
        assert!(err.to_string().contains("0x480"));
    }

    #[test]
    fn error_data_size_mismatch() {
        let err = TypesError::data_size_mismatch(1000, 500);
        assert!(err.to_string().contains("1000"));
        assert!(err.to_string().contains("500"));
    }

    #[test]
    fn error_invalid_shape_lists_actual() {
        let err = TypesError::invalid_shape("[1, 3, H, W]", &[3, 640, 640]);
        let msg = err.to_string();
        assert!(msg.contains("[1, 3, H, W]"));
        assert!(msg.contains("640"));
    }

    #[test]
    fn error_invalid_confidence() {
        let err = TypesError::invalid_confidence(1.5);
        assert!(err.to_string().contains("1.5"));
    }
}
