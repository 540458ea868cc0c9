//! Error types for encoding and decoding.

use detect_types::TypesError;
use thiserror::Error;

/// Errors raised while turning a frame into a model input.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CodecError {
    /// The frame failed validation.
    #[error("invalid frame: {0}")]
    InvalidFrame(#[from] TypesError),

    /// The model input size is zero in some dimension.
    #[error("invalid target size: {width}x{height}")]
    InvalidTargetSize {
        /// Requested width.
        width: u32,
        /// Requested height.
        height: u32,
    },
}

impl CodecError {
    /// Creates an invalid target size error.
    #[must_use]
    pub const fn invalid_target_size(width: u32, height: u32) -> Self {
        Self::InvalidTargetSize { width, height }
    }
}

/// Errors raised while decoding raw model output.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The output does not match either supported candidate layout.
    #[error("malformed output: {reason}")]
    MalformedOutput {
        /// What was wrong.
        reason: String,
    },
}

impl DecodeError {
    /// Creates a malformed output error.
    #[must_use]
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedOutput {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codec_error_display() {
        let err = CodecError::invalid_target_size(0, 640);
        assert_eq!(err.to_string(), "invalid target size: 0x640");

        let err: CodecError = TypesError::data_size_mismatch(12, 3).into();
        assert!(err.to_string().starts_with("invalid frame:"));
    }

    #[test]
    fn decode_error_display() {
        let err = DecodeError::malformed("expected 84 or 85 rows, got 7");
        assert_eq!(
            err.to_string(),
            "malformed output: expected 84 or 85 rows, got 7"
        );
    }
}
