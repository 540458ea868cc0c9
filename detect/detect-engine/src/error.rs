//! Error types for the detection engine.

use std::path::PathBuf;

use detect_adapt::AdaptError;
use detect_codec::{CodecError, DecodeError};
use detect_model::{InferenceError, LoadError, RecoveryError};
use thiserror::Error;

/// Rejected or unreadable engine configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("cannot read config {path}: {source}")]
    Io {
        /// Config file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The JSON did not parse.
    #[error("cannot parse config: {0}")]
    Parse(#[from] serde_json::Error),

    /// A field is outside its legal range.
    #[error("invalid config: {field} {reason}")]
    Invalid {
        /// Offending field.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },

    /// The controller section is invalid.
    #[error(transparent)]
    Controller(#[from] AdaptError),
}

impl ConfigError {
    /// Creates an invalid field error.
    #[must_use]
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Engine-level failures surfaced to the caller.
#[derive(Debug, Error)]
pub enum EngineError {
    /// No model candidate could be loaded. Terminal.
    #[error("model load failed: {0}")]
    Load(#[from] LoadError),

    /// The configuration was rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Context restoration failed; the context stays lost.
    #[error(transparent)]
    Recovery(#[from] RecoveryError),

    /// The engine has not been initialized.
    #[error("engine is not initialized")]
    NotInitialized,

    /// The engine was disposed.
    #[error("engine is disposed")]
    Disposed,

    /// Logging could not be installed.
    #[error("cannot initialize logging: {0}")]
    Logging(String),
}

/// Why a single frame produced a sentinel instead of detections.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FrameError {
    /// The frame could not be encoded.
    #[error(transparent)]
    Encode(#[from] CodecError),

    /// Inference did not produce an output.
    #[error(transparent)]
    Inference(#[from] InferenceError),

    /// The output could not be decoded.
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display() {
        let err = ConfigError::invalid("iou_threshold", "must be in (0, 1]");
        assert_eq!(err.to_string(), "invalid config: iou_threshold must be in (0, 1]");
    }

    #[test]
    fn engine_error_wraps_load() {
        let err = EngineError::from(LoadError::NoCandidates { fallback_index: 3 });
        assert!(err.to_string().starts_with("model load failed"));
    }

    #[test]
    fn frame_error_from_inference() {
        let err = FrameError::from(InferenceError::ContextLost);
        assert_eq!(err, FrameError::Inference(InferenceError::ContextLost));
    }
}
