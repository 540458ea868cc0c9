//! Error types for the adaptive controller.

use thiserror::Error;

/// Rejected controller configuration.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AdaptError {
    /// A field is outside its legal range.
    #[error("invalid controller config: {field} {reason}")]
    InvalidConfig {
        /// Offending field.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

impl AdaptError {
    /// Creates an invalid configuration error.
    #[must_use]
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field,
            reason: reason.into(),
        }
    }
}

/// Result type for controller operations.
pub type Result<T> = std::result::Result<T, AdaptError>;
