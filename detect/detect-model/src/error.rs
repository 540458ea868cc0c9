//! Error types for verification, loading and inference.
//!
//! Fallback decisions are made on the error variant, never on message
//! text. The one exception is [`FaultKind::Unknown`], where the runtime
//! gave no structured reason and [`SessionFault::classify`] falls back to
//! matching known indicators in the message.

use std::path::PathBuf;

use thiserror::Error;

/// Failures of the read-only artifact probe.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VerificationError {
    /// The artifact could not be reached. Usually transient.
    #[error("artifact unreachable: {path}: {reason}")]
    Unreachable {
        /// Probed path.
        path: PathBuf,
        /// Why the probe failed.
        reason: String,
    },

    /// The reported size is outside the tolerance band.
    #[error("artifact size mismatch: {path}: expected ~{expected} bytes, found {actual}")]
    SizeMismatch {
        /// Probed path.
        path: PathBuf,
        /// Declared approximate size.
        expected: u64,
        /// Reported size.
        actual: u64,
    },

    /// The header does not carry the expected format signature.
    #[error("invalid artifact format: {path}: {reason}")]
    InvalidFormat {
        /// Probed path.
        path: PathBuf,
        /// What was wrong with the header.
        reason: String,
    },
}

impl VerificationError {
    /// Creates an unreachable error.
    #[must_use]
    pub fn unreachable(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Unreachable {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Creates a size mismatch error.
    #[must_use]
    pub fn size_mismatch(path: impl Into<PathBuf>, expected: u64, actual: u64) -> Self {
        Self::SizeMismatch {
            path: path.into(),
            expected,
            actual,
        }
    }

    /// Creates an invalid format error.
    #[must_use]
    pub fn invalid_format(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidFormat {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// The artifact itself is bad; move on to the next candidate.
    #[must_use]
    pub const fn is_corruption(&self) -> bool {
        matches!(self, Self::SizeMismatch { .. } | Self::InvalidFormat { .. })
    }

    /// Retrying the same artifact may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Unreachable { .. })
    }
}

/// Structured fault kinds reported by an inference runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultKind {
    /// The model graph or weights are unusable.
    Corrupt,
    /// A retry may succeed.
    Transient,
    /// The input tensor was rejected.
    InvalidInput,
    /// The runtime gave no structured reason.
    Unknown,
}

/// Message fragments that indicate a corrupt model.
const CORRUPTION_INDICATORS: &[&str] = &[
    "corrupt",
    "invalid model",
    "invalid protobuf",
    "protobuf parsing failed",
    "failed to load model",
    "unexpected end",
    "bad magic",
    "checksum",
    "malformed",
];

/// Message fragments that indicate a transient runtime condition.
const TRANSIENT_INDICATORS: &[&str] = &[
    "timeout",
    "timed out",
    "busy",
    "temporarily",
    "out of memory",
    "device lost",
    "context lost",
];

/// Fault raised by an inference session or session factory.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct SessionFault {
    /// Kind reported by the runtime.
    pub kind: FaultKind,
    /// Runtime message.
    pub message: String,
}

impl SessionFault {
    /// Creates a fault of the given kind.
    #[must_use]
    pub fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Creates a corrupt-model fault.
    #[must_use]
    pub fn corrupt(message: impl Into<String>) -> Self {
        Self::new(FaultKind::Corrupt, message)
    }

    /// Creates a transient fault.
    #[must_use]
    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(FaultKind::Transient, message)
    }

    /// Creates an invalid-input fault.
    #[must_use]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(FaultKind::InvalidInput, message)
    }

    /// Creates an unclassified fault.
    #[must_use]
    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(FaultKind::Unknown, message)
    }

    /// Effective kind of this fault.
    ///
    /// Structured kinds are returned as-is. [`FaultKind::Unknown`] is
    /// resolved by matching the message against known corruption and
    /// transient indicators, and stays `Unknown` if nothing matches.
    #[must_use]
    pub fn classify(&self) -> FaultKind {
        if self.kind != FaultKind::Unknown {
            return self.kind;
        }
        let message = self.message.to_lowercase();
        if CORRUPTION_INDICATORS.iter().any(|i| message.contains(i)) {
            FaultKind::Corrupt
        } else if TRANSIENT_INDICATORS.iter().any(|i| message.contains(i)) {
            FaultKind::Transient
        } else {
            FaultKind::Unknown
        }
    }

    /// Returns `true` if the fault points at the model itself.
    #[must_use]
    pub fn is_corrupt(&self) -> bool {
        self.classify() == FaultKind::Corrupt
    }
}

/// Per-call inference failures.
///
/// Every variant counts as a failure for retry accounting.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InferenceError {
    /// The call did not finish before its deadline.
    #[error("inference timed out after {timeout_ms}ms")]
    Timeout {
        /// Deadline that expired.
        timeout_ms: u64,
    },

    /// The hardware context was lost while the call was pending.
    #[error("hardware context lost during inference")]
    ContextLost,

    /// The runtime reported a fault.
    #[error("inference runtime fault: {0}")]
    RuntimeFault(#[from] SessionFault),

    /// The owning engine was disposed while the call was pending.
    #[error("inference cancelled")]
    Cancelled,

    /// No ready session exists.
    #[error("no model session available")]
    ModelUnavailable,
}

impl InferenceError {
    /// Creates a timeout error.
    #[must_use]
    pub const fn timeout(timeout_ms: u64) -> Self {
        Self::Timeout { timeout_ms }
    }

    /// Returns `true` if the failure points at the model itself.
    #[must_use]
    pub fn is_corruption(&self) -> bool {
        matches!(self, Self::RuntimeFault(fault) if fault.is_corrupt())
    }
}

/// Why one candidate artifact could not be brought to `Ready`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CandidateFailure {
    /// Verification failed.
    #[error(transparent)]
    Verification(#[from] VerificationError),

    /// The session could not be created.
    #[error("session creation failed: {0}")]
    Session(SessionFault),

    /// The self-test inference failed.
    #[error("self-test failed: {0}")]
    SelfTest(InferenceError),
}

impl CandidateFailure {
    /// Returns `true` for failures that suggest a bad artifact.
    #[must_use]
    pub fn is_corruption(&self) -> bool {
        match self {
            Self::Verification(e) => e.is_corruption(),
            Self::Session(fault) => fault.is_corrupt(),
            Self::SelfTest(e) => e.is_corruption(),
        }
    }
}

/// Terminal load failures surfaced to the caller.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LoadError {
    /// Every candidate from the current fallback index onward failed.
    #[error("all model candidates exhausted after {attempted} attempt(s): {last_error}")]
    AllFallbacksExhausted {
        /// Candidates tried during this load.
        attempted: usize,
        /// Failure of the last candidate.
        last_error: String,
    },

    /// No candidate remains at or after the current fallback index.
    #[error("no model candidates remain (fallback index {fallback_index})")]
    NoCandidates {
        /// Current fallback index.
        fallback_index: usize,
    },
}

/// A recovery handler failed to restore its resources.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("recovery handler '{handler}' failed: {reason}")]
pub struct RecoveryError {
    /// Handler name.
    pub handler: String,
    /// Failure reason.
    pub reason: String,
}

impl RecoveryError {
    /// Creates a recovery error.
    #[must_use]
    pub fn new(handler: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            handler: handler.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verification_classification() {
        let unreachable = VerificationError::unreachable("m.onnx", "not found");
        let size = VerificationError::size_mismatch("m.onnx", 12_000_000, 9_000_000);
        let format = VerificationError::invalid_format("m.onnx", "html");

        assert!(unreachable.is_transient());
        assert!(!unreachable.is_corruption());
        assert!(size.is_corruption());
        assert!(format.is_corruption());
        assert!(!size.is_transient());
    }

    #[test]
    fn verification_display() {
        let err = VerificationError::size_mismatch("m.onnx", 12_000_000, 9_000_000);
        assert_eq!(
            err.to_string(),
            "artifact size mismatch: m.onnx: expected ~12000000 bytes, found 9000000"
        );
    }

    #[test]
    fn structured_fault_kind_wins() {
        let fault = SessionFault::transient("protobuf parsing failed");
        assert_eq!(fault.classify(), FaultKind::Transient);
        assert!(!fault.is_corrupt());
    }

    #[test]
    fn unknown_fault_uses_indicators() {
        assert_eq!(
            SessionFault::unknown("Protobuf parsing failed at offset 12").classify(),
            FaultKind::Corrupt
        );
        assert_eq!(
            SessionFault::unknown("GPU device lost").classify(),
            FaultKind::Transient
        );
        assert_eq!(
            SessionFault::unknown("shape [1,3,320,320] != [1,3,640,640]").classify(),
            FaultKind::Unknown
        );
    }

    #[test]
    fn inference_error_corruption() {
        assert!(InferenceError::from(SessionFault::corrupt("bad weights")).is_corruption());
        assert!(!InferenceError::timeout(200).is_corruption());
        assert!(!InferenceError::ContextLost.is_corruption());
        assert_eq!(
            InferenceError::timeout(200).to_string(),
            "inference timed out after 200ms"
        );
    }

    #[test]
    fn candidate_failure_corruption() {
        let f: CandidateFailure = VerificationError::invalid_format("m", "html").into();
        assert!(f.is_corruption());
        assert!(!CandidateFailure::SelfTest(InferenceError::timeout(3000)).is_corruption());
        assert!(CandidateFailure::Session(SessionFault::unknown("model is corrupt")).is_corruption());
    }

    #[test]
    fn load_error_display() {
        let err = LoadError::AllFallbacksExhausted {
            attempted: 3,
            last_error: "self-test failed: inference timed out after 3000ms".to_string(),
        };
        assert!(err.to_string().starts_with("all model candidates exhausted after 3 attempt(s)"));
    }
}
