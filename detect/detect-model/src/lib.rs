//! Model artifact verification, session lifecycle and hardware-context
//! monitoring for the waste-detection engine.
//!
//! # Components
//!
//! - [`Verifier`] - Read-only probe of an artifact: reachability, approximate
//!   size and header signature
//! - [`ModelLifecycle`] - Verify, load, self-test and run a model, retrying
//!   transient failures and falling back through alternative artifacts
//! - [`ContextMonitor`] - Hardware-context availability plus an ordered
//!   registry of [`RecoveryHandler`]s
//! - [`InferenceSession`] / [`SessionFactory`] - The seam to the inference
//!   runtime
//!
//! # Failure Handling
//!
//! | Failure | Classification | Action |
//! |---------|----------------|--------|
//! | Artifact unreachable | transient | retry with exponential backoff, then fall back |
//! | Size or header mismatch | corruption | flag suspected corrupt, fall back |
//! | Session creation on GPU | non-corrupt | retry on the portable backend |
//! | Self-test failure | same as load | fall back |
//! | Repeated inference failures | threshold reached | flag corrupt, proactive fallback |
//! | Portable backend forced | GPU session active | rebuild on the portable backend |
//!
//! Reloads the manager starts on its own are reported through
//! [`ModelLifecycle::take_reload`].
//!
//! # Features
//!
//! - `onnx` - `OnnxSessionFactory` backed by ONNX Runtime
//! - `testing` - Scripted stores, sessions and factories in the `testing` module
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use detect_model::{ContextMonitor, FsArtifactStore, ModelArtifactDescriptor, Verifier};
//!
//! let verifier = Verifier::new(Arc::new(FsArtifactStore), 0.10);
//! let descriptor = ModelArtifactDescriptor::new("static/models/yolov8n.onnx", 6_300_000);
//! let monitor = ContextMonitor::new(false);
//!
//! assert_eq!(descriptor.candidate_count(), 1);
//! assert!(!monitor.is_available());
//! # let _ = verifier;
//! ```

#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![warn(missing_docs)]

mod artifact;
mod context;
mod error;
mod lifecycle;
mod session;
mod verifier;

#[cfg(feature = "onnx")]
mod onnx;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use artifact::{
    ArtifactCandidate, ArtifactFormat, DEFAULT_ONNX_IR_VERSION, FallbackArtifact, HEADER_PROBE_LEN,
    ModelArtifactDescriptor,
};
pub use context::{ContextMonitor, ContextState, RecoveryHandler};
pub use error::{
    CandidateFailure, FaultKind, InferenceError, LoadError, RecoveryError, SessionFault,
    VerificationError,
};
pub use lifecycle::{
    LifecycleConfig, LifecyclePolicy, LoadStage, ModelLifecycle, ModelState,
    RECOVERY_HANDLER_NAME, Ready, Reload,
};
pub use session::{InferenceSession, SessionFactory};
pub use verifier::{ArtifactStore, FsArtifactStore, Verified, Verifier};

#[cfg(feature = "onnx")]
pub use onnx::{OnnxSession, OnnxSessionFactory};
