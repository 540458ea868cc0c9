//! Inference runtime seam.

use std::sync::Arc;

use async_trait::async_trait;
use detect_types::{ExecutionBackend, InputTensor, RawOutput};

use crate::error::SessionFault;
use crate::verifier::Verified;

/// A loaded model ready to run.
///
/// Sessions are owned by the lifecycle manager; callers never keep one
/// across an await without re-checking context availability.
#[async_trait]
pub trait InferenceSession: Send + Sync {
    /// Backend the session executes on.
    fn backend(&self) -> ExecutionBackend;

    /// Runs one forward pass.
    ///
    /// Dropping the returned future abandons the call.
    async fn run(&self, input: &InputTensor) -> Result<RawOutput, SessionFault>;

    /// Checks that the session survived a hardware-context restoration.
    ///
    /// The default assumes sessions hold no context-bound resources.
    async fn revalidate(&self) -> Result<(), SessionFault> {
        Ok(())
    }
}

/// Builds sessions from verified artifacts.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    /// Creates a session for `artifact` on `backend`.
    async fn create(
        &self,
        artifact: &Verified,
        backend: ExecutionBackend,
    ) -> Result<Arc<dyn InferenceSession>, SessionFault>;
}
