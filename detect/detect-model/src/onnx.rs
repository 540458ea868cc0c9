//! ONNX Runtime sessions.

use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use detect_types::{ExecutionBackend, InputTensor, RawOutput};
use ort::execution_providers::CUDAExecutionProvider;
use ort::session::Session;
use ort::session::builder::GraphOptimizationLevel;
use ort::value::TensorRef;
use parking_lot::Mutex;
use tracing::debug;

use crate::error::SessionFault;
use crate::session::{InferenceSession, SessionFactory};
use crate::verifier::Verified;

/// Runtime errors carry no structured kind; the message is classified.
fn fault<E: Display>(error: E) -> SessionFault {
    SessionFault::unknown(error.to_string())
}

/// Creates ONNX Runtime sessions.
///
/// The GPU backend registers the CUDA execution provider and fails if it
/// cannot be initialised, so the lifecycle can retry on CPU.
#[derive(Debug, Clone, Copy)]
pub struct OnnxSessionFactory {
    intra_threads: usize,
}

impl Default for OnnxSessionFactory {
    fn default() -> Self {
        Self { intra_threads: 4 }
    }
}

impl OnnxSessionFactory {
    /// Factory using `intra_threads` threads per operator.
    #[must_use]
    pub const fn new(intra_threads: usize) -> Self {
        Self { intra_threads }
    }
}

fn build_session(
    path: &Path,
    backend: ExecutionBackend,
    intra_threads: usize,
) -> Result<Session, SessionFault> {
    let mut builder = Session::builder()
        .map_err(fault)?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(fault)?
        .with_intra_threads(intra_threads)
        .map_err(fault)?;

    if backend.is_gpu() {
        builder = builder
            .with_execution_providers([CUDAExecutionProvider::default().build().error_on_failure()])
            .map_err(|e| SessionFault::transient(format!("GPU execution provider unavailable: {e}")))?;
    }

    builder.commit_from_file(path).map_err(fault)
}

#[async_trait]
impl SessionFactory for OnnxSessionFactory {
    async fn create(
        &self,
        artifact: &Verified,
        backend: ExecutionBackend,
    ) -> Result<Arc<dyn InferenceSession>, SessionFault> {
        let path: PathBuf = artifact.path.clone();
        let intra_threads = self.intra_threads;
        let session = tokio::task::spawn_blocking(move || build_session(&path, backend, intra_threads))
            .await
            .map_err(|e| SessionFault::transient(format!("session build task failed: {e}")))??;

        let input_name = session
            .inputs
            .first()
            .map_or_else(|| "images".to_string(), |i| i.name.clone());
        let output_name = session
            .outputs
            .first()
            .map_or_else(|| "output0".to_string(), |o| o.name.clone());
        debug!(
            path = %artifact.path.display(),
            backend = %backend,
            input = %input_name,
            output = %output_name,
            "ONNX session created"
        );

        Ok(Arc::new(OnnxSession {
            backend,
            inner: Arc::new(Mutex::new(session)),
            input_name,
            output_name,
        }))
    }
}

/// A committed ONNX Runtime session.
///
/// Runs execute on the blocking pool; the session mutex serialises calls.
pub struct OnnxSession {
    backend: ExecutionBackend,
    inner: Arc<Mutex<Session>>,
    input_name: String,
    output_name: String,
}

impl std::fmt::Debug for OnnxSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxSession")
            .field("backend", &self.backend)
            .field("input_name", &self.input_name)
            .field("output_name", &self.output_name)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl InferenceSession for OnnxSession {
    fn backend(&self) -> ExecutionBackend {
        self.backend
    }

    async fn run(&self, input: &InputTensor) -> Result<RawOutput, SessionFault> {
        let array = input.as_array().clone();
        let inner = Arc::clone(&self.inner);
        let input_name = self.input_name.clone();
        let output_name = self.output_name.clone();

        tokio::task::spawn_blocking(move || {
            let mut session = inner.lock();
            let contiguous = array.as_standard_layout();
            let tensor = TensorRef::from_array_view(&contiguous).map_err(fault)?;
            let outputs = session
                .run(ort::inputs![input_name.as_str() => tensor])
                .map_err(fault)?;
            let output = outputs.get(output_name.as_str()).ok_or_else(|| {
                SessionFault::invalid_input(format!("output '{output_name}' not found"))
            })?;
            let (shape, data) = output.try_extract_tensor::<f32>().map_err(fault)?;
            let shape: Vec<usize> = shape
                .iter()
                .map(|&d| usize::try_from(d).unwrap_or(0))
                .collect();
            RawOutput::from_shape_vec(&shape, data.to_vec())
                .map_err(|e| SessionFault::invalid_input(e.to_string()))
        })
        .await
        .map_err(|e| SessionFault::transient(format!("inference task failed: {e}")))?
    }
}
