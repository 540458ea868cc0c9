//! Scripted stores, sessions and factories.
//!
//! Enabled by the `testing` feature for test suites of dependent crates.

use std::collections::{HashMap, VecDeque};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use detect_types::{ExecutionBackend, InputTensor, RawOutput};
use parking_lot::Mutex;

use crate::error::SessionFault;
use crate::session::{InferenceSession, SessionFactory};
use crate::verifier::{ArtifactStore, Verified};

/// ONNX header with IR version 8.
pub const ONNX_HEADER: &[u8] = &[0x08, 0x08, 0x12, 0x07, b'p', b'y', b't', b'o', b'r', b'c', b'h'];

#[derive(Debug, Clone)]
struct MemoryArtifact {
    size: u64,
    header: Vec<u8>,
    transient_failures: u32,
}

/// In-memory artifact store.
#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
    entries: Mutex<HashMap<PathBuf, MemoryArtifact>>,
    probes: AtomicUsize,
}

impl MemoryArtifactStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an artifact with a valid ONNX header and the given reported size.
    #[must_use]
    pub fn with_onnx(self, path: impl Into<PathBuf>, size: u64) -> Self {
        self.with_bytes(path, size, ONNX_HEADER.to_vec())
    }

    /// Adds an artifact with an arbitrary header.
    #[must_use]
    pub fn with_bytes(self, path: impl Into<PathBuf>, size: u64, header: Vec<u8>) -> Self {
        self.entries.lock().insert(
            path.into(),
            MemoryArtifact {
                size,
                header,
                transient_failures: 0,
            },
        );
        self
    }

    /// Makes the next `count` size probes of `path` fail with an I/O error.
    #[must_use]
    pub fn with_transient_failures(self, path: impl AsRef<Path>, count: u32) -> Self {
        if let Some(entry) = self.entries.lock().get_mut(path.as_ref()) {
            entry.transient_failures = count;
        }
        self
    }

    /// Removes an artifact.
    pub fn remove(&self, path: impl AsRef<Path>) {
        self.entries.lock().remove(path.as_ref());
    }

    /// Size probes served so far.
    #[must_use]
    pub fn probes(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    async fn size(&self, path: &Path) -> io::Result<Option<u64>> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        let mut entries = self.entries.lock();
        match entries.get_mut(path) {
            None => Ok(None),
            Some(entry) if entry.transient_failures > 0 => {
                entry.transient_failures -= 1;
                Err(io::Error::new(io::ErrorKind::ConnectionReset, "connection reset"))
            }
            Some(entry) => Ok(Some(entry.size)),
        }
    }

    async fn header(&self, path: &Path, len: usize) -> io::Result<Vec<u8>> {
        let entries = self.entries.lock();
        let entry = entries
            .get(path)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "not found"))?;
        Ok(entry.header.iter().copied().take(len).collect())
    }
}

/// One scripted response of a [`ScriptedSession`].
#[derive(Debug, Clone)]
pub enum Step {
    /// Return this output.
    Output(RawOutput),
    /// Fail with this fault.
    Fault(SessionFault),
    /// Never complete.
    Hang,
    /// Return this output after a delay.
    Delay(Duration, RawOutput),
}

/// Session that replays a script, then repeats a default step.
#[derive(Debug)]
pub struct ScriptedSession {
    backend: ExecutionBackend,
    steps: Mutex<VecDeque<Step>>,
    default_step: Step,
    revalidate_result: Mutex<Result<(), SessionFault>>,
    calls: AtomicUsize,
}

impl ScriptedSession {
    /// Session that repeats `default_step` once the script is empty.
    #[must_use]
    pub fn new(backend: ExecutionBackend, default_step: Step) -> Self {
        Self {
            backend,
            steps: Mutex::new(VecDeque::new()),
            default_step,
            revalidate_result: Mutex::new(Ok(())),
            calls: AtomicUsize::new(0),
        }
    }

    /// Session that always returns `output`.
    #[must_use]
    pub fn healthy(backend: ExecutionBackend, output: RawOutput) -> Self {
        Self::new(backend, Step::Output(output))
    }

    /// Session that passes its self-test, then fails every call with `fault`.
    #[must_use]
    pub fn failing_after_self_test(
        backend: ExecutionBackend,
        output: RawOutput,
        fault: SessionFault,
    ) -> Self {
        Self::new(backend, Step::Fault(fault)).then(Step::Output(output))
    }

    /// Appends a scripted step.
    #[must_use]
    pub fn then(self, step: Step) -> Self {
        self.steps.lock().push_back(step);
        self
    }

    /// Makes [`InferenceSession::revalidate`] fail.
    #[must_use]
    pub fn with_revalidate_failure(self, fault: SessionFault) -> Self {
        *self.revalidate_result.lock() = Err(fault);
        self
    }

    /// Calls to `run` so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InferenceSession for ScriptedSession {
    fn backend(&self) -> ExecutionBackend {
        self.backend
    }

    async fn run(&self, _input: &InputTensor) -> Result<RawOutput, SessionFault> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let step = self
            .steps
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.default_step.clone());
        match step {
            Step::Output(output) => Ok(output),
            Step::Fault(fault) => Err(fault),
            Step::Hang => std::future::pending().await,
            Step::Delay(delay, output) => {
                tokio::time::sleep(delay).await;
                Ok(output)
            }
        }
    }

    async fn revalidate(&self) -> Result<(), SessionFault> {
        self.revalidate_result.lock().clone()
    }
}

type SessionBuilder =
    dyn Fn(&Verified, ExecutionBackend) -> Result<ScriptedSession, SessionFault> + Send + Sync;

/// Factory that builds [`ScriptedSession`]s and records every request.
pub struct ScriptedFactory {
    builder: Box<SessionBuilder>,
    requests: Mutex<Vec<(PathBuf, ExecutionBackend)>>,
    sessions: Mutex<Vec<Arc<ScriptedSession>>>,
}

impl std::fmt::Debug for ScriptedFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedFactory")
            .field("requests", &*self.requests.lock())
            .finish_non_exhaustive()
    }
}

impl ScriptedFactory {
    /// Factory calling `builder` for every request.
    pub fn new<F>(builder: F) -> Self
    where
        F: Fn(&Verified, ExecutionBackend) -> Result<ScriptedSession, SessionFault>
            + Send
            + Sync
            + 'static,
    {
        Self {
            builder: Box::new(builder),
            requests: Mutex::new(Vec::new()),
            sessions: Mutex::new(Vec::new()),
        }
    }

    /// Factory whose sessions always return `output`.
    #[must_use]
    pub fn healthy(output: RawOutput) -> Self {
        Self::new(move |_, backend| Ok(ScriptedSession::healthy(backend, output.clone())))
    }

    /// Every `(path, backend)` requested so far, including failed ones.
    #[must_use]
    pub fn requests(&self) -> Vec<(PathBuf, ExecutionBackend)> {
        self.requests.lock().clone()
    }

    /// Sessions handed out so far.
    #[must_use]
    pub fn sessions(&self) -> Vec<Arc<ScriptedSession>> {
        self.sessions.lock().clone()
    }
}

#[async_trait]
impl SessionFactory for ScriptedFactory {
    async fn create(
        &self,
        artifact: &Verified,
        backend: ExecutionBackend,
    ) -> Result<Arc<dyn InferenceSession>, SessionFault> {
        self.requests.lock().push((artifact.path.clone(), backend));
        let session = Arc::new((self.builder)(artifact, backend)?);
        self.sessions.lock().push(Arc::clone(&session));
        Ok(session)
    }
}

/// Builds an anchor-free `[1, 4 + C, N]` output.
///
/// Each candidate is `(cx, cy, w, h, class_id, score)` in model-input space.
#[must_use]
pub fn anchor_free_output(
    num_classes: usize,
    candidates: &[(f32, f32, f32, f32, usize, f32)],
) -> RawOutput {
    let rows = 4 + num_classes;
    let n = candidates.len();
    let mut flat = vec![0.0f32; rows * n];
    for (j, &(cx, cy, w, h, class_id, score)) in candidates.iter().enumerate() {
        flat[j] = cx;
        flat[n + j] = cy;
        flat[2 * n + j] = w;
        flat[3 * n + j] = h;
        if class_id < num_classes {
            flat[(4 + class_id) * n + j] = score;
        }
    }
    match RawOutput::from_shape_vec(&[1, rows, n], flat) {
        Ok(output) => output,
        Err(_) => unreachable!("shape matches buffer length by construction"),
    }
}
