//! Model lifecycle: verify, load, self-test, run, fall back, recover.
//!
//! # Load Stages
//!
//! ```text
//! Unloaded -> Verifying -> Loading -> SelfTesting -> Ready
//!                 ^                                   |
//!                 +----------- TryFallback <----------+ (any stage failure)
//!                                   |
//!                                   +--> Failed (candidates exhausted)
//! ```
//!
//! The fallback index never decreases during the lifetime of a
//! [`ModelLifecycle`].

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use detect_types::{Capabilities, ExecutionBackend, InputTensor, RawOutput};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::artifact::ModelArtifactDescriptor;
use crate::context::{ContextMonitor, RecoveryHandler, wait_lost};
use crate::error::{CandidateFailure, InferenceError, LoadError, RecoveryError, SessionFault};
use crate::session::{InferenceSession, SessionFactory};
use crate::verifier::{ArtifactStore, Verified, Verifier};

/// Name of the lifecycle's recovery handler.
pub const RECOVERY_HANDLER_NAME: &str = "model-lifecycle";

/// Tunables for loading and failure accounting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecyclePolicy {
    /// Accepted fractional deviation from the declared artifact size.
    pub size_tolerance: f64,

    /// Consecutive inference failures before proactive fallback.
    pub failure_threshold: u32,

    /// Verification attempts per candidate for transient failures.
    pub max_transient_attempts: u32,

    /// First retry delay in milliseconds; doubles per attempt.
    pub backoff_base_ms: u64,

    /// Retry delay cap in milliseconds.
    pub backoff_max_ms: u64,

    /// Deadline for the post-load self-test inference.
    pub self_test_timeout_ms: u64,

    /// IoU multiplier applied in low-precision mode.
    pub low_precision_iou_factor: f32,
}

impl Default for LifecyclePolicy {
    fn default() -> Self {
        Self {
            size_tolerance: 0.10,
            failure_threshold: 10,
            max_transient_attempts: 3,
            backoff_base_ms: 250,
            backoff_max_ms: 4000,
            self_test_timeout_ms: 3000,
            low_precision_iou_factor: 0.8,
        }
    }
}

impl LifecyclePolicy {
    /// Sets the size tolerance.
    #[must_use]
    pub const fn with_size_tolerance(mut self, tolerance: f64) -> Self {
        self.size_tolerance = tolerance;
        self
    }

    /// Sets the consecutive failure threshold.
    #[must_use]
    pub const fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    /// Sets the transient retry cap.
    #[must_use]
    pub const fn with_max_transient_attempts(mut self, attempts: u32) -> Self {
        self.max_transient_attempts = attempts;
        self
    }

    /// Delay before retry number `attempt` (1-based).
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(20);
        let delay = self.backoff_base_ms.saturating_mul(1u64 << exponent);
        Duration::from_millis(delay.min(self.backoff_max_ms))
    }

    /// Self-test deadline.
    #[must_use]
    pub const fn self_test_timeout(&self) -> Duration {
        Duration::from_millis(self.self_test_timeout_ms)
    }

    /// Validates the policy.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        (0.0..1.0).contains(&self.size_tolerance)
            && self.failure_threshold > 0
            && self.max_transient_attempts > 0
            && self.backoff_base_ms <= self.backoff_max_ms
            && self.self_test_timeout_ms > 0
            && self.low_precision_iou_factor > 0.0
            && self.low_precision_iou_factor <= 1.0
    }
}

/// Stage of the load state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadStage {
    /// No session.
    Unloaded,
    /// Probing the current candidate.
    Verifying,
    /// Creating the session.
    Loading,
    /// Running the self-test inference.
    SelfTesting,
    /// A session is ready.
    Ready,
    /// Moving to the next candidate.
    TryFallback,
    /// Every candidate failed.
    Failed,
}

/// Mutable bookkeeping owned by the lifecycle manager.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelState {
    /// Candidate currently selected.
    pub current_path: PathBuf,
    /// Index of that candidate; never decreases.
    pub fallback_index: usize,
    /// A corruption-like failure was seen since the last successful inference.
    pub is_suspected_corrupt: bool,
    /// Inference failures since the last success or load.
    pub consecutive_failure_count: u32,
    /// When the active artifact last passed verification.
    pub last_verified_at: Option<Instant>,
}

/// Outcome of a successful load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ready {
    /// Loaded artifact.
    pub path: PathBuf,
    /// Candidate index.
    pub fallback_index: usize,
    /// Session backend.
    pub backend: ExecutionBackend,
}

/// Outcome of a reload the manager started on its own, after repeated
/// failures or a backend change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reload {
    /// A new session is active.
    Loaded(Ready),
    /// No candidate could be loaded; the manager holds no session.
    Failed(LoadError),
}

/// Static inputs of a [`ModelLifecycle`].
#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    /// Candidate artifacts.
    pub descriptor: ModelArtifactDescriptor,
    /// Tunables.
    pub policy: LifecyclePolicy,
    /// Model input size used for the self-test tensor.
    pub input_size: (u32, u32),
    /// Backends present on the host.
    pub capabilities: Capabilities,
}

struct ActiveModel {
    verified: Verified,
    session: Arc<dyn InferenceSession>,
}

/// Owns the inference session and everything needed to keep one alive.
pub struct ModelLifecycle {
    descriptor: ModelArtifactDescriptor,
    policy: LifecyclePolicy,
    input_size: (u32, u32),
    capabilities: Capabilities,
    verifier: Verifier,
    factory: Arc<dyn SessionFactory>,
    monitor: Arc<ContextMonitor>,
    state: Mutex<ModelState>,
    stage: Mutex<LoadStage>,
    active: RwLock<Option<ActiveModel>>,
    force_portable: AtomicBool,
    migration_attempted: AtomicBool,
    reload: Mutex<Option<Reload>>,
    fallback_count: AtomicUsize,
    cancel: CancellationToken,
    loading: tokio::sync::Mutex<()>,
}

impl std::fmt::Debug for ModelLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelLifecycle")
            .field("stage", &*self.stage.lock())
            .field("state", &*self.state.lock())
            .field("backend", &self.active_backend())
            .finish_non_exhaustive()
    }
}

impl ModelLifecycle {
    /// Creates a lifecycle manager and registers its recovery handler with
    /// `monitor`.
    #[must_use]
    pub fn new(
        config: LifecycleConfig,
        store: Arc<dyn ArtifactStore>,
        factory: Arc<dyn SessionFactory>,
        monitor: Arc<ContextMonitor>,
    ) -> Arc<Self> {
        let LifecycleConfig {
            descriptor,
            policy,
            input_size,
            capabilities,
        } = config;
        let verifier = Verifier::new(store, policy.size_tolerance);
        let state = ModelState {
            current_path: descriptor.path.clone(),
            fallback_index: 0,
            is_suspected_corrupt: false,
            consecutive_failure_count: 0,
            last_verified_at: None,
        };

        let lifecycle = Arc::new(Self {
            descriptor,
            policy,
            input_size,
            capabilities,
            verifier,
            factory,
            monitor: Arc::clone(&monitor),
            state: Mutex::new(state),
            stage: Mutex::new(LoadStage::Unloaded),
            active: RwLock::new(None),
            force_portable: AtomicBool::new(false),
            migration_attempted: AtomicBool::new(false),
            reload: Mutex::new(None),
            fallback_count: AtomicUsize::new(0),
            cancel: CancellationToken::new(),
            loading: tokio::sync::Mutex::new(()),
        });

        monitor.register(Arc::new(LifecycleRecovery {
            lifecycle: Arc::downgrade(&lifecycle),
        }));
        lifecycle
    }

    /// Current bookkeeping snapshot.
    #[must_use]
    pub fn state(&self) -> ModelState {
        self.state.lock().clone()
    }

    /// Current load stage.
    #[must_use]
    pub fn stage(&self) -> LoadStage {
        *self.stage.lock()
    }

    /// Returns `true` if a session is ready.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.active.read().is_some()
    }

    /// Backend of the active session.
    #[must_use]
    pub fn active_backend(&self) -> Option<ExecutionBackend> {
        self.active.read().as_ref().map(|a| a.session.backend())
    }

    /// Times the fallback index has advanced.
    #[must_use]
    pub fn fallback_count(&self) -> usize {
        self.fallback_count.load(Ordering::SeqCst)
    }

    /// Candidate artifacts.
    #[must_use]
    pub const fn descriptor(&self) -> &ModelArtifactDescriptor {
        &self.descriptor
    }

    /// Tunables.
    #[must_use]
    pub const fn policy(&self) -> &LifecyclePolicy {
        &self.policy
    }

    /// Hardware context monitor shared with this manager.
    #[must_use]
    pub fn monitor(&self) -> &Arc<ContextMonitor> {
        &self.monitor
    }

    /// Avoids the accelerated backend.
    ///
    /// Sessions created from now on use the portable backend. An active
    /// accelerated session is rebuilt on the portable backend before the
    /// next inference; it stays in use if the rebuild fails.
    pub fn set_force_portable(&self, force: bool) {
        let previous = self.force_portable.swap(force, Ordering::SeqCst);
        if previous != force {
            self.migration_attempted.store(false, Ordering::SeqCst);
            debug!(force_portable = force, "Backend preference changed");
        }
    }

    /// Takes the outcome of the last reload started by the manager itself.
    pub fn take_reload(&self) -> Option<Reload> {
        self.reload.lock().take()
    }

    /// Loads the current candidate, falling back as needed.
    ///
    /// Starts at the current fallback index; a reload never revisits an
    /// earlier candidate.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError`] when no candidate from the current index onward
    /// can be brought to `Ready`.
    pub async fn load(&self) -> Result<Ready, LoadError> {
        let _loading = self.loading.lock().await;
        let start = self.state.lock().fallback_index;
        self.load_from(start).await
    }

    async fn load_from(&self, start: usize) -> Result<Ready, LoadError> {
        let total = self.descriptor.candidate_count();
        if start >= total {
            self.set_stage(LoadStage::Failed);
            return Err(LoadError::NoCandidates {
                fallback_index: start,
            });
        }

        let mut attempted = 0;
        let mut last_error = String::new();
        for index in start..total {
            self.advance_to(index);
            match self.try_candidate(index).await {
                Ok(ready) => return Ok(ready),
                Err(failure) => {
                    attempted += 1;
                    if failure.is_corruption() {
                        self.state.lock().is_suspected_corrupt = true;
                    }
                    warn!(fallback_index = index, error = %failure, "Model candidate failed");
                    last_error = failure.to_string();
                    if index + 1 < total {
                        self.set_stage(LoadStage::TryFallback);
                    }
                }
            }
        }

        self.set_stage(LoadStage::Failed);
        error!(attempted, last_error = %last_error, "All model candidates exhausted");
        Err(LoadError::AllFallbacksExhausted {
            attempted,
            last_error,
        })
    }

    fn advance_to(&self, index: usize) {
        let mut state = self.state.lock();
        if index > state.fallback_index {
            self.fallback_count.fetch_add(1, Ordering::SeqCst);
            state.fallback_index = index;
            info!(fallback_index = index, "Advancing to fallback model");
        }
        if let Some(candidate) = self.descriptor.candidate(state.fallback_index) {
            state.current_path = candidate.path.to_path_buf();
        }
    }

    async fn try_candidate(&self, index: usize) -> Result<Ready, CandidateFailure> {
        self.set_stage(LoadStage::Verifying);
        let verified = self.verify_with_retry(index).await?;

        self.set_stage(LoadStage::Loading);
        let session = self
            .create_session(&verified)
            .await
            .map_err(CandidateFailure::Session)?;

        self.set_stage(LoadStage::SelfTesting);
        self.self_test(&session)
            .await
            .map_err(CandidateFailure::SelfTest)?;

        let backend = session.backend();
        {
            let mut state = self.state.lock();
            state.consecutive_failure_count = 0;
            state.last_verified_at = Some(verified.verified_at);
            state.current_path.clone_from(&verified.path);
        }
        let ready = Ready {
            path: verified.path.clone(),
            fallback_index: index,
            backend,
        };
        *self.active.write() = Some(ActiveModel { verified, session });
        self.set_stage(LoadStage::Ready);

        info!(
            path = %ready.path.display(),
            fallback_index = index,
            backend = %backend,
            "Model ready"
        );
        Ok(ready)
    }

    async fn verify_with_retry(&self, index: usize) -> Result<Verified, CandidateFailure> {
        let mut attempt = 1;
        loop {
            match self.verifier.verify_candidate(&self.descriptor, index).await {
                Ok(verified) => return Ok(verified),
                Err(e) if e.is_transient() && attempt < self.policy.max_transient_attempts => {
                    let delay = self.policy.backoff(attempt);
                    debug!(
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "Retrying artifact after transient failure"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn select_backend(&self) -> ExecutionBackend {
        let context = self.monitor.state();
        let context_usable = context.available || context.is_recovering;
        let force = self.force_portable.load(Ordering::SeqCst) || !context_usable;
        self.capabilities.preferred(force)
    }

    async fn create_session(
        &self,
        verified: &Verified,
    ) -> Result<Arc<dyn InferenceSession>, SessionFault> {
        let backend = self.select_backend();
        match self.factory.create(verified, backend).await {
            Ok(session) => Ok(session),
            Err(fault)
                if backend.is_gpu()
                    && !fault.is_corrupt()
                    && self.capabilities.portable_backend_available =>
            {
                warn!(
                    path = %verified.path.display(),
                    error = %fault,
                    "GPU session creation failed, retrying on portable backend"
                );
                self.factory
                    .create(verified, ExecutionBackend::Portable)
                    .await
            }
            Err(fault) => Err(fault),
        }
    }

    async fn self_test(&self, session: &Arc<dyn InferenceSession>) -> Result<(), InferenceError> {
        let input = InputTensor::zeros(self.input_size.0, self.input_size.1);
        self.execute(session, &input, self.policy.self_test_timeout())
            .await
            .map(|_| ())
    }

    /// Races one call against cancellation, context loss and a deadline.
    async fn execute(
        &self,
        session: &Arc<dyn InferenceSession>,
        input: &InputTensor,
        timeout: Duration,
    ) -> Result<RawOutput, InferenceError> {
        let guard_context = session.backend().is_gpu();
        let mut context = self.monitor.subscribe();
        let lost = async {
            if guard_context {
                wait_lost(&mut context).await;
            } else {
                std::future::pending::<()>().await;
            }
        };

        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(InferenceError::Cancelled),
            () = lost => Err(InferenceError::ContextLost),
            result = tokio::time::timeout(timeout, session.run(input)) => match result {
                Ok(Ok(output)) => Ok(output),
                Ok(Err(fault)) => Err(InferenceError::RuntimeFault(fault)),
                Err(_) => Err(InferenceError::timeout(
                    u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                )),
            },
        }
    }

    /// Runs one inference on the active session.
    ///
    /// Every error increments the consecutive failure count. When the count
    /// reaches the policy threshold the model is flagged as suspected corrupt
    /// and the next fallback is loaded before this call returns.
    ///
    /// # Errors
    ///
    /// - [`InferenceError::ModelUnavailable`] with no ready session
    /// - [`InferenceError::ContextLost`] if an accelerated session's context
    ///   is or becomes unavailable
    /// - [`InferenceError::Timeout`] past `timeout`
    /// - [`InferenceError::Cancelled`] after [`ModelLifecycle::dispose`]
    /// - [`InferenceError::RuntimeFault`] for runtime errors
    pub async fn run_inference(
        &self,
        input: &InputTensor,
        timeout: Duration,
    ) -> Result<RawOutput, InferenceError> {
        if self.migration_due() {
            self.migrate_to_portable().await;
        }

        let session = self
            .active
            .read()
            .as_ref()
            .map(|active| Arc::clone(&active.session));

        let result = match session {
            None => Err(InferenceError::ModelUnavailable),
            Some(session) if session.backend().is_gpu() && !self.monitor.is_available() => {
                Err(InferenceError::ContextLost)
            }
            Some(session) => self.execute(&session, input, timeout).await,
        };

        match result {
            Ok(output) => {
                self.record_success();
                Ok(output)
            }
            Err(e) => {
                self.record_failure(&e).await;
                Err(e)
            }
        }
    }

    fn migration_due(&self) -> bool {
        self.force_portable.load(Ordering::SeqCst)
            && self.capabilities.portable_backend_available
            && !self.cancel.is_cancelled()
            && self
                .active
                .read()
                .as_ref()
                .is_some_and(|active| active.session.backend().is_gpu())
            && !self.migration_attempted.swap(true, Ordering::SeqCst)
    }

    async fn migrate_to_portable(&self) {
        let Ok(_loading) = self.loading.try_lock() else {
            self.migration_attempted.store(false, Ordering::SeqCst);
            return;
        };
        let verified = self
            .active
            .read()
            .as_ref()
            .filter(|active| active.session.backend().is_gpu())
            .map(|active| active.verified.clone());
        let Some(verified) = verified else {
            return;
        };

        let fresh = match self.factory.create(&verified, ExecutionBackend::Portable).await {
            Ok(session) => session,
            Err(fault) => {
                warn!(error = %fault, "Portable session creation failed, keeping GPU session");
                return;
            }
        };
        if let Err(e) = self.self_test(&fresh).await {
            warn!(error = %e, "Portable session failed self-test, keeping GPU session");
            return;
        }

        let fallback_index = self.state.lock().fallback_index;
        let backend = fresh.backend();
        let ready = Ready {
            path: verified.path.clone(),
            fallback_index,
            backend,
        };
        *self.active.write() = Some(ActiveModel {
            verified,
            session: fresh,
        });
        info!(
            path = %ready.path.display(),
            fallback_index,
            backend = %backend,
            "Session moved to portable backend"
        );
        *self.reload.lock() = Some(Reload::Loaded(ready));
    }

    fn record_success(&self) {
        let mut state = self.state.lock();
        state.consecutive_failure_count = 0;
        if state.is_suspected_corrupt {
            debug!("Inference succeeded, clearing suspected corruption");
            state.is_suspected_corrupt = false;
        }
    }

    async fn record_failure(&self, error: &InferenceError) {
        let (count, tripped) = {
            let mut state = self.state.lock();
            state.consecutive_failure_count = state.consecutive_failure_count.saturating_add(1);
            if error.is_corruption() {
                state.is_suspected_corrupt = true;
            }
            let tripped = state.consecutive_failure_count >= self.policy.failure_threshold;
            if tripped {
                state.is_suspected_corrupt = true;
            }
            (state.consecutive_failure_count, tripped)
        };
        debug!(consecutive_failures = count, error = %error, "Inference failed");

        let proactive = tripped
            && !matches!(error, InferenceError::Cancelled | InferenceError::ModelUnavailable)
            && !self.cancel.is_cancelled();
        if proactive {
            self.proactive_fallback(count).await;
        }
    }

    async fn proactive_fallback(&self, failures: u32) {
        let Ok(_loading) = self.loading.try_lock() else {
            return;
        };
        let next = self.state.lock().fallback_index + 1;
        if next >= self.descriptor.candidate_count() {
            warn!(
                consecutive_failures = failures,
                "Model suspected corrupt but no fallback remains, keeping current session"
            );
            self.state.lock().consecutive_failure_count = 0;
            return;
        }

        warn!(
            consecutive_failures = failures,
            fallback_index = next,
            "Model suspected corrupt, loading next fallback"
        );
        *self.active.write() = None;
        let outcome = match self.load_from(next).await {
            Ok(ready) => Reload::Loaded(ready),
            Err(e) => {
                error!(error = %e, "Proactive fallback failed");
                Reload::Failed(e)
            }
        };
        *self.reload.lock() = Some(outcome);
    }

    /// Re-validates the active session after a context restoration,
    /// recreating it on the same artifact if it did not survive.
    ///
    /// # Errors
    ///
    /// Returns [`RecoveryError`] if recreation or its self-test fails.
    pub async fn revalidate(&self) -> Result<(), RecoveryError> {
        let active = self
            .active
            .read()
            .as_ref()
            .map(|a| (Arc::clone(&a.session), a.verified.clone()));
        let Some((session, verified)) = active else {
            return Ok(());
        };
        if !session.backend().is_gpu() {
            return Ok(());
        }

        let Err(fault) = session.revalidate().await else {
            debug!("Session survived context restoration");
            return Ok(());
        };
        warn!(error = %fault, "Session lost with context, recreating");

        let fresh = self
            .create_session(&verified)
            .await
            .map_err(|f| RecoveryError::new(RECOVERY_HANDLER_NAME, f.to_string()))?;
        self.self_test(&fresh)
            .await
            .map_err(|e| RecoveryError::new(RECOVERY_HANDLER_NAME, e.to_string()))?;

        let backend = fresh.backend();
        *self.active.write() = Some(ActiveModel {
            verified,
            session: fresh,
        });
        info!(backend = %backend, "Session recreated after context restoration");
        Ok(())
    }

    /// Cancels pending work and releases the session.
    pub fn dispose(&self) {
        self.cancel.cancel();
        *self.active.write() = None;
        self.set_stage(LoadStage::Unloaded);
        debug!("Model lifecycle disposed");
    }

    fn set_stage(&self, stage: LoadStage) {
        *self.stage.lock() = stage;
    }
}

struct LifecycleRecovery {
    lifecycle: Weak<ModelLifecycle>,
}

#[async_trait]
impl RecoveryHandler for LifecycleRecovery {
    fn name(&self) -> &str {
        RECOVERY_HANDLER_NAME
    }

    async fn recover(&self) -> Result<(), RecoveryError> {
        match self.lifecycle.upgrade() {
            Some(lifecycle) => lifecycle.revalidate().await,
            None => Ok(()),
        }
    }
}
