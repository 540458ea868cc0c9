//! The detection engine facade.

use std::sync::Arc;

use detect_adapt::{AdaptiveController, StrategyChange};
use detect_codec::{FrameCodec, PostProcessor};
use detect_model::{
    ArtifactStore, ContextMonitor, FsArtifactStore, LifecycleConfig, ModelLifecycle, ModelState,
    Reload, SessionFactory,
};
use detect_types::{
    Capabilities, Detection, DeviceProfile, Frame, OptimizationStrategy, PowerState,
    TelemetrySample, ThermalLevel,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::EngineConfig;
use crate::error::{EngineError, FrameError, Result};
use crate::events::{EVENT_CHANNEL_CAPACITY, EngineEvent};
use crate::metrics::EngineMetrics;
use crate::pacing::{FpsEstimator, SkipCounter};

/// Engine state machine.
///
/// ```text
/// Uninitialized -> Initializing -> Ready <-> Detecting
///                       |           |           |
///                       v           v           v
///                     Failed     Disposed     Failed (fallbacks exhausted)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    /// Constructed, not yet loaded.
    Uninitialized,
    /// Loading the model.
    Initializing,
    /// Waiting for a frame.
    Ready,
    /// Processing a frame.
    Detecting,
    /// Released. Terminal.
    Disposed,
    /// No model could be loaded. Terminal.
    Failed,
}

/// Host-supplied collaborators.
#[derive(Clone)]
pub struct EngineRuntime {
    /// Session backend.
    pub factory: Arc<dyn SessionFactory>,
    /// Artifact storage.
    pub store: Arc<dyn ArtifactStore>,
    /// Backends present on the host.
    pub capabilities: Capabilities,
    /// Host device description.
    pub device: DeviceProfile,
}

impl std::fmt::Debug for EngineRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineRuntime")
            .field("capabilities", &self.capabilities)
            .field("device", &self.device)
            .finish_non_exhaustive()
    }
}

impl EngineRuntime {
    /// Filesystem artifacts, portable backend only, default device.
    #[must_use]
    pub fn new(factory: Arc<dyn SessionFactory>) -> Self {
        Self {
            factory,
            store: Arc::new(FsArtifactStore),
            capabilities: Capabilities::portable_only(),
            device: DeviceProfile::default(),
        }
    }

    /// Sets the artifact store.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn ArtifactStore>) -> Self {
        self.store = store;
        self
    }

    /// Sets the backend capabilities.
    #[must_use]
    pub const fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Sets the device profile.
    #[must_use]
    pub const fn with_device(mut self, device: DeviceProfile) -> Self {
        self.device = device;
        self
    }
}

/// Verifies and loads a model, then turns frames into detections while
/// adapting cost to observed performance.
///
/// One detection runs at a time; concurrent `detect` calls queue.
/// `detect` never fails: every error path yields a one-element sentinel
/// list.
pub struct DetectionEngine {
    config: EngineConfig,
    codec: FrameCodec,
    post: PostProcessor,
    lifecycle: Arc<ModelLifecycle>,
    monitor: Arc<ContextMonitor>,
    controller: Arc<AdaptiveController>,
    state: Mutex<EngineState>,
    pacing: Mutex<Pacing>,
    metrics: Mutex<EngineMetrics>,
    events: broadcast::Sender<EngineEvent>,
    clock: Instant,
    in_flight: tokio::sync::Mutex<()>,
    cancel: CancellationToken,
    periodic: Mutex<Option<JoinHandle<()>>>,
}

/// Puts the state back to `restore` when dropped, unless it has moved on
/// from `held`. Covers callers that drop a pending future.
struct StateGuard<'a> {
    state: &'a Mutex<EngineState>,
    held: EngineState,
    restore: EngineState,
}

impl Drop for StateGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        if *state == self.held {
            *state = self.restore;
        }
    }
}

#[derive(Debug, Default)]
struct Pacing {
    skip: SkipCounter,
    fps: FpsEstimator,
}

impl std::fmt::Debug for DetectionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetectionEngine")
            .field("state", &*self.state.lock())
            .field("lifecycle", &self.lifecycle)
            .field("metrics", &*self.metrics.lock())
            .finish_non_exhaustive()
    }
}

impl DetectionEngine {
    /// Builds an engine in the `Uninitialized` state.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Config`] if `config` does not validate.
    pub fn new(config: EngineConfig, runtime: EngineRuntime) -> Result<Self> {
        config.validate()?;

        let monitor = Arc::new(ContextMonitor::new(runtime.capabilities.gpu_backend_available));
        let lifecycle = ModelLifecycle::new(
            LifecycleConfig {
                descriptor: config.model.clone(),
                policy: config.lifecycle.clone(),
                input_size: config.input_size,
                capabilities: runtime.capabilities,
            },
            runtime.store,
            runtime.factory,
            Arc::clone(&monitor),
        );
        let controller = Arc::new(
            AdaptiveController::with_device(config.controller_config(), runtime.device)
                .map_err(crate::error::ConfigError::from)?,
        );
        let codec = FrameCodec::new(config.input_size, config.class_names.len());
        let post = PostProcessor::new(config.labels(), config.iou_threshold)
            .with_low_precision_factor(config.lifecycle.low_precision_iou_factor)
            .with_floors(config.category_floors.clone());
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            config,
            codec,
            post,
            lifecycle,
            monitor,
            controller,
            state: Mutex::new(EngineState::Uninitialized),
            pacing: Mutex::new(Pacing::default()),
            metrics: Mutex::new(EngineMetrics::default()),
            events,
            clock: Instant::now(),
            in_flight: tokio::sync::Mutex::new(()),
            cancel: CancellationToken::new(),
            periodic: Mutex::new(None),
        })
    }

    /// Loads the model and starts the periodic strategy recompute.
    ///
    /// Calling again once `Ready` is a no-op.
    ///
    /// # Errors
    ///
    /// - [`EngineError::Load`] if every candidate fails; the engine moves
    ///   to `Failed`
    /// - [`EngineError::Disposed`] after [`DetectionEngine::dispose`]
    /// - [`EngineError::NotInitialized`] if a previous initialization failed
    ///   or is still running
    pub async fn initialize(&self) -> Result<()> {
        {
            let mut state = self.state.lock();
            match *state {
                EngineState::Uninitialized => *state = EngineState::Initializing,
                EngineState::Ready | EngineState::Detecting => return Ok(()),
                EngineState::Disposed => return Err(EngineError::Disposed),
                EngineState::Initializing | EngineState::Failed => {
                    return Err(EngineError::NotInitialized);
                }
            }
        }
        let _initializing = StateGuard {
            state: &self.state,
            held: EngineState::Initializing,
            restore: EngineState::Uninitialized,
        };

        let strategy = self.controller.current_strategy();
        self.lifecycle.set_force_portable(strategy.force_portable_backend);

        match self.lifecycle.load().await {
            Ok(ready) => {
                if !self.transition(EngineState::Initializing, EngineState::Ready) {
                    self.lifecycle.dispose();
                    return Err(EngineError::Disposed);
                }
                self.emit(EngineEvent::ModelLoadSucceeded {
                    path: ready.path,
                    fallback_index: ready.fallback_index,
                    backend: ready.backend,
                });
                self.start_periodic();
                Ok(())
            }
            Err(e) => {
                self.transition(EngineState::Initializing, EngineState::Failed);
                error!(error = %e, "Engine initialization failed");
                self.emit(EngineEvent::ModelLoadFailed {
                    reason: e.to_string(),
                });
                Err(EngineError::Load(e))
            }
        }
    }

    fn start_periodic(&self) {
        let events = self.events.clone();
        let task = tokio::spawn(Arc::clone(&self.controller).run_periodic(
            self.clock,
            self.cancel.child_token(),
            move |change| {
                let _ = events.send(EngineEvent::from(change));
            },
        ));
        *self.periodic.lock() = Some(task);
    }

    /// Runs the per-frame pipeline.
    ///
    /// Returns an empty list for skipped frames and a one-element sentinel
    /// list on any failure or outside `Ready`.
    pub async fn detect(&self, frame: &Frame) -> Vec<Detection> {
        let _one_at_a_time = self.in_flight.lock().await;

        if !self.transition(EngineState::Ready, EngineState::Detecting) {
            warn!(state = ?self.state(), frame_id = frame.id, "Detect called outside Ready");
            return self.sentinel();
        }
        let detecting = StateGuard {
            state: &self.state,
            held: EngineState::Detecting,
            restore: EngineState::Ready,
        };

        let strategy = self.controller.current_strategy();
        let skip = {
            let mut pacing = self.pacing.lock();
            pacing.fps.record(Instant::now());
            pacing.skip.should_skip(strategy.frame_skip_count)
        };
        let total_skipped = {
            let mut metrics = self.metrics.lock();
            metrics.frames_seen += 1;
            if skip {
                metrics.frames_skipped += 1;
            }
            metrics.frames_skipped
        };

        let result = if skip {
            debug!(frame_id = frame.id, skip_count = strategy.frame_skip_count, "Frame skipped");
            self.emit(EngineEvent::FrameSkipped {
                frame_id: frame.id,
                total_skipped,
            });
            Ok(Vec::new())
        } else {
            self.process(frame, &strategy).await
        };

        drop(detecting);

        result.unwrap_or_else(|e| {
            warn!(frame_id = frame.id, error = %e, "Frame failed, returning sentinel");
            self.sentinel()
        })
    }

    async fn process(
        &self,
        frame: &Frame,
        strategy: &OptimizationStrategy,
    ) -> std::result::Result<Vec<Detection>, FrameError> {
        let input = self.codec.encode(frame, strategy)?;
        self.lifecycle.set_force_portable(strategy.force_portable_backend);

        let started = Instant::now();
        let result = self
            .lifecycle
            .run_inference(&input, self.config.inference_timeout())
            .await;
        let elapsed = started.elapsed();
        self.apply_reload();

        let output = match result {
            Ok(output) => output,
            Err(e) => {
                let (total_failures, last_ms) = {
                    let mut metrics = self.metrics.lock();
                    metrics.inference_failures += 1;
                    (metrics.inference_failures, metrics.last_inference_ms)
                };
                self.emit(EngineEvent::InferenceFailure {
                    error: e.to_string(),
                    consecutive_failures: self.lifecycle.state().consecutive_failure_count,
                    total_failures,
                });
                let spent_ms = (elapsed.as_secs_f64() * 1000.0).max(last_ms.unwrap_or(0.0));
                self.push_telemetry(spent_ms, 1);
                return Err(e.into());
            }
        };

        let candidates = self.codec.decode(&output, frame.size, strategy)?;
        let detections = self.post.process(candidates, strategy);

        let elapsed_ms = elapsed.as_secs_f64() * 1000.0;
        {
            let mut metrics = self.metrics.lock();
            metrics.frames_inferred += 1;
            metrics.last_inference_ms = Some(elapsed_ms);
        }
        self.push_telemetry(elapsed_ms, 0);

        debug!(
            frame_id = frame.id,
            detections = detections.len(),
            inference_ms = elapsed_ms,
            "Frame processed"
        );
        Ok(detections)
    }

    fn push_telemetry(&self, inference_ms: f64, errors: u32) {
        #[allow(clippy::cast_possible_truncation)]
        let sample = TelemetrySample::new(
            self.pacing.lock().fps.estimate(),
            inference_ms as f32,
            self.clock.elapsed().as_secs_f64(),
        )
        .with_errors(errors);
        if let Some(change) = self.controller.update_telemetry(sample) {
            self.strategy_changed(change);
        }
    }

    /// Reports reloads the lifecycle started on its own. Exhaustion moves the
    /// engine to `Failed`, reported once.
    fn apply_reload(&self) {
        match self.lifecycle.take_reload() {
            None => {}
            Some(Reload::Loaded(ready)) => self.emit(EngineEvent::ModelLoadSucceeded {
                path: ready.path,
                fallback_index: ready.fallback_index,
                backend: ready.backend,
            }),
            Some(Reload::Failed(e)) => {
                if self.transition(EngineState::Detecting, EngineState::Failed) {
                    error!(error = %e, "Model lost with no usable fallback");
                    self.emit(EngineEvent::ModelLoadFailed {
                        reason: e.to_string(),
                    });
                }
            }
        }
    }

    /// Reports a hardware-context loss. Pending accelerated inference
    /// aborts with `ContextLost`.
    pub fn notify_context_lost(&self) {
        let was_available = self.monitor.is_available();
        self.monitor.notify_lost();
        if was_available {
            self.emit(EngineEvent::ContextLost);
        }
    }

    /// Reports a hardware-context restoration and runs recovery.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Recovery`] if a recovery handler fails; the
    /// context stays lost until the next restoration signal.
    pub async fn notify_context_restored(&self) -> Result<()> {
        self.monitor.notify_restored().await?;
        info!("Hardware context restored");
        self.emit(EngineEvent::ContextRestored);
        Ok(())
    }

    /// Updates the battery signal.
    pub fn set_power_state(&self, power: PowerState) {
        if let Some(change) = self.controller.set_power_state(power) {
            self.strategy_changed(change);
        }
    }

    /// Updates the device profile.
    pub fn set_device_profile(&self, device: DeviceProfile) {
        if let Some(change) = self.controller.set_device_profile(device) {
            self.strategy_changed(change);
        }
    }

    /// Stops background work, cancels pending inference and releases the
    /// model. Idempotent.
    pub fn dispose(&self) {
        let previous = std::mem::replace(&mut *self.state.lock(), EngineState::Disposed);
        if previous == EngineState::Disposed {
            return;
        }
        self.cancel.cancel();
        if let Some(task) = self.periodic.lock().take() {
            task.abort();
        }
        self.lifecycle.dispose();
        info!(previous = ?previous, "Engine disposed");
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> EngineState {
        *self.state.lock()
    }

    /// Current strategy snapshot.
    #[must_use]
    pub fn strategy(&self) -> OptimizationStrategy {
        self.controller.current_strategy()
    }

    /// Thermal level behind the current strategy.
    #[must_use]
    pub fn thermal_level(&self) -> ThermalLevel {
        self.controller.thermal_level()
    }

    /// Counter snapshot.
    #[must_use]
    pub fn metrics(&self) -> EngineMetrics {
        *self.metrics.lock()
    }

    /// Model lifecycle snapshot.
    #[must_use]
    pub fn model_state(&self) -> ModelState {
        self.lifecycle.state()
    }

    /// Receiver for engine events.
    #[must_use]
    pub fn subscribe_events(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    /// Configuration the engine was built with.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Returns `true` while the hardware context is usable.
    #[must_use]
    pub fn is_context_available(&self) -> bool {
        self.monitor.is_available()
    }

    fn strategy_changed(&self, change: StrategyChange) {
        self.lifecycle
            .set_force_portable(change.current.force_portable_backend);
        self.emit(EngineEvent::from(change));
    }

    fn transition(&self, from: EngineState, to: EngineState) -> bool {
        let mut state = self.state.lock();
        if *state == from {
            *state = to;
            true
        } else {
            false
        }
    }

    fn sentinel(&self) -> Vec<Detection> {
        self.metrics.lock().sentinel_results += 1;
        vec![Detection::sentinel()]
    }

    fn emit(&self, event: EngineEvent) {
        let _ = self.events.send(event);
    }
}

impl Drop for DetectionEngine {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.periodic.get_mut().take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use detect_model::ModelArtifactDescriptor;
    use detect_model::testing::{MemoryArtifactStore, ScriptedFactory, anchor_free_output};
    use std::time::Duration;

    fn engine() -> DetectionEngine {
        let config = EngineConfig::default()
            .with_model(ModelArtifactDescriptor::new("model.onnx", 1_000_000))
            .with_input_size(64, 64)
            .with_class_names(["bottle", "banana"]);
        let output = anchor_free_output(2, &[(32.0, 32.0, 16.0, 16.0, 0, 0.9)]);
        let runtime = EngineRuntime::new(Arc::new(ScriptedFactory::healthy(output)))
            .with_store(Arc::new(MemoryArtifactStore::new().with_onnx("model.onnx", 1_000_000)));
        DetectionEngine::new(config, runtime).unwrap()
    }

    fn frame(id: u64) -> Frame {
        Frame::rgba(id, 0.0, vec![128; 64 * 64 * 4], 64, 64)
    }

    #[tokio::test]
    async fn detect_before_initialize_is_sentinel() {
        let engine = engine();
        let detections = engine.detect(&frame(0)).await;
        assert_eq!(detections.len(), 1);
        assert!(detections[0].is_sentinel());
        assert_eq!(engine.metrics().sentinel_results, 1);
        assert_eq!(engine.metrics().frames_seen, 0);
    }

    #[tokio::test]
    async fn initialize_is_idempotent() {
        let engine = engine();
        engine.initialize().await.unwrap();
        engine.initialize().await.unwrap();
        assert_eq!(engine.state(), EngineState::Ready);
    }

    #[tokio::test]
    async fn rejects_invalid_config() {
        let config = EngineConfig::default().with_max_objects(0);
        let runtime = EngineRuntime::new(Arc::new(ScriptedFactory::healthy(anchor_free_output(
            80,
            &[],
        ))));
        assert!(matches!(
            DetectionEngine::new(config, runtime),
            Err(EngineError::Config(_))
        ));
    }

    #[tokio::test]
    async fn dispose_is_terminal() {
        let engine = engine();
        engine.initialize().await.unwrap();
        engine.dispose();
        engine.dispose();
        assert_eq!(engine.state(), EngineState::Disposed);
        assert!(matches!(engine.initialize().await, Err(EngineError::Disposed)));
        assert!(engine.detect(&frame(1)).await[0].is_sentinel());
    }

    #[tokio::test(start_paused = true)]
    async fn detects_and_records_metrics() {
        let engine = engine();
        engine.initialize().await.unwrap();

        let detections = engine.detect(&frame(1)).await;
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].class_name, "bottle");
        tokio::time::sleep(Duration::from_millis(33)).await;
        engine.detect(&frame(2)).await;

        let metrics = engine.metrics();
        assert_eq!(metrics.frames_seen, 2);
        assert_eq!(metrics.frames_inferred, 2);
        assert_eq!(metrics.sentinel_results, 0);
        assert!(metrics.last_inference_ms.is_some());
        assert_eq!(engine.state(), EngineState::Ready);
    }

    #[tokio::test]
    async fn low_battery_skips_alternate_frames() {
        let engine = engine();
        engine.initialize().await.unwrap();
        let mut events = engine.subscribe_events();
        engine.set_power_state(PowerState::new(0.05, false));
        assert!(matches!(
            events.recv().await.unwrap(),
            EngineEvent::StrategyChanged { .. }
        ));
        assert_eq!(engine.strategy().frame_skip_count, 1);

        let first = engine.detect(&frame(1)).await;
        let second = engine.detect(&frame(2)).await;
        assert!(!first.is_empty());
        assert!(second.is_empty());
        assert_eq!(engine.metrics().frames_skipped, 1);
    }
}
