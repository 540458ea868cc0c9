//! The adaptive optimization controller.

use std::sync::Arc;

use detect_types::{DeviceProfile, OptimizationStrategy, PowerState, TelemetrySample, ThermalLevel};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::ControllerConfig;
use crate::error::Result;
use crate::history::SampleHistory;
use crate::policy::compose;
use crate::thermal::{ThermalAssessment, assess};

/// A published strategy change.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrategyChange {
    /// Snapshot replaced by this change.
    pub previous: OptimizationStrategy,
    /// Newly published snapshot.
    pub current: OptimizationStrategy,
    /// Thermal level behind the new snapshot.
    pub level: ThermalLevel,
}

#[derive(Debug)]
struct ControllerState {
    history: SampleHistory,
    power: PowerState,
    device: DeviceProfile,
    last_recompute: Option<f64>,
    assessment: ThermalAssessment,
}

/// Turns telemetry into published [`OptimizationStrategy`] snapshots.
///
/// Samples are applied in arrival order. A recompute runs when a sample
/// arrives at least `recompute_interval_secs` after the previous one, on
/// [`tick`](Self::tick), and whenever a power or device signal changes.
/// Subscribers are only notified when the strategy value changes.
///
/// # Example
///
/// ```
/// use detect_adapt::{AdaptiveController, ControllerConfig};
/// use detect_types::{TelemetrySample, ThermalLevel};
///
/// let controller = AdaptiveController::new(ControllerConfig::default()).unwrap();
/// assert_eq!(controller.current_strategy().frame_skip_count, 0);
///
/// let change = controller.update_telemetry(TelemetrySample::new(4.0, 90.0, 5.0));
/// assert_eq!(controller.thermal_level(), ThermalLevel::Critical);
/// assert!(change.is_some());
/// assert!(controller.current_strategy().force_portable_backend);
/// ```
#[derive(Debug)]
pub struct AdaptiveController {
    config: ControllerConfig,
    state: Mutex<ControllerState>,
    strategy: watch::Sender<OptimizationStrategy>,
}

impl AdaptiveController {
    /// Creates a controller publishing the normal-level strategy.
    ///
    /// # Errors
    ///
    /// Returns [`crate::AdaptError`] if `config` is invalid.
    pub fn new(config: ControllerConfig) -> Result<Self> {
        Self::with_device(config, DeviceProfile::default())
    }

    /// Creates a controller for a known device.
    ///
    /// # Errors
    ///
    /// Returns [`crate::AdaptError`] if `config` is invalid.
    pub fn with_device(config: ControllerConfig, device: DeviceProfile) -> Result<Self> {
        config.validate()?;
        let power = PowerState::default();
        let initial = compose(ThermalLevel::Normal, &power, device.tier(), &config);
        let (strategy, _) = watch::channel(initial);
        Ok(Self {
            state: Mutex::new(ControllerState {
                history: SampleHistory::new(config.history_capacity),
                power,
                device,
                last_recompute: None,
                assessment: ThermalAssessment::NOMINAL,
            }),
            config,
            strategy,
        })
    }

    /// Controller configuration.
    #[must_use]
    pub const fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Current strategy snapshot.
    #[must_use]
    pub fn current_strategy(&self) -> OptimizationStrategy {
        *self.strategy.borrow()
    }

    /// Receiver notified on every published change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<OptimizationStrategy> {
        self.strategy.subscribe()
    }

    /// Level from the most recent recompute.
    #[must_use]
    pub fn thermal_level(&self) -> ThermalLevel {
        self.state.lock().assessment.level
    }

    /// Signals from the most recent recompute.
    #[must_use]
    pub fn assessment(&self) -> ThermalAssessment {
        self.state.lock().assessment
    }

    /// Samples currently retained.
    #[must_use]
    pub fn history_len(&self) -> usize {
        self.state.lock().history.len()
    }

    /// Records a sample, recomputing if the interval has elapsed.
    ///
    /// The first sample always recomputes.
    pub fn update_telemetry(&self, sample: TelemetrySample) -> Option<StrategyChange> {
        let mut state = self.state.lock();
        state.history.push(sample);
        let due = state.last_recompute.is_none_or(|last| {
            sample.timestamp - last >= self.config.recompute_interval_secs
        });
        if due {
            self.recompute(&mut state, sample.timestamp)
        } else {
            None
        }
    }

    /// Recomputes unconditionally at time `now` (seconds on the sample clock).
    pub fn tick(&self, now: f64) -> Option<StrategyChange> {
        let mut state = self.state.lock();
        self.recompute(&mut state, now)
    }

    /// Updates the battery signal and recomputes.
    pub fn set_power_state(&self, power: PowerState) -> Option<StrategyChange> {
        let mut state = self.state.lock();
        if state.power == power {
            return None;
        }
        state.power = power;
        let now = state.last_recompute.unwrap_or(0.0);
        self.recompute(&mut state, now)
    }

    /// Updates the device profile and recomputes.
    pub fn set_device_profile(&self, device: DeviceProfile) -> Option<StrategyChange> {
        let mut state = self.state.lock();
        if state.device == device {
            return None;
        }
        state.device = device;
        let now = state.last_recompute.unwrap_or(0.0);
        self.recompute(&mut state, now)
    }

    fn recompute(&self, state: &mut ControllerState, now: f64) -> Option<StrategyChange> {
        state.last_recompute = Some(now);
        state.assessment = assess(&state.history, &self.config);
        let level = state.assessment.level;
        let next = compose(level, &state.power, state.device.tier(), &self.config);

        let mut previous = next;
        let changed = self.strategy.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                previous = *current;
                *current = next;
                true
            }
        });

        if !changed {
            debug!(level = %level, "Strategy unchanged");
            return None;
        }

        info!(
            level = %level,
            fps_ratio = state.assessment.fps_ratio,
            time_ratio = state.assessment.time_ratio,
            degraded = state.assessment.degraded,
            error_rate = state.assessment.error_rate,
            frame_skip = next.frame_skip_count,
            resolution_reduction = next.resolution_reduction_percent,
            low_precision = next.use_low_precision,
            force_portable = next.force_portable_backend,
            expected_cost = next.expected_cost_factor(),
            "Optimization strategy changed"
        );
        Some(StrategyChange {
            previous,
            current: next,
            level,
        })
    }

    /// Ticks every recompute interval until `cancel` fires.
    ///
    /// Time is measured in seconds since `origin`, the clock telemetry
    /// timestamps use. Changes are passed to `on_change`.
    pub async fn run_periodic<F>(self: Arc<Self>, origin: Instant, cancel: CancellationToken, on_change: F)
    where
        F: Fn(StrategyChange) + Send,
    {
        let mut interval = tokio::time::interval(self.config.recompute_interval());
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        interval.tick().await;
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                _ = interval.tick() => {
                    if let Some(change) = self.tick(origin.elapsed().as_secs_f64()) {
                        on_change(change);
                    }
                }
            }
        }
        debug!("Periodic recompute stopped");
    }
}
