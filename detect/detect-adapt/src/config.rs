//! Controller configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AdaptError, Result};

/// Tunables for the adaptive controller.
///
/// # Example
///
/// ```
/// use detect_adapt::ControllerConfig;
///
/// let config = ControllerConfig::default()
///     .with_target_fps(15.0)
///     .with_inference_budget_ms(120.0);
///
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Frame rate the caller aims for.
    pub target_fps: f32,

    /// Inference time budget per frame in milliseconds.
    pub inference_budget_ms: f32,

    /// Minimum seconds between two recomputes.
    pub recompute_interval_secs: f64,

    /// Telemetry samples retained.
    pub history_capacity: usize,

    /// Samples per window in the degradation trend.
    pub trend_window: usize,

    /// Recent-over-prior mean ratio above which performance is degrading.
    pub degradation_ratio: f32,

    /// Battery level below which a discharging device is low.
    pub low_battery_level: f32,

    /// Confidence threshold at the normal level.
    pub base_confidence_threshold: f32,

    /// Object cap at the normal level.
    pub base_max_objects: usize,

    /// Object cap never exceeded on low-end devices.
    pub low_end_max_objects: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            target_fps: 30.0,
            inference_budget_ms: 200.0,
            recompute_interval_secs: 2.0,
            history_capacity: 60,
            trend_window: 10,
            degradation_ratio: 1.5,
            low_battery_level: 0.2,
            base_confidence_threshold: 0.5,
            base_max_objects: 20,
            low_end_max_objects: 5,
        }
    }
}

impl ControllerConfig {
    /// Sets the target frame rate.
    #[must_use]
    pub const fn with_target_fps(mut self, fps: f32) -> Self {
        self.target_fps = fps;
        self
    }

    /// Sets the inference budget.
    #[must_use]
    pub const fn with_inference_budget_ms(mut self, budget_ms: f32) -> Self {
        self.inference_budget_ms = budget_ms;
        self
    }

    /// Sets the recompute interval.
    #[must_use]
    pub const fn with_recompute_interval_secs(mut self, secs: f64) -> Self {
        self.recompute_interval_secs = secs;
        self
    }

    /// Sets the normal-level confidence threshold.
    #[must_use]
    pub const fn with_base_confidence_threshold(mut self, threshold: f32) -> Self {
        self.base_confidence_threshold = threshold;
        self
    }

    /// Sets the normal-level object cap.
    #[must_use]
    pub const fn with_base_max_objects(mut self, max_objects: usize) -> Self {
        self.base_max_objects = max_objects;
        self
    }

    /// Recompute interval as a duration.
    #[must_use]
    pub fn recompute_interval(&self) -> Duration {
        Duration::from_secs_f64(self.recompute_interval_secs.max(0.001))
    }

    /// Checks every field.
    ///
    /// # Errors
    ///
    /// Returns [`AdaptError::InvalidConfig`] naming the first bad field.
    pub fn validate(&self) -> Result<()> {
        if !(self.target_fps.is_finite() && self.target_fps > 0.0) {
            return Err(AdaptError::invalid("target_fps", "must be positive"));
        }
        if !(self.inference_budget_ms.is_finite() && self.inference_budget_ms > 0.0) {
            return Err(AdaptError::invalid("inference_budget_ms", "must be positive"));
        }
        if !(self.recompute_interval_secs.is_finite() && self.recompute_interval_secs > 0.0) {
            return Err(AdaptError::invalid("recompute_interval_secs", "must be positive"));
        }
        if self.trend_window == 0 {
            return Err(AdaptError::invalid("trend_window", "must be at least 1"));
        }
        if self.history_capacity < 2 * self.trend_window {
            return Err(AdaptError::invalid(
                "history_capacity",
                format!("must hold two trend windows ({})", 2 * self.trend_window),
            ));
        }
        if !(self.degradation_ratio.is_finite() && self.degradation_ratio > 1.0) {
            return Err(AdaptError::invalid("degradation_ratio", "must exceed 1"));
        }
        if !(0.0..=1.0).contains(&self.low_battery_level) {
            return Err(AdaptError::invalid("low_battery_level", "must be in [0, 1]"));
        }
        if !(0.0..=1.0).contains(&self.base_confidence_threshold) {
            return Err(AdaptError::invalid(
                "base_confidence_threshold",
                "must be in [0, 1]",
            ));
        }
        if self.base_max_objects == 0 || self.low_end_max_objects == 0 {
            return Err(AdaptError::invalid("max_objects", "caps must be at least 1"));
        }
        Ok(())
    }
}
