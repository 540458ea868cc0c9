//! Optimization strategy snapshots.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Upper bound on [`OptimizationStrategy::frame_skip_count`].
pub const MAX_FRAME_SKIP: u32 = 10;

/// Upper bound on [`OptimizationStrategy::resolution_reduction_percent`].
pub const MAX_RESOLUTION_REDUCTION: u32 = 90;

/// Thermal-proxy level inferred from observed inference behavior.
///
/// Levels are ordered from least to most stressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThermalLevel {
    /// No sign of stress.
    #[default]
    Normal,
    /// Mild slowdown.
    Fair,
    /// Sustained slowdown or degradation trend.
    Serious,
    /// Severe slowdown.
    Critical,
}

impl ThermalLevel {
    /// Returns the level name as a string.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Fair => "fair",
            Self::Serious => "serious",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for ThermalLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Cost-reduction knobs applied to every frame.
///
/// Snapshots are immutable once published; the controller replaces them
/// wholesale.
///
/// # Example
///
/// ```
/// use detect_types::OptimizationStrategy;
///
/// let strategy = OptimizationStrategy::default()
///     .with_resolution_reduction(50)
///     .with_confidence_threshold(1.4);
///
/// assert!(strategy.is_consistent());
/// assert!((strategy.confidence_threshold - 1.0).abs() < f32::EPSILON);
/// assert!((strategy.scale_factor() - 0.5).abs() < f32::EPSILON);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OptimizationStrategy {
    /// Frames skipped after every processed frame.
    pub frame_skip_count: u32,

    /// Source-frame downscale applied before the model resize, in percent.
    pub resolution_reduction_percent: u32,

    /// Trade recall for speed in suppression.
    pub use_low_precision: bool,

    /// Avoid the accelerated backend for new sessions.
    pub force_portable_backend: bool,

    /// Maximum number of detections returned per frame.
    pub max_objects: usize,

    /// Minimum combined confidence for a candidate to survive decoding.
    pub confidence_threshold: f32,
}

impl Default for OptimizationStrategy {
    fn default() -> Self {
        Self {
            frame_skip_count: 0,
            resolution_reduction_percent: 0,
            use_low_precision: false,
            force_portable_backend: false,
            max_objects: 20,
            confidence_threshold: 0.5,
        }
    }
}

impl OptimizationStrategy {
    /// Sets the frame skip count (clamped).
    #[must_use]
    pub fn with_frame_skip(mut self, count: u32) -> Self {
        self.frame_skip_count = count.min(MAX_FRAME_SKIP);
        self
    }

    /// Sets the resolution reduction (clamped).
    #[must_use]
    pub fn with_resolution_reduction(mut self, percent: u32) -> Self {
        self.resolution_reduction_percent = percent.min(MAX_RESOLUTION_REDUCTION);
        self
    }

    /// Sets the confidence threshold (clamped to `[0, 1]`).
    #[must_use]
    pub fn with_confidence_threshold(mut self, threshold: f32) -> Self {
        self.confidence_threshold = clamp_unit(threshold);
        self
    }

    /// Sets the object cap.
    #[must_use]
    pub const fn with_max_objects(mut self, max_objects: usize) -> Self {
        self.max_objects = max_objects;
        self
    }

    /// Sets the low-precision flag.
    #[must_use]
    pub const fn with_low_precision(mut self, enabled: bool) -> Self {
        self.use_low_precision = enabled;
        self
    }

    /// Sets the portable-backend flag.
    #[must_use]
    pub const fn with_force_portable(mut self, enabled: bool) -> Self {
        self.force_portable_backend = enabled;
        self
    }

    /// Returns a copy with every field inside its legal range.
    #[must_use]
    pub fn clamped(self) -> Self {
        Self {
            frame_skip_count: self.frame_skip_count.min(MAX_FRAME_SKIP),
            resolution_reduction_percent: self
                .resolution_reduction_percent
                .min(MAX_RESOLUTION_REDUCTION),
            max_objects: self.max_objects.max(1),
            confidence_threshold: clamp_unit(self.confidence_threshold),
            ..self
        }
    }

    /// Returns `true` if every field is inside its legal range.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.frame_skip_count <= MAX_FRAME_SKIP
            && self.resolution_reduction_percent <= MAX_RESOLUTION_REDUCTION
            && self.max_objects >= 1
            && (0.0..=1.0).contains(&self.confidence_threshold)
    }

    /// Linear scale applied to the source frame before the model resize.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn scale_factor(&self) -> f32 {
        let percent = self.resolution_reduction_percent.min(MAX_RESOLUTION_REDUCTION);
        1.0 - percent as f32 / 100.0
    }

    /// Rough relative compute cost of this strategy versus the default.
    ///
    /// Product of the pixel fraction, the precision discount and the share
    /// of frames that reach inference.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn expected_cost_factor(&self) -> f32 {
        let scale = self.scale_factor();
        let skip = 1.0 / (self.frame_skip_count as f32 + 1.0);
        let precision = if self.use_low_precision { 0.7 } else { 1.0 };
        scale * scale * precision * skip
    }
}

fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
