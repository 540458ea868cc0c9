//! Engine configuration.

use std::path::Path;
use std::time::Duration;

use detect_adapt::ControllerConfig;
use detect_codec::CategoryFloors;
use detect_model::{FallbackArtifact, LifecyclePolicy, ModelArtifactDescriptor};
use detect_types::{COCO_CLASS_NAMES, LabelSet};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Lower bound of the per-frame inference timeout.
pub const MIN_INFERENCE_TIMEOUT_MS: u64 = 5000;

/// Configuration supplied once at construction.
///
/// Missing JSON fields take their defaults. The top-level rate, budget,
/// confidence and object cap override the matching `controller` fields.
///
/// # Example
///
/// ```
/// use detect_engine::EngineConfig;
///
/// let config = EngineConfig::from_json_str(r#"{
///     "model": { "path": "models/waste.onnx", "expected_approx_size_bytes": 6300000 },
///     "confidence_threshold": 0.6,
///     "target_fps": 15
/// }"#).unwrap();
///
/// assert_eq!(config.input_size, (640, 640));
/// assert_eq!(config.class_names.len(), 80);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Primary artifact and fallbacks.
    pub model: ModelArtifactDescriptor,

    /// Model input resolution `(width, height)`.
    pub input_size: (u32, u32),

    /// Minimum confidence at the normal thermal level.
    pub confidence_threshold: f32,

    /// Suppression overlap threshold.
    pub iou_threshold: f32,

    /// Frame rate the caller aims for.
    pub target_fps: f32,

    /// Inference time budget per frame in milliseconds.
    pub max_inference_time_ms: u64,

    /// Object cap at the normal thermal level.
    pub max_objects: usize,

    /// Class names in model class-id order.
    pub class_names: Vec<String>,

    /// Per-category minimum confidence.
    pub category_floors: CategoryFloors,

    /// Load and failure accounting tunables.
    pub lifecycle: LifecyclePolicy,

    /// Adaptive controller tunables.
    pub controller: ControllerConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            model: ModelArtifactDescriptor::default(),
            input_size: (640, 640),
            confidence_threshold: 0.5,
            iou_threshold: 0.45,
            target_fps: 30.0,
            max_inference_time_ms: 200,
            max_objects: 20,
            class_names: COCO_CLASS_NAMES.iter().map(|&name| name.to_owned()).collect(),
            category_floors: CategoryFloors::none(),
            lifecycle: LifecyclePolicy::default(),
            controller: ControllerConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Parses a JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] on malformed JSON. The result is not
    /// validated; call [`EngineConfig::validate`].
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads and parses a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read and
    /// [`ConfigError::Parse`] on malformed JSON.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Serializes to pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if serialization fails.
    pub fn to_json_pretty(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Sets the model descriptor.
    #[must_use]
    pub fn with_model(mut self, model: ModelArtifactDescriptor) -> Self {
        self.model = model;
        self
    }

    /// Appends a fallback artifact.
    #[must_use]
    pub fn with_fallback(mut self, fallback: FallbackArtifact) -> Self {
        self.model = self.model.with_fallback(fallback);
        self
    }

    /// Sets the model input resolution.
    #[must_use]
    pub const fn with_input_size(mut self, width: u32, height: u32) -> Self {
        self.input_size = (width, height);
        self
    }

    /// Sets the base confidence threshold.
    #[must_use]
    pub const fn with_confidence_threshold(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    /// Sets the suppression overlap threshold.
    #[must_use]
    pub const fn with_iou_threshold(mut self, threshold: f32) -> Self {
        self.iou_threshold = threshold;
        self
    }

    /// Sets the target frame rate.
    #[must_use]
    pub const fn with_target_fps(mut self, fps: f32) -> Self {
        self.target_fps = fps;
        self
    }

    /// Sets the inference time budget.
    #[must_use]
    pub const fn with_max_inference_time_ms(mut self, budget_ms: u64) -> Self {
        self.max_inference_time_ms = budget_ms;
        self
    }

    /// Sets the base object cap.
    #[must_use]
    pub const fn with_max_objects(mut self, max_objects: usize) -> Self {
        self.max_objects = max_objects;
        self
    }

    /// Replaces the class table.
    #[must_use]
    pub fn with_class_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.class_names = names.into_iter().map(Into::into).collect();
        self
    }

    /// Sets per-category confidence floors.
    #[must_use]
    pub fn with_category_floors(mut self, floors: CategoryFloors) -> Self {
        self.category_floors = floors;
        self
    }

    /// Sets the lifecycle policy.
    #[must_use]
    pub fn with_lifecycle(mut self, policy: LifecyclePolicy) -> Self {
        self.lifecycle = policy;
        self
    }

    /// Label table built from `class_names`.
    #[must_use]
    pub fn labels(&self) -> LabelSet {
        LabelSet::new(self.class_names.iter().cloned())
    }

    /// Controller tunables with the top-level overrides applied.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            target_fps: self.target_fps,
            inference_budget_ms: self.max_inference_time_ms as f32,
            base_confidence_threshold: self.confidence_threshold,
            base_max_objects: self.max_objects,
            ..self.controller.clone()
        }
    }

    /// Per-frame inference deadline: `max(5000 ms, 2 × budget)`.
    #[must_use]
    pub fn inference_timeout(&self) -> Duration {
        Duration::from_millis(
            self.max_inference_time_ms
                .saturating_mul(2)
                .max(MIN_INFERENCE_TIMEOUT_MS),
        )
    }

    /// Checks every field.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.model.is_valid() {
            return Err(ConfigError::invalid("model", "needs non-empty artifact paths"));
        }
        if self.input_size.0 == 0 || self.input_size.1 == 0 {
            return Err(ConfigError::invalid("input_size", "must be non-zero"));
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(ConfigError::invalid("confidence_threshold", "must be in [0, 1]"));
        }
        if !(self.iou_threshold > 0.0 && self.iou_threshold <= 1.0) {
            return Err(ConfigError::invalid("iou_threshold", "must be in (0, 1]"));
        }
        if self.max_inference_time_ms == 0 {
            return Err(ConfigError::invalid("max_inference_time_ms", "must be positive"));
        }
        if self.max_objects == 0 {
            return Err(ConfigError::invalid("max_objects", "must be at least 1"));
        }
        if self.class_names.is_empty() {
            return Err(ConfigError::invalid("class_names", "must not be empty"));
        }
        if !self.category_floors.is_valid() {
            return Err(ConfigError::invalid("category_floors", "floors must be in [0, 1]"));
        }
        if !self.lifecycle.is_valid() {
            return Err(ConfigError::invalid("lifecycle", "policy out of range"));
        }
        self.controller_config().validate()?;
        Ok(())
    }
}
