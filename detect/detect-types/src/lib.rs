//! Value types for the adaptive waste-detection engine.
//!
//! This crate provides the data model shared by every stage of the
//! detection pipeline:
//!
//! # Frame and Tensor Types
//!
//! - [`Frame`] - Source-resolution pixel buffer supplied by a capture collaborator
//! - [`InputTensor`] - Planar `[1, 3, H, W]` float tensor fed to the model
//! - [`RawOutput`] - Model output tensor `[1, rows, N]`
//!
//! # Detection Types
//!
//! - [`PixelBox`] - Axis-aligned box in source-image pixel space
//! - [`RawDetection`] - Decoded candidate before suppression and labelling
//! - [`Detection`] - Final, labelled detection returned to callers
//! - [`WasteCategory`] - `recycle`, `compost` or `landfill`
//! - [`LabelSet`] - Class-id to class-name table
//!
//! # Adaptation Types
//!
//! - [`OptimizationStrategy`] - Snapshot of the cost-reduction knobs
//! - [`ThermalLevel`] - Thermal-proxy level inferred from observed performance
//! - [`TelemetrySample`] - One observation of inference performance
//! - [`PowerState`], [`DeviceProfile`], [`DeviceTier`] - Device signals
//! - [`Capabilities`], [`ExecutionBackend`] - Execution backends present at startup
//!
//! # Layer 0 Crate
//!
//! This crate has **no async runtime dependency**. It can be used in:
//! - The detection engine itself
//! - Offline replay and evaluation tools
//! - Rendering or analytics collaborators that consume detections
//!
//! # Example
//!
//! ```
//! use detect_types::{Detection, LabelSet, PixelBox, RawDetection, WasteCategory};
//!
//! let labels = LabelSet::coco();
//! let raw = RawDetection::new(PixelBox::new(10.0, 20.0, 50.0, 80.0), 39, 0.91);
//! let detection = Detection::from_raw(&raw, &labels);
//!
//! assert_eq!(detection.class_name, "bottle");
//! assert_eq!(detection.category, WasteCategory::Recycle);
//! ```

#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![warn(missing_docs)]

mod backend;
mod bbox;
mod detection;
mod error;
mod frame;
mod labels;
mod strategy;
mod telemetry;
mod tensor;

pub use backend::{Capabilities, ExecutionBackend};
pub use bbox::PixelBox;
pub use detection::{Detection, RawDetection, WasteCategory};
pub use frame::{Frame, PixelFormat};
pub use labels::{COCO_CLASS_NAMES, LabelSet};
pub use strategy::{MAX_FRAME_SKIP, MAX_RESOLUTION_REDUCTION, OptimizationStrategy, ThermalLevel};
pub use telemetry::{DeviceProfile, DeviceTier, PowerState, TelemetrySample};
pub use tensor::{InputTensor, RawOutput};

pub use error::{Result, TypesError};

/// Prelude for convenient imports.
pub mod prelude {
    pub use super::{
        Capabilities, Detection, DeviceProfile, DeviceTier, ExecutionBackend, Frame, InputTensor,
        LabelSet, OptimizationStrategy, PixelBox, PixelFormat, PowerState, RawDetection, RawOutput,
        TelemetrySample, ThermalLevel, TypesError, WasteCategory,
    };
}
