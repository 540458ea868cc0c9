//! Detection records.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::PixelBox;
use crate::labels::{LabelSet, UNKNOWN_CLASS};

/// Disposal category of a detected object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WasteCategory {
    /// Goes in the recycling bin.
    Recycle,
    /// Organic waste.
    Compost,
    /// Everything else. Also used for sentinel detections.
    Landfill,
}

const RECYCLE_CLASSES: &[&str] = &[
    "bottle",
    "wine glass",
    "cup",
    "fork",
    "knife",
    "spoon",
    "bowl",
    "book",
    "vase",
    "scissors",
    "can",
    "tin can",
    "paper",
    "cardboard",
    "newspaper",
    "glass jar",
];

const COMPOST_CLASSES: &[&str] = &[
    "banana",
    "apple",
    "sandwich",
    "orange",
    "broccoli",
    "carrot",
    "hot dog",
    "pizza",
    "donut",
    "cake",
    "potted plant",
    "food",
    "leaf",
    "peel",
];

impl WasteCategory {
    /// All categories.
    pub const ALL: [Self; 3] = [Self::Recycle, Self::Compost, Self::Landfill];

    /// Maps a detector class name to its disposal category.
    ///
    /// Matching is case-insensitive. Unrecognised classes map to `Landfill`.
    ///
    /// # Example
    ///
    /// ```
    /// use detect_types::WasteCategory;
    ///
    /// assert_eq!(WasteCategory::for_class("Bottle"), WasteCategory::Recycle);
    /// assert_eq!(WasteCategory::for_class("banana"), WasteCategory::Compost);
    /// assert_eq!(WasteCategory::for_class("laptop"), WasteCategory::Landfill);
    /// ```
    #[must_use]
    pub fn for_class(class_name: &str) -> Self {
        let name = class_name.trim().to_lowercase();
        if RECYCLE_CLASSES.contains(&name.as_str()) {
            Self::Recycle
        } else if COMPOST_CLASSES.contains(&name.as_str()) {
            Self::Compost
        } else {
            Self::Landfill
        }
    }

    /// Returns the category name as a string.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Recycle => "recycle",
            Self::Compost => "compost",
            Self::Landfill => "landfill",
        }
    }
}

impl fmt::Display for WasteCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A decoded candidate, before suppression and labelling.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawDetection {
    /// Box in source-image pixel space.
    pub bounding_box: PixelBox,
    /// Index of the highest-scoring class.
    pub class_id: usize,
    /// Combined confidence (objectness times class score).
    pub confidence: f32,
}

impl RawDetection {
    /// Creates a new candidate.
    #[must_use]
    pub const fn new(bounding_box: PixelBox, class_id: usize, confidence: f32) -> Self {
        Self {
            bounding_box,
            class_id,
            confidence,
        }
    }
}

/// A labelled detection returned to the caller.
///
/// Detections are plain values; the engine keeps no reference to them once
/// returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Box in source-image pixel space.
    pub bounding_box: PixelBox,
    /// Model class id, `None` for sentinel detections.
    pub class_id: Option<usize>,
    /// Human-readable class name.
    pub class_name: String,
    /// Confidence in `[0, 1]`.
    pub confidence: f32,
    /// Disposal category.
    pub category: WasteCategory,
}

impl Detection {
    /// Labels a raw candidate using `labels`.
    #[must_use]
    pub fn from_raw(raw: &RawDetection, labels: &LabelSet) -> Self {
        let class_name = labels.name(raw.class_id).to_string();
        let category = WasteCategory::for_class(&class_name);
        Self {
            bounding_box: raw.bounding_box,
            class_id: Some(raw.class_id),
            class_name,
            confidence: raw.confidence.clamp(0.0, 1.0),
            category,
        }
    }

    /// The well-formed placeholder returned when a frame fails.
    ///
    /// Class `"unknown"`, category `landfill`, zero confidence, empty box.
    #[must_use]
    pub fn sentinel() -> Self {
        Self {
            bounding_box: PixelBox::ZERO,
            class_id: None,
            class_name: UNKNOWN_CLASS.to_string(),
            confidence: 0.0,
            category: WasteCategory::Landfill,
        }
    }

    /// Returns true if this is a sentinel detection.
    #[must_use]
    pub fn is_sentinel(&self) -> bool {
        self.class_id.is_none() && self.confidence <= 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_mapping() {
        assert_eq!(WasteCategory::for_class("cup"), WasteCategory::Recycle);
        assert_eq!(WasteCategory::for_class(" Pizza "), WasteCategory::Compost);
        assert_eq!(WasteCategory::for_class("person"), WasteCategory::Landfill);
        assert_eq!(WasteCategory::for_class(""), WasteCategory::Landfill);
    }

    #[test]
    fn category_serializes_lowercase() {
        let json = serde_json::to_string(&WasteCategory::Compost).unwrap_or_default();
        assert_eq!(json, "\"compost\"");
        assert_eq!(format!("{}", WasteCategory::Recycle), "recycle");
    }

    #[test]
    fn from_raw_labels_and_categorises() {
        let labels = LabelSet::coco();
        let raw = RawDetection::new(PixelBox::new(1.0, 2.0, 3.0, 4.0), 46, 0.8);
        let det = Detection::from_raw(&raw, &labels);
        assert_eq!(det.class_name, "banana");
        assert_eq!(det.category, WasteCategory::Compost);
        assert_eq!(det.class_id, Some(46));
        assert!(!det.is_sentinel());
    }

    #[test]
    fn from_raw_unknown_class() {
        let labels = LabelSet::new(["only"]);
        let raw = RawDetection::new(PixelBox::ZERO, 5, 0.5);
        let det = Detection::from_raw(&raw, &labels);
        assert_eq!(det.class_name, "unknown");
        assert_eq!(det.category, WasteCategory::Landfill);
    }

    #[test]
    fn sentinel_shape() {
        let s = Detection::sentinel();
        assert!(s.is_sentinel());
        assert_eq!(s.category, WasteCategory::Landfill);
        assert_eq!(s.class_name, "unknown");
        assert!(s.confidence.abs() < f32::EPSILON);
    }
}
