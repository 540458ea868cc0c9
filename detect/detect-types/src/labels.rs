//! Class label tables.

use serde::{Deserialize, Serialize};

/// The 80 COCO class names, in model output order.
///
/// This is the class table of the stock YOLOv8n artifact.
pub const COCO_CLASS_NAMES: [&str; 80] = [
    "person",
    "bicycle",
    "car",
    "motorcycle",
    "airplane",
    "bus",
    "train",
    "truck",
    "boat",
    "traffic light",
    "fire hydrant",
    "stop sign",
    "parking meter",
    "bench",
    "bird",
    "cat",
    "dog",
    "horse",
    "sheep",
    "cow",
    "elephant",
    "bear",
    "zebra",
    "giraffe",
    "backpack",
    "umbrella",
    "handbag",
    "tie",
    "suitcase",
    "frisbee",
    "skis",
    "snowboard",
    "sports ball",
    "kite",
    "baseball bat",
    "baseball glove",
    "skateboard",
    "surfboard",
    "tennis racket",
    "bottle",
    "wine glass",
    "cup",
    "fork",
    "knife",
    "spoon",
    "bowl",
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
    "chair",
    "couch",
    "potted plant",
    "bed",
    "dining table",
    "toilet",
    "tv",
    "laptop",
    "mouse",
    "remote",
    "keyboard",
    "cell phone",
    "microwave",
    "oven",
    "toaster",
    "sink",
    "refrigerator",
    "book",
    "clock",
    "vase",
    "scissors",
    "teddy bear",
    "hair drier",
    "toothbrush",
];

/// Name used for class ids outside the table and for sentinel detections.
pub(crate) const UNKNOWN_CLASS: &str = "unknown";

/// Ordered class-name table indexed by model class id.
///
/// # Example
///
/// ```
/// use detect_types::LabelSet;
///
/// let labels = LabelSet::new(["can", "peel"]);
/// assert_eq!(labels.len(), 2);
/// assert_eq!(labels.name(1), "peel");
/// assert_eq!(labels.name(7), "unknown");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelSet {
    names: Vec<String>,
}

impl LabelSet {
    /// Creates a label set from class names in class-id order.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// The 80-class COCO table.
    #[must_use]
    pub fn coco() -> Self {
        Self::new(COCO_CLASS_NAMES)
    }

    /// Number of classes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Returns true if the table has no classes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Returns the class name for `class_id`, or `"unknown"`.
    #[must_use]
    pub fn name(&self, class_id: usize) -> &str {
        self.names.get(class_id).map_or(UNKNOWN_CLASS, String::as_str)
    }

    /// Iterates over class names in class-id order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

impl Default for LabelSet {
    fn default() -> Self {
        Self::coco()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coco_has_eighty_classes() {
        let labels = LabelSet::coco();
        assert_eq!(labels.len(), 80);
        assert_eq!(labels.name(0), "person");
        assert_eq!(labels.name(39), "bottle");
        assert_eq!(labels.name(79), "toothbrush");
    }

    #[test]
    fn out_of_range_is_unknown() {
        assert_eq!(LabelSet::coco().name(80), UNKNOWN_CLASS);
        assert_eq!(LabelSet::new(Vec::<String>::new()).name(0), UNKNOWN_CLASS);
    }

    #[test]
    fn serializes_as_plain_list() {
        let labels = LabelSet::new(["a", "b"]);
        let json = serde_json::to_string(&labels).unwrap_or_default();
        assert_eq!(json, r#"["a","b"]"#);
    }
}
