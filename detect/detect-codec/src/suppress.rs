//! Greedy non-maximum suppression.

use detect_types::{Detection, PixelBox, RawDetection};

/// Anything with a box and a confidence can be suppressed.
pub trait Scored {
    /// Box used for overlap tests.
    fn bounding_box(&self) -> &PixelBox;
    /// Score used for ordering.
    fn confidence(&self) -> f32;
}

impl Scored for RawDetection {
    fn bounding_box(&self) -> &PixelBox {
        &self.bounding_box
    }

    fn confidence(&self) -> f32 {
        self.confidence
    }
}

impl Scored for Detection {
    fn bounding_box(&self) -> &PixelBox {
        &self.bounding_box
    }

    fn confidence(&self) -> f32 {
        self.confidence
    }
}

/// Class-agnostic greedy NMS.
///
/// Candidates are sorted by confidence descending (stable, so ties keep
/// input order). A candidate is kept unless its IoU with an already kept
/// candidate exceeds `iou_threshold`.
///
/// # Example
///
/// ```
/// use detect_codec::suppress;
/// use detect_types::{PixelBox, RawDetection};
///
/// let candidates = vec![
///     RawDetection::new(PixelBox::new(0.0, 0.0, 100.0, 100.0), 0, 0.9),
///     RawDetection::new(PixelBox::new(10.0, 10.0, 100.0, 100.0), 0, 0.8),
/// ];
///
/// let kept = suppress(candidates, 0.5);
/// assert_eq!(kept.len(), 1);
/// assert!((kept[0].confidence - 0.9).abs() < f32::EPSILON);
/// ```
#[must_use]
pub fn suppress<T: Scored>(mut candidates: Vec<T>, iou_threshold: f32) -> Vec<T> {
    if candidates.len() < 2 {
        return candidates;
    }

    candidates.sort_by(|a, b| {
        b.confidence()
            .partial_cmp(&a.confidence())
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut kept: Vec<T> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let overlaps = kept
            .iter()
            .any(|k| k.bounding_box().iou(candidate.bounding_box()) > iou_threshold);
        if !overlaps {
            kept.push(candidate);
        }
    }
    kept
}
