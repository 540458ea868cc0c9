//! Labelling, suppression, confidence floors and the object cap.

use std::collections::BTreeMap;

use detect_types::{Detection, LabelSet, OptimizationStrategy, RawDetection, WasteCategory};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::suppress::suppress;

/// Minimum confidence per waste category.
///
/// Categories without an entry have no floor beyond the strategy threshold.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryFloors(BTreeMap<WasteCategory, f32>);

impl CategoryFloors {
    /// No floors.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Sets the floor for one category.
    #[must_use]
    pub fn with(mut self, category: WasteCategory, floor: f32) -> Self {
        self.0.insert(category, floor);
        self
    }

    /// Floor for `category`, `0.0` when unset.
    #[must_use]
    pub fn floor(&self, category: WasteCategory) -> f32 {
        self.0.get(&category).copied().unwrap_or(0.0)
    }

    /// Effective threshold for `category` under `strategy`.
    #[must_use]
    pub fn threshold(&self, category: WasteCategory, strategy: &OptimizationStrategy) -> f32 {
        strategy.confidence_threshold.max(self.floor(category))
    }

    /// Returns `true` if every floor is in `[0, 1]`.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.0.values().all(|f| (0.0..=1.0).contains(f))
    }

    /// Iterates over the configured floors.
    pub fn iter(&self) -> impl Iterator<Item = (WasteCategory, f32)> + '_ {
        self.0.iter().map(|(c, f)| (*c, *f))
    }
}

/// Turns decoded candidates into the final per-frame detection list.
#[derive(Debug, Clone)]
pub struct PostProcessor {
    labels: LabelSet,
    iou_threshold: f32,
    low_precision_iou_factor: f32,
    floors: CategoryFloors,
}

impl PostProcessor {
    /// Creates a post-processor.
    #[must_use]
    pub fn new(labels: LabelSet, iou_threshold: f32) -> Self {
        Self {
            labels,
            iou_threshold,
            low_precision_iou_factor: 1.0,
            floors: CategoryFloors::none(),
        }
    }

    /// Sets the IoU multiplier used in low-precision mode.
    #[must_use]
    pub const fn with_low_precision_factor(mut self, factor: f32) -> Self {
        self.low_precision_iou_factor = factor;
        self
    }

    /// Sets per-category confidence floors.
    #[must_use]
    pub fn with_floors(mut self, floors: CategoryFloors) -> Self {
        self.floors = floors;
        self
    }

    /// The label table used for naming classes.
    #[must_use]
    pub const fn labels(&self) -> &LabelSet {
        &self.labels
    }

    /// IoU threshold in effect under `strategy`.
    ///
    /// Low precision tightens the threshold, suppressing more.
    #[must_use]
    pub fn effective_iou(&self, strategy: &OptimizationStrategy) -> f32 {
        if strategy.use_low_precision {
            self.iou_threshold * self.low_precision_iou_factor
        } else {
            self.iou_threshold
        }
    }

    /// Filters, suppresses, labels and caps `candidates`.
    ///
    /// Candidates below their category threshold are dropped before
    /// suppression, so they never suppress an overlapping box that passes.
    /// Every returned detection satisfies
    /// `confidence >= max(strategy.confidence_threshold, floor(category))`
    /// and the list holds at most `strategy.max_objects` entries.
    #[must_use]
    pub fn process(
        &self,
        candidates: Vec<RawDetection>,
        strategy: &OptimizationStrategy,
    ) -> Vec<Detection> {
        let eligible: Vec<RawDetection> = candidates
            .into_iter()
            .filter(|raw| {
                let category = WasteCategory::for_class(self.labels.name(raw.class_id));
                raw.confidence >= self.floors.threshold(category, strategy)
            })
            .collect();
        let kept = suppress(eligible, self.effective_iou(strategy));

        let mut detections: Vec<Detection> = kept
            .iter()
            .map(|raw| Detection::from_raw(raw, &self.labels))
            .collect();

        if detections.len() > strategy.max_objects {
            debug!(
                found = detections.len(),
                max_objects = strategy.max_objects,
                "Truncating detections"
            );
            detections.truncate(strategy.max_objects);
        }

        detections
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use detect_types::PixelBox;

    fn labels() -> LabelSet {
        LabelSet::new(["bottle", "banana", "chair"])
    }

    fn raw(i: u8, class_id: usize, confidence: f32) -> RawDetection {
        let offset = f32::from(i) * 100.0;
        RawDetection::new(PixelBox::new(offset, 0.0, 50.0, 50.0), class_id, confidence)
    }

    #[test]
    fn process_labels_and_categorises() {
        let pp = PostProcessor::new(labels(), 0.45);
        let dets = pp.process(vec![raw(0, 0, 0.9), raw(1, 1, 0.8)], &OptimizationStrategy::default());
        assert_eq!(dets.len(), 2);
        assert_eq!(dets[0].class_name, "bottle");
        assert_eq!(dets[0].category, WasteCategory::Recycle);
        assert_eq!(dets[1].category, WasteCategory::Compost);
    }

    #[test]
    fn process_truncates_to_max_objects() {
        let pp = PostProcessor::new(labels(), 0.45);
        let candidates = (0..8).map(|i| raw(i, 2, 0.9)).collect();
        let strategy = OptimizationStrategy::default().with_max_objects(3);
        assert_eq!(pp.process(candidates, &strategy).len(), 3);
    }

    #[test]
    fn process_applies_category_floors() {
        let floors = CategoryFloors::none()
            .with(WasteCategory::Recycle, 0.7)
            .with(WasteCategory::Compost, 0.8);
        let pp = PostProcessor::new(labels(), 0.45).with_floors(floors);
        let dets = pp.process(
            vec![raw(0, 0, 0.65), raw(1, 1, 0.79), raw(2, 2, 0.55), raw(3, 0, 0.75)],
            &OptimizationStrategy::default(),
        );
        let names: Vec<&str> = dets.iter().map(|d| d.class_name.as_str()).collect();
        assert_eq!(names, vec!["bottle", "chair"]);
    }

    #[test]
    fn floored_candidate_does_not_suppress_neighbour() {
        let floors = CategoryFloors::none().with(WasteCategory::Recycle, 0.8);
        let pp = PostProcessor::new(labels(), 0.45).with_floors(floors);
        let bottle = RawDetection::new(PixelBox::new(0.0, 0.0, 100.0, 100.0), 0, 0.75);
        let chair = RawDetection::new(PixelBox::new(5.0, 5.0, 100.0, 100.0), 2, 0.7);

        let dets = pp.process(vec![bottle, chair], &OptimizationStrategy::default());
        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].class_name, "chair");
    }

    #[test]
    fn process_respects_strategy_threshold() {
        let pp = PostProcessor::new(labels(), 0.45);
        let strategy = OptimizationStrategy::default().with_confidence_threshold(0.7);
        let dets = pp.process(vec![raw(0, 2, 0.69), raw(1, 2, 0.71)], &strategy);
        assert_eq!(dets.len(), 1);
        assert!(dets.iter().all(|d| d.confidence >= 0.7));
    }

    #[test]
    fn low_precision_tightens_iou() {
        let pp = PostProcessor::new(labels(), 0.5).with_low_precision_factor(0.8);
        let normal = OptimizationStrategy::default();
        let low = normal.with_low_precision(true);
        assert_relative_eq!(pp.effective_iou(&normal), 0.5);
        assert_relative_eq!(pp.effective_iou(&low), 0.4);

        // IoU of these two is 0.4286: kept at 0.5, suppressed at 0.4.
        let a = RawDetection::new(PixelBox::new(0.0, 0.0, 100.0, 100.0), 2, 0.9);
        let b = RawDetection::new(PixelBox::new(0.0, 40.0, 100.0, 100.0), 2, 0.8);
        assert_eq!(pp.process(vec![a, b], &normal).len(), 2);
        assert_eq!(pp.process(vec![a, b], &low).len(), 1);
    }

    #[test]
    fn floors_serialize_by_category_name() {
        let floors = CategoryFloors::none().with(WasteCategory::Recycle, 0.7);
        let json = serde_json::to_string(&floors).unwrap();
        assert_eq!(json, r#"{"recycle":0.7}"#);
        assert!(floors.is_valid());
        assert!(!CategoryFloors::none().with(WasteCategory::Compost, 1.5).is_valid());
    }
}
