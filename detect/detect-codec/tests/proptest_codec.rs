//! Property-based tests for the codec and suppression.
//!
//! Run with: cargo test -p detect-codec -- proptest

#![allow(clippy::unwrap_used, clippy::expect_used)]

use detect_codec::{FrameCodec, PostProcessor, suppress};
use detect_types::{LabelSet, OptimizationStrategy, PixelBox, RawDetection, RawOutput};
use proptest::prelude::*;

// =============================================================================
// Strategies
// =============================================================================

fn arb_candidate() -> impl Strategy<Value = RawDetection> {
    (
        0.0..600.0f32,
        0.0..600.0f32,
        1.0..200.0f32,
        1.0..200.0f32,
        0usize..80,
        0.0..=1.0f32,
    )
        .prop_map(|(x, y, w, h, class_id, confidence)| {
            RawDetection::new(PixelBox::new(x, y, w, h), class_id, confidence)
        })
}

/// An image size and a box lying fully inside it.
fn arb_sized_box() -> impl Strategy<Value = ((u32, u32), PixelBox)> {
    (64u32..2000, 64u32..2000).prop_flat_map(|(iw, ih)| {
        let (wf, hf) = (iw as f32, ih as f32);
        (1.0..wf / 2.0, 1.0..hf / 2.0).prop_flat_map(move |(bw, bh)| {
            (0.0..(wf - bw), 0.0..(hf - bh))
                .prop_map(move |(x, y)| ((iw, ih), PixelBox::new(x, y, bw, bh)))
        })
    })
}

/// Packs anchor-free records column-wise into a `[1, rows, N]` output.
fn pack(records: &[Vec<f32>]) -> RawOutput {
    let rows = records[0].len();
    let n = records.len();
    let mut flat = vec![0.0; rows * n];
    for (j, record) in records.iter().enumerate() {
        for (r, value) in record.iter().enumerate() {
            flat[r * n + j] = *value;
        }
    }
    RawOutput::from_shape_vec(&[1, rows, n], flat).unwrap()
}

// =============================================================================
// Property Tests: Suppression
// =============================================================================

proptest! {
    /// Suppressing an already suppressed list changes nothing.
    #[test]
    fn suppress_is_idempotent(
        candidates in prop::collection::vec(arb_candidate(), 0..60),
        iou in 0.1..0.9f32,
    ) {
        let once = suppress(candidates, iou);
        let twice = suppress(once.clone(), iou);
        prop_assert_eq!(once, twice);
    }

    /// No two kept boxes overlap beyond the threshold.
    #[test]
    fn suppress_leaves_no_overlap(
        candidates in prop::collection::vec(arb_candidate(), 0..60),
        iou in 0.1..0.9f32,
    ) {
        let kept = suppress(candidates, iou);
        for (i, a) in kept.iter().enumerate() {
            for b in &kept[i + 1..] {
                prop_assert!(a.bounding_box.iou(&b.bounding_box) <= iou);
            }
        }
    }

    /// Output is sorted by confidence, highest first.
    #[test]
    fn suppress_output_sorted(
        candidates in prop::collection::vec(arb_candidate(), 0..60),
    ) {
        let kept = suppress(candidates, 0.5);
        prop_assert!(kept.windows(2).all(|w| w[0].confidence >= w[1].confidence));
    }
}

// =============================================================================
// Property Tests: Decoding
// =============================================================================

proptest! {
    /// A box expressed in model-input space decodes back to the same box in
    /// source-image space.
    #[test]
    fn decode_round_trips_box_coordinates(
        (size, original) in arb_sized_box(),
        input in prop::sample::select(vec![320u32, 416, 640]),
    ) {
        let codec = FrameCodec::new((input, input), 1);
        let sx = input as f32 / size.0 as f32;
        let sy = input as f32 / size.1 as f32;
        let (cx, cy) = original.center();
        let record = vec![
            cx * sx,
            cy * sy,
            original.width * sx,
            original.height * sy,
            0.99,
        ];

        let decoded = codec
            .decode(&pack(&[record]), size, &OptimizationStrategy::default())
            .unwrap();

        prop_assert_eq!(decoded.len(), 1);
        let b = decoded[0].bounding_box;
        let tolerance = 1e-3 * size.0.max(size.1) as f32;
        prop_assert!((b.x - original.x).abs() < tolerance);
        prop_assert!((b.y - original.y).abs() < tolerance);
        prop_assert!((b.width - original.width).abs() < tolerance);
        prop_assert!((b.height - original.height).abs() < tolerance);
    }

    /// Every processed detection clears the strategy threshold and the cap.
    #[test]
    fn processed_detections_respect_strategy(
        scores in prop::collection::vec((0.0..=1.0f32, 0.0..=1.0f32), 1..40),
        threshold in 0.0..=1.0f32,
        max_objects in 1usize..10,
    ) {
        let records: Vec<Vec<f32>> = scores
            .iter()
            .enumerate()
            .map(|(i, (a, b))| vec![20.0 + 15.0 * i as f32, 100.0, 10.0, 10.0, *a, *b])
            .collect();
        let strategy = OptimizationStrategy::default()
            .with_confidence_threshold(threshold)
            .with_max_objects(max_objects);

        let codec = FrameCodec::new((640, 640), 2);
        let candidates = codec.decode(&pack(&records), (640, 640), &strategy).unwrap();
        let detections = PostProcessor::new(LabelSet::new(["bottle", "banana"]), 0.45)
            .process(candidates, &strategy);

        prop_assert!(detections.len() <= max_objects);
        prop_assert!(detections.iter().all(|d| d.confidence >= strategy.confidence_threshold));
    }
}
