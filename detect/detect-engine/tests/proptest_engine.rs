//! Property-based tests for the detection engine output.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use detect_codec::CategoryFloors;
use detect_engine::{DetectionEngine, EngineConfig, EngineRuntime};
use detect_model::ModelArtifactDescriptor;
use detect_model::testing::{MemoryArtifactStore, ScriptedFactory, anchor_free_output};
use detect_types::{Frame, PowerState, WasteCategory};
use proptest::prelude::*;

// ============================================================================
// Strategies
// ============================================================================

type Candidate = (f32, f32, f32, f32, usize, f32);

fn candidate() -> impl Strategy<Value = Candidate> {
    (
        0.0f32..64.0,
        0.0f32..64.0,
        1.0f32..40.0,
        1.0f32..40.0,
        0usize..3,
        0.0f32..=1.0,
    )
}

fn run_engine(
    candidates: &[Candidate],
    threshold: f32,
    max_objects: usize,
    floors: CategoryFloors,
    low_battery: bool,
) -> (Vec<detect_types::Detection>, detect_types::OptimizationStrategy) {
    let config = EngineConfig::default()
        .with_model(ModelArtifactDescriptor::new("model.onnx", 1_000_000))
        .with_input_size(64, 64)
        .with_class_names(["bottle", "banana", "chair"])
        .with_confidence_threshold(threshold)
        .with_max_objects(max_objects)
        .with_category_floors(floors);
    let factory = ScriptedFactory::healthy(anchor_free_output(3, candidates));
    let runtime = EngineRuntime::new(Arc::new(factory))
        .with_store(Arc::new(MemoryArtifactStore::new().with_onnx("model.onnx", 1_000_000)));

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap();
    rt.block_on(async {
        let engine = DetectionEngine::new(config, runtime).unwrap();
        engine.initialize().await.unwrap();
        if low_battery {
            engine.set_power_state(PowerState::new(0.05, false));
        }
        let strategy = engine.strategy();
        let frame = Frame::rgba(1, 0.0, vec![200; 96 * 72 * 4], 96, 72);
        let detections = engine.detect(&frame).await;
        engine.dispose();
        (detections, strategy)
    })
}

// ============================================================================
// Output invariants
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn confidence_never_below_strategy_threshold(
        candidates in prop::collection::vec(candidate(), 0..40),
        threshold in 0.05f32..0.95,
        max_objects in 1usize..10,
        low_battery in any::<bool>(),
    ) {
        let (detections, strategy) =
            run_engine(&candidates, threshold, max_objects, CategoryFloors::none(), low_battery);

        prop_assert!(detections.len() <= strategy.max_objects);
        for detection in &detections {
            prop_assert!(!detection.is_sentinel());
            prop_assert!(detection.confidence >= strategy.confidence_threshold);
            let b = detection.bounding_box;
            prop_assert!(b.x >= 0.0 && b.y >= 0.0);
            prop_assert!(b.x + b.width <= 96.0 + 1e-3);
            prop_assert!(b.y + b.height <= 72.0 + 1e-3);
        }
    }

    #[test]
    fn category_floors_apply_on_top(
        candidates in prop::collection::vec(candidate(), 0..40),
        recycle_floor in 0.0f32..=1.0,
    ) {
        let floors = CategoryFloors::none().with(WasteCategory::Recycle, recycle_floor);
        let (detections, strategy) = run_engine(&candidates, 0.3, 20, floors, false);

        for detection in &detections {
            let required = if detection.category == WasteCategory::Recycle {
                strategy.confidence_threshold.max(recycle_floor)
            } else {
                strategy.confidence_threshold
            };
            prop_assert!(detection.confidence >= required);
        }
    }
}
