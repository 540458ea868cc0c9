//! Events broadcast to external observers.

use std::path::PathBuf;

use detect_adapt::StrategyChange;
use detect_types::{ExecutionBackend, OptimizationStrategy, ThermalLevel};
use serde::{Deserialize, Serialize};

/// Capacity of the event broadcast channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Something an analytics collaborator may want to record.
///
/// Serialized with a `type` tag:
///
/// ```
/// use detect_engine::EngineEvent;
///
/// let json = serde_json::to_string(&EngineEvent::ContextLost).unwrap();
/// assert_eq!(json, r#"{"type":"context_lost"}"#);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// The controller published a new strategy.
    StrategyChanged {
        /// Thermal level behind the change.
        level: ThermalLevel,
        /// Replaced snapshot.
        previous: OptimizationStrategy,
        /// New snapshot.
        current: OptimizationStrategy,
        /// Relative cost of the new snapshot.
        expected_cost_factor: f32,
    },

    /// A model reached `Ready`.
    ModelLoadSucceeded {
        /// Loaded artifact.
        path: PathBuf,
        /// Candidate index.
        fallback_index: usize,
        /// Backend the session runs on.
        backend: ExecutionBackend,
    },

    /// Initialization failed terminally.
    ModelLoadFailed {
        /// Failure description.
        reason: String,
    },

    /// One inference failed.
    InferenceFailure {
        /// Failure description.
        error: String,
        /// Consecutive failures on the current model.
        consecutive_failures: u32,
        /// Failures over the engine lifetime.
        total_failures: u64,
    },

    /// A frame was skipped by the strategy.
    FrameSkipped {
        /// Skipped frame.
        frame_id: u64,
        /// Skips over the engine lifetime.
        total_skipped: u64,
    },

    /// The hardware context was lost.
    ContextLost,

    /// The hardware context was restored.
    ContextRestored,
}

impl From<StrategyChange> for EngineEvent {
    fn from(change: StrategyChange) -> Self {
        Self::StrategyChanged {
            level: change.level,
            previous: change.previous,
            current: change.current,
            expected_cost_factor: change.current.expected_cost_factor(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_change_carries_cost() {
        let current = OptimizationStrategy::default().with_frame_skip(1);
        let event = EngineEvent::from(StrategyChange {
            previous: OptimizationStrategy::default(),
            current,
            level: ThermalLevel::Fair,
        });
        match event {
            EngineEvent::StrategyChanged {
                expected_cost_factor,
                level,
                ..
            } => {
                assert!((expected_cost_factor - 0.5).abs() < f32::EPSILON);
                assert_eq!(level, ThermalLevel::Fair);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn tagged_serialization() {
        let event = EngineEvent::FrameSkipped {
            frame_id: 7,
            total_skipped: 3,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"frame_skipped""#));
        let back: EngineEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
