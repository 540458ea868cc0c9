//! Engine counters.

use serde::{Deserialize, Serialize};

/// Snapshot of per-frame counters.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EngineMetrics {
    /// Frames passed to `detect` while ready.
    pub frames_seen: u64,

    /// Frames skipped by the strategy.
    pub frames_skipped: u64,

    /// Frames that produced a model output.
    pub frames_inferred: u64,

    /// Failed inferences.
    pub inference_failures: u64,

    /// Sentinel lists returned.
    pub sentinel_results: u64,

    /// Duration of the last successful inference in milliseconds.
    pub last_inference_ms: Option<f64>,
}

impl EngineMetrics {
    /// Share of attempted inferences that succeeded, or `None` before the
    /// first attempt.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn success_rate(&self) -> Option<f64> {
        let attempted = self.frames_inferred + self.inference_failures;
        (attempted > 0).then(|| self.frames_inferred as f64 / attempted as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_rate() {
        assert_eq!(EngineMetrics::default().success_rate(), None);
        let metrics = EngineMetrics {
            frames_inferred: 3,
            inference_failures: 1,
            ..EngineMetrics::default()
        };
        assert_eq!(metrics.success_rate(), Some(0.75));
    }
}
