//! Frame skipping and frame-rate estimation.

use tokio::time::Instant;

/// Processes one frame, then skips the strategy's skip count.
#[derive(Debug, Default)]
pub(crate) struct SkipCounter {
    remaining: u32,
}

impl SkipCounter {
    /// Returns `true` if this frame falls inside the skip window.
    ///
    /// A lowered skip count shortens a window already in progress.
    pub(crate) fn should_skip(&mut self, skip_count: u32) -> bool {
        self.remaining = self.remaining.min(skip_count);
        if self.remaining > 0 {
            self.remaining -= 1;
            true
        } else {
            self.remaining = skip_count;
            false
        }
    }
}

/// Exponentially smoothed rate of `detect` calls.
#[derive(Debug)]
pub(crate) struct FpsEstimator {
    last: Option<Instant>,
    smoothed: Option<f32>,
    alpha: f32,
}

impl Default for FpsEstimator {
    fn default() -> Self {
        Self {
            last: None,
            smoothed: None,
            alpha: 0.2,
        }
    }
}

impl FpsEstimator {
    /// Records a frame at `now` and returns the estimate; `0.0` until two
    /// frames with distinct timestamps have been seen.
    pub(crate) fn record(&mut self, now: Instant) -> f32 {
        if let Some(last) = self.last {
            let dt = now.saturating_duration_since(last).as_secs_f32();
            if dt > 0.0 {
                let instant = 1.0 / dt;
                self.smoothed = Some(match self.smoothed {
                    Some(prev) => prev + self.alpha * (instant - prev),
                    None => instant,
                });
            }
        }
        self.last = Some(now);
        self.estimate()
    }

    /// Current estimate without recording a frame.
    pub(crate) fn estimate(&self) -> f32 {
        self.smoothed.unwrap_or(0.0)
    }
}
