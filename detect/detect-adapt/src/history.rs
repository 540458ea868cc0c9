//! Bounded telemetry history.

use std::collections::VecDeque;

use detect_types::TelemetrySample;

/// Fixed-capacity ring of telemetry samples in arrival order.
///
/// When full, pushing evicts the oldest sample.
///
/// # Example
///
/// ```
/// use detect_adapt::SampleHistory;
/// use detect_types::TelemetrySample;
///
/// let mut history = SampleHistory::new(2);
/// history.push(TelemetrySample::new(30.0, 20.0, 0.0));
/// history.push(TelemetrySample::new(29.0, 21.0, 0.5));
/// history.push(TelemetrySample::new(28.0, 22.0, 1.0));
///
/// assert_eq!(history.len(), 2);
/// assert_eq!(history.oldest().map(|s| s.timestamp), Some(0.5));
/// ```
#[derive(Debug, Clone)]
pub struct SampleHistory {
    capacity: usize,
    samples: VecDeque<TelemetrySample>,
}

impl SampleHistory {
    /// Creates an empty history holding at most `capacity` samples.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            samples: VecDeque::with_capacity(capacity.min(1024)),
        }
    }

    /// Maximum number of samples retained.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of samples held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Returns `true` if no samples are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Drops every sample.
    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Appends a sample, evicting the oldest when full.
    pub fn push(&mut self, sample: TelemetrySample) {
        if self.samples.len() >= self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    /// Oldest retained sample.
    #[must_use]
    pub fn oldest(&self) -> Option<&TelemetrySample> {
        self.samples.front()
    }

    /// Newest sample.
    #[must_use]
    pub fn latest(&self) -> Option<&TelemetrySample> {
        self.samples.back()
    }

    /// Iterates oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &TelemetrySample> {
        self.samples.iter()
    }

    /// Mean inference time over the newest `window` samples.
    ///
    /// Returns `None` if fewer than `window` samples are held.
    #[must_use]
    pub fn recent_mean_ms(&self, window: usize) -> Option<f32> {
        self.window_mean(0, window)
    }

    /// Ratio of the mean inference time of the newest `window` samples to
    /// the mean of the `window` samples before them.
    ///
    /// Returns `None` until `2 * window` samples are held or when the
    /// earlier window has no positive mean.
    #[must_use]
    pub fn inference_growth(&self, window: usize) -> Option<f32> {
        let recent = self.window_mean(0, window)?;
        let prior = self.window_mean(window, window)?;
        (prior > 0.0).then(|| recent / prior)
    }

    /// Fraction of the newest `window` samples that report an error.
    ///
    /// Returns `None` if fewer than `window` samples are held.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn error_rate(&self, window: usize) -> Option<f32> {
        if window == 0 || self.samples.len() < window {
            return None;
        }
        let failed = self
            .samples
            .iter()
            .rev()
            .take(window)
            .filter(|s| s.error_count > 0)
            .count();
        Some(failed as f32 / window as f32)
    }

    /// Mean of `window` samples ending `skip` samples before the newest.
    #[allow(clippy::cast_precision_loss)]
    fn window_mean(&self, skip: usize, window: usize) -> Option<f32> {
        if window == 0 || self.samples.len() < skip + window {
            return None;
        }
        let sum: f32 = self
            .samples
            .iter()
            .rev()
            .skip(skip)
            .take(window)
            .map(|s| s.average_inference_time_ms)
            .sum();
        Some(sum / window as f32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample(ms: f32, t: f64) -> TelemetrySample {
        TelemetrySample::new(30.0, ms, t)
    }

    #[test]
    fn evicts_oldest() {
        let mut history = SampleHistory::new(3);
        for i in 0..5 {
            history.push(sample(10.0, f64::from(i)));
        }
        assert_eq!(history.len(), 3);
        assert_eq!(history.oldest().map(|s| s.timestamp), Some(2.0));
        assert_eq!(history.latest().map(|s| s.timestamp), Some(4.0));
    }

    #[test]
    fn zero_capacity_holds_one() {
        let mut history = SampleHistory::new(0);
        history.push(sample(1.0, 0.0));
        history.push(sample(2.0, 1.0));
        assert_eq!(history.capacity(), 1);
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn growth_compares_adjacent_windows() {
        let mut history = SampleHistory::new(60);
        for i in 0..10 {
            history.push(sample(20.0, f64::from(i)));
        }
        assert!(history.inference_growth(10).is_none());
        for i in 10..20 {
            history.push(sample(40.0, f64::from(i)));
        }
        assert_relative_eq!(history.inference_growth(10).unwrap(), 2.0);
        assert_relative_eq!(history.recent_mean_ms(10).unwrap(), 40.0);
    }

    #[test]
    fn error_rate_counts_failed_samples() {
        let mut history = SampleHistory::new(8);
        history.push(sample(10.0, 0.0).with_errors(1));
        assert!(history.error_rate(4).is_none());
        for i in 1..4 {
            history.push(sample(10.0, f64::from(i)));
        }
        assert_relative_eq!(history.error_rate(4).unwrap(), 0.25);
        history.push(sample(10.0, 4.0).with_errors(3));
        assert_relative_eq!(history.error_rate(4).unwrap(), 0.25);
        assert_relative_eq!(history.error_rate(2).unwrap(), 0.5);
    }

    #[test]
    fn growth_needs_positive_baseline() {
        let mut history = SampleHistory::new(8);
        for i in 0..4 {
            history.push(sample(0.0, f64::from(i)));
        }
        assert!(history.inference_growth(2).is_none());
    }
}
