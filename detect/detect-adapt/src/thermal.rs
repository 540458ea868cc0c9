//! Thermal-proxy estimation from observed inference behaviour.

use detect_types::ThermalLevel;

use crate::config::ControllerConfig;
use crate::history::SampleHistory;

/// Signals behind one thermal-level decision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThermalAssessment {
    /// Derived level.
    pub level: ThermalLevel,

    /// Latest frame rate over the target; `1.0` when unknown.
    pub fps_ratio: f32,

    /// Latest inference time over the budget; `0.0` when unknown.
    pub time_ratio: f32,

    /// Whether the recent window is slower than the prior one by more than
    /// the degradation ratio.
    pub degraded: bool,

    /// Fraction of the recent window that reported failures; `0.0` until
    /// the window fills.
    pub error_rate: f32,
}

impl ThermalAssessment {
    /// Assessment of an empty history.
    pub const NOMINAL: Self = Self {
        level: ThermalLevel::Normal,
        fps_ratio: 1.0,
        time_ratio: 0.0,
        degraded: false,
        error_rate: 0.0,
    };
}

/// Derives the thermal-proxy level from the telemetry history.
///
/// | Level | Any of |
/// |-------|--------|
/// | critical | fps ratio < 0.25, time ratio > 2.5, degraded with time ratio > 1.5, error rate >= 0.9 |
/// | serious | fps ratio < 0.5, time ratio > 1.75, degraded, error rate > 0.5 |
/// | fair | fps ratio < 0.8, time ratio > 1.2, error rate > 0.2 |
///
/// Rates and trends use the newest `trend_window` samples.
/// | normal | otherwise |
#[must_use]
pub fn assess(history: &SampleHistory, config: &ControllerConfig) -> ThermalAssessment {
    let Some(latest) = history.latest() else {
        return ThermalAssessment::NOMINAL;
    };

    let fps_ratio = if latest.estimated_fps.is_finite() && latest.estimated_fps > 0.0 {
        latest.estimated_fps / config.target_fps
    } else {
        1.0
    };
    let time_ratio = if latest.average_inference_time_ms.is_finite() {
        latest.average_inference_time_ms.max(0.0) / config.inference_budget_ms
    } else {
        0.0
    };
    let degraded = history
        .inference_growth(config.trend_window)
        .is_some_and(|growth| growth > config.degradation_ratio);
    let error_rate = history.error_rate(config.trend_window).unwrap_or(0.0);

    let level = if fps_ratio < 0.25
        || time_ratio > 2.5
        || (degraded && time_ratio > 1.5)
        || error_rate >= 0.9
    {
        ThermalLevel::Critical
    } else if fps_ratio < 0.5 || time_ratio > 1.75 || degraded || error_rate > 0.5 {
        ThermalLevel::Serious
    } else if fps_ratio < 0.8 || time_ratio > 1.2 || error_rate > 0.2 {
        ThermalLevel::Fair
    } else {
        ThermalLevel::Normal
    };

    ThermalAssessment {
        level,
        fps_ratio,
        time_ratio,
        degraded,
        error_rate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use detect_types::TelemetrySample;

    #[allow(clippy::cast_precision_loss)]
    fn history_of(samples: &[(f32, f32)]) -> SampleHistory {
        let mut history = SampleHistory::new(60);
        for (i, &(fps, ms)) in samples.iter().enumerate() {
            history.push(TelemetrySample::new(fps, ms, i as f64));
        }
        history
    }

    #[test]
    fn empty_history_is_normal() {
        let assessment = assess(&SampleHistory::new(4), &ControllerConfig::default());
        assert_eq!(assessment, ThermalAssessment::NOMINAL);
    }

    #[test]
    fn levels_follow_ratios() {
        let config = ControllerConfig::default();
        let cases = [
            ((30.0, 50.0), ThermalLevel::Normal),
            ((20.0, 50.0), ThermalLevel::Fair),
            ((30.0, 260.0), ThermalLevel::Fair),
            ((12.0, 50.0), ThermalLevel::Serious),
            ((30.0, 380.0), ThermalLevel::Serious),
            ((5.0, 50.0), ThermalLevel::Critical),
            ((30.0, 600.0), ThermalLevel::Critical),
        ];
        for (sample, expected) in cases {
            let assessment = assess(&history_of(&[sample]), &config);
            assert_eq!(assessment.level, expected, "sample {sample:?}");
        }
    }

    #[test]
    fn unknown_fps_is_neutral() {
        let config = ControllerConfig::default();
        let assessment = assess(&history_of(&[(0.0, 50.0)]), &config);
        assert_eq!(assessment.level, ThermalLevel::Normal);
        assert!((assessment.fps_ratio - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn sustained_growth_flags_degradation() {
        let config = ControllerConfig::default();
        let mut samples = vec![(30.0, 40.0); 10];
        samples.extend(vec![(30.0, 100.0); 10]);
        let assessment = assess(&history_of(&samples), &config);
        assert!(assessment.degraded);
        assert_eq!(assessment.level, ThermalLevel::Serious);

        let mut samples = vec![(30.0, 100.0); 10];
        samples.extend(vec![(30.0, 320.0); 10]);
        assert_eq!(
            assess(&history_of(&samples), &config).level,
            ThermalLevel::Critical
        );
    }

    #[test]
    fn sustained_failures_raise_level() {
        let config = ControllerConfig::default();
        let failing = |failed: u32| {
            let mut history = SampleHistory::new(60);
            for i in 0..10u32 {
                let sample = TelemetrySample::new(30.0, 0.0, f64::from(i));
                history.push(sample.with_errors(u32::from(i < failed)));
            }
            assess(&history, &config)
        };
        assert_eq!(failing(0).level, ThermalLevel::Normal);
        assert_eq!(failing(3).level, ThermalLevel::Fair);
        assert_eq!(failing(6).level, ThermalLevel::Serious);
        let all = failing(10);
        assert_eq!(all.level, ThermalLevel::Critical);
        assert!((all.error_rate - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn mild_growth_is_not_degradation() {
        let config = ControllerConfig::default();
        let mut samples = vec![(30.0, 40.0); 10];
        samples.extend(vec![(30.0, 55.0); 10]);
        let assessment = assess(&history_of(&samples), &config);
        assert!(!assessment.degraded);
        assert_eq!(assessment.level, ThermalLevel::Normal);
    }
}
