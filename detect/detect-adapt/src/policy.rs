//! Strategy composition: thermal base, battery layer, device floor.

use detect_types::{DeviceTier, OptimizationStrategy, PowerState, ThermalLevel};

use crate::config::ControllerConfig;

/// Extra frames skipped on a low, discharging battery.
pub const LOW_BATTERY_EXTRA_SKIP: u32 = 1;

/// Extra resolution reduction on a low, discharging battery, in percent.
pub const LOW_BATTERY_EXTRA_REDUCTION: u32 = 15;

/// Base strategy for a thermal level.
///
/// | Level | Skip | Reduction | Low precision | Portable | Max objects | Confidence |
/// |-------|------|-----------|---------------|----------|-------------|------------|
/// | normal | 0 | 0% | no | no | base | base |
/// | fair | 1 | 10% | no | no | 15 | base + 0.05 |
/// | serious | 2 | 25% | yes | no | 10 | base + 0.10 |
/// | critical | 4 | 50% | yes | yes | 5 | base + 0.20 |
///
/// Object caps never exceed the configured base.
#[must_use]
pub fn base_strategy(level: ThermalLevel, config: &ControllerConfig) -> OptimizationStrategy {
    let base = config.base_confidence_threshold;
    let (skip, reduction, low_precision, portable, cap, boost) = match level {
        ThermalLevel::Normal => (0, 0, false, false, config.base_max_objects, 0.0),
        ThermalLevel::Fair => (1, 10, false, false, 15, 0.05),
        ThermalLevel::Serious => (2, 25, true, false, 10, 0.10),
        ThermalLevel::Critical => (4, 50, true, true, 5, 0.20),
    };

    OptimizationStrategy::default()
        .with_frame_skip(skip)
        .with_resolution_reduction(reduction)
        .with_low_precision(low_precision)
        .with_force_portable(portable)
        .with_max_objects(cap.min(config.base_max_objects))
        .with_confidence_threshold(base + boost)
}

/// Full strategy for a level under the given power and device signals.
///
/// Battery adjustments apply at every thermal level. The result is clamped.
#[must_use]
pub fn compose(
    level: ThermalLevel,
    power: &PowerState,
    tier: DeviceTier,
    config: &ControllerConfig,
) -> OptimizationStrategy {
    let mut strategy = base_strategy(level, config);

    if power.is_low(config.low_battery_level) {
        strategy.frame_skip_count = strategy
            .frame_skip_count
            .saturating_add(LOW_BATTERY_EXTRA_SKIP);
        strategy.resolution_reduction_percent = strategy
            .resolution_reduction_percent
            .saturating_add(LOW_BATTERY_EXTRA_REDUCTION);
    }

    if tier == DeviceTier::LowEnd {
        strategy.max_objects = strategy.max_objects.min(config.low_end_max_objects);
    }

    strategy.clamped()
}
