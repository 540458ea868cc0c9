//! Adaptive optimization controller for the waste-detection engine.
//!
//! The controller never reads thermal sensors directly. It infers device
//! stress from observed inference behaviour and publishes an
//! [`OptimizationStrategy`](detect_types::OptimizationStrategy) snapshot the
//! rest of the pipeline reads per frame.
//!
//! # Pipeline
//!
//! ```text
//! TelemetrySample -> SampleHistory -> assess() -> ThermalLevel
//!                                                     |
//!                    PowerState, DeviceTier -------> compose() -> watch channel
//! ```
//!
//! # Types
//!
//! - [`AdaptiveController`] - Owns the history and publishes strategies
//! - [`ControllerConfig`] - Targets, windows and thresholds
//! - [`SampleHistory`] - Bounded telemetry ring
//! - [`ThermalAssessment`] - Signals behind a thermal-level decision
//! - [`StrategyChange`] - A published change with its previous value
//!
//! # Example
//!
//! ```
//! use detect_adapt::{ControllerConfig, compose};
//! use detect_types::{DeviceTier, PowerState, ThermalLevel};
//!
//! let config = ControllerConfig::default();
//! let strategy = compose(
//!     ThermalLevel::Serious,
//!     &PowerState::new(0.1, false),
//!     DeviceTier::LowEnd,
//!     &config,
//! );
//!
//! assert_eq!(strategy.frame_skip_count, 3);
//! assert_eq!(strategy.max_objects, 5);
//! assert!(strategy.use_low_precision);
//! ```

#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![warn(missing_docs)]

mod config;
mod controller;
mod error;
mod history;
mod policy;
mod thermal;

pub use config::ControllerConfig;
pub use controller::{AdaptiveController, StrategyChange};
pub use error::{AdaptError, Result};
pub use history::SampleHistory;
pub use policy::{LOW_BATTERY_EXTRA_REDUCTION, LOW_BATTERY_EXTRA_SKIP, base_strategy, compose};
pub use thermal::{ThermalAssessment, assess};
