//! Adaptive detection engine.
//!
//! [`DetectionEngine`] ties the pipeline together:
//!
//! ```text
//! Frame -> skip check -> encode -> ModelLifecycle::run_inference -> decode
//!       -> floor/suppress/label/cap -> Vec<Detection>
//!                                          |
//!     inference timing and failures -> AdaptiveController -> OptimizationStrategy
//! ```
//!
//! # Failure Surface
//!
//! | Operation | On failure |
//! |-----------|------------|
//! | [`DetectionEngine::new`] | [`EngineError::Config`] |
//! | [`DetectionEngine::initialize`] | [`EngineError::Load`], engine `Failed` |
//! | [`DetectionEngine::detect`] | one sentinel detection, never an error |
//! | proactive fallback exhausted during `detect` | `ModelLoadFailed` event, engine `Failed` |
//! | [`DetectionEngine::notify_context_restored`] | [`EngineError::Recovery`], context stays lost |
//!
//! # Types
//!
//! - [`EngineConfig`] - Configuration surface, loadable from JSON
//! - [`EngineRuntime`] - Session factory, artifact store and host capabilities
//! - [`EngineEvent`] - Broadcast to observers
//! - [`EngineMetrics`] - Per-frame counters
//! - [`LogConfig`], [`init_tracing`] - Subscriber setup for binaries
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use detect_engine::{DetectionEngine, EngineConfig, EngineRuntime};
//! # use detect_model::SessionFactory;
//! # async fn run(factory: Arc<dyn SessionFactory>, frame: detect_types::Frame) -> detect_engine::Result<()> {
//! let config = EngineConfig::from_json_file("engine.json")?;
//! let engine = DetectionEngine::new(config, EngineRuntime::new(factory))?;
//! engine.initialize().await?;
//!
//! for detection in engine.detect(&frame).await {
//!     println!("{} {:.2} {}", detection.class_name, detection.confidence, detection.category);
//! }
//! engine.dispose();
//! # Ok(())
//! # }
//! ```

#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![warn(missing_docs)]

mod config;
mod engine;
mod error;
mod events;
mod logging;
mod metrics;
mod pacing;

pub use config::{EngineConfig, MIN_INFERENCE_TIMEOUT_MS};
pub use engine::{DetectionEngine, EngineRuntime, EngineState};
pub use error::{ConfigError, EngineError, FrameError, Result};
pub use events::{EVENT_CHANNEL_CAPACITY, EngineEvent};
pub use logging::{LogConfig, init_tracing};
pub use metrics::EngineMetrics;
