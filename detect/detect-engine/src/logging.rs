//! Tracing subscriber installation for binaries.

use serde::{Deserialize, Serialize};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::error::{EngineError, Result};

/// Subscriber settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Filter directive used when `RUST_LOG` is unset, e.g. `info` or
    /// `detect_model=debug,info`.
    pub level: String,

    /// Include the module path of each event.
    pub include_target: bool,

    /// Colour output.
    pub ansi: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            include_target: false,
            ansi: true,
        }
    }
}

impl LogConfig {
    /// Debug level with targets.
    #[must_use]
    pub fn verbose() -> Self {
        Self {
            level: "debug".to_owned(),
            include_target: true,
            ..Self::default()
        }
    }

    /// Filter for this config, with `RUST_LOG` taking precedence.
    #[must_use]
    pub fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level))
    }
}

/// Installs a global fmt subscriber.
///
/// # Errors
///
/// Returns [`EngineError::Logging`] if a global subscriber is already set.
pub fn init_tracing(config: &LogConfig) -> Result<()> {
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(config.include_target)
                .with_ansi(config.ansi),
        )
        .with(config.filter())
        .try_init()
        .map_err(|e| EngineError::Logging(e.to_string()))
}
