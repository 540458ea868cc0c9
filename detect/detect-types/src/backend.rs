//! Execution backends and startup capabilities.

use serde::{Deserialize, Serialize};

/// Hardware execution path for model inference.
///
/// # Example
///
/// ```
/// use detect_types::ExecutionBackend;
///
/// assert!(ExecutionBackend::Gpu.is_gpu());
/// assert_eq!(ExecutionBackend::Portable.name(), "portable");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionBackend {
    /// Hardware-accelerated path. Subject to graphics-context loss.
    Gpu,

    /// Universally available CPU path.
    #[default]
    Portable,
}

impl ExecutionBackend {
    /// Returns `true` for the accelerated backend.
    #[must_use]
    pub const fn is_gpu(&self) -> bool {
        matches!(self, Self::Gpu)
    }

    /// Returns the backend name as a string.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Gpu => "gpu",
            Self::Portable => "portable",
        }
    }
}

impl std::fmt::Display for ExecutionBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Backends present on the host, detected once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// Whether the accelerated backend can be created.
    pub gpu_backend_available: bool,

    /// Whether the portable backend can be created.
    pub portable_backend_available: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::portable_only()
    }
}

impl Capabilities {
    /// Both backends present.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            gpu_backend_available: true,
            portable_backend_available: true,
        }
    }

    /// Only the portable backend.
    #[must_use]
    pub const fn portable_only() -> Self {
        Self {
            gpu_backend_available: false,
            portable_backend_available: true,
        }
    }

    /// Returns the backend sessions should use.
    ///
    /// The accelerated backend is picked when present and not forced off.
    /// With nothing available the portable backend is still returned; its
    /// creation will fail and be reported as a load error.
    #[must_use]
    pub const fn preferred(&self, force_portable: bool) -> ExecutionBackend {
        if self.gpu_backend_available && !force_portable {
            ExecutionBackend::Gpu
        } else {
            ExecutionBackend::Portable
        }
    }

    /// Returns `true` if any backend is usable.
    #[must_use]
    pub const fn any(&self) -> bool {
        self.gpu_backend_available || self.portable_backend_available
    }
}
