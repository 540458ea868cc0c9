//! Telemetry samples and device signals.

use serde::{Deserialize, Serialize};

/// One observation of inference performance.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TelemetrySample {
    /// Frames per second observed by the caller.
    pub estimated_fps: f32,

    /// Mean inference time over the sampling window, in milliseconds.
    pub average_inference_time_ms: f32,

    /// Inference failures observed since the previous sample.
    pub error_count: u32,

    /// Sample time in seconds on the controller's clock.
    pub timestamp: f64,
}

impl TelemetrySample {
    /// Creates a sample with no errors.
    #[must_use]
    pub const fn new(estimated_fps: f32, average_inference_time_ms: f32, timestamp: f64) -> Self {
        Self {
            estimated_fps,
            average_inference_time_ms,
            error_count: 0,
            timestamp,
        }
    }

    /// Sets the error count.
    #[must_use]
    pub const fn with_errors(mut self, error_count: u32) -> Self {
        self.error_count = error_count;
        self
    }
}

/// Battery state reported by the host, when available.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PowerState {
    /// Charge level in `[0, 1]`, or `None` if unknown.
    pub battery_level: Option<f32>,

    /// Whether the device is on external power, or `None` if unknown.
    pub charging: Option<bool>,
}

impl PowerState {
    /// A known battery level and charging state.
    #[must_use]
    pub const fn new(battery_level: f32, charging: bool) -> Self {
        Self {
            battery_level: Some(battery_level),
            charging: Some(charging),
        }
    }

    /// Returns `true` when the battery is below `threshold` and not charging.
    ///
    /// Unknown signals never count as low.
    #[must_use]
    pub fn is_low(&self, threshold: f32) -> bool {
        match (self.battery_level, self.charging) {
            (Some(level), charging) => level < threshold && charging != Some(true),
            (None, _) => false,
        }
    }
}

/// Coarse device class used for capability floors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceTier {
    /// Little memory or few cores.
    LowEnd,
    /// Everything else.
    #[default]
    MidRange,
    /// Plenty of memory and an accelerator.
    HighEnd,
}

/// Static description of the host device.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeviceProfile {
    /// Installed memory in gigabytes.
    pub memory_gb: f32,

    /// Logical CPU cores.
    pub cpu_cores: u32,

    /// Whether an accelerator is present.
    pub has_gpu: bool,
}

impl Default for DeviceProfile {
    fn default() -> Self {
        Self {
            memory_gb: 4.0,
            cpu_cores: 4,
            has_gpu: false,
        }
    }
}

impl DeviceProfile {
    /// Classifies the device.
    ///
    /// Low-end below 2 GB or with at most 2 cores; high-end with at least
    /// 8 GB and a GPU; mid-range otherwise.
    #[must_use]
    pub fn tier(&self) -> DeviceTier {
        if self.memory_gb < 2.0 || self.cpu_cores <= 2 {
            DeviceTier::LowEnd
        } else if self.memory_gb >= 8.0 && self.has_gpu {
            DeviceTier::HighEnd
        } else {
            DeviceTier::MidRange
        }
    }
}
