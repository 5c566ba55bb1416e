//! Engine configuration types

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Shortest accepted sampling interval in milliseconds
pub const MIN_SAMPLING_INTERVAL_MS: u16 = 5;

/// Power-on sampling interval in milliseconds
pub const DEFAULT_SAMPLING_INTERVAL_MS: u16 = 100;

/// Configuration for the protocol engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EngineConfig {
    /// Milliseconds between report ticks; clamped to
    /// [`MIN_SAMPLING_INTERVAL_MS`]. The host can change it at runtime
    /// with the sampling-interval command.
    pub sampling_interval_ms: u16,
    /// Report a streaming channel only when its value changed since the
    /// previous report. Off by default: every streaming channel is
    /// reported on every due tick.
    pub report_on_change_only: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sampling_interval_ms: DEFAULT_SAMPLING_INTERVAL_MS,
            report_on_change_only: false,
        }
    }
}
