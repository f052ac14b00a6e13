//! Auto-mix tunables
//!
//! Persisted with `crossmix-core`'s YAML config helpers. Every field has a
//! sensible default and unknown/missing fields fall back cleanly, so old
//! config files keep working.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::planner::{TransitionStyle, DEFAULT_MAX_BPM_ADJUSTMENT};

/// Tunables for the auto-mixing brain
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoMixConfig {
    /// Maximum playback-rate adjustment for tempo matching.
    /// Default: 0.08 (+/- 8%)
    pub max_bpm_adjustment: f64,

    /// Transition length for the smooth style, in bars.
    /// Default: 32
    pub smooth_bars: u32,

    /// Transition length for the hype style, in bars.
    /// Default: 16
    pub hype_bars: u32,

    /// Executor tick interval in milliseconds. 50 or less keeps ramps
    /// inaudible as steps. Default: 25
    pub tick_interval_ms: u64,
}

impl Default for AutoMixConfig {
    fn default() -> Self {
        Self {
            max_bpm_adjustment: DEFAULT_MAX_BPM_ADJUSTMENT,
            smooth_bars: 32,
            hype_bars: 16,
            tick_interval_ms: 25,
        }
    }
}

impl AutoMixConfig {
    /// Configured bar count for a style
    pub fn bars_for(&self, style: TransitionStyle) -> u32 {
        match style {
            TransitionStyle::Smooth => self.smooth_bars,
            TransitionStyle::Hype => self.hype_bars,
        }
    }

    /// Executor tick interval as a [`Duration`]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}
