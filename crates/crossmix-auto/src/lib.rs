//! Crossmix Auto - the auto-mixing brain
//!
//! Pure, deterministic track-compatibility scoring and ordering
//! ([`compat`]), declarative transition plans ([`planner`]), and the
//! clock-driven executor that walks a plan against the engine
//! ([`executor`]). Everything here talks to the audio side exclusively
//! through `crossmix-core`'s command queue.

pub mod compat;
pub mod config;
pub mod executor;
pub mod planner;

pub use compat::{
    bpm_compatibility, camelot_of, energy_flow, key_compatibility, mix_compatibility,
    smart_order, MixCompatibility, SmartOrder,
};
pub use config::AutoMixConfig;
pub use executor::{drive, MixerControl, ProgressFn, TickOutcome, TransitionExecutor, EXECUTOR_TICK};
pub use planner::{
    bpm_match_rate, build_plan, optimize_start_time, transition_duration, EqRamp,
    RateAdjustment, TransitionPhase, TransitionPlan, TransitionStyle, VolumeRamp,
};
