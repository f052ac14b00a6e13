//! Transition planning
//!
//! Builds a declarative, time-phased plan of volume and EQ ramps for mixing
//! deck A out and deck B in. Plans are immutable data; the executor does the
//! clock-driven interpolation. Durations are musical (bars at the outgoing
//! track's tempo), and `optimize_start_time` snaps the plan onto a phrase
//! boundary so the blend starts where the music breathes.

use crossmix_core::analysis::TrackAnalysis;
use crossmix_core::engine::EqBand;
use crossmix_core::types::DeckId;

/// Default maximum playback-rate adjustment for tempo matching (+/- 8%)
pub const DEFAULT_MAX_BPM_ADJUSTMENT: f64 = 0.08;

/// A drop inside the first 30 seconds of the incoming track counts as
/// "early" and makes phrase alignment prefer landing the swap on it
const EARLY_DROP_WINDOW: f64 = 30.0;

/// Beats per bar assumed by the planners (the analysis grid is 4/4)
const BEATS_PER_BAR: f64 = 4.0;

/// Mixing styles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionStyle {
    /// Long, gradual 32-bar blend
    Smooth,
    /// Short 16-bar build with a hard drop
    Hype,
}

impl TransitionStyle {
    /// Transition length in bars for this style
    pub fn bars(self) -> u32 {
        match self {
            TransitionStyle::Smooth => 32,
            TransitionStyle::Hype => 16,
        }
    }
}

/// A linear volume ramp for one deck across one phase
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeRamp {
    pub start: f32,
    pub end: f32,
}

/// A linear EQ band ramp for one deck across one phase
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EqRamp {
    pub deck: DeckId,
    pub band: EqBand,
    pub start: f32,
    pub end: f32,
}

/// One contiguous phase of a transition
#[derive(Debug, Clone)]
pub struct TransitionPhase {
    pub name: &'static str,
    /// Seconds from plan start; phases are contiguous and non-overlapping
    pub start_offset: f64,
    pub duration: f64,
    pub volume_a: VolumeRamp,
    pub volume_b: VolumeRamp,
    pub eq_ramps: Vec<EqRamp>,
}

/// A complete transition plan. Immutable once built; only
/// [`optimize_start_time`] rewrites `start_time` (by returning a copy).
#[derive(Debug, Clone)]
pub struct TransitionPlan {
    pub style: TransitionStyle,
    /// Seconds into the mix timeline where the transition begins
    pub start_time: f64,
    /// Total length in seconds; phase durations sum to this
    pub duration: f64,
    pub phases: Vec<TransitionPhase>,
}

impl TransitionPlan {
    /// Index of the phase containing `elapsed` seconds from plan start
    pub fn phase_index_at(&self, elapsed: f64) -> Option<usize> {
        self.phases
            .iter()
            .position(|p| elapsed >= p.start_offset && elapsed < p.start_offset + p.duration)
    }

    /// Copy of the plan with only the start time rewritten
    pub fn with_start_time(&self, start_time: f64) -> Self {
        Self {
            start_time,
            ..self.clone()
        }
    }
}

/// Transition length in seconds for a style at the outgoing track's tempo
///
/// bars x 4 beats/bar x (60 / bpm). Callers guarantee bpm > 0.
pub fn transition_duration(style: TransitionStyle, bpm: f64) -> f64 {
    style.bars() as f64 * BEATS_PER_BAR * (60.0 / bpm)
}

/// Ramp a single deck's EQ band
fn ramp(deck: DeckId, band: EqBand, start: f32, end: f32) -> EqRamp {
    EqRamp { deck, band, start, end }
}

/// Build the four-phase plan for a style
///
/// Both styles honor the one hard rule of the craft: the two decks' bass is
/// never simultaneously at full gain - the low band swaps, it never doubles.
pub fn build_plan(style: TransitionStyle, analysis_a: &TrackAnalysis, _analysis_b: &TrackAnalysis) -> TransitionPlan {
    let duration = transition_duration(style, analysis_a.bpm);
    let phases = match style {
        TransitionStyle::Smooth => smooth_phases(duration),
        TransitionStyle::Hype => hype_phases(duration),
    };

    debug_assert!({
        let total: f64 = phases.iter().map(|p| p.duration).sum();
        (total - duration).abs() < 1e-9
    });

    TransitionPlan {
        style,
        start_time: 0.0,
        duration,
        phases,
    }
}

/// Smooth style: four equal quarters
///
/// 1. incoming highs - B enters on highs/mids only, bass fully cut
/// 2. mid blend - B's mids open while A's recede
/// 3. bass swap - A's low band cuts as B's comes up
/// 4. outro - A fades to silence, B reaches full presence
fn smooth_phases(duration: f64) -> Vec<TransitionPhase> {
    use DeckId::{A, B};
    use EqBand::{High, Low, Mid};

    let quarter = duration / 4.0;
    vec![
        TransitionPhase {
            name: "incoming highs",
            start_offset: 0.0,
            duration: quarter,
            volume_a: VolumeRamp { start: 1.0, end: 1.0 },
            volume_b: VolumeRamp { start: 0.0, end: 0.4 },
            eq_ramps: vec![
                ramp(B, Low, -1.0, -1.0),
                ramp(B, High, -0.3, 0.0),
                ramp(B, Mid, -0.5, -0.2),
            ],
        },
        TransitionPhase {
            name: "mid blend",
            start_offset: quarter,
            duration: quarter,
            volume_a: VolumeRamp { start: 1.0, end: 0.9 },
            volume_b: VolumeRamp { start: 0.4, end: 0.7 },
            eq_ramps: vec![
                ramp(B, Mid, -0.2, 0.0),
                ramp(A, Mid, 0.0, -0.3),
            ],
        },
        TransitionPhase {
            name: "bass swap",
            start_offset: quarter * 2.0,
            duration: quarter,
            volume_a: VolumeRamp { start: 0.9, end: 0.8 },
            volume_b: VolumeRamp { start: 0.7, end: 0.9 },
            eq_ramps: vec![
                ramp(A, Low, 0.0, -1.0),
                ramp(B, Low, -1.0, 0.0),
            ],
        },
        TransitionPhase {
            name: "outro",
            start_offset: quarter * 3.0,
            duration: quarter,
            volume_a: VolumeRamp { start: 0.8, end: 0.0 },
            volume_b: VolumeRamp { start: 0.9, end: 1.0 },
            eq_ramps: vec![
                ramp(A, Mid, -0.3, -1.0),
                ramp(A, High, 0.0, -1.0),
            ],
        },
    ]
}

/// Hype style: tease, build, a half-length drop, a stretched outro
///
/// Phase lengths are 1x, 1x, 0.5x, 1.5x of the nominal quarter, so the drop
/// hits fast and the outgoing track gets room to leave.
fn hype_phases(duration: f64) -> Vec<TransitionPhase> {
    use DeckId::{A, B};
    use EqBand::{High, Low, Mid};

    let nominal = duration / 4.0;
    let drop_len = nominal * 0.5;
    let outro_len = nominal * 1.5;

    vec![
        TransitionPhase {
            name: "tease",
            start_offset: 0.0,
            duration: nominal,
            volume_a: VolumeRamp { start: 1.0, end: 1.0 },
            volume_b: VolumeRamp { start: 0.0, end: 0.3 },
            eq_ramps: vec![
                ramp(B, Low, -1.0, -1.0),
                ramp(B, High, -0.6, -0.2),
                ramp(B, Mid, -0.8, -0.5),
            ],
        },
        TransitionPhase {
            name: "build",
            start_offset: nominal,
            duration: nominal,
            volume_a: VolumeRamp { start: 1.0, end: 0.9 },
            volume_b: VolumeRamp { start: 0.3, end: 0.6 },
            eq_ramps: vec![
                ramp(B, High, -0.2, 0.15),
                ramp(B, Mid, -0.5, -0.1),
                ramp(A, High, 0.0, 0.2),
            ],
        },
        TransitionPhase {
            name: "drop",
            start_offset: nominal * 2.0,
            duration: drop_len,
            volume_a: VolumeRamp { start: 0.9, end: 0.6 },
            volume_b: VolumeRamp { start: 0.6, end: 1.0 },
            eq_ramps: vec![
                ramp(A, Low, 0.0, -1.0),
                ramp(B, Low, -1.0, 0.0),
                ramp(B, High, 0.15, 0.0),
                ramp(B, Mid, -0.1, 0.0),
            ],
        },
        TransitionPhase {
            name: "outro",
            start_offset: nominal * 2.5,
            duration: outro_len,
            volume_a: VolumeRamp { start: 0.6, end: 0.0 },
            volume_b: VolumeRamp { start: 1.0, end: 1.0 },
            eq_ramps: vec![
                ramp(A, Mid, 0.0, -1.0),
                ramp(A, High, 0.2, -1.0),
            ],
        },
    ]
}

/// Snap a plan's start time to the next phrase boundary of the outgoing
/// track
///
/// The first phrase marker strictly after `current_time` becomes the start
/// time. An early drop in the incoming track keeps that same boundary (the
/// phrase snap is the contract; landing the drop sample-exactly on the bass
/// swap is best-effort and intentionally not attempted). With no qualifying
/// marker the plan is returned unchanged.
pub fn optimize_start_time(
    plan: &TransitionPlan,
    analysis_a: &TrackAnalysis,
    analysis_b: &TrackAnalysis,
    current_time: f64,
) -> TransitionPlan {
    let Some(marker) = analysis_a.next_phrase_marker(current_time) else {
        return plan.clone();
    };

    if let Some(drop) = analysis_b.first_drop().filter(|&d| d < EARLY_DROP_WINDOW) {
        log::debug!(
            "transition start {:.2}s on phrase boundary, incoming drop at {:.2}s",
            marker,
            drop
        );
    }

    plan.with_start_time(marker)
}

/// Result of [`bpm_match_rate`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateAdjustment {
    /// Playback rate to apply to track B
    pub rate: f64,
    /// Whether any adjustment is applied (false = tempos too far apart)
    pub adjusted: bool,
}

/// Playback rate that brings track B onto track A's tempo grid
///
/// Within `max_adjustment` of unity the raw ratio is the rate. Ratios near
/// 2 or 0.5 are half/double-time mixable and also rate-match (a 64 BPM
/// track plays at 2x against 128). Anything further apart returns unity
/// unadjusted - an extreme tempo bend sounds worse than a tempo clash.
pub fn bpm_match_rate(bpm_a: f64, bpm_b: f64, max_adjustment: f64) -> RateAdjustment {
    const UNADJUSTED: RateAdjustment = RateAdjustment { rate: 1.0, adjusted: false };

    if bpm_a <= 0.0 || bpm_b <= 0.0 {
        return UNADJUSTED;
    }

    let ratio = bpm_a / bpm_b;
    let near = |target: f64| (ratio / target - 1.0).abs() <= max_adjustment;

    if near(1.0) || near(2.0) || near(0.5) {
        RateAdjustment { rate: ratio, adjusted: true }
    } else {
        UNADJUSTED
    }
}
