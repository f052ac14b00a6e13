//! Transition execution
//!
//! A clock-driven scheduler that walks a [`TransitionPlan`] against the
//! engine's audio clock, interpolating every volume and EQ ramp of the
//! current phase and applying the values through a [`MixerControl`]. One
//! execution is active at a time; starting a new plan cancels the old one,
//! and ticks after completion are no-ops - a cancelled or finished run can
//! never fight the user for the faders.
//!
//! The executor is cooperatively ticked by the control thread (a UI tick
//! subscription or the [`drive`] loop); tick cadence only affects ramp
//! granularity, never the terminal values, which are applied exactly.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossmix_core::audio::CommandSender;
use crossmix_core::engine::{EngineClock, EngineCommand, EqBand};
use crossmix_core::types::DeckId;

use crate::planner::{TransitionPhase, TransitionPlan};

/// Recommended tick interval; anything at or under 50ms keeps ramps smooth
pub const EXECUTOR_TICK: Duration = Duration::from_millis(25);

/// The executor's write path into the mixer
///
/// Implemented for the engine's lock-free [`CommandSender`]; tests plug in
/// a recorder.
pub trait MixerControl {
    fn set_deck_volume(&mut self, deck: DeckId, volume: f32);
    fn set_deck_eq(&mut self, deck: DeckId, band: EqBand, gain: f32);
}

impl MixerControl for CommandSender {
    fn set_deck_volume(&mut self, deck: DeckId, volume: f32) {
        if self.send(EngineCommand::SetVolume { deck, volume }).is_err() {
            log::warn!("transition volume command dropped (queue full)");
        }
    }

    fn set_deck_eq(&mut self, deck: DeckId, band: EqBand, gain: f32) {
        if self.send(EngineCommand::SetEq { deck, band, gain }).is_err() {
            log::warn!("transition EQ command dropped (queue full)");
        }
    }
}

/// Outcome of a single tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    /// No active execution
    Idle,
    /// Armed: the plan's start time is still in the future
    Waiting { seconds_until_start: f64 },
    /// Mid-transition
    Running { phase: &'static str, progress: f64 },
    /// This tick finished the plan and applied all terminal values
    Completed,
}

/// Progress callback: (phase name, phase progress 0-1)
pub type ProgressFn = Box<dyn FnMut(&str, f64) + Send>;

/// Clock-driven transition scheduler: Idle -> Running -> Idle
pub struct TransitionExecutor {
    plan: Option<TransitionPlan>,
    /// Clock instant (seconds) where phase time zero sits
    started_at: f64,
    /// Highest phase index whose end values have been applied
    next_phase: usize,
    on_progress: Option<ProgressFn>,
}

impl TransitionExecutor {
    pub fn new() -> Self {
        Self {
            plan: None,
            started_at: 0.0,
            next_phase: 0,
            on_progress: None,
        }
    }

    /// Install a progress callback invoked once per tick while running
    pub fn on_progress(&mut self, callback: ProgressFn) {
        self.on_progress = Some(callback);
    }

    pub fn is_running(&self) -> bool {
        self.plan.is_some()
    }

    /// Arm a plan against the clock
    ///
    /// Phase time starts at the plan's start time if that is still ahead of
    /// `now`, otherwise immediately. A previous execution is cancelled
    /// first - its remaining ticks never fire.
    pub fn start(&mut self, plan: TransitionPlan, now: f64) {
        if self.plan.is_some() {
            log::info!("replacing active transition");
        }
        self.started_at = if plan.start_time > now { plan.start_time } else { now };
        self.next_phase = 0;
        self.plan = Some(plan);
    }

    /// Cancel the active execution; subsequent ticks are no-ops and manual
    /// mixer control resumes without interference
    pub fn cancel(&mut self) {
        if self.plan.take().is_some() {
            log::info!("transition cancelled");
        }
    }

    /// Apply one phase's terminal values
    fn apply_phase_end(phase: &TransitionPhase, ctl: &mut impl MixerControl) {
        ctl.set_deck_volume(DeckId::A, phase.volume_a.end);
        ctl.set_deck_volume(DeckId::B, phase.volume_b.end);
        for ramp in &phase.eq_ramps {
            ctl.set_deck_eq(ramp.deck, ramp.band, ramp.end);
        }
    }

    /// Advance the transition to `now` (engine clock seconds)
    ///
    /// Phases the clock has already passed are closed out at their exact
    /// end values before the current phase interpolates, so coarse or
    /// stalled tick cadences still land every ramp exactly.
    pub fn tick(&mut self, now: f64, ctl: &mut impl MixerControl) -> TickOutcome {
        let Some(plan) = &self.plan else {
            return TickOutcome::Idle;
        };

        let elapsed = now - self.started_at;
        if elapsed < 0.0 {
            return TickOutcome::Waiting {
                seconds_until_start: -elapsed,
            };
        }

        if elapsed >= plan.duration {
            // Close out every remaining phase so all ramps reach their
            // declared end values exactly - clamp, never overshoot.
            let plan = self.plan.take().expect("checked above");
            for phase in &plan.phases[self.next_phase.min(plan.phases.len())..] {
                Self::apply_phase_end(phase, ctl);
            }
            if let (Some(cb), Some(last)) = (self.on_progress.as_mut(), plan.phases.last()) {
                cb(last.name, 1.0);
            }
            log::info!("transition complete");
            return TickOutcome::Completed;
        }

        let Some(index) = plan.phase_index_at(elapsed) else {
            // Between floating-point cracks at a phase boundary; treat as
            // still running, the next tick resolves it.
            return TickOutcome::Running { phase: "", progress: 0.0 };
        };

        // Close out any phases the clock skipped past since the last tick
        let plan = self.plan.as_ref().expect("checked above");
        for phase in &plan.phases[self.next_phase..index] {
            Self::apply_phase_end(phase, ctl);
        }

        let phase = &plan.phases[index];
        let progress = ((elapsed - phase.start_offset) / phase.duration).clamp(0.0, 1.0);
        let t = progress as f32;

        let volume_a = phase.volume_a.start + (phase.volume_a.end - phase.volume_a.start) * t;
        let volume_b = phase.volume_b.start + (phase.volume_b.end - phase.volume_b.start) * t;
        ctl.set_deck_volume(DeckId::A, volume_a);
        ctl.set_deck_volume(DeckId::B, volume_b);
        for ramp in &phase.eq_ramps {
            let gain = ramp.start + (ramp.end - ramp.start) * t;
            ctl.set_deck_eq(ramp.deck, ramp.band, gain);
        }

        let name = phase.name;
        self.next_phase = index;
        if let Some(cb) = self.on_progress.as_mut() {
            cb(name, progress);
        }

        TickOutcome::Running { phase: name, progress }
    }
}

impl Default for TransitionExecutor {
    fn default() -> Self {
        Self::new()
    }
}

/// Blocking drive loop for a dedicated control thread
///
/// Ticks the executor against the engine clock until the plan completes or
/// `cancel` flips. Cancellation halts scheduled ticks immediately.
pub fn drive(
    executor: &mut TransitionExecutor,
    clock: &EngineClock,
    ctl: &mut impl MixerControl,
    cancel: &AtomicBool,
    tick_interval: Duration,
) -> TickOutcome {
    loop {
        if cancel.load(Ordering::Relaxed) {
            executor.cancel();
            return TickOutcome::Idle;
        }
        match executor.tick(clock.seconds(), ctl) {
            TickOutcome::Idle => return TickOutcome::Idle,
            TickOutcome::Completed => return TickOutcome::Completed,
            _ => std::thread::sleep(tick_interval),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::{build_plan, TransitionStyle};
    use crossmix_core::analysis::{BeatGrid, TrackAnalysis};
    use crossmix_core::engine::{command_channel, MixEngine};
    use crossmix_core::types::SAMPLE_RATE;
    use std::collections::HashMap;

    fn analysis(bpm: f64) -> TrackAnalysis {
        TrackAnalysis {
            track_id: 1,
            bpm,
            key: "Am".to_string(),
            key_number: 8,
            key_mode: "minor".to_string(),
            energy: 0.5,
            energy_curve: Vec::new(),
            beat_grid: BeatGrid::default(),
            drops: Vec::new(),
            peaks: Vec::new(),
            phrase_markers: Vec::new(),
        }
    }

    /// Records the last value applied per parameter
    #[derive(Default)]
    struct Recorder {
        volumes: HashMap<DeckId, f32>,
        eqs: HashMap<(DeckId, EqBand), f32>,
        writes: usize,
    }

    impl MixerControl for Recorder {
        fn set_deck_volume(&mut self, deck: DeckId, volume: f32) {
            self.volumes.insert(deck, volume);
            self.writes += 1;
        }

        fn set_deck_eq(&mut self, deck: DeckId, band: EqBand, gain: f32) {
            self.eqs.insert((deck, band), gain);
            self.writes += 1;
        }
    }

    fn run_to_completion(style: TransitionStyle, tick_step: f64) -> Recorder {
        let a = analysis(128.0);
        let plan = build_plan(style, &a, &a);
        let duration = plan.duration;

        let mut executor = TransitionExecutor::new();
        let mut recorder = Recorder::default();
        executor.start(plan, 0.0);

        let mut now = 0.0;
        loop {
            let outcome = executor.tick(now, &mut recorder);
            if outcome == TickOutcome::Completed {
                break;
            }
            assert!(now <= duration + tick_step * 2.0, "executor never completed");
            now += tick_step;
        }
        recorder
    }

    #[test]
    fn completion_applies_exact_terminal_values() {
        for style in [TransitionStyle::Smooth, TransitionStyle::Hype] {
            let recorder = run_to_completion(style, 0.025);

            assert_eq!(recorder.volumes[&DeckId::A], 0.0, "{:?}", style);
            assert_eq!(recorder.volumes[&DeckId::B], 1.0, "{:?}", style);
            assert_eq!(recorder.eqs[&(DeckId::A, EqBand::Low)], -1.0);
            assert_eq!(recorder.eqs[&(DeckId::B, EqBand::Low)], 0.0);
            assert_eq!(recorder.eqs[&(DeckId::A, EqBand::Mid)], -1.0);
            assert_eq!(recorder.eqs[&(DeckId::A, EqBand::High)], -1.0);
            assert_eq!(recorder.eqs[&(DeckId::B, EqBand::Mid)], 0.0);
            assert_eq!(recorder.eqs[&(DeckId::B, EqBand::High)], 0.0);
        }
    }

    #[test]
    fn coarse_ticks_still_land_terminal_values() {
        // One tick every 7 seconds hops straight over whole phases
        let recorder = run_to_completion(TransitionStyle::Smooth, 7.0);
        assert_eq!(recorder.volumes[&DeckId::A], 0.0);
        assert_eq!(recorder.volumes[&DeckId::B], 1.0);
        assert_eq!(recorder.eqs[&(DeckId::A, EqBand::Low)], -1.0);
        assert_eq!(recorder.eqs[&(DeckId::B, EqBand::Low)], 0.0);
    }

    #[test]
    fn tick_interpolates_mid_phase() {
        let a = analysis(128.0);
        let plan = build_plan(TransitionStyle::Smooth, &a, &a); // 60s total
        let mut executor = TransitionExecutor::new();
        let mut recorder = Recorder::default();
        executor.start(plan, 0.0);

        // Halfway through phase 1 (0..15s): B volume ramps 0 -> 0.4
        let outcome = executor.tick(7.5, &mut recorder);
        assert!(matches!(
            outcome,
            TickOutcome::Running { phase: "incoming highs", .. }
        ));
        assert!((recorder.volumes[&DeckId::B] - 0.2).abs() < 1e-6);
        assert_eq!(recorder.volumes[&DeckId::A], 1.0);
    }

    #[test]
    fn idle_and_post_completion_ticks_are_noops() {
        let mut executor = TransitionExecutor::new();
        let mut recorder = Recorder::default();
        assert_eq!(executor.tick(1.0, &mut recorder), TickOutcome::Idle);
        assert_eq!(recorder.writes, 0);

        let a = analysis(128.0);
        executor.start(build_plan(TransitionStyle::Hype, &a, &a), 0.0);
        let duration = 16.0 * 4.0 * 60.0 / 128.0;
        assert_eq!(executor.tick(duration + 1.0, &mut recorder), TickOutcome::Completed);

        let writes = recorder.writes;
        assert_eq!(executor.tick(duration + 2.0, &mut recorder), TickOutcome::Idle);
        assert_eq!(recorder.writes, writes, "stale tick wrote to the mixer");
    }

    #[test]
    fn future_start_time_waits() {
        let a = analysis(128.0);
        let plan = build_plan(TransitionStyle::Smooth, &a, &a).with_start_time(30.0);
        let mut executor = TransitionExecutor::new();
        let mut recorder = Recorder::default();
        executor.start(plan, 10.0);

        match executor.tick(12.0, &mut recorder) {
            TickOutcome::Waiting { seconds_until_start } => {
                assert!((seconds_until_start - 18.0).abs() < 1e-9);
            }
            other => panic!("expected Waiting, got {:?}", other),
        }
        assert_eq!(recorder.writes, 0);
    }

    #[test]
    fn restart_replaces_the_active_plan() {
        let a = analysis(128.0);
        let mut executor = TransitionExecutor::new();
        let mut recorder = Recorder::default();

        executor.start(build_plan(TransitionStyle::Smooth, &a, &a), 0.0);
        executor.tick(1.0, &mut recorder);

        // Restart mid-run: the new plan's phases take over
        executor.start(build_plan(TransitionStyle::Hype, &a, &a), 100.0);
        match executor.tick(100.5, &mut recorder) {
            TickOutcome::Running { phase, .. } => assert_eq!(phase, "tease"),
            other => panic!("expected Running, got {:?}", other),
        }
    }

    #[test]
    fn cancel_halts_ticks() {
        let a = analysis(128.0);
        let mut executor = TransitionExecutor::new();
        let mut recorder = Recorder::default();
        executor.start(build_plan(TransitionStyle::Smooth, &a, &a), 0.0);
        executor.tick(1.0, &mut recorder);

        executor.cancel();
        let writes = recorder.writes;
        assert_eq!(executor.tick(2.0, &mut recorder), TickOutcome::Idle);
        assert_eq!(recorder.writes, writes);
        assert!(!executor.is_running());
    }

    #[test]
    fn progress_callback_reports_phases() {
        let a = analysis(128.0);
        let mut executor = TransitionExecutor::new();
        let mut recorder = Recorder::default();

        let seen: std::sync::Arc<std::sync::Mutex<Vec<(String, f64)>>> =
            std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = std::sync::Arc::clone(&seen);
        executor.on_progress(Box::new(move |name, progress| {
            sink.lock().unwrap().push((name.to_string(), progress));
        }));

        executor.start(build_plan(TransitionStyle::Smooth, &a, &a), 0.0);
        executor.tick(7.5, &mut recorder);
        executor.tick(61.0, &mut recorder);

        let seen = seen.lock().unwrap();
        assert_eq!(seen[0].0, "incoming highs");
        assert!((seen[0].1 - 0.5).abs() < 1e-9);
        // Completion reports the last phase at progress 1.0
        assert_eq!(seen.last().unwrap().0, "outro");
        assert_eq!(seen.last().unwrap().1, 1.0);
    }

    /// End-to-end through the real command queue into a real engine: after
    /// completion the mixer's targets are the plan's terminal values.
    #[test]
    fn commands_reach_the_engine() {
        let mut engine = MixEngine::new(SAMPLE_RATE);
        let (producer, mut consumer) = command_channel();
        let mut sender = CommandSender::new(producer);

        let a = analysis(128.0);
        let mut executor = TransitionExecutor::new();
        executor.start(build_plan(TransitionStyle::Hype, &a, &a), 0.0);

        let duration = 16.0 * 4.0 * 60.0 / 128.0;
        let mut now = 0.0;
        while executor.tick(now, &mut sender) != TickOutcome::Completed {
            engine.process_commands(&mut consumer);
            now += 0.5;
        }
        engine.process_commands(&mut consumer);
        assert!(now >= duration);

        assert_eq!(engine.mixer().channel(DeckId::A).volume(), 0.0);
        assert_eq!(engine.mixer().channel(DeckId::B).volume(), 1.0);
        assert_eq!(engine.mixer().channel(DeckId::A).eq.gain(EqBand::Low), -1.0);
        assert_eq!(engine.mixer().channel(DeckId::B).eq.gain(EqBand::Low), 0.0);
    }
}
