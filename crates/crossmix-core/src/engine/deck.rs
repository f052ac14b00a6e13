//! Deck - individual track player with stem busses
//!
//! A deck renders either the full mix or the four separated stems of its
//! loaded track, reading at a variable playback rate through linear
//! interpolation (tempo nudging shifts pitch - there is deliberately no
//! time-stretching in this engine). Per-stem gains are smoothed busses
//! summed before the channel EQ.

use std::sync::atomic::{AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use basedrop::Shared;
use rayon::prelude::*;

use super::smooth::SmoothedParam;
use super::MAX_BUFFER_SIZE;
use crate::error::{EngineError, EngineResult};
use crate::loader::LoadedTrack;
use crate::types::{DeckId, PlayState, Stem, StereoBuffer, StereoSample, NUM_STEMS};

/// What a deck is actually rendering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackMode {
    /// Single full-mix source
    FullMix,
    /// Four stem busses (only when the stem set is complete)
    Stems,
}

/// Lock-free playback state for control-thread reads
///
/// The audio thread stores into these after every buffer; the UI reads them
/// without touching the engine. Relaxed ordering - visibility is all that is
/// needed.
pub struct DeckAtomics {
    /// Playhead position in track frames
    position: AtomicU64,
    /// 0 = stopped, 1 = playing
    state: AtomicU8,
    /// Sample rate of the loaded track's buffers (0 when empty)
    track_sample_rate: AtomicU32,
}

impl DeckAtomics {
    fn new() -> Self {
        Self {
            position: AtomicU64::new(0),
            state: AtomicU8::new(0),
            track_sample_rate: AtomicU32::new(0),
        }
    }

    /// Playhead in track frames
    #[inline]
    pub fn position(&self) -> u64 {
        self.position.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn is_playing(&self) -> bool {
        self.state.load(Ordering::Relaxed) == 1
    }

    #[inline]
    pub fn play_state(&self) -> PlayState {
        if self.is_playing() {
            PlayState::Playing
        } else {
            PlayState::Stopped
        }
    }

    /// Playhead in seconds (0.0 while no track is loaded)
    pub fn position_seconds(&self) -> f64 {
        let sr = self.track_sample_rate.load(Ordering::Relaxed);
        if sr == 0 {
            return 0.0;
        }
        self.position() as f64 / sr as f64
    }
}

impl Default for DeckAtomics {
    fn default() -> Self {
        Self::new()
    }
}

/// Linear interpolation read at a fractional frame position
///
/// Out-of-range positions read as silence, so a playhead running off either
/// end degrades gracefully.
#[inline]
fn read_linear(data: &[StereoSample], position: f64) -> StereoSample {
    let len = data.len();
    if len == 0 || position < 0.0 {
        return StereoSample::silence();
    }
    let index = position.floor() as usize;
    if index >= len {
        return StereoSample::silence();
    }
    let frac = (position - index as f64) as f32;
    let s0 = data[index];
    let s1 = if index + 1 < len { data[index + 1] } else { StereoSample::silence() };
    StereoSample {
        left: s0.left + (s1.left - s0.left) * frac,
        right: s0.right + (s1.right - s0.right) * frac,
    }
}

/// A single deck
pub struct Deck {
    id: DeckId,
    /// Loaded track, shared with the control thread. Dropping the last
    /// reference on the audio thread defers deallocation to the GC thread.
    track: Option<Shared<LoadedTrack>>,
    /// Fractional playhead in track frames
    position: f64,
    state: PlayState,
    /// Playback rate multiplier, always > 0 (validated at the setter)
    rate: f64,
    /// Whether the user asked for stem playback
    stem_mode: bool,
    /// What is actually sounding right now
    active_mode: PlaybackMode,
    /// Per-stem bus gains (smoothed)
    stem_gains: [SmoothedParam; NUM_STEMS],
    atomics: Arc<DeckAtomics>,
    /// Pre-allocated per-stem render buffers (no allocation in the callback)
    stem_buffers: [StereoBuffer; NUM_STEMS],
    /// Engine output sample rate, for rate conversion of foreign-rate tracks
    engine_sample_rate: u32,
}

impl Deck {
    pub fn new(id: DeckId, engine_sample_rate: u32) -> Self {
        Self {
            id,
            track: None,
            position: 0.0,
            state: PlayState::Stopped,
            rate: 1.0,
            stem_mode: false,
            active_mode: PlaybackMode::FullMix,
            stem_gains: std::array::from_fn(|_| SmoothedParam::new(1.0, engine_sample_rate)),
            atomics: Arc::new(DeckAtomics::new()),
            stem_buffers: std::array::from_fn(|_| StereoBuffer::silence(MAX_BUFFER_SIZE)),
            engine_sample_rate,
        }
    }

    pub fn id(&self) -> DeckId {
        self.id
    }

    /// Lock-free state handle for the control thread
    pub fn atomics(&self) -> Arc<DeckAtomics> {
        Arc::clone(&self.atomics)
    }

    #[inline]
    fn sync_state_atomic(&self) {
        let state_val = match self.state {
            PlayState::Stopped => 0,
            PlayState::Playing => 1,
        };
        self.atomics.state.store(state_val, Ordering::Relaxed);
    }

    #[inline]
    fn sync_position_atomic(&self) {
        self.atomics.position.store(self.position as u64, Ordering::Relaxed);
    }

    /// Load a track. Does not start playback: Empty/Paused -> Loaded.
    pub fn load_track(&mut self, track: Shared<LoadedTrack>) {
        let sr = track.sample_rate;
        self.track = Some(track);
        self.position = 0.0;
        self.state = PlayState::Stopped;
        self.active_mode = PlaybackMode::FullMix;
        for gain in &mut self.stem_gains {
            gain.set_target(1.0);
            gain.snap();
        }
        self.atomics.track_sample_rate.store(sr, Ordering::Relaxed);
        self.sync_position_atomic();
        self.sync_state_atomic();
        log::info!("deck {}: loaded track {}", self.id, self.track.as_ref().map(|t| t.id).unwrap_or(-1));
    }

    /// Unload the current track (the only way out of Playing besides pause)
    pub fn unload_track(&mut self) {
        self.track = None;
        self.position = 0.0;
        self.state = PlayState::Stopped;
        self.atomics.track_sample_rate.store(0, Ordering::Relaxed);
        self.sync_position_atomic();
        self.sync_state_atomic();
    }

    pub fn has_track(&self) -> bool {
        self.track.is_some()
    }

    pub fn track(&self) -> Option<&Shared<LoadedTrack>> {
        self.track.as_ref()
    }

    pub fn state(&self) -> PlayState {
        self.state
    }

    /// The mode that would be (or is being) rendered
    pub fn active_mode(&self) -> PlaybackMode {
        self.active_mode
    }

    /// True when a complete stem set is available for this deck
    pub fn can_play_stems(&self) -> bool {
        self.track
            .as_ref()
            .and_then(|t| t.stems.as_ref())
            .map(|s| s.is_complete())
            .unwrap_or(false)
    }

    /// Pick the playback mode for the current stem_mode flag and stem set.
    /// An incomplete stem set falls back to the full mix - never a partial
    /// subset of stems playing silently short.
    fn resolve_mode(&self) -> PlaybackMode {
        if self.stem_mode && self.can_play_stems() {
            PlaybackMode::Stems
        } else {
            PlaybackMode::FullMix
        }
    }

    /// Start playback from the current position
    ///
    /// Fails loudly on an empty deck - that is a caller bug, unlike the
    /// other controls which are no-ops when empty. Returns the mode actually
    /// selected so callers can observe the stem fallback.
    pub fn play(&mut self) -> EngineResult<PlaybackMode> {
        if self.track.is_none() {
            return Err(EngineError::EmptyDeck(self.id));
        }
        self.active_mode = self.resolve_mode();
        if self.stem_mode && self.active_mode == PlaybackMode::FullMix {
            log::warn!("deck {}: stems incomplete, falling back to full mix", self.id);
        }
        self.state = PlayState::Playing;
        self.sync_state_atomic();
        Ok(self.active_mode)
    }

    /// Pause playback, keeping the playhead as the resume point.
    /// Idempotent - pausing a stopped or empty deck is a no-op.
    pub fn pause(&mut self) {
        if self.state == PlayState::Playing {
            self.state = PlayState::Stopped;
            self.sync_state_atomic();
        }
    }

    /// Toggle play/pause. A no-op on an empty deck (the explicit `play`
    /// path is the one that must fail loudly).
    pub fn toggle_play(&mut self) {
        if self.track.is_none() {
            return;
        }
        match self.state {
            PlayState::Playing => self.pause(),
            PlayState::Stopped => {
                let _ = self.play();
            }
        }
    }

    /// Jump to a position in seconds (clamped to the track). No-op if empty.
    pub fn seek(&mut self, seconds: f64) {
        if let Some(track) = &self.track {
            let max = track.duration_frames().saturating_sub(1) as f64;
            self.position = (seconds.max(0.0) * track.sample_rate as f64).min(max);
            self.sync_position_atomic();
        }
    }

    /// Playhead in seconds; frozen while paused
    pub fn current_time(&self) -> f64 {
        match &self.track {
            Some(track) => self.position / track.sample_rate as f64,
            None => 0.0,
        }
    }

    /// Set the playback rate. Rejects rates at or below zero.
    pub fn set_rate(&mut self, rate: f64) -> EngineResult<()> {
        if rate <= 0.0 {
            return Err(EngineError::InvalidRate { deck: self.id, rate });
        }
        self.rate = rate;
        Ok(())
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Enable or disable stem playback. Stem and full-mix sources are
    /// mutually exclusive, so switching while playing restarts the deck's
    /// sources at the current playhead.
    pub fn set_stem_mode(&mut self, enabled: bool) {
        self.stem_mode = enabled;
        if self.state == PlayState::Playing {
            let next = self.resolve_mode();
            if next != self.active_mode {
                self.active_mode = next;
                log::debug!("deck {}: switched sources to {:?} mid-play", self.id, next);
            }
        }
    }

    pub fn stem_mode(&self) -> bool {
        self.stem_mode
    }

    /// Set a stem bus gain in [0, 1] (smoothed). Safe no-op when empty or in
    /// full-mix playback - the target still sticks for the next stem start.
    pub fn set_stem_gain(&mut self, stem: Stem, gain: f32) {
        self.stem_gains[stem as usize].set_target(gain.clamp(0.0, 1.0));
    }

    pub fn stem_gain(&self, stem: Stem) -> f32 {
        self.stem_gains[stem as usize].target()
    }

    /// Frames the playhead advances per output frame
    fn step(&self, track_sample_rate: u32) -> f64 {
        self.rate * track_sample_rate as f64 / self.engine_sample_rate as f64
    }

    /// Render one buffer of deck output
    ///
    /// Stems render in parallel into the pre-allocated per-stem buffers and
    /// are then summed; the full mix reads directly. Reaching the end of the
    /// track stops the deck.
    pub fn process(&mut self, output: &mut StereoBuffer) {
        let Some(track) = self.track.as_ref() else {
            output.fill_silence();
            return;
        };
        if self.state != PlayState::Playing {
            output.fill_silence();
            return;
        }

        // Cheap pointer clone so the parallel closures can borrow the track
        // while the stem buffers are mutably split.
        let track = Shared::clone(track);
        let buffer_len = output.len();
        let start_pos = self.position;
        let step = self.step(track.sample_rate);

        match self.active_mode {
            PlaybackMode::FullMix => {
                let data = track.full.as_slice();
                let mut pos = start_pos;
                for frame in output.iter_mut() {
                    *frame = read_linear(data, pos);
                    pos += step;
                }
            }
            PlaybackMode::Stems => {
                // play() only selects Stems with a complete set, but the
                // fallback read keeps a torn state safe.
                let stems = track.stems.as_ref();
                for buf in &mut self.stem_buffers {
                    buf.set_len_from_capacity(buffer_len);
                }

                self.stem_buffers
                    .par_iter_mut()
                    .zip(self.stem_gains.par_iter_mut())
                    .enumerate()
                    .for_each(|(stem_idx, (stem_buffer, gain))| {
                        let stem = Stem::ALL[stem_idx];
                        let Some(data) = stems.map(|s| s.get(stem).as_slice()) else {
                            stem_buffer.fill_silence();
                            return;
                        };
                        let mut pos = start_pos;
                        for frame in stem_buffer.iter_mut() {
                            *frame = read_linear(data, pos) * gain.step();
                            pos += step;
                        }
                    });

                output.fill_silence();
                for stem_buffer in &self.stem_buffers {
                    output.add_buffer(stem_buffer);
                }
            }
        }

        // Advance the playhead; stop at the end of the track
        self.position += buffer_len as f64 * step;
        let duration = track.duration_frames() as f64;
        if self.position >= duration {
            self.position = (duration - 1.0).max(0.0);
            self.state = PlayState::Stopped;
            self.sync_state_atomic();
            log::info!("deck {}: reached end of track", self.id);
        }
        self.sync_position_atomic();
    }
}
