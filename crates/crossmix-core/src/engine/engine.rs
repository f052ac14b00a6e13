//! Main mix engine - two decks, mixer, metronome, and the audio clock

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use basedrop::Shared;

use super::command::EngineCommand;
use super::deck::{Deck, DeckAtomics, PlaybackMode};
use super::eq::EqBand;
use super::metronome::Metronome;
use super::mixer::Mixer;
use crate::error::EngineResult;
use crate::loader::LoadedTrack;
use crate::types::{DeckId, Stem, StereoBuffer, NUM_DECKS};

/// Nominal processing buffer size in frames
pub const BUFFER_SIZE: usize = 256;

/// Maximum buffer size to pre-allocate for real-time safety. Covers every
/// common device configuration, so the callback never allocates.
pub const MAX_BUFFER_SIZE: usize = 8192;

/// Monotonic audio clock, advanced by the engine as it renders
///
/// The sample counter is the single source of truth for elapsed time: the
/// transition executor reads [`EngineClock::seconds`] as "now", and UI
/// polling at any coarser cadence stays correct.
pub struct EngineClock {
    samples: AtomicU64,
    sample_rate: u32,
}

impl EngineClock {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            samples: AtomicU64::new(0),
            sample_rate,
        }
    }

    /// Advance by a rendered buffer (audio thread only)
    #[inline]
    pub fn advance(&self, frames: u64) {
        self.samples.fetch_add(frames, Ordering::Relaxed);
    }

    /// Total frames rendered since the engine started
    #[inline]
    pub fn samples(&self) -> u64 {
        self.samples.load(Ordering::Relaxed)
    }

    /// Elapsed audio time in seconds
    pub fn seconds(&self) -> f64 {
        self.samples() as f64 / self.sample_rate as f64
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

/// The main audio engine
///
/// Owned exclusively by the audio thread; the control thread talks to it
/// through the [`EngineCommand`] queue and reads state through atomics.
/// Construct one per application (or per test) - there is deliberately no
/// global instance.
pub struct MixEngine {
    decks: [Deck; NUM_DECKS],
    mixer: Mixer,
    metronome: Metronome,
    clock: Arc<EngineClock>,
    sample_rate: u32,
    /// Pre-allocated per-deck render buffers
    deck_buffers: [StereoBuffer; NUM_DECKS],
}

impl MixEngine {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            decks: [
                Deck::new(DeckId::A, sample_rate),
                Deck::new(DeckId::B, sample_rate),
            ],
            mixer: Mixer::new(sample_rate),
            metronome: Metronome::new(sample_rate),
            clock: Arc::new(EngineClock::new(sample_rate)),
            sample_rate,
            deck_buffers: std::array::from_fn(|_| StereoBuffer::silence(MAX_BUFFER_SIZE)),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Shared clock handle for schedulers on the control thread
    pub fn clock(&self) -> Arc<EngineClock> {
        Arc::clone(&self.clock)
    }

    pub fn deck(&self, id: DeckId) -> &Deck {
        &self.decks[id.index()]
    }

    pub fn deck_mut(&mut self, id: DeckId) -> &mut Deck {
        &mut self.decks[id.index()]
    }

    /// Lock-free atomics for both decks (grab once at startup)
    pub fn deck_atomics(&self) -> [Arc<DeckAtomics>; NUM_DECKS] {
        std::array::from_fn(|i| self.decks[i].atomics())
    }

    pub fn mixer(&self) -> &Mixer {
        &self.mixer
    }

    pub fn mixer_mut(&mut self) -> &mut Mixer {
        &mut self.mixer
    }

    // --- Deck transport ---

    pub fn load_track(&mut self, deck: DeckId, track: Shared<LoadedTrack>) {
        self.decks[deck.index()].load_track(track);
    }

    pub fn unload_track(&mut self, deck: DeckId) {
        self.decks[deck.index()].unload_track();
    }

    /// Start a deck. Fails loudly on an empty deck; reports the playback
    /// mode actually chosen (stems may fall back to the full mix).
    pub fn play(&mut self, deck: DeckId) -> EngineResult<PlaybackMode> {
        self.decks[deck.index()].play()
    }

    pub fn pause(&mut self, deck: DeckId) {
        self.decks[deck.index()].pause();
    }

    pub fn toggle_play(&mut self, deck: DeckId) {
        self.decks[deck.index()].toggle_play();
    }

    pub fn seek(&mut self, deck: DeckId, seconds: f64) {
        self.decks[deck.index()].seek(seconds);
    }

    /// Playhead position in seconds (frozen while paused)
    pub fn current_time(&self, deck: DeckId) -> f64 {
        self.decks[deck.index()].current_time()
    }

    pub fn set_playback_rate(&mut self, deck: DeckId, rate: f64) -> EngineResult<()> {
        self.decks[deck.index()].set_rate(rate)
    }

    pub fn set_stem_mode(&mut self, deck: DeckId, enabled: bool) {
        self.decks[deck.index()].set_stem_mode(enabled);
    }

    pub fn can_play_stems(&self, deck: DeckId) -> bool {
        self.decks[deck.index()].can_play_stems()
    }

    pub fn set_stem_gain(&mut self, deck: DeckId, stem: Stem, gain: f32) {
        self.decks[deck.index()].set_stem_gain(stem, gain);
    }

    // --- Mixer controls ---

    pub fn set_volume(&mut self, deck: DeckId, volume: f32) {
        self.mixer.channel_mut(deck).set_volume(volume);
    }

    pub fn set_eq(&mut self, deck: DeckId, band: EqBand, gain: f32) {
        self.mixer.channel_mut(deck).eq.set_gain(band, gain);
    }

    pub fn set_crossfader(&mut self, position: f32) {
        self.mixer.set_crossfader(position);
    }

    /// The (deck A, deck B) equal-power gain pair for the current position
    pub fn crossfader_gains(&self) -> (f32, f32) {
        self.mixer.crossfader_gains()
    }

    pub fn set_master_volume(&mut self, volume: f32) {
        self.mixer.set_master_volume(volume);
    }

    // --- Metronome ---

    pub fn metronome(&self) -> &Metronome {
        &self.metronome
    }

    pub fn metronome_start(&mut self) {
        self.metronome.start();
    }

    pub fn metronome_stop(&mut self) {
        self.metronome.stop();
    }

    pub fn set_metronome_bpm(&mut self, bpm: f64) {
        self.metronome.set_bpm(bpm);
    }

    // --- Audio thread entry points ---

    /// Drain and apply pending control commands (start of each callback)
    pub fn process_commands(&mut self, rx: &mut rtrb::Consumer<EngineCommand>) {
        while let Ok(cmd) = rx.pop() {
            self.apply_command(cmd);
        }
    }

    fn apply_command(&mut self, cmd: EngineCommand) {
        match cmd {
            EngineCommand::LoadTrack { deck, track } => self.load_track(deck, track),
            EngineCommand::UnloadTrack { deck } => self.unload_track(deck),
            EngineCommand::Play { deck } => {
                if let Err(e) = self.play(deck) {
                    // Queue commands cannot return errors; a play on an
                    // empty deck is a caller bug and gets logged loudly.
                    log::error!("engine command failed: {}", e);
                }
            }
            EngineCommand::Pause { deck } => self.pause(deck),
            EngineCommand::TogglePlay { deck } => self.toggle_play(deck),
            EngineCommand::Seek { deck, seconds } => self.seek(deck, seconds),
            EngineCommand::SetPlaybackRate { deck, rate } => {
                if let Err(e) = self.set_playback_rate(deck, rate) {
                    log::error!("engine command failed: {}", e);
                }
            }
            EngineCommand::SetStemMode { deck, enabled } => self.set_stem_mode(deck, enabled),
            EngineCommand::SetStemGain { deck, stem, gain } => self.set_stem_gain(deck, stem, gain),
            EngineCommand::SetVolume { deck, volume } => self.set_volume(deck, volume),
            EngineCommand::SetEq { deck, band, gain } => self.set_eq(deck, band, gain),
            EngineCommand::SetCrossfader { position } => self.set_crossfader(position),
            EngineCommand::SetMasterVolume { volume } => self.set_master_volume(volume),
            EngineCommand::MetronomeStart => self.metronome_start(),
            EngineCommand::MetronomeStop => self.metronome_stop(),
            EngineCommand::SetMetronomeBpm(bpm) => self.set_metronome_bpm(bpm),
        }
    }

    /// Render one buffer of master output and advance the clock
    pub fn process(&mut self, master_out: &mut StereoBuffer) {
        let buffer_len = master_out.len();

        for buf in &mut self.deck_buffers {
            buf.set_len_from_capacity(buffer_len);
        }

        for deck_idx in 0..NUM_DECKS {
            self.decks[deck_idx].process(&mut self.deck_buffers[deck_idx]);
        }

        self.mixer.process(&mut self.deck_buffers, master_out);
        self.metronome.render(master_out);

        self.clock.advance(buffer_len as u64);
    }
}
