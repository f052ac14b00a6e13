//! Lock-free command queue for engine control
//!
//! The control thread pushes commands into an `rtrb` SPSC ring buffer; the
//! audio thread drains them at buffer boundaries. Both sides are wait-free,
//! so a slow UI can never starve the callback and a busy callback can never
//! block the UI. Commands stay small - the one large payload (a loaded
//! track) travels as a pointer-sized `basedrop::Shared`.

use basedrop::Shared;

use super::eq::EqBand;
use crate::loader::LoadedTrack;
use crate::types::{DeckId, Stem};

/// Commands sent from the control thread to the audio thread
///
/// Each variant is one atomic operation applied at a frame boundary, so no
/// state change ever lands mid-buffer.
pub enum EngineCommand {
    // Track management
    /// Load a decoded track onto a deck (does not start playback)
    LoadTrack {
        deck: DeckId,
        track: Shared<LoadedTrack>,
    },
    /// Unload a deck's track
    UnloadTrack { deck: DeckId },

    // Transport
    Play { deck: DeckId },
    Pause { deck: DeckId },
    TogglePlay { deck: DeckId },
    /// Jump to a position in seconds
    Seek { deck: DeckId, seconds: f64 },
    /// Set playback rate (> 0; the engine rejects and logs invalid rates)
    SetPlaybackRate { deck: DeckId, rate: f64 },

    // Stems
    /// Select stem vs full-mix playback (restarts sources when playing)
    SetStemMode { deck: DeckId, enabled: bool },
    /// Set one stem bus gain (0-1)
    SetStemGain { deck: DeckId, stem: Stem, gain: f32 },

    // Mixer
    /// Channel volume fader (0-1)
    SetVolume { deck: DeckId, volume: f32 },
    /// Channel EQ band gain (-1 = kill, 0 = flat, +1 = boost)
    SetEq { deck: DeckId, band: EqBand, gain: f32 },
    /// Crossfader position (-1 = full A, +1 = full B), equal-power law
    SetCrossfader { position: f32 },
    /// Master output volume (0-1)
    SetMasterVolume { volume: f32 },

    // Metronome
    MetronomeStart,
    MetronomeStop,
    SetMetronomeBpm(f64),
}

/// Capacity of the command queue
///
/// A transition executor tick writes at most a dozen parameter commands;
/// 256 leaves generous headroom even with manual tweaking on top.
pub const COMMAND_QUEUE_CAPACITY: usize = 256;

/// Create the command channel (producer for the control thread, consumer
/// for the audio thread)
pub fn command_channel() -> (rtrb::Producer<EngineCommand>, rtrb::Consumer<EngineCommand>) {
    rtrb::RingBuffer::new(COMMAND_QUEUE_CAPACITY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_roundtrip() {
        let (mut tx, mut rx) = command_channel();
        tx.push(EngineCommand::Play { deck: DeckId::A }).unwrap();
        let cmd = rx.pop().unwrap();
        assert!(matches!(cmd, EngineCommand::Play { deck: DeckId::A }));
    }

    #[test]
    fn empty_channel_pops_err() {
        let (_tx, mut rx) = command_channel();
        assert!(rx.pop().is_err());
    }

    #[test]
    fn command_stays_cache_friendly() {
        // The queue copies commands; keep the enum within a cache line.
        // Largest variants are Seek/SetPlaybackRate (DeckId + f64).
        let size = std::mem::size_of::<EngineCommand>();
        assert!(size <= 24, "EngineCommand is {} bytes", size);
    }
}
