//! Crossmix Core - two-deck DJ mixing engine
//!
//! Owns the real-time audio graph (decks, EQ, crossfader, metronome), the
//! lock-free command queue between the control thread and the audio thread,
//! the decoded-buffer loader/cache, and the CPAL output backend. The
//! auto-mixing logic (compatibility scoring, transition planning/execution)
//! lives in the `crossmix-auto` crate on top of this one.

pub mod analysis;
pub mod audio;
pub mod config;
pub mod engine;
pub mod error;
pub mod loader;
pub mod music;
pub mod snapshot;
pub mod types;

pub use types::*;
