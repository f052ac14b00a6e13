//! Audio engine - decks, mixer, metronome, command queue
//!
//! The engine components for the two-deck mixer:
//! - Deck: per-deck playback with stem busses and variable rate
//! - Mixer: 3-band EQ, smoothed gains, equal-power crossfader
//! - Metronome: synthesized drum-loop practice metronome
//! - MixEngine: ties everything together on the audio thread
//! - EngineCommand: lock-free control from the UI thread

mod command;
mod deck;
mod engine;
mod eq;
pub mod gc;
mod metronome;
mod mixer;
mod smooth;

pub use command::*;
pub use deck::*;
pub use engine::*;
pub use eq::{EqBand, ThreeBandEq};
pub use metronome::*;
pub use mixer::*;
pub use smooth::SmoothedParam;
