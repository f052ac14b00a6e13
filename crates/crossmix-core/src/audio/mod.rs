//! Audio output backend
//!
//! CPAL-based output: the audio callback exclusively owns the [`MixEngine`],
//! drains the command queue at each buffer boundary, renders the master bus,
//! and writes interleaved frames to the device. The control thread keeps the
//! [`CommandSender`], the deck atomics, and the engine clock.
//!
//! ```ignore
//! let result = start_audio_system(&AudioConfig::default())?;
//! result.command_sender.send(EngineCommand::Play { deck: DeckId::A })?;
//! let playhead = result.deck_atomics[0].position_seconds();
//! ```

mod config;
mod cpal_backend;
mod error;

pub use config::{AudioConfig, BufferSize};
pub use cpal_backend::{start_audio_system, AudioHandle, AudioSystemResult, CommandSender};
pub use error::{AudioError, AudioResult};
