//! CPAL output backend
//!
//! Builds the output stream and moves the engine into the data callback.
//! The callback is the only code that ever touches the engine after startup:
//! it drains the command queue, renders the master bus into a pre-allocated
//! buffer, and interleaves into the device's frame layout.

use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use super::config::{AudioConfig, BufferSize};
use super::error::{AudioError, AudioResult};
use crate::engine::{command_channel, DeckAtomics, EngineClock, EngineCommand, MixEngine, MAX_BUFFER_SIZE};
use crate::types::{StereoBuffer, NUM_DECKS};

/// Command sender for the control thread
///
/// Wraps the lock-free producer; every send is wait-free. A full queue
/// returns the command so the caller can retry or drop it.
pub struct CommandSender {
    producer: rtrb::Producer<EngineCommand>,
}

impl CommandSender {
    /// Wrap the producer half of a [`command_channel`]
    pub fn new(producer: rtrb::Producer<EngineCommand>) -> Self {
        Self { producer }
    }

    /// Queue a command for the audio thread (non-blocking)
    pub fn send(&mut self, cmd: EngineCommand) -> Result<(), EngineCommand> {
        self.producer.push(cmd).map_err(|e| match e {
            rtrb::PushError::Full(value) => {
                log::warn!("engine command queue full, command dropped back to caller");
                value
            }
        })
    }
}

/// Keeps the output stream alive; drop to stop audio
pub struct AudioHandle {
    _stream: cpal::Stream,
    sample_rate: u32,
}

impl AudioHandle {
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

/// Everything the control thread needs after startup
pub struct AudioSystemResult {
    /// Keeps the stream alive
    pub handle: AudioHandle,
    /// Lock-free command path into the engine
    pub command_sender: CommandSender,
    /// Per-deck lock-free state
    pub deck_atomics: [Arc<DeckAtomics>; NUM_DECKS],
    /// The engine's monotonic audio clock
    pub clock: Arc<EngineClock>,
    /// Negotiated stream sample rate
    pub sample_rate: u32,
}

/// Start the audio system: engine, command queue, and output stream
pub fn start_audio_system(config: &AudioConfig) -> AudioResult<AudioSystemResult> {
    let host = cpal::default_host();

    let device = match &config.device {
        Some(name) => host
            .output_devices()
            .map_err(|e| AudioError::ConfigError(e.to_string()))?
            .find(|d| d.name().map(|n| n == *name).unwrap_or(false))
            .ok_or_else(|| AudioError::DeviceNotFound(name.clone()))?,
        None => host.default_output_device().ok_or(AudioError::NoDevices)?,
    };

    let default_config = device
        .default_output_config()
        .map_err(|e| AudioError::ConfigError(e.to_string()))?;

    if default_config.sample_format() != cpal::SampleFormat::F32 {
        return Err(AudioError::UnsupportedFormat(format!(
            "{:?}",
            default_config.sample_format()
        )));
    }

    let sample_rate = default_config.sample_rate().0;
    let channels = default_config.channels() as usize;

    let mut stream_config: cpal::StreamConfig = default_config.into();
    if let BufferSize::Fixed(frames) = config.buffer_size {
        stream_config.buffer_size = cpal::BufferSize::Fixed(frames);
    }

    let mut engine = MixEngine::new(sample_rate);
    let deck_atomics = engine.deck_atomics();
    let clock = engine.clock();
    let (producer, mut consumer) = command_channel();

    let mut render_buffer = StereoBuffer::silence(MAX_BUFFER_SIZE);

    let stream = device
        .build_output_stream(
            &stream_config,
            move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                engine.process_commands(&mut consumer);

                let frames = data.len() / channels;
                if frames == 0 {
                    return;
                }
                render_buffer.set_len_from_capacity(frames.min(MAX_BUFFER_SIZE));
                engine.process(&mut render_buffer);

                // Interleave into the device layout; channels beyond stereo
                // stay silent.
                for (frame_idx, frame) in data.chunks_exact_mut(channels).enumerate() {
                    let sample = render_buffer[frame_idx.min(render_buffer.len() - 1)];
                    frame[0] = sample.left;
                    if channels > 1 {
                        frame[1] = sample.right;
                    }
                    for extra in frame.iter_mut().skip(2) {
                        *extra = 0.0;
                    }
                }
            },
            |err| log::error!("audio stream error: {}", err),
            None,
        )
        .map_err(|e| AudioError::StreamBuildError(e.to_string()))?;

    stream
        .play()
        .map_err(|e| AudioError::StreamPlayError(e.to_string()))?;

    log::info!(
        "audio system started: {} Hz, {} channels",
        sample_rate,
        channels
    );

    Ok(AudioSystemResult {
        handle: AudioHandle {
            _stream: stream,
            sample_rate,
        },
        command_sender: CommandSender::new(producer),
        deck_atomics,
        clock,
        sample_rate,
    })
}
