//! Mixer - combines the two deck outputs
//!
//! Per-deck channel strip (3-band EQ + smoothed volume fader), equal-power
//! crossfader, and smoothed master gain. All gains ramp; nothing jumps.

use rayon::prelude::*;

use super::eq::{EqBand, ThreeBandEq};
use super::smooth::SmoothedParam;
use crate::types::{DeckId, StereoBuffer, NUM_DECKS};

/// Per-deck gain multipliers for a crossfader position in [-1, 1]
///
/// Equal-power law: position is normalized to [0, 1], then
/// `gain_a = cos(n * pi/2)`, `gain_b = sin(n * pi/2)`. The two gains always
/// satisfy a^2 + b^2 = 1, so perceived combined loudness stays constant
/// across the sweep - unlike a linear blend, which dips in the middle.
pub fn equal_power_gains(position: f32) -> (f32, f32) {
    let normalized = (position.clamp(-1.0, 1.0) + 1.0) / 2.0;
    let angle = normalized * std::f32::consts::FRAC_PI_2;
    (angle.cos(), angle.sin())
}

/// Channel strip for a single deck: EQ then volume fader
pub struct ChannelStrip {
    /// Three-band EQ, gains in [-1, 1]
    pub eq: ThreeBandEq,
    volume: SmoothedParam,
}

impl ChannelStrip {
    fn new(sample_rate: u32) -> Self {
        Self {
            eq: ThreeBandEq::new(sample_rate),
            volume: SmoothedParam::new(1.0, sample_rate),
        }
    }

    /// Set the fader target (clamped to [0, 1])
    pub fn set_volume(&mut self, volume: f32) {
        self.volume.set_target(volume.clamp(0.0, 1.0));
    }

    /// The fader target (not the smoothed instantaneous value)
    pub fn volume(&self) -> f32 {
        self.volume.target()
    }

    fn reset(&mut self) {
        self.eq.reset();
        self.volume.snap();
    }
}

/// The two-deck mixer
pub struct Mixer {
    channels: [ChannelStrip; NUM_DECKS],
    /// Crossfader position in [-1, 1] (-1 = full A, +1 = full B)
    crossfader: f32,
    /// Smoothed per-deck crossfader gains
    xfade_gains: [SmoothedParam; NUM_DECKS],
    master: SmoothedParam,
}

impl Mixer {
    pub fn new(sample_rate: u32) -> Self {
        // Crossfader starts centered: both decks at cos(pi/4)
        let (gain_a, gain_b) = equal_power_gains(0.0);
        Self {
            channels: std::array::from_fn(|_| ChannelStrip::new(sample_rate)),
            crossfader: 0.0,
            xfade_gains: [
                SmoothedParam::new(gain_a, sample_rate),
                SmoothedParam::new(gain_b, sample_rate),
            ],
            master: SmoothedParam::new(1.0, sample_rate),
        }
    }

    /// Get a channel strip
    pub fn channel(&self, deck: DeckId) -> &ChannelStrip {
        &self.channels[deck.index()]
    }

    /// Get a mutable channel strip
    pub fn channel_mut(&mut self, deck: DeckId) -> &mut ChannelStrip {
        &mut self.channels[deck.index()]
    }

    /// Set the crossfader position (clamped to [-1, 1])
    pub fn set_crossfader(&mut self, position: f32) {
        self.crossfader = position.clamp(-1.0, 1.0);
        let (gain_a, gain_b) = equal_power_gains(self.crossfader);
        self.xfade_gains[0].set_target(gain_a);
        self.xfade_gains[1].set_target(gain_b);
    }

    /// Current crossfader position
    pub fn crossfader(&self) -> f32 {
        self.crossfader
    }

    /// The (deck A, deck B) gain targets for the current position
    pub fn crossfader_gains(&self) -> (f32, f32) {
        (self.xfade_gains[0].target(), self.xfade_gains[1].target())
    }

    /// Set master volume (clamped to [0, 1])
    pub fn set_master_volume(&mut self, volume: f32) {
        self.master.set_target(volume.clamp(0.0, 1.0));
    }

    pub fn master_volume(&self) -> f32 {
        self.master.target()
    }

    /// Process both deck buffers and sum into the master output
    ///
    /// EQ runs per channel in parallel (one deck per thread), then the
    /// summing pass applies fader, crossfader, and master gains with
    /// per-sample smoothing.
    pub fn process(&mut self, deck_buffers: &mut [StereoBuffer; NUM_DECKS], master_out: &mut StereoBuffer) {
        let buffer_len = master_out.len();
        master_out.fill_silence();

        self.channels
            .par_iter_mut()
            .zip(deck_buffers.par_iter_mut())
            .for_each(|(channel, buffer)| {
                channel.eq.process(buffer);
            });

        let out = master_out.as_mut_slice();
        for deck_idx in 0..NUM_DECKS {
            let buffer = &deck_buffers[deck_idx];
            let channel = &mut self.channels[deck_idx];
            let xfade = &mut self.xfade_gains[deck_idx];
            for (i, frame) in out.iter_mut().enumerate().take(buffer_len.min(buffer.len())) {
                let gain = channel.volume.step() * xfade.step();
                *frame += buffer[i] * gain;
            }
        }

        for frame in out.iter_mut() {
            *frame *= self.master.step();
        }
    }

    /// Reset all filter state and snap smoothed gains (stream restart)
    pub fn reset(&mut self) {
        for channel in &mut self.channels {
            channel.reset();
        }
        for gain in &mut self.xfade_gains {
            gain.snap();
        }
        self.master.snap();
    }
}
