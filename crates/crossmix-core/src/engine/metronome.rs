//! Drum-loop metronome
//!
//! Synthesizes a fixed 4/4 practice pattern - kick on beats 1 and 3, snare
//! on 2 and 4, closed hat on every beat - directly into the master bus.
//! Events are placed sample-accurately inside each render buffer, so beat
//! timing never depends on control-thread timer jitter. Changing the BPM
//! restarts the pattern phase at the new tempo.

use crate::types::{Sample, StereoBuffer, StereoSample};

pub const MIN_METRONOME_BPM: f64 = 60.0;
pub const MAX_METRONOME_BPM: f64 = 180.0;
pub const DEFAULT_METRONOME_BPM: f64 = 120.0;

/// Beats per bar of the fixed pattern
const PATTERN_BEATS: u32 = 4;

/// Maximum simultaneously-decaying drum voices. Three voices spawn per beat
/// at most, and every voice dies well within one beat at 60 BPM.
const MAX_VOICES: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DrumHit {
    Kick,
    Snare,
    Hat,
}

impl DrumHit {
    /// Voice length in seconds
    fn duration(self) -> f64 {
        match self {
            DrumHit::Kick => 0.12,
            DrumHit::Snare => 0.15,
            DrumHit::Hat => 0.03,
        }
    }
}

/// Cheap deterministic noise (hashed sine), good enough for hats and snares
#[inline]
fn noise(n: usize) -> Sample {
    ((n as f32 * 7919.0).sin() * 43_758.547).fract() * 2.0 - 1.0
}

/// One decaying drum voice
#[derive(Debug, Clone, Copy)]
struct Voice {
    hit: DrumHit,
    /// Frames since the voice was triggered
    age: usize,
}

impl Voice {
    /// Render one frame of this voice
    fn sample(&self, sample_rate: u32) -> Sample {
        let t = self.age as f32 / sample_rate as f32;
        match self.hit {
            DrumHit::Kick => {
                // Sine sweep 150 -> 50 Hz with a fast exponential decay
                let sweep = (t / 0.12).min(1.0);
                let freq = 150.0 - 100.0 * sweep;
                let env = (-t * 25.0).exp();
                0.6 * env * (2.0 * std::f32::consts::PI * freq * t).sin()
            }
            DrumHit::Snare => {
                // Noise burst over a short 190 Hz body
                let env = (-t * 35.0).exp();
                let body = (2.0 * std::f32::consts::PI * 190.0 * t).sin();
                env * (0.35 * noise(self.age) + 0.25 * body)
            }
            DrumHit::Hat => {
                let env = (-t * 200.0).exp();
                0.2 * env * noise(self.age.wrapping_mul(3))
            }
        }
    }

    fn finished(&self, sample_rate: u32) -> bool {
        self.age as f64 / sample_rate as f64 >= self.hit.duration()
    }
}

/// The drum-loop metronome
pub struct Metronome {
    running: bool,
    bpm: f64,
    sample_rate: u32,
    /// Beat index within the bar (0-3)
    beat_index: u32,
    /// Frames until the next beat fires (fractional, tracks tempo exactly)
    frames_until_beat: f64,
    /// Active voices; fixed-size slab, no allocation in the callback
    voices: [Option<Voice>; MAX_VOICES],
}

impl Metronome {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            running: false,
            bpm: DEFAULT_METRONOME_BPM,
            sample_rate,
            beat_index: 0,
            frames_until_beat: 0.0,
            voices: [None; MAX_VOICES],
        }
    }

    /// Start the loop on beat 1. Idempotent - starting a running metronome
    /// does not reset the pattern.
    pub fn start(&mut self) {
        if self.running {
            return;
        }
        self.running = true;
        self.beat_index = 0;
        self.frames_until_beat = 0.0;
        log::info!("metronome started at {} BPM", self.bpm);
    }

    /// Stop the loop. Idempotent; already-triggered voices decay naturally.
    pub fn stop(&mut self) {
        if self.running {
            self.running = false;
            log::info!("metronome stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Set the tempo, clamped to 60-180 BPM. While running, the pattern
    /// restarts on beat 1 at the new tempo so no drift accumulates.
    pub fn set_bpm(&mut self, bpm: f64) {
        self.bpm = bpm.clamp(MIN_METRONOME_BPM, MAX_METRONOME_BPM);
        if self.running {
            self.beat_index = 0;
            self.frames_until_beat = 0.0;
        }
    }

    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    fn frames_per_beat(&self) -> f64 {
        self.sample_rate as f64 * 60.0 / self.bpm
    }

    fn trigger_beat(&mut self) {
        let hits: &[DrumHit] = match self.beat_index {
            0 | 2 => &[DrumHit::Kick, DrumHit::Hat],
            _ => &[DrumHit::Snare, DrumHit::Hat],
        };
        for &hit in hits {
            // Take a free slot, or steal the oldest voice
            let slot = self
                .voices
                .iter()
                .position(|v| v.is_none())
                .unwrap_or_else(|| {
                    self.voices
                        .iter()
                        .enumerate()
                        .max_by_key(|(_, v)| v.map(|v| v.age).unwrap_or(0))
                        .map(|(i, _)| i)
                        .unwrap_or(0)
                });
            self.voices[slot] = Some(Voice { hit, age: 0 });
        }
        self.beat_index = (self.beat_index + 1) % PATTERN_BEATS;
    }

    /// Render the metronome additively into `output`
    pub fn render(&mut self, output: &mut StereoBuffer) {
        if !self.running && self.voices.iter().all(|v| v.is_none()) {
            return;
        }

        let frames_per_beat = self.frames_per_beat();
        for frame in output.iter_mut() {
            if self.running {
                if self.frames_until_beat <= 0.0 {
                    self.trigger_beat();
                    self.frames_until_beat += frames_per_beat;
                }
                self.frames_until_beat -= 1.0;
            }

            let mut mix = 0.0;
            for voice in self.voices.iter_mut().flatten() {
                mix += voice.sample(self.sample_rate);
                voice.age += 1;
            }
            *frame += StereoSample::mono(mix);

            for voice in &mut self.voices {
                if voice.map(|v| v.finished(self.sample_rate)).unwrap_or(false) {
                    *voice = None;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SAMPLE_RATE;

    #[test]
    fn start_stop_idempotent() {
        let mut m = Metronome::new(SAMPLE_RATE);
        m.start();
        m.start();
        assert!(m.is_running());
        m.stop();
        m.stop();
        assert!(!m.is_running());
    }

    #[test]
    fn bpm_clamps_to_range() {
        let mut m = Metronome::new(SAMPLE_RATE);
        m.set_bpm(20.0);
        assert_eq!(m.bpm(), MIN_METRONOME_BPM);
        m.set_bpm(500.0);
        assert_eq!(m.bpm(), MAX_METRONOME_BPM);
        m.set_bpm(128.0);
        assert_eq!(m.bpm(), 128.0);
    }

    #[test]
    fn renders_audio_when_running() {
        let mut m = Metronome::new(SAMPLE_RATE);
        m.start();
        let mut out = StereoBuffer::silence(512);
        m.render(&mut out);
        assert!(out.peak() > 0.0, "metronome produced silence");
    }

    #[test]
    fn silent_when_never_started() {
        let mut m = Metronome::new(SAMPLE_RATE);
        let mut out = StereoBuffer::silence(512);
        m.render(&mut out);
        assert_eq!(out.peak(), 0.0);
    }

    #[test]
    fn beat_spacing_matches_bpm() {
        let mut m = Metronome::new(SAMPLE_RATE);
        m.set_bpm(120.0);
        m.start();

        // 120 BPM = one beat every 0.5s = 24000 frames. Render two beats and
        // count kick onsets by looking for energy after silence gaps.
        let frames = SAMPLE_RATE as usize; // 1 second = 2 beats
        let mut out = StereoBuffer::silence(frames);
        m.render(&mut out);

        // Beat 0 (kick) at frame 0, beat 1 (snare) at 24000
        assert!(out[0].peak().abs() < 1.0); // defined, not asserting exact phase
        let around_half = out.as_slice()[23990..24100]
            .iter()
            .map(|s| s.peak())
            .fold(0.0f32, f32::max);
        assert!(around_half > 0.01, "no hit near the second beat");
    }
}
