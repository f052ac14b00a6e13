//! Three-band channel EQ
//!
//! Low shelf / peaking mid / high shelf biquads in series. Band gains live
//! in [-1, 1]: 0 is flat, +1 is +6 dB boost, -1 is a -60 dB kill - the
//! asymmetric DJ-mixer curve where the cut side goes all the way to silence.

use serde::{Deserialize, Serialize};

use crate::types::{StereoBuffer, StereoSample, SAMPLE_RATE};

/// EQ band identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EqBand {
    Low,
    Mid,
    High,
}

impl EqBand {
    /// All bands, low to high
    pub const ALL: [EqBand; 3] = [EqBand::Low, EqBand::Mid, EqBand::High];

    #[inline]
    fn index(self) -> usize {
        match self {
            EqBand::Low => 0,
            EqBand::Mid => 1,
            EqBand::High => 2,
        }
    }
}

/// Band centers / corner frequencies
const EQ_LO_FREQ: f32 = 100.0;
const EQ_MID_FREQ: f32 = 1000.0;
const EQ_HI_FREQ: f32 = 10000.0;
const EQ_MID_Q: f32 = 0.7;

/// Gain range: boost side tops out at +6 dB, cut side reaches a -60 dB kill
const EQ_BOOST_RANGE_DB: f32 = 6.0;
const EQ_CUT_RANGE_DB: f32 = 60.0;

/// Map a [-1, 1] band gain to dB
fn band_gain_to_db(gain: f32) -> f32 {
    let gain = gain.clamp(-1.0, 1.0);
    if gain >= 0.0 {
        gain * EQ_BOOST_RANGE_DB
    } else {
        gain * EQ_CUT_RANGE_DB
    }
}

/// Biquad filter state (direct form I, stereo)
#[derive(Debug, Clone, Default)]
struct BiquadState {
    x1_l: f32, x2_l: f32, y1_l: f32, y2_l: f32,
    x1_r: f32, x2_r: f32, y1_r: f32, y2_r: f32,
}

impl BiquadState {
    #[inline]
    fn process(&mut self, input_l: f32, input_r: f32, coeffs: &BiquadCoeffs) -> (f32, f32) {
        let out_l = coeffs.b0 * input_l + coeffs.b1 * self.x1_l + coeffs.b2 * self.x2_l
            - coeffs.a1 * self.y1_l - coeffs.a2 * self.y2_l;
        self.x2_l = self.x1_l;
        self.x1_l = input_l;
        self.y2_l = self.y1_l;
        self.y1_l = out_l;

        let out_r = coeffs.b0 * input_r + coeffs.b1 * self.x1_r + coeffs.b2 * self.x2_r
            - coeffs.a1 * self.y1_r - coeffs.a2 * self.y2_r;
        self.x2_r = self.x1_r;
        self.x1_r = input_r;
        self.y2_r = self.y1_r;
        self.y1_r = out_r;

        (out_l, out_r)
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Biquad coefficients (RBJ audio EQ cookbook forms)
#[derive(Debug, Clone)]
struct BiquadCoeffs {
    b0: f32, b1: f32, b2: f32,
    a1: f32, a2: f32,
}

impl BiquadCoeffs {
    fn low_shelf(freq: f32, gain_db: f32, sample_rate: f32) -> Self {
        let a = 10.0_f32.powf(gain_db / 40.0);
        let w0 = 2.0 * std::f32::consts::PI * freq / sample_rate;
        let cos_w0 = w0.cos();
        let sin_w0 = w0.sin();
        let alpha = sin_w0 / 2.0 * ((a + 1.0 / a) * (1.0 / 0.9 - 1.0) + 2.0).sqrt();

        let a0 = (a + 1.0) + (a - 1.0) * cos_w0 + 2.0 * a.sqrt() * alpha;
        Self {
            b0: (a * ((a + 1.0) - (a - 1.0) * cos_w0 + 2.0 * a.sqrt() * alpha)) / a0,
            b1: (2.0 * a * ((a - 1.0) - (a + 1.0) * cos_w0)) / a0,
            b2: (a * ((a + 1.0) - (a - 1.0) * cos_w0 - 2.0 * a.sqrt() * alpha)) / a0,
            a1: (-2.0 * ((a - 1.0) + (a + 1.0) * cos_w0)) / a0,
            a2: ((a + 1.0) + (a - 1.0) * cos_w0 - 2.0 * a.sqrt() * alpha) / a0,
        }
    }

    fn peaking(freq: f32, gain_db: f32, q: f32, sample_rate: f32) -> Self {
        let a = 10.0_f32.powf(gain_db / 40.0);
        let w0 = 2.0 * std::f32::consts::PI * freq / sample_rate;
        let cos_w0 = w0.cos();
        let sin_w0 = w0.sin();
        let alpha = sin_w0 / (2.0 * q);

        let a0 = 1.0 + alpha / a;
        Self {
            b0: (1.0 + alpha * a) / a0,
            b1: (-2.0 * cos_w0) / a0,
            b2: (1.0 - alpha * a) / a0,
            a1: (-2.0 * cos_w0) / a0,
            a2: (1.0 - alpha / a) / a0,
        }
    }

    fn high_shelf(freq: f32, gain_db: f32, sample_rate: f32) -> Self {
        let a = 10.0_f32.powf(gain_db / 40.0);
        let w0 = 2.0 * std::f32::consts::PI * freq / sample_rate;
        let cos_w0 = w0.cos();
        let sin_w0 = w0.sin();
        let alpha = sin_w0 / 2.0 * ((a + 1.0 / a) * (1.0 / 0.9 - 1.0) + 2.0).sqrt();

        let a0 = (a + 1.0) - (a - 1.0) * cos_w0 + 2.0 * a.sqrt() * alpha;
        Self {
            b0: (a * ((a + 1.0) + (a - 1.0) * cos_w0 + 2.0 * a.sqrt() * alpha)) / a0,
            b1: (-2.0 * a * ((a - 1.0) + (a + 1.0) * cos_w0)) / a0,
            b2: (a * ((a + 1.0) + (a - 1.0) * cos_w0 - 2.0 * a.sqrt() * alpha)) / a0,
            a1: (2.0 * ((a - 1.0) - (a + 1.0) * cos_w0)) / a0,
            a2: ((a + 1.0) - (a - 1.0) * cos_w0 - 2.0 * a.sqrt() * alpha) / a0,
        }
    }

    /// Unity gain, no filtering
    fn passthrough() -> Self {
        Self { b0: 1.0, b1: 0.0, b2: 0.0, a1: 0.0, a2: 0.0 }
    }
}

/// The per-deck EQ triad: low shelf -> peaking mid -> high shelf
pub struct ThreeBandEq {
    gains: [f32; 3],
    states: [BiquadState; 3],
    coeffs: [BiquadCoeffs; 3],
    sample_rate: f32,
    dirty: bool,
}

impl ThreeBandEq {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            gains: [0.0; 3],
            states: std::array::from_fn(|_| BiquadState::default()),
            coeffs: std::array::from_fn(|_| BiquadCoeffs::passthrough()),
            sample_rate: sample_rate as f32,
            dirty: false,
        }
    }

    /// Set a band gain in [-1, 1] (clamped)
    pub fn set_gain(&mut self, band: EqBand, gain: f32) {
        self.gains[band.index()] = gain.clamp(-1.0, 1.0);
        self.dirty = true;
    }

    /// Current gain for a band
    pub fn gain(&self, band: EqBand) -> f32 {
        self.gains[band.index()]
    }

    fn update_coeffs(&mut self) {
        if !self.dirty {
            return;
        }

        let sr = self.sample_rate;
        for band in EqBand::ALL {
            let db = band_gain_to_db(self.gains[band.index()]);
            // Skip the biquad entirely when the band is effectively flat
            self.coeffs[band.index()] = if db.abs() > 0.1 {
                match band {
                    EqBand::Low => BiquadCoeffs::low_shelf(EQ_LO_FREQ, db, sr),
                    EqBand::Mid => BiquadCoeffs::peaking(EQ_MID_FREQ, db, EQ_MID_Q, sr),
                    EqBand::High => BiquadCoeffs::high_shelf(EQ_HI_FREQ, db, sr),
                }
            } else {
                BiquadCoeffs::passthrough()
            };
        }

        self.dirty = false;
    }

    /// Run the buffer through all three bands in series
    pub fn process(&mut self, buffer: &mut StereoBuffer) {
        self.update_coeffs();

        for sample in buffer.iter_mut() {
            let mut left = sample.left;
            let mut right = sample.right;
            for i in 0..3 {
                (left, right) = self.states[i].process(left, right, &self.coeffs[i]);
            }
            *sample = StereoSample::new(left, right);
        }
    }

    /// Clear all filter state (source restart)
    pub fn reset(&mut self) {
        for state in &mut self.states {
            state.reset();
        }
    }
}

impl Default for ThreeBandEq {
    fn default() -> Self {
        Self::new(SAMPLE_RATE)
    }
}
