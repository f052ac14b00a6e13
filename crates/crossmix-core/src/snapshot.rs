//! Visualization snapshots
//!
//! Waveform and frequency views are computed from the loaded track buffer at
//! the playhead - pure reads over shared immutable data, so the UI never
//! taps the audio thread. Callers pass the position they read from the deck
//! atomics.

use rustfft::{num_complex::Complex, FftPlanner};

use crate::loader::LoadedTrack;
use crate::types::{Sample, StereoBuffer};

/// Default FFT size for frequency snapshots
pub const SPECTRUM_SIZE: usize = 2048;

/// Mono waveform window of `frames` samples centered on `center_seconds`
///
/// Positions outside the track read as silence, so windows near the track
/// edges keep their requested length.
pub fn waveform_window(track: &LoadedTrack, center_seconds: f64, frames: usize) -> Vec<Sample> {
    let data = track.full.as_slice();
    let center = (center_seconds * track.sample_rate as f64) as i64;
    let start = center - (frames as i64) / 2;

    (0..frames)
        .map(|i| {
            let idx = start + i as i64;
            if idx >= 0 && (idx as usize) < data.len() {
                let s = data[idx as usize];
                (s.left + s.right) * 0.5
            } else {
                0.0
            }
        })
        .collect()
}

/// Peak-per-bin overview of a whole buffer (track overview strips)
pub fn waveform_peaks(buffer: &StereoBuffer, bins: usize) -> Vec<Sample> {
    if bins == 0 || buffer.is_empty() {
        return Vec::new();
    }
    let data = buffer.as_slice();
    let chunk = (data.len() / bins).max(1);
    data.chunks(chunk)
        .take(bins)
        .map(|c| c.iter().map(|s| s.peak()).fold(0.0, Sample::max))
        .collect()
}

/// Magnitude spectrum of the `SPECTRUM_SIZE` frames at the playhead
///
/// Hann-windowed FFT; returns `size / 2` magnitude bins (DC through
/// Nyquist). Bin `i` is centered at `i * sample_rate / size` Hz.
pub fn spectrum(track: &LoadedTrack, center_seconds: f64, size: usize) -> Vec<Sample> {
    let window = waveform_window(track, center_seconds, size);

    let mut input: Vec<Complex<f32>> = window
        .iter()
        .enumerate()
        .map(|(i, &s)| {
            // Hann window
            let w = 0.5
                * (1.0
                    - (2.0 * std::f32::consts::PI * i as f32 / (size.max(2) - 1) as f32).cos());
            Complex::new(s * w, 0.0)
        })
        .collect();

    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(size);
    fft.process(&mut input);

    let scale = 2.0 / size as f32;
    input[..size / 2].iter().map(|c| c.norm() * scale).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{StereoSample, SAMPLE_RATE};

    fn sine_track(freq: f32, seconds: f64) -> LoadedTrack {
        let frames = (seconds * SAMPLE_RATE as f64) as usize;
        let mut full = StereoBuffer::silence(frames);
        for (i, s) in full.iter_mut().enumerate() {
            let t = i as f32 / SAMPLE_RATE as f32;
            *s = StereoSample::mono((2.0 * std::f32::consts::PI * freq * t).sin());
        }
        LoadedTrack {
            id: 1,
            sample_rate: SAMPLE_RATE,
            full,
            stems: None,
            analysis: None,
        }
    }

    #[test]
    fn waveform_window_has_requested_length() {
        let track = sine_track(440.0, 1.0);
        let window = waveform_window(&track, 0.5, 1024);
        assert_eq!(window.len(), 1024);
        assert!(window.iter().any(|&s| s.abs() > 0.5));
    }

    #[test]
    fn waveform_window_pads_edges_with_silence() {
        let track = sine_track(440.0, 1.0);
        let window = waveform_window(&track, 0.0, 512);
        // First half of the window sits before the track start
        assert!(window[..200].iter().all(|&s| s == 0.0));
        assert_eq!(window.len(), 512);
    }

    #[test]
    fn spectrum_peaks_at_the_sine_bin() {
        let freq = 1000.0;
        let track = sine_track(freq, 1.0);
        let mags = spectrum(&track, 0.5, SPECTRUM_SIZE);
        assert_eq!(mags.len(), SPECTRUM_SIZE / 2);

        let peak_bin = mags
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .map(|(i, _)| i)
            .unwrap();
        let expected_bin = (freq / (SAMPLE_RATE as f32 / SPECTRUM_SIZE as f32)).round() as usize;
        assert!(
            (peak_bin as i64 - expected_bin as i64).abs() <= 1,
            "peak at bin {}, expected near {}",
            peak_bin,
            expected_bin
        );
    }

    #[test]
    fn peaks_overview_has_bin_count() {
        let track = sine_track(200.0, 0.5);
        let peaks = waveform_peaks(&track.full, 100);
        assert_eq!(peaks.len(), 100);
        assert!(peaks.iter().all(|&p| p >= 0.0 && p <= 1.01));
    }
}
