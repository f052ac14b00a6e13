//! One-pole parameter smoothing
//!
//! Every audible gain in the graph moves through one of these instead of
//! jumping, so fader/EQ/crossfader changes never click.

/// Smoothing time constant for audible parameters
pub const SMOOTH_TIME_MS: f32 = 5.0;

/// One-pole coefficient for a given time constant at a sample rate
pub fn smoothing_coeff(sample_rate: u32, time_ms: f32) -> f32 {
    let tau_samples = (time_ms / 1000.0) * sample_rate as f32;
    if tau_samples <= 0.0 {
        return 1.0;
    }
    1.0 - (-1.0 / tau_samples).exp()
}

/// A parameter that ramps toward its target one sample at a time
#[derive(Debug, Clone, Copy)]
pub struct SmoothedParam {
    current: f32,
    target: f32,
    coeff: f32,
}

impl SmoothedParam {
    pub fn new(initial: f32, sample_rate: u32) -> Self {
        Self {
            current: initial,
            target: initial,
            coeff: smoothing_coeff(sample_rate, SMOOTH_TIME_MS),
        }
    }

    /// Set the value the parameter ramps toward
    #[inline]
    pub fn set_target(&mut self, target: f32) {
        self.target = target;
    }

    #[inline]
    pub fn target(&self) -> f32 {
        self.target
    }

    #[inline]
    pub fn current(&self) -> f32 {
        self.current
    }

    /// Advance one sample and return the smoothed value
    #[inline]
    pub fn step(&mut self) -> f32 {
        self.current += (self.target - self.current) * self.coeff;
        self.current
    }

    /// Jump straight to the target (stream start, tests)
    pub fn snap(&mut self) {
        self.current = self.target;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ramps_toward_target() {
        let mut p = SmoothedParam::new(0.0, 48000);
        p.set_target(1.0);

        let first = p.step();
        assert!(first > 0.0 && first < 0.1);

        // After a few time constants the value has effectively arrived
        for _ in 0..48000 {
            p.step();
        }
        assert!((p.current() - 1.0).abs() < 1e-3);
    }

    #[test]
    fn snap_jumps_immediately() {
        let mut p = SmoothedParam::new(0.0, 48000);
        p.set_target(0.7);
        p.snap();
        assert_eq!(p.current(), 0.7);
    }
}
