//! Filters used by the voice renderer.
//!
//! - `OnePoleLP`   : RC-style one-pole low-pass, used for reverb damping
//! - `ResonantLp`  : TPT state-variable low-pass with adjustable Q, used for
//!   bell brightness tracking and swarm grains
//!
//! `ResonantLp` is the trapezoidal SVF with `g = tan(π fc / sr)`, `k = 1/Q`
//! and the `1 / (1 + g (g + k))` normalization, which keeps it stable for any
//! cutoff up to the `tpt_g` clamp.

use crate::dsp::{kill_denormals, one_pole_coeff_hz, tpt_g};

/// One-pole low-pass `y += a * (x - y)` with `a = 1 - exp(-2π fc / sr)`.
#[derive(Copy, Clone, Debug)]
pub struct OnePoleLP {
    a: f32,
    y: f32,
}

impl OnePoleLP {
    #[inline]
    pub fn new(cut_hz: f32, sr: f32) -> Self {
        Self { a: 1.0 - one_pole_coeff_hz(cut_hz.max(0.0), sr.max(1.0)), y: 0.0 }
    }

    #[inline]
    pub fn process(&mut self, x: f32) -> f32 {
        self.y += self.a * (x - self.y);
        self.y = kill_denormals(self.y);
        self.y
    }
}

/// Resonant low-pass built on a TPT state-variable core.
#[derive(Copy, Clone, Debug)]
pub struct ResonantLp {
    a1: f32,
    a2: f32,
    a3: f32,
    ic1eq: f32,
    ic2eq: f32,
}

impl ResonantLp {
    #[inline]
    pub fn new(cut_hz: f32, q: f32, sr: f32) -> Self {
        let g = tpt_g(cut_hz.max(0.0), sr.max(1.0));
        let k = 1.0 / q.max(1e-4);
        let a1 = 1.0 / (1.0 + g * (g + k));
        let a2 = g * a1;
        Self { a1, a2, a3: g * a2, ic1eq: 0.0, ic2eq: 0.0 }
    }

    /// Process one sample and return the low-pass tap.
    #[inline]
    pub fn process(&mut self, x: f32) -> f32 {
        let v3 = x - self.ic2eq;
        let v1 = self.a1 * self.ic1eq + self.a2 * v3;
        let v2 = self.ic2eq + self.a2 * self.ic1eq + self.a3 * v3;
        self.ic1eq = kill_denormals(2.0 * v1 - self.ic1eq);
        self.ic2eq = kill_denormals(2.0 * v2 - self.ic2eq);
        v2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_pole_lp_moves_towards_input() {
        let sr = 48000.0;
        let mut lp = OnePoleLP::new(1000.0, sr);
        let mut y = 0.0;
        for _ in 0..(sr as usize) {
            y = lp.process(1.0);
        }
        assert!(y > 0.9, "y={y}");
    }

    #[test]
    fn resonant_lp_passes_dc_and_stays_bounded() {
        let sr = 48000.0;
        let mut lp = ResonantLp::new(800.0, 4.0, sr);
        let mut peak = 0.0f32;
        let mut y = 0.0;
        for _ in 0..(sr as usize) {
            y = lp.process(1.0);
            peak = peak.max(y.abs());
        }
        assert!((y - 1.0).abs() < 1e-3, "settled at {y}");
        assert!(peak < 4.0, "runaway resonance: {peak}");
    }

    #[test]
    fn resonant_lp_attenuates_above_cutoff() {
        let sr = 48000.0;
        let mut lp = ResonantLp::new(200.0, 0.707, sr);
        let freq = 8000.0;
        let mut peak = 0.0f32;
        for n in 0..(sr as usize / 4) {
            let x = (crate::dsp::TAU * freq * n as f32 / sr).sin();
            let y = lp.process(x);
            if n > 2000 {
                peak = peak.max(y.abs());
            }
        }
        assert!(peak < 0.01, "peak={peak}");
    }

    /// Impulse response peak and the peak over the last tenth of a second.
    fn impulse(cut: f32, q: f32, sr: f32) -> (f32, f32) {
        let mut lp = ResonantLp::new(cut, q, sr);
        let n = sr as usize;
        let (mut peak, mut tail) = (0.0f32, 0.0f32);
        for i in 0..n {
            let y = lp.process(if i == 0 { 1.0 } else { 0.0 });
            assert!(y.is_finite(), "non-finite output at {i} for {cut} Hz / {sr}");
            peak = peak.max(y.abs());
            if i > n - n / 10 {
                tail = tail.max(y.abs());
            }
        }
        (peak, tail)
    }

    #[test]
    fn resonant_lp_is_stable_at_bell_cutoffs() {
        for (cut, sr) in [(6000.0, 48_000.0), (6000.0, 44_100.0), (3000.0, 22_050.0), (1760.0, 8_000.0)] {
            let (peak, tail) = impulse(cut, 4.0, sr);
            assert!(peak < 4.0, "{cut} Hz @ {sr}: peak {peak}");
            assert!(tail < 1e-4, "{cut} Hz @ {sr}: tail {tail}");
        }
    }

    #[test]
    fn resonant_lp_is_stable_near_nyquist() {
        for sr in [8_000.0, 48_000.0] {
            let (peak, tail) = impulse(0.49 * sr, 4.0, sr);
            assert!(peak < 4.0, "{sr}: peak {peak}");
            assert!(tail < 1e-4, "{sr}: tail {tail}");
            let (peak, _) = impulse(2400.0, 0.8, sr);
            assert!(peak < 2.0, "swarm cutoff @ {sr}: peak {peak}");
        }
    }
}
