//! Math helpers shared by the voice renderer.
//!
//! Features used by this file:
//! - `fast-math` : polynomial/rational approximations for sine and tanh
//!
//! Conventions:
//! - Audio-rate helpers are `f32`; anything measured on the session clock is `f64`.
//! - Helpers are side-effect free and `#[inline]` where they sit in per-sample loops.

#![allow(clippy::excessive_precision)]

use core::f32::consts::PI;

use cfg_if::cfg_if;

// --------------------------------- Constants -------------------------------------

/// 2π
pub const TAU: f32 = 2.0 * PI;

/// Below this magnitude a sample is flushed to zero.
pub const EPS_SMALL: f32 = 1.0e-20;

/// Smallest target an exponential ramp may approach; zero is not reachable
/// on an exponential curve.
pub const EXP_FLOOR: f32 = 1.0e-4;

// --------------------------------- Utilities -------------------------------------

/// Wrap phase into [0, 1).
#[inline]
pub fn wrap_phase01(p: f32) -> f32 {
    let w = p - p.floor();
    if w >= 1.0 { 0.0 } else { w }
}

/// Flush subnormal values to zero.
#[inline]
pub fn kill_denormals(x: f32) -> f32 {
    if x.abs() < EPS_SMALL { 0.0 } else { x }
}

/// Equal-tempered frequency ratio for `semitones` (may be fractional or negative).
#[inline]
pub fn semitone_ratio(semitones: f64) -> f64 {
    (semitones / 12.0).exp2()
}

// --------------------------------- Trig ------------------------------------------

/// Sine of `x` radians. With `fast-math` this is a range-reduced 5th-order
/// polynomial (max abs error around 1e-3); otherwise it is `f32::sin`.
#[inline]
pub fn fast_sin(x: f32) -> f32 {
    cfg_if! {
        if #[cfg(feature = "fast-math")] {
            let k = (x / TAU).round();
            let xr = x - k * TAU;
            let x2 = xr * xr;
            xr * (0.999_979_313_3 + x2 * (-0.166_624_432_0 + x2 * 0.008_308_978_98))
        } else {
            x.sin()
        }
    }
}

/// `g = tan(π fc / sr)` for the TPT state-variable filter.
#[inline]
pub fn tpt_g(cut_hz: f32, sr: f32) -> f32 {
    let fc = cut_hz.clamp(0.0, 0.49 * sr);
    (PI * fc / sr).tan()
}

/// `exp(-2π fc / sr)`, the pole of an RC-style one-pole filter.
#[inline]
pub fn one_pole_coeff_hz(cut_hz: f32, sr: f32) -> f32 {
    let fc = cut_hz.clamp(0.0, 0.499 * sr);
    (-2.0 * PI * fc / sr).exp()
}

// --------------------------------- Nonlinearities --------------------------------

/// Soft clip via tanh. With `fast-math`, `x (27 + x²) / (27 + 9x²)`.
#[inline]
pub fn soft_clip(x: f32) -> f32 {
    cfg_if! {
        if #[cfg(feature = "fast-math")] {
            let x = x.clamp(-3.0, 3.0);
            let x2 = x * x;
            x * (27.0 + x2) / (27.0 + 9.0 * x2)
        } else {
            x.tanh()
        }
    }
}

/// Constant-power pan gains `(left, right)` for `pan` in [-1, 1].
#[inline]
pub fn pan_gains(pan: f32) -> (f32, f32) {
    let p = (pan.clamp(-1.0, 1.0) + 1.0) * 0.25 * PI;
    (p.cos(), p.sin())
}

// --------------------------------- Tests -----------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn soft_clip_is_bounded() {
        for x in [-10.0, -2.0, -1.0, 0.0, 1.0, 2.0, 10.0] {
            let y = soft_clip(x);
            assert!((-1.0 - 1e-4..=1.0 + 1e-4).contains(&y), "x={x} y={y}");
        }
    }

    #[test]
    fn semitone_ratio_octave_and_fifth() {
        assert!((semitone_ratio(12.0) - 2.0).abs() < 1e-12);
        assert!((semitone_ratio(-12.0) - 0.5).abs() < 1e-12);
        assert!((semitone_ratio(7.0) - 1.498_307_077).abs() < 1e-6);
    }

    #[test]
    fn pan_is_constant_power() {
        for pan in [-1.0, -0.3, 0.0, 0.5, 1.0] {
            let (l, r) = pan_gains(pan);
            assert!((l * l + r * r - 1.0).abs() < 1e-5, "pan={pan}");
        }
        let (l, r) = pan_gains(-1.0);
        assert!(l > 0.99 && r < 1e-3);
    }

    #[test]
    fn wrap_phase_stays_in_unit_range() {
        for p in [-2.25, -0.5, 0.0, 0.999, 1.0, 3.75] {
            let w = wrap_phase01(p);
            assert!((0.0..1.0).contains(&w), "p={p} w={w}");
        }
    }
}
