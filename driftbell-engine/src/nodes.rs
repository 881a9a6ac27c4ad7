//! Oscillator node used by rendered voices.
//!
//! Frequency is supplied per sample so carriers can be frequency-modulated
//! without the node knowing about the modulator. Not anti-aliased; the saw is
//! only used for short, filtered swarm grains.

use driftbell_core::dsp::{fast_sin, wrap_phase01, TAU};
use serde::{Deserialize, Serialize};

/// Oscillator waveform.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Wave { Sine, Saw }

#[inline]
fn osc_sample(phase01: f32, wave: Wave) -> f32 {
    match wave {
        Wave::Sine => fast_sin(TAU * phase01),
        Wave::Saw => 2.0 * phase01 - 1.0,
    }
}

#[derive(Copy, Clone, Debug)]
pub struct Osc {
    phase: f32,
    wave: Wave,
}

impl Osc {
    #[inline] pub fn new(wave: Wave) -> Self { Self { phase: 0.0, wave } }

    /// Advance one sample at `freq_hz` and return the sample.
    #[inline]
    pub fn next(&mut self, freq_hz: f32, sr: f32) -> f32 {
        let s = osc_sample(self.phase, self.wave);
        self.phase = wrap_phase01(self.phase + freq_hz / sr);
        s
    }
}
