//! The Audio Backend capability consumed by the scheduler.
//!
//! The scheduler never touches samples. It hands the backend fully specified
//! [`VoiceRequest`]s with absolute start/stop times on the backend clock, and
//! later asks it to fade or release voices by [`VoiceId`]. Backends execute
//! requests asynchronously at their designated times.

use driftbell_core::automation::Automation;
use serde::{Deserialize, Serialize};

use crate::error::BackendError;
use crate::nodes::Wave;

/// Opaque handle for a voice accepted by a backend.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VoiceId(pub u64);

/// Voice archetype. Also used to tag handles for targeted cleanup.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoiceKind {
    Bell,
    Swarm,
    Drone,
}

/// Frequency modulator added to the carrier frequency:
/// `f(t) = carrier + depth(t) * osc(modulator)`.
#[derive(Clone, Debug, PartialEq)]
pub struct Modulator {
    pub wave: Wave,
    pub freq_hz: f32,
    pub depth_hz: Automation,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Lowpass {
    pub cutoff_hz: f32,
    pub q: f32,
}

/// One voice, fully specified: source, modulation, envelope, filter,
/// placement, and its dry/reverb routing.
#[derive(Clone, Debug, PartialEq)]
pub struct VoiceRequest {
    pub kind: VoiceKind,
    pub wave: Wave,
    pub freq_hz: f32,
    pub modulator: Option<Modulator>,
    pub gain: Automation,
    pub lowpass: Option<Lowpass>,
    /// Constant-power pan in [-1, 1].
    pub pan: f32,
    /// Level into the shared reverb; the dry path is always at unity.
    pub reverb_send: f32,
    pub start: f64,
    pub stop: f64,
}

impl VoiceRequest {
    /// Shift every time in the request by `offset` seconds.
    pub fn offset(mut self, offset: f64) -> Self {
        if offset == 0.0 {
            return self;
        }
        self.start += offset;
        self.stop += offset;
        self.gain = self.gain.shifted(offset);
        if let Some(m) = self.modulator.as_mut() {
            m.depth_hz = m.depth_hz.shifted(offset);
        }
        self
    }
}

/// A clock-referenced synthesis context.
pub trait AudioBackend {
    /// Seconds on the backend clock ("sounding now").
    fn current_time(&self) -> f64;

    fn sample_rate(&self) -> u32;

    /// Schedule a voice; it sounds from `request.start` to `request.stop`.
    fn play(&mut self, request: VoiceRequest) -> Result<VoiceId, BackendError>;

    /// Cancel pending gain automation from `at` and ramp to silence over `over` seconds.
    fn fade_out(&mut self, voice: VoiceId, at: f64, over: f64) -> Result<(), BackendError>;

    /// Stop the voice at `at` and free its resources.
    fn release(&mut self, voice: VoiceId, at: f64) -> Result<(), BackendError>;
}

/// Creates backends for live sessions. Opening is where a missing audio
/// capability is detected.
pub trait BackendProvider {
    type Backend: AudioBackend;

    fn open(&mut self) -> Result<Self::Backend, BackendError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_moves_times_and_curves() {
        let mut gain = Automation::constant(0.0);
        gain.set_value_at(0.0, 1.0).linear_ramp_to(0.5, 2.0);
        let req = VoiceRequest {
            kind: VoiceKind::Bell,
            wave: Wave::Sine,
            freq_hz: 440.0,
            modulator: None,
            gain,
            lowpass: None,
            pan: 0.0,
            reverb_send: 0.3,
            start: 1.0,
            stop: 3.0,
        };
        let moved = req.clone().offset(10.0);
        assert_eq!(moved.start, 11.0);
        assert_eq!(moved.stop, 13.0);
        assert_eq!(moved.gain.value_at(11.5), req.gain.value_at(1.5));
        assert_eq!(moved.gain.value_at(5.0), 0.0);
    }
}
