//! Voice parameter model: note events to backend requests.
//!
//! Three archetypes:
//! - **Bell**: sine carrier frequency-modulated by a sine at a non-integer
//!   ratio (golden ratio under high tension), 10 ms linear attack, exponential
//!   decay over the full duration, resonant low-pass at `min(4f, 6000)`.
//! - **Swarm**: seven short sawtooth grains scattered over the first 70% of the
//!   cluster, pitched on a just-ish ratio set with ±1% detune, randomly panned.
//! - **Drone**: sine with slow vibrato whose depth swells and returns to zero,
//!   2 s exponential rise then exponential decay, fixed warm low-pass.
//!   A drone chord is three of these weighted 0.50 / 0.30 / 0.20.
//!
//! Variation is drawn from any [`rand::Rng`]; the scheduler passes a stream
//! derived from the session seed and the event ordinal.

use driftbell_core::automation::Automation;
use driftbell_core::dsp::EXP_FLOOR;
use rand::Rng;

use crate::backend::{Lowpass, Modulator, VoiceKind, VoiceRequest};
use crate::nodes::Wave;

pub const GOLDEN_RATIO: f64 = 1.618;
pub const SWARM_GRAINS: usize = 7;
pub const SWARM_RATIOS: [f64; 3] = [1.0, 1.2599, 1.8877];
pub const DRONE_WEIGHTS: [f64; 3] = [0.50, 0.30, 0.20];

const BELL_ATTACK_SECS: f64 = 0.01;
const BELL_SEND: f32 = 0.45;
const SWARM_SEND: f32 = 0.6;
const DRONE_SEND: f32 = 0.5;
const DRONE_RISE_SECS: f64 = 2.0;
const DRONE_LOWPASS_HZ: f32 = 900.0;
const DRONE_VIBRATO_HZ: f32 = 0.18;
const DRONE_VIBRATO_DEPTH: f64 = 0.004;

/// Modulator-to-carrier ratio for a bell at `tension`.
pub fn bell_ratio<R: Rng + ?Sized>(tension: f64, rng: &mut R) -> f64 {
    if tension > 0.6 { GOLDEN_RATIO } else { rng.gen_range(1.5..3.5) }
}

/// FM index: `1 + 2 * tension`.
pub fn bell_index(tension: f64) -> f64 {
    1.0 + 2.0 * tension.clamp(0.0, 1.0)
}

pub fn bell<R: Rng + ?Sized>(
    freq: f64,
    start: f64,
    duration: f64,
    amplitude: f64,
    tension: f64,
    rng: &mut R,
) -> VoiceRequest {
    let ratio = bell_ratio(tension, rng);
    let mod_freq = freq * ratio;
    let stop = start + duration;

    let mut gain = Automation::constant(0.0);
    gain.set_value_at(0.0, start)
        .linear_ramp_to(amplitude as f32, start + BELL_ATTACK_SECS)
        .exponential_ramp_to(0.0, stop);

    VoiceRequest {
        kind: VoiceKind::Bell,
        wave: Wave::Sine,
        freq_hz: freq as f32,
        modulator: Some(Modulator {
            wave: Wave::Sine,
            freq_hz: mod_freq as f32,
            depth_hz: Automation::constant((bell_index(tension) * mod_freq) as f32),
        }),
        gain,
        lowpass: Some(Lowpass { cutoff_hz: (4.0 * freq).min(6000.0) as f32, q: 4.0 }),
        pan: rng.gen_range(-0.3..0.3),
        reverb_send: BELL_SEND,
        start,
        stop,
    }
}

pub fn swarm<R: Rng + ?Sized>(
    root: f64,
    start: f64,
    duration: f64,
    amplitude: f64,
    rng: &mut R,
) -> Vec<VoiceRequest> {
    let grain_amp = (amplitude / SWARM_GRAINS as f64 * 2.0) as f32;
    (0..SWARM_GRAINS)
        .map(|_| {
            let offset = rng.gen_range(0.0..0.7) * duration;
            let len = rng.gen_range(0.5..2.5);
            let ratio = SWARM_RATIOS[rng.gen_range(0..SWARM_RATIOS.len())];
            let detune = rng.gen_range(-0.01..0.01);
            let pan = rng.gen_range(-1.0..1.0);

            let t0 = start + offset;
            let mut gain = Automation::constant(0.0);
            gain.set_value_at(0.0, t0)
                .linear_ramp_to(grain_amp, t0 + len * 0.4)
                .linear_ramp_to(0.0, t0 + len);

            VoiceRequest {
                kind: VoiceKind::Swarm,
                wave: Wave::Saw,
                freq_hz: (root * ratio * (1.0 + detune)) as f32,
                modulator: None,
                gain,
                lowpass: Some(Lowpass { cutoff_hz: 2400.0, q: 0.8 }),
                pan,
                reverb_send: SWARM_SEND,
                start: t0,
                stop: t0 + len,
            }
        })
        .collect()
}

pub fn drone(freq: f64, start: f64, duration: f64, amplitude: f64) -> VoiceRequest {
    let stop = start + duration;
    let rise_end = start + DRONE_RISE_SECS.min(duration * 0.5);

    let mut gain = Automation::constant(0.0);
    gain.set_value_at(EXP_FLOOR, start)
        .exponential_ramp_to(amplitude as f32, rise_end)
        .exponential_ramp_to(0.0, stop);

    let depth = (freq * DRONE_VIBRATO_DEPTH) as f32;
    let mut depth_hz = Automation::constant(0.0);
    depth_hz
        .set_value_at(0.0, start)
        .linear_ramp_to(depth, start + duration * 0.5)
        .linear_ramp_to(0.0, stop);

    VoiceRequest {
        kind: VoiceKind::Drone,
        wave: Wave::Sine,
        freq_hz: freq as f32,
        modulator: Some(Modulator { wave: Wave::Sine, freq_hz: DRONE_VIBRATO_HZ, depth_hz }),
        gain,
        lowpass: Some(Lowpass { cutoff_hz: DRONE_LOWPASS_HZ, q: 0.7 }),
        pan: 0.0,
        reverb_send: DRONE_SEND,
        start,
        stop,
    }
}

/// Root, fifth and optional third as simultaneous drone voices.
pub fn drone_chord(
    root: f64,
    fifth: f64,
    third: Option<f64>,
    start: f64,
    duration: f64,
    amplitude: f64,
) -> Vec<VoiceRequest> {
    let mut out = vec![
        drone(root, start, duration, amplitude * DRONE_WEIGHTS[0]),
        drone(fifth, start, duration, amplitude * DRONE_WEIGHTS[1]),
    ];
    if let Some(third) = third {
        out.push(drone(third, start, duration, amplitude * DRONE_WEIGHTS[2]));
    }
    out
}
