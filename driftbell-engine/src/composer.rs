//! The composition step function.
//!
//! [`Composition`] is the whole decision state of a session: seeded stream,
//! key, movement, arc, melodic pattern index, drone cooldown and the event
//! clock. [`Composition::fill`] runs [`Composition::step`] until the clock
//! passes the horizon given by a [`Drive`], so the live and offline
//! realizations differ only in how that horizon is chosen.
//!
//! Times in emitted events are seconds since session start.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::arc::ArcTracker;
use crate::backend::VoiceKind;
use crate::config::ComposerConfig;
use crate::movement::{Movement, MovementState, Texture};
use crate::rng::SeededRng;
use crate::tonal::{clamp_to_floor, Key, DRONE_FLOOR_HZ, MELODIC_FLOOR_HZ};

pub const FINAL_BELL_SECS: f64 = 20.0;
pub const FINAL_BELL_AMPLITUDE: f64 = 0.4;
pub const DRONE_COOLDOWN_FRACTION: f64 = 0.65;

/// Upper voices of a drone chord; the root is the event frequency.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DroneChord {
    pub fifth_hz: f64,
    pub third_hz: Option<f64>,
}

/// One musical event: the tuple that live and offline must agree on.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NoteEvent {
    pub ordinal: u64,
    pub kind: VoiceKind,
    pub freq: f64,
    pub start: f64,
    pub duration: f64,
    pub amplitude: f64,
    pub tension: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chord: Option<DroneChord>,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ScoreEvent {
    Note(NoteEvent),
    /// Fade out every sounding bell at `at` (CHORUS has begun).
    ReleaseBells { at: f64 },
}

impl ScoreEvent {
    pub fn as_note(&self) -> Option<&NoteEvent> {
        match self {
            ScoreEvent::Note(n) => Some(n),
            ScoreEvent::ReleaseBells { .. } => None,
        }
    }
}

/// How far ahead a call to [`Composition::fill`] may schedule.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Drive {
    /// Timer-driven: commit everything starting before `now + lookahead`.
    Realtime { now: f64, lookahead: f64 },
    /// Batch: run the simulated clock up to `until`.
    Simulated { until: f64 },
}

impl Drive {
    pub fn horizon(self) -> f64 {
        match self {
            Drive::Realtime { now, lookahead } => now + lookahead,
            Drive::Simulated { until } => until,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Composition {
    seed: u32,
    base_hz: f64,
    cfg: ComposerConfig,
    rng: SeededRng,
    key: Key,
    movement: MovementState,
    arc: ArcTracker,
    pattern_index: i32,
    clock: f64,
    last_drone: Option<(f64, f64)>,
    ordinal: u64,
    limit: Option<f64>,
    halted: bool,
}

impl Composition {
    /// Fresh session state. `limit` is the session length; `None` runs forever.
    pub fn new(seed: u32, base_hz: f64, cfg: &ComposerConfig, limit: Option<f64>) -> Self {
        let mut rng = SeededRng::new(seed);
        let arc = ArcTracker::new(&mut rng);
        Self {
            seed,
            base_hz,
            cfg: cfg.clone(),
            rng,
            key: Key::default(),
            movement: MovementState::new(cfg.intro_secs),
            arc,
            pattern_index: 0,
            clock: 0.0,
            last_drone: None,
            ordinal: 0,
            limit,
            halted: false,
        }
    }

    #[inline] pub fn seed(&self) -> u32 { self.seed }
    #[inline] pub fn clock(&self) -> f64 { self.clock }
    #[inline] pub fn key(&self) -> Key { self.key }
    #[inline] pub fn movement(&self) -> Movement { self.movement.current() }
    #[inline] pub fn density(&self) -> f64 { self.movement.density() }
    #[inline] pub fn arc(&self) -> &ArcTracker { &self.arc }
    #[inline] pub fn pattern_index(&self) -> i32 { self.pattern_index }
    #[inline] pub fn is_halted(&self) -> bool { self.halted }

    /// Step until the event clock reaches the drive's horizon or the session halts.
    pub fn fill(&mut self, drive: Drive, out: &mut Vec<ScoreEvent>) {
        let horizon = drive.horizon();
        while !self.halted && self.clock < horizon {
            self.step(out);
        }
    }

    /// Take one scheduling step, appending whatever it emits to `out`.
    pub fn step(&mut self, out: &mut Vec<ScoreEvent>) {
        if self.halted {
            return;
        }
        if let Some(limit) = self.limit {
            if self.clock >= limit {
                self.finish(out);
                return;
            }
        }

        self.movement.smooth_density(self.cfg.density_smoothing);
        let density = self.movement.density();
        let elapsed = self.cfg.step_base_interval / density.max(0.1);
        if let Some(tr) = self.movement.advance(elapsed, &mut self.rng, &mut self.key) {
            info!(from = ?tr.from, to = ?tr.to, at = self.clock, "movement");
            if tr.enters_chorus() {
                out.push(ScoreEvent::ReleaseBells { at: self.clock });
            }
        }

        let movement = self.movement.current();
        let texture = movement.profile().texture;
        if texture == Texture::Silence {
            self.clock += self.cfg.void_rest_secs;
            return;
        }

        if self.rng.chance(0.3) {
            if self.rng.chance(0.2) {
                self.key.minor = !self.key.minor;
            } else {
                self.key.circle_pos += self.rng.step();
            }
        }

        self.arc.advance(&mut self.rng);
        let tension = self.arc.tension();

        let index = if movement == Movement::Chorus {
            self.pattern_index.div_euclid(7) * 7 + 4
        } else {
            self.pattern_index
        };
        let freq = clamp_to_floor(self.key.frequency(self.base_hz, index), MELODIC_FLOOR_HZ);

        let (kind, duration, amplitude) = match texture {
            Texture::Swarm => (VoiceKind::Swarm, self.cfg.swarm_duration_secs, self.cfg.swarm_amplitude),
            _ => {
                let duration = self.rng.range(4.0, 8.0);
                let amplitude = 0.12 + 0.10 * self.rng.next_f64() + 0.08 * tension;
                (VoiceKind::Bell, duration, amplitude)
            }
        };
        self.emit(out, kind, freq, duration, amplitude, tension, None);

        self.maybe_drone(out, tension);

        self.pattern_index += self.rng.step();
        self.clock += (1.0 / density) * self.rng.range(0.9, 1.1);
    }

    fn maybe_drone(&mut self, out: &mut Vec<ScoreEvent>, tension: f64) {
        if !self.movement.current().allows_drone() {
            return;
        }
        if let Some((start, dur)) = self.last_drone {
            if self.clock < start + DRONE_COOLDOWN_FRACTION * dur {
                return;
            }
        }
        let arc_start = self.arc.is_arc_start();
        let climax = self.arc.is_climax();
        let gate = if self.arc.is_phrase_start() { 0.18 } else { 0.04 };
        if !(arc_start || climax || self.rng.chance(gate)) {
            return;
        }

        let degree = if !arc_start && self.arc.phrase_step() >= 13 && self.rng.chance(0.5) { 5 } else { 0 };
        let drone_base = self.base_hz * 0.5;
        let root = clamp_to_floor(self.key.frequency(drone_base, degree), DRONE_FLOOR_HZ);
        let interval = |steps: i32| {
            let semis = self.key.semitones(degree + steps) - self.key.semitones(degree);
            root * driftbell_core::dsp::semitone_ratio(f64::from(semis))
        };
        let chord = DroneChord {
            fifth_hz: interval(4),
            third_hz: self.cfg.drone_third.then(|| interval(2)),
        };

        let duration = if arc_start { 32.0 } else { 22.0 };
        let base_amp = if arc_start || climax { 0.40 } else { 0.28 };
        let amplitude = base_amp * self.cfg.drone_gain;
        debug!(root, degree, duration, at = self.clock, "drone");
        self.last_drone = Some((self.clock, duration));
        self.emit(out, VoiceKind::Drone, root, duration, amplitude, tension, Some(chord));
    }

    fn finish(&mut self, out: &mut Vec<ScoreEvent>) {
        let freq = clamp_to_floor(self.key.frequency(self.base_hz, 0), MELODIC_FLOOR_HZ);
        info!(at = self.clock, "session length reached; final bell");
        self.emit(out, VoiceKind::Bell, freq, FINAL_BELL_SECS, FINAL_BELL_AMPLITUDE, 0.0, None);
        self.halted = true;
    }

    #[allow(clippy::too_many_arguments)]
    fn emit(
        &mut self,
        out: &mut Vec<ScoreEvent>,
        kind: VoiceKind,
        freq: f64,
        duration: f64,
        amplitude: f64,
        tension: f64,
        chord: Option<DroneChord>,
    ) {
        out.push(ScoreEvent::Note(NoteEvent {
            ordinal: self.ordinal,
            kind,
            freq,
            start: self.clock,
            duration,
            amplitude,
            tension,
            chord,
        }));
        self.ordinal += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(seed: u32, until: f64) -> Vec<ScoreEvent> {
        let mut c = Composition::new(seed, 110.0, &ComposerConfig::default(), None);
        let mut out = Vec::new();
        c.fill(Drive::Simulated { until }, &mut out);
        out
    }

    #[test]
    fn first_event_is_a_bell_with_an_opening_drone() {
        let events = run(42, 5.0);
        let notes: Vec<&NoteEvent> = events.iter().filter_map(ScoreEvent::as_note).collect();
        assert_eq!(notes[0].kind, VoiceKind::Bell);
        assert_eq!(notes[0].start, 0.0);
        // the first step is an arc start, so a drone comes with it
        assert_eq!(notes[1].kind, VoiceKind::Drone);
        assert_eq!(notes[1].duration, 32.0);
        assert!((notes[1].amplitude - 0.40 * 0.6).abs() < 1e-12);
    }

    #[test]
    fn melodic_notes_respect_floor_and_drones_their_floor() {
        for seed in [1, 7, 42, 1234] {
            for ev in run(seed, 600.0) {
                if let ScoreEvent::Note(n) = ev {
                    match n.kind {
                        VoiceKind::Drone => assert!(n.freq >= DRONE_FLOOR_HZ),
                        _ => assert!(n.freq >= MELODIC_FLOOR_HZ),
                    }
                    assert!((0.0..=1.0).contains(&n.tension));
                }
            }
        }
    }

    #[test]
    fn ordinals_count_up_and_times_never_go_back() {
        let events = run(99, 900.0);
        let notes: Vec<&NoteEvent> = events.iter().filter_map(ScoreEvent::as_note).collect();
        for (i, n) in notes.iter().enumerate() {
            assert_eq!(n.ordinal, i as u64);
        }
        for w in notes.windows(2) {
            assert!(w[1].start >= w[0].start);
        }
    }

    #[test]
    fn chorus_emits_swarms_on_the_dominant() {
        let mut c = Composition::new(5, 110.0, &ComposerConfig::default(), None);
        let mut out = Vec::new();
        let mut seen = false;
        while c.clock() < 600.0 {
            out.clear();
            c.step(&mut out);
            if c.movement() == Movement::Chorus {
                for n in out.iter().filter_map(ScoreEvent::as_note) {
                    assert_eq!(n.kind, VoiceKind::Swarm);
                    seen = true;
                }
            }
        }
        assert!(seen);
    }

    #[test]
    fn entering_chorus_releases_bells() {
        let events = run(11, 120.0);
        assert!(events.iter().any(|e| matches!(e, ScoreEvent::ReleaseBells { .. })));
    }

    #[test]
    fn finite_session_ends_with_one_long_bell() {
        let mut c = Composition::new(42, 110.0, &ComposerConfig::default(), Some(60.0));
        let mut out = Vec::new();
        c.fill(Drive::Simulated { until: f64::INFINITY }, &mut out);
        assert!(c.is_halted());
        let last = out.last().and_then(ScoreEvent::as_note).copied().unwrap();
        assert_eq!(last.kind, VoiceKind::Bell);
        assert_eq!(last.duration, FINAL_BELL_SECS);
        assert_eq!(last.amplitude, FINAL_BELL_AMPLITUDE);
        assert!(last.start >= 60.0);
        let before = out.len();
        c.fill(Drive::Simulated { until: f64::INFINITY }, &mut out);
        c.step(&mut out);
        assert_eq!(out.len(), before);
    }
}
