//! Turning score events into backend voices.
//!
//! [`dispatch`] is shared by both realizations: it maps each [`NoteEvent`]
//! through the voice model, offsets it onto the backend clock, plays it and
//! tracks the handle in the [`VoiceArena`]. [`LiveScheduler`] wraps a
//! [`Composition`] and a backend and is driven by a periodic tick.

use tracing::{debug, info, warn};

use crate::backend::{AudioBackend, VoiceKind, VoiceRequest};
use crate::composer::{Composition, Drive, NoteEvent, ScoreEvent};
use crate::config::ComposerConfig;
use crate::error::BackendError;
use crate::lifecycle::{TrackedVoice, VoiceArena};
use crate::rng::SeededRng;
use crate::voices;

pub const BELL_FADE_SECS: f64 = 0.2;
pub const BELL_RELEASE_AFTER_SECS: f64 = 0.25;
pub const STOP_FADE_SECS: f64 = 1.5;

/// Voice requests for one note, in session time.
pub fn realize(note: &NoteEvent, seed: u32, cfg: &ComposerConfig) -> Vec<VoiceRequest> {
    let mut rng = SeededRng::for_event(seed, note.ordinal);
    match note.kind {
        VoiceKind::Bell => {
            vec![voices::bell(note.freq, note.start, note.duration, note.amplitude, note.tension, &mut rng)]
        }
        VoiceKind::Swarm if cfg.legacy_unseeded_swarm => {
            voices::swarm(note.freq, note.start, note.duration, note.amplitude, &mut rand::thread_rng())
        }
        VoiceKind::Swarm => voices::swarm(note.freq, note.start, note.duration, note.amplitude, &mut rng),
        VoiceKind::Drone => match note.chord {
            Some(chord) => voices::drone_chord(
                note.freq,
                chord.fifth_hz,
                chord.third_hz,
                note.start,
                note.duration,
                note.amplitude,
            ),
            None => vec![voices::drone(note.freq, note.start, note.duration, note.amplitude)],
        },
    }
}

/// Send `events` to `backend`, shifting session times by `origin`.
pub fn dispatch<B: AudioBackend + ?Sized>(
    events: &[ScoreEvent],
    backend: &mut B,
    arena: &mut VoiceArena,
    seed: u32,
    origin: f64,
    cfg: &ComposerConfig,
) -> Result<usize, BackendError> {
    let mut played = 0;
    for ev in events {
        match ev {
            ScoreEvent::Note(note) => {
                for req in realize(note, seed, cfg) {
                    let req = req.offset(origin);
                    let (kind, stop) = (req.kind, req.stop);
                    let id = backend.play(req)?;
                    arena.insert(TrackedVoice { id, kind, stop });
                    played += 1;
                }
            }
            ScoreEvent::ReleaseBells { at } => {
                let n = arena.fade_bells(backend, origin + at, BELL_FADE_SECS, BELL_RELEASE_AFTER_SECS);
                debug!(faded = n, at, "released bells");
            }
        }
    }
    Ok(played)
}

/// Live realization: one composition driven by the backend clock.
pub struct LiveScheduler<B: AudioBackend> {
    backend: B,
    composition: Composition,
    arena: VoiceArena,
    cfg: ComposerConfig,
    origin: f64,
    pending: Vec<ScoreEvent>,
    stopped: bool,
}

impl<B: AudioBackend> LiveScheduler<B> {
    /// The session clock starts a short lead after the backend's current time.
    pub fn new(backend: B, seed: u32, base_hz: f64, cfg: &ComposerConfig, limit: Option<f64>) -> Self {
        let origin = backend.current_time() + cfg.start_lead_secs;
        if cfg.legacy_unseeded_swarm {
            warn!("unseeded swarm grains enabled; exports will not reproduce CHORUS audio");
        }
        info!(seed, base_hz, origin, ?limit, "live session started");
        Self {
            backend,
            composition: Composition::new(seed, base_hz, cfg, limit),
            arena: VoiceArena::new(),
            cfg: cfg.clone(),
            origin,
            pending: Vec::with_capacity(32),
            stopped: false,
        }
    }

    /// Timer body: commit every event inside the lookahead window.
    pub fn tick(&mut self) -> Result<usize, BackendError> {
        let now = self.backend.current_time();
        self.arena.prune(now);
        if self.stopped || self.composition.is_halted() {
            return Ok(0);
        }
        self.pending.clear();
        self.composition.fill(
            Drive::Realtime { now: now - self.origin, lookahead: self.cfg.profile.lookahead_secs() },
            &mut self.pending,
        );
        let played = dispatch(
            &self.pending,
            &mut self.backend,
            &mut self.arena,
            self.composition.seed(),
            self.origin,
            &self.cfg,
        )?;
        if self.composition.is_halted() {
            info!(at = self.composition.clock(), "session length reached");
        }
        Ok(played)
    }

    /// Silence the session: fade everything over 1.5 s, or cut it now.
    pub fn stop(&mut self, fade: bool) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        let now = self.backend.current_time();
        if fade {
            self.arena.fade_all(&mut self.backend, now, STOP_FADE_SECS);
        } else {
            self.arena.release_all(&mut self.backend, now);
        }
        info!(fade, "live session stopped");
    }

    #[inline] pub fn is_stopped(&self) -> bool { self.stopped }
    #[inline] pub fn is_halted(&self) -> bool { self.composition.is_halted() }

    /// Halted, and every voice it started has reached its stop time.
    pub fn is_drained(&self) -> bool {
        self.composition.is_halted() && self.arena.is_empty()
    }

    #[inline] pub fn origin(&self) -> f64 { self.origin }
    #[inline] pub fn seed(&self) -> u32 { self.composition.seed() }
    #[inline] pub fn composition(&self) -> &Composition { &self.composition }
    #[inline] pub fn arena(&self) -> &VoiceArena { &self.arena }
    #[inline] pub fn backend(&self) -> &B { &self.backend }
    #[inline] pub fn backend_mut(&mut self) -> &mut B { &mut self.backend }

    pub fn into_backend(self) -> B {
        self.backend
    }
}
