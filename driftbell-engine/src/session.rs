//! Session control surface.
//!
//! A [`Conductor`] owns a [`BackendProvider`], the composer config and the
//! listener [`Settings`]. `start` opens a backend and begins a live session,
//! `tick` is the body of the host's periodic timer, `stop` silences it, and
//! `export_render` re-renders the last started session offline.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::info;

use crate::backend::BackendProvider;
use crate::config::ComposerConfig;
use crate::error::SessionError;
use crate::offline::{self, AudioBuffer};
use crate::scheduler::LiveScheduler;
use crate::settings::Settings;

pub const DEFAULT_EXPORT_RATE: u32 = 48_000;

/// Seed from the wall clock, in milliseconds truncated to 32 bits.
pub fn wall_clock_seed() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u32)
        .unwrap_or(0)
}

/// What a session was started with, kept so an export renders the same piece
/// even after settings change.
#[derive(Clone, Debug, PartialEq)]
struct Capture {
    seed: u32,
    tone_base: f64,
    cfg: ComposerConfig,
}

pub struct Conductor<P: BackendProvider> {
    provider: P,
    cfg: ComposerConfig,
    settings: Settings,
    live: Option<LiveScheduler<P::Backend>>,
    last: Option<Capture>,
    export_rate: u32,
}

impl<P: BackendProvider> Conductor<P> {
    pub fn new(provider: P, cfg: ComposerConfig, settings: Settings) -> Self {
        Self { provider, cfg, settings, live: None, last: None, export_rate: DEFAULT_EXPORT_RATE }
    }

    pub fn with_export_rate(mut self, sample_rate: u32) -> Self {
        self.export_rate = sample_rate;
        self
    }

    #[inline] pub fn config(&self) -> &ComposerConfig { &self.cfg }
    #[inline] pub fn settings(&self) -> &Settings { &self.settings }
    #[inline] pub fn last_seed(&self) -> Option<u32> { self.last.as_ref().map(|c| c.seed) }
    #[inline] pub fn live(&self) -> Option<&LiveScheduler<P::Backend>> { self.live.as_ref() }
    #[inline] pub fn live_mut(&mut self) -> Option<&mut LiveScheduler<P::Backend>> { self.live.as_mut() }

    /// Takes effect at the next `start`.
    pub fn set_settings(&mut self, settings: Settings) {
        self.settings = settings;
    }

    /// How often the host should call [`Conductor::tick`].
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.cfg.profile.tick_interval_ms())
    }

    /// Begin a live session, stopping any running one first. Returns the seed.
    pub fn start(&mut self, seed: Option<u32>) -> Result<u32, SessionError> {
        if self.is_running() {
            self.stop(false);
        }
        let backend = self.provider.open()?;
        let seed = seed.unwrap_or_else(wall_clock_seed);
        let limit = self.settings.song_duration.limit_secs();
        let capture = Capture { seed, tone_base: self.settings.tone_base_hz, cfg: self.cfg.clone() };
        info!(seed, tone_base = capture.tone_base, duration = %self.settings.song_duration, "starting session");

        let mut live = LiveScheduler::new(backend, seed, capture.tone_base, &capture.cfg, limit);
        live.tick()?;
        self.live = Some(live);
        self.last = Some(capture);
        Ok(seed)
    }

    /// Periodic timer body. Does nothing when no session is running.
    pub fn tick(&mut self) -> Result<usize, SessionError> {
        match self.live.as_mut() {
            Some(live) if !live.is_stopped() => Ok(live.tick()?),
            _ => Ok(0),
        }
    }

    /// Stop the live session. The backend stays open so a fade can finish;
    /// it is closed when the next session starts or the conductor drops.
    pub fn stop(&mut self, fade: bool) {
        if let Some(live) = self.live.as_mut() {
            live.stop(fade);
        }
    }

    /// A session is running until it is stopped or it has halted and its
    /// last voice has finished.
    pub fn is_running(&self) -> bool {
        self.live.as_ref().is_some_and(|l| !l.is_stopped() && !l.is_drained())
    }

    /// Offline re-render of the last started session, with the tone base and
    /// config it was started with.
    pub fn export_render(&self, seconds: f64) -> Result<AudioBuffer, SessionError> {
        let last = self.last.as_ref().ok_or(SessionError::NoSeed)?;
        offline::render(last.seed, &last.cfg, last.tone_base, seconds, self.export_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{AudioBackend, VoiceId, VoiceRequest};
    use crate::error::BackendError;
    use crate::settings::SongDuration;

    #[derive(Default)]
    struct Silent {
        now: f64,
        voices: u64,
    }

    impl AudioBackend for Silent {
        fn current_time(&self) -> f64 { self.now }
        fn sample_rate(&self) -> u32 { 48_000 }
        fn play(&mut self, _r: VoiceRequest) -> Result<VoiceId, BackendError> {
            self.voices += 1;
            Ok(VoiceId(self.voices))
        }
        fn fade_out(&mut self, _: VoiceId, _: f64, _: f64) -> Result<(), BackendError> { Ok(()) }
        fn release(&mut self, _: VoiceId, _: f64) -> Result<(), BackendError> { Ok(()) }
    }

    struct Provider {
        available: bool,
    }

    impl BackendProvider for Provider {
        type Backend = Silent;
        fn open(&mut self) -> Result<Silent, BackendError> {
            if self.available {
                Ok(Silent::default())
            } else {
                Err(BackendError::Unavailable("no output device".into()))
            }
        }
    }

    fn conductor(available: bool) -> Conductor<Provider> {
        Conductor::new(Provider { available }, ComposerConfig::default(), Settings::default())
            .with_export_rate(8_000)
    }

    #[test]
    fn export_without_a_seed_is_rejected() {
        let c = conductor(true);
        assert!(matches!(c.export_render(5.0), Err(SessionError::NoSeed)));
    }

    #[test]
    fn start_fails_fast_without_audio() {
        let mut c = conductor(false);
        assert!(matches!(c.start(Some(1)), Err(SessionError::Backend(BackendError::Unavailable(_)))));
        assert!(!c.is_running());
        assert_eq!(c.last_seed(), None);
    }

    #[test]
    fn start_stop_and_export_reuse_the_seed() {
        let mut c = conductor(true);
        assert_eq!(c.start(Some(42)).unwrap(), 42);
        assert!(c.is_running());
        assert!(c.live().unwrap().backend().voices > 0);
        c.stop(true);
        assert!(!c.is_running());
        assert_eq!(c.tick().unwrap(), 0);
        let buf = c.export_render(1.0).unwrap();
        assert_eq!(buf.frames(), 8_000);
        assert_eq!(c.last_seed(), Some(42));
    }

    #[test]
    fn export_ignores_settings_changed_after_start() {
        let mut c = conductor(true);
        c.start(Some(42)).unwrap();
        c.set_settings(Settings { tone_base_hz: 150.0, ..Settings::default() });
        let exported = c.export_render(2.0).unwrap();
        let started = offline::render(42, c.config(), Settings::default().tone_base_hz, 2.0, 8_000).unwrap();
        assert_eq!(exported.samples, started.samples);
        assert_ne!(exported.samples, offline::render(42, c.config(), 150.0, 2.0, 8_000).unwrap().samples);
    }

    #[test]
    fn backend_errors_do_not_claim_a_failed_start() {
        let msg = SessionError::from(BackendError::Closed).to_string();
        assert_eq!(msg, "audio backend error: audio backend closed");
        assert!(SessionError::from(BackendError::QueueFull).to_string().contains("queue is full"));
    }

    #[test]
    fn restart_replaces_the_session() {
        let mut c = conductor(true);
        c.start(Some(1)).unwrap();
        c.start(Some(2)).unwrap();
        assert_eq!(c.live().unwrap().seed(), 2);
        assert!(c.is_running());
    }

    #[test]
    fn finite_setting_limits_the_session() {
        let mut c = conductor(true);
        c.set_settings(Settings { song_duration: SongDuration::Finite(60), ..Settings::default() });
        c.start(Some(42)).unwrap();
        let mut now = 0.0;
        while c.is_running() && now < 200.0 {
            now += 0.1;
            c.live_mut().unwrap().backend_mut().now = now;
            c.tick().unwrap();
        }
        let live = c.live().unwrap();
        assert!(live.is_halted());
        assert!(live.composition().clock() >= 60.0);
        assert!(!c.is_running());
        assert!(now > 80.0 && now < 200.0);
    }
}
