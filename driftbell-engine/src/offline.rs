//! Offline realization: the whole timeline first, then the audio.
//!
//! [`OfflineRenderer`] is an [`AudioBackend`] whose clock stays at 0 while
//! the composition is scheduled into it. [`OfflineRenderer::render`] then runs
//! a [`VoicePool`] over the collected requests, activating each voice in the
//! block where it starts.

use std::path::Path;

use tracing::{info, warn};

use crate::backend::{AudioBackend, VoiceId, VoiceRequest};
use crate::composer::{Composition, Drive, ScoreEvent};
use crate::config::ComposerConfig;
use crate::error::{BackendError, SessionError};
use crate::lifecycle::VoiceArena;
use crate::mixer::{fade_request, VoicePool};
use crate::scheduler::dispatch;
use crate::wav;

pub const MASTER_GAIN: f32 = 0.8;
const BLOCK_FRAMES: usize = 512;

/// Interleaved stereo audio.
#[derive(Clone, Debug, PartialEq)]
pub struct AudioBuffer {
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<f32>,
}

impl AudioBuffer {
    pub fn frames(&self) -> usize {
        self.samples.len() / usize::from(self.channels.max(1))
    }

    pub fn duration_secs(&self) -> f64 {
        self.frames() as f64 / f64::from(self.sample_rate.max(1))
    }

    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0f32, |m, s| m.max(s.abs()))
    }

    pub fn to_wav_bytes(&self) -> std::io::Result<Vec<u8>> {
        wav::wav_bytes(self.sample_rate, self.channels, &self.samples)
    }

    pub fn write_wav(&self, path: &Path) -> Result<(), SessionError> {
        wav::write_wav_file(path, self.sample_rate, self.channels, &self.samples)?;
        info!(path = %path.display(), secs = self.duration_secs(), "wrote wav");
        Ok(())
    }
}

pub struct OfflineRenderer {
    sample_rate: u32,
    pool: VoicePool,
    pending: Vec<(VoiceId, VoiceRequest)>,
    next_id: u64,
}

impl OfflineRenderer {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            pool: VoicePool::new(sample_rate, MASTER_GAIN),
            pending: Vec::new(),
            next_id: 0,
        }
    }

    /// Voices accepted but not yet handed to the pool.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Render `seconds` of audio from the accepted requests.
    pub fn render(mut self, seconds: f64) -> AudioBuffer {
        let sr = f64::from(self.sample_rate);
        let total = (seconds.max(0.0) * sr).round() as usize;
        let mut samples = vec![0.0f32; total * 2];

        self.pending.sort_by(|a, b| a.1.start.total_cmp(&b.1.start));
        let mut queue = std::mem::take(&mut self.pending).into_iter().peekable();

        for (i, block) in samples.chunks_mut(BLOCK_FRAMES * 2).enumerate() {
            let block_end = ((i * BLOCK_FRAMES + block.len() / 2) as f64) / sr;
            while let Some((id, req)) = queue.next_if(|(_, r)| r.start < block_end) {
                if let Err(req) = self.pool.add(id, Box::new(req)) {
                    warn!(?id, start = req.start, "voice pool full; voice skipped");
                }
            }
            self.pool.render_interleaved(block, 2);
            self.pool.retire(drop);
        }

        AudioBuffer { sample_rate: self.sample_rate, channels: 2, samples }
    }

    fn pending_mut(&mut self, id: VoiceId) -> Option<&mut VoiceRequest> {
        self.pending.iter_mut().find(|(p, _)| *p == id).map(|(_, r)| r)
    }
}

impl AudioBackend for OfflineRenderer {
    fn current_time(&self) -> f64 {
        self.pool.time()
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn play(&mut self, request: VoiceRequest) -> Result<VoiceId, BackendError> {
        let id = VoiceId(self.next_id);
        self.next_id += 1;
        self.pending.push((id, request));
        Ok(id)
    }

    fn fade_out(&mut self, voice: VoiceId, at: f64, over: f64) -> Result<(), BackendError> {
        match self.pending_mut(voice) {
            Some(req) => {
                fade_request(req, at, over);
                Ok(())
            }
            None => self.pool.fade_out(voice, at, over),
        }
    }

    fn release(&mut self, voice: VoiceId, at: f64) -> Result<(), BackendError> {
        match self.pending_mut(voice) {
            Some(req) => {
                req.stop = req.stop.min(at);
                Ok(())
            }
            None => self.pool.release(voice, at),
        }
    }
}

/// The event timeline of `seed` up to `seconds`, as a fresh session would play it.
/// The horizon is capped at `cfg.max_render_secs` so the pass always ends.
pub fn timeline(seed: u32, cfg: &ComposerConfig, tone_base: f64, seconds: f64) -> Vec<ScoreEvent> {
    let until = seconds.min(cfg.max_render_secs);
    let mut c = Composition::new(seed, tone_base, cfg, None);
    let mut out = Vec::new();
    c.fill(Drive::Simulated { until }, &mut out);
    out
}

/// Re-render `seed` offline. Length is capped at `cfg.max_render_secs`.
pub fn render(
    seed: u32,
    cfg: &ComposerConfig,
    tone_base: f64,
    seconds: f64,
    sample_rate: u32,
) -> Result<AudioBuffer, SessionError> {
    let secs = seconds.clamp(0.0, cfg.max_render_secs);
    info!(seed, secs, sample_rate, "export begin");
    let events = timeline(seed, cfg, tone_base, secs);

    let mut renderer = OfflineRenderer::new(sample_rate);
    let mut arena = VoiceArena::new();
    dispatch(&events, &mut renderer, &mut arena, seed, 0.0, cfg)?;
    let voices = renderer.pending();
    let buf = renderer.render(secs);
    info!(seed, voices, peak = buf.peak(), "export end");
    Ok(buf)
}
