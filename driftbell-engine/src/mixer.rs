//! Voice pool: turns [`VoiceRequest`]s into stereo samples.
//!
//! Each voice is a carrier oscillator with optional frequency modulation,
//! gain automation, optional resonant low-pass and constant-power panning.
//! All voices feed a dry bus and the shared [`ReverbSend`]. The pool owns its
//! own sample clock; voices are silent before their start time and handed
//! back through [`VoicePool::retire`] once their stop time has passed.
//!
//! The voice list has a fixed capacity so rendering never allocates; the
//! real-time backend relies on that.

use driftbell_core::dsp::{pan_gains, soft_clip};
use driftbell_core::filters::ResonantLp;

use crate::backend::{VoiceId, VoiceRequest};
use crate::error::BackendError;
use crate::nodes::Osc;
use crate::reverb::ReverbSend;

const REVERB_RETURN: f32 = 0.6;

/// Voices that can sound at once.
pub const MAX_VOICES: usize = 256;

#[derive(Debug)]
struct ActiveVoice {
    id: VoiceId,
    req: Box<VoiceRequest>,
    carrier: Osc,
    modulator: Option<Osc>,
    lp: Option<ResonantLp>,
    gl: f32,
    gr: f32,
}

impl ActiveVoice {
    fn new(id: VoiceId, req: Box<VoiceRequest>, sr: f32) -> Self {
        let (gl, gr) = pan_gains(req.pan);
        Self {
            id,
            carrier: Osc::new(req.wave),
            modulator: req.modulator.as_ref().map(|m| Osc::new(m.wave)),
            lp: req.lowpass.map(|f| ResonantLp::new(f.cutoff_hz, f.q, sr)),
            gl,
            gr,
            req,
        }
    }

    /// One sample of the voice at time `t`, before panning.
    #[inline]
    fn sample(&mut self, t: f64, sr: f32) -> f32 {
        let mut freq = self.req.freq_hz;
        if let (Some(osc), Some(m)) = (self.modulator.as_mut(), self.req.modulator.as_ref()) {
            freq += m.depth_hz.value_at(t) * osc.next(m.freq_hz, sr);
        }
        let mut s = self.carrier.next(freq, sr);
        if let Some(lp) = self.lp.as_mut() {
            s = lp.process(s);
        }
        s * self.req.gain.value_at(t)
    }
}

#[derive(Debug)]
pub struct VoicePool {
    sr: f32,
    frame: u64,
    voices: Vec<ActiveVoice>,
    reverb: ReverbSend,
    master: f32,
}

impl VoicePool {
    pub fn new(sample_rate: u32, master: f32) -> Self {
        let sr = sample_rate.max(1) as f32;
        Self {
            sr,
            frame: 0,
            voices: Vec::with_capacity(MAX_VOICES),
            reverb: ReverbSend::new(sr, 0.75, 0.45),
            master,
        }
    }

    /// Seconds rendered so far.
    #[inline]
    pub fn time(&self) -> f64 {
        self.frame as f64 / f64::from(self.sr)
    }

    #[inline] pub fn len(&self) -> usize { self.voices.len() }
    #[inline] pub fn is_empty(&self) -> bool { self.voices.is_empty() }

    /// Start tracking a voice. A full pool hands the request back.
    pub fn add(&mut self, id: VoiceId, req: Box<VoiceRequest>) -> Result<(), Box<VoiceRequest>> {
        if self.voices.len() >= MAX_VOICES {
            return Err(req);
        }
        self.voices.push(ActiveVoice::new(id, req, self.sr));
        Ok(())
    }

    fn voice_mut(&mut self, id: VoiceId) -> Result<&mut ActiveVoice, BackendError> {
        self.voices
            .iter_mut()
            .find(|v| v.id == id)
            .ok_or(BackendError::UnknownVoice(id))
    }

    pub fn fade_out(&mut self, id: VoiceId, at: f64, over: f64) -> Result<(), BackendError> {
        let v = self.voice_mut(id)?;
        fade_request(&mut v.req, at, over);
        Ok(())
    }

    pub fn release(&mut self, id: VoiceId, at: f64) -> Result<(), BackendError> {
        let v = self.voice_mut(id)?;
        v.req.stop = v.req.stop.min(at);
        Ok(())
    }

    /// Render one stereo frame and advance the clock.
    #[inline]
    pub fn next_frame(&mut self) -> (f32, f32) {
        let t = self.time();
        let sr = self.sr;
        let (mut l, mut r, mut send) = (0.0f32, 0.0f32, 0.0f32);
        for v in &mut self.voices {
            if t < v.req.start || t >= v.req.stop {
                continue;
            }
            let s = v.sample(t, sr);
            l += s * v.gl;
            r += s * v.gr;
            send += s * v.req.reverb_send;
        }
        let (wl, wr) = self.reverb.process(send);
        self.frame += 1;
        (
            soft_clip((l + wl * REVERB_RETURN) * self.master),
            soft_clip((r + wr * REVERB_RETURN) * self.master),
        )
    }

    /// Fill an interleaved buffer. Mono outputs get the channel average;
    /// channels beyond two repeat the stereo pair.
    pub fn render_interleaved(&mut self, out: &mut [f32], channels: usize) {
        let channels = channels.max(1);
        for frame in out.chunks_mut(channels) {
            let (l, r) = self.next_frame();
            if channels == 1 {
                frame[0] = 0.5 * (l + r);
            } else {
                for (c, s) in frame.iter_mut().enumerate() {
                    *s = if c % 2 == 0 { l } else { r };
                }
            }
        }
    }

    /// Remove every voice whose stop time has passed, in order, passing its
    /// request to `sink`.
    pub fn retire(&mut self, mut sink: impl FnMut(Box<VoiceRequest>)) {
        let now = self.time();
        let mut i = 0;
        while i < self.voices.len() {
            if self.voices[i].req.stop > now {
                i += 1;
            } else {
                sink(self.voices.remove(i).req);
            }
        }
    }
}

/// Cancel pending gain automation from `at` and ramp to silence over `over`.
pub(crate) fn fade_request(req: &mut VoiceRequest, at: f64, over: f64) {
    let end = at + over.max(0.0);
    req.gain.cancel_and_hold(at).linear_ramp_to(0.0, end);
    req.stop = req.stop.min(end);
}
