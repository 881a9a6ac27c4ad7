//! Real-time backend on a `cpal` output stream.
//!
//! The audio callback owns a [`VoicePool`]. The scheduler side talks to it
//! through a bounded command channel and reads the playback clock from a
//! shared frame counter, so nothing on the audio thread takes a lock.
//! Sends never block: a full queue is an error for the caller. Finished
//! requests travel back on a second channel and are freed on the scheduler
//! side, so the callback neither allocates nor frees.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use tracing::{error, info};

use crate::backend::{AudioBackend, BackendProvider, VoiceId, VoiceRequest};
use crate::error::BackendError;
use crate::mixer::VoicePool;
use crate::offline::MASTER_GAIN;

const COMMAND_QUEUE: usize = 1024;
const SCRATCH_FRAMES: usize = 1024;
/// Breakpoints reserved per voice: room for two fades.
const FADE_HEADROOM: usize = 4;

enum Command {
    Play(VoiceId, Box<VoiceRequest>),
    FadeOut(VoiceId, f64, f64),
    Release(VoiceId, f64),
}

fn unavailable(e: impl std::fmt::Display) -> BackendError {
    BackendError::Unavailable(e.to_string())
}

fn stream_err(e: impl std::fmt::Display) -> BackendError {
    BackendError::Stream(e.to_string())
}

fn enqueue(tx: &Sender<Command>, cmd: Command) -> Result<(), BackendError> {
    tx.try_send(cmd).map_err(|e| match e {
        TrySendError::Full(_) => BackendError::QueueFull,
        TrySendError::Disconnected(_) => BackendError::Closed,
    })
}

/// Names of the default host's output devices.
pub fn list_output_devices() -> Result<Vec<String>, BackendError> {
    let host = cpal::default_host();
    let mut names = Vec::new();
    for dev in host.output_devices().map_err(unavailable)? {
        names.push(dev.name().map_err(unavailable)?);
    }
    Ok(names)
}

fn pick_device(name: Option<&str>) -> Result<cpal::Device, BackendError> {
    let host = cpal::default_host();
    if let Some(name) = name {
        for d in host.output_devices().map_err(unavailable)? {
            if d.name().map_err(unavailable)? == name {
                return Ok(d);
            }
        }
        return Err(unavailable(format!("requested device not found: {name}")));
    }
    host.default_output_device().ok_or_else(|| unavailable("no default output device"))
}

/// Closest supported config to the requested rate and channel count.
fn choose_config(
    device: &cpal::Device,
    req_sr: Option<u32>,
    req_ch: Option<u16>,
) -> Result<cpal::SupportedStreamConfig, BackendError> {
    if req_sr.is_none() && req_ch.is_none() {
        return device.default_output_config().map_err(unavailable);
    }

    let mut best: Option<(u64, cpal::SupportedStreamConfigRange)> = None;
    for range in device.supported_output_configs().map_err(unavailable)? {
        let ch = range.channels();
        let (lo, hi) = (range.min_sample_rate().0, range.max_sample_rate().0);
        let ch_pen = req_ch.map_or(0, |c| u64::from(ch.abs_diff(c)));
        let sr_pen = req_sr.map_or(0, |sr| {
            if (lo..=hi).contains(&sr) { 0 } else { u64::from(lo.abs_diff(sr).min(hi.abs_diff(sr))) }
        });
        let score = sr_pen.saturating_mul(1000) + ch_pen;
        if best.as_ref().map_or(true, |(s, _)| score < *s) {
            best = Some((score, range));
        }
    }

    let (_, range) = best.ok_or_else(|| unavailable("no supported output configs"))?;
    let sr = match req_sr {
        Some(sr) => cpal::SampleRate(sr.clamp(range.min_sample_rate().0, range.max_sample_rate().0)),
        None => range.max_sample_rate(),
    };
    Ok(range.with_sample_rate(sr))
}

/// Opens the output device on demand.
#[derive(Clone, Debug, Default)]
pub struct CpalProvider {
    pub device: Option<String>,
    pub sample_rate: Option<u32>,
    pub channels: Option<u16>,
}

impl BackendProvider for CpalProvider {
    type Backend = StreamBackend;

    fn open(&mut self) -> Result<StreamBackend, BackendError> {
        StreamBackend::open(self.device.as_deref(), self.sample_rate, self.channels)
    }
}

pub struct StreamBackend {
    _stream: cpal::Stream,
    tx: Sender<Command>,
    retired: Receiver<Box<VoiceRequest>>,
    frames: Arc<AtomicU64>,
    sample_rate: u32,
    next_id: u64,
}

impl StreamBackend {
    pub fn open(device: Option<&str>, req_sr: Option<u32>, req_ch: Option<u16>) -> Result<Self, BackendError> {
        let device = pick_device(device)?;
        let supported = choose_config(&device, req_sr, req_ch)?;
        let format = supported.sample_format();
        let cfg = supported.config();
        let sample_rate = cfg.sample_rate.0;

        let (tx, rx) = bounded(COMMAND_QUEUE);
        let (graveyard, retired) = bounded(COMMAND_QUEUE);
        let frames = Arc::new(AtomicU64::new(0));
        let pool = VoicePool::new(sample_rate, MASTER_GAIN);
        let ends = CallbackEnds { pool, rx, graveyard, frames: frames.clone() };

        let stream = match format {
            cpal::SampleFormat::F32 => build_stream::<f32>(&device, &cfg, ends),
            cpal::SampleFormat::I16 => build_stream::<i16>(&device, &cfg, ends),
            cpal::SampleFormat::U16 => build_stream::<u16>(&device, &cfg, ends),
            other => Err(unavailable(format!("unsupported device sample format: {other:?}"))),
        }?;
        stream.play().map_err(stream_err)?;

        info!(
            device = %device.name().unwrap_or_default(),
            sample_rate,
            channels = cfg.channels,
            ?format,
            "audio stream open"
        );
        Ok(Self { _stream: stream, tx, retired, frames, sample_rate, next_id: 0 })
    }

    fn send(&self, cmd: Command) -> Result<(), BackendError> {
        self.retired.try_iter().for_each(drop);
        enqueue(&self.tx, cmd)
    }
}

impl AudioBackend for StreamBackend {
    fn current_time(&self) -> f64 {
        self.frames.load(Ordering::Acquire) as f64 / f64::from(self.sample_rate)
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn play(&mut self, mut request: VoiceRequest) -> Result<VoiceId, BackendError> {
        request.gain.reserve(FADE_HEADROOM);
        let id = VoiceId(self.next_id);
        self.send(Command::Play(id, Box::new(request)))?;
        self.next_id += 1;
        Ok(id)
    }

    fn fade_out(&mut self, voice: VoiceId, at: f64, over: f64) -> Result<(), BackendError> {
        self.send(Command::FadeOut(voice, at, over))
    }

    fn release(&mut self, voice: VoiceId, at: f64) -> Result<(), BackendError> {
        self.send(Command::Release(voice, at))
    }
}

/// Everything the audio callback owns.
struct CallbackEnds {
    pool: VoicePool,
    rx: Receiver<Command>,
    graveyard: Sender<Box<VoiceRequest>>,
    frames: Arc<AtomicU64>,
}

impl CallbackEnds {
    /// Apply pending commands. Unknown handles belong to voices that already
    /// ended and are ignored.
    fn drain_commands(&mut self) {
        for cmd in self.rx.try_iter() {
            let _ = match cmd {
                Command::Play(id, req) => {
                    if let Err(req) = self.pool.add(id, req) {
                        let _ = self.graveyard.try_send(req);
                    }
                    Ok(())
                }
                Command::FadeOut(id, at, over) => self.pool.fade_out(id, at, over),
                Command::Release(id, at) => self.pool.release(id, at),
            };
        }
    }

    /// Render into `out` through `scratch` in scratch-sized chunks, then hand
    /// finished voices back.
    fn fill<T>(&mut self, out: &mut [T], scratch: &mut [f32], channels: usize)
    where
        T: cpal::Sample + cpal::FromSample<f32>,
    {
        for chunk in out.chunks_mut(scratch.len()) {
            let buf = &mut scratch[..chunk.len()];
            self.pool.render_interleaved(buf, channels);
            for (o, s) in chunk.iter_mut().zip(buf.iter()) {
                *o = T::from_sample(*s);
            }
        }
        let graveyard = &self.graveyard;
        self.pool.retire(|req| {
            let _ = graveyard.try_send(req);
        });
        self.frames.fetch_add((out.len() / channels) as u64, Ordering::Release);
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    cfg: &cpal::StreamConfig,
    mut ends: CallbackEnds,
) -> Result<cpal::Stream, BackendError>
where
    T: cpal::Sample + cpal::FromSample<f32> + cpal::SizedSample + Send + 'static,
{
    let channels = usize::from(cfg.channels).max(1);
    let mut scratch: Vec<f32> = vec![0.0; SCRATCH_FRAMES * channels];

    device
        .build_output_stream(
            cfg,
            move |output: &mut [T], _| {
                ends.drain_commands();
                ends.fill(output, &mut scratch, channels);
            },
            |e| error!(error = %e, "audio stream error"),
            None,
        )
        .map_err(stream_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::VoiceKind;
    use crate::nodes::Wave;
    use driftbell_core::automation::Automation;

    fn request(start: f64, stop: f64) -> Box<VoiceRequest> {
        Box::new(VoiceRequest {
            kind: VoiceKind::Bell,
            wave: Wave::Sine,
            freq_hz: 440.0,
            modulator: None,
            gain: Automation::constant(0.2),
            lowpass: None,
            pan: 0.0,
            reverb_send: 0.0,
            start,
            stop,
        })
    }

    #[test]
    fn full_queue_fails_instead_of_blocking() {
        let (tx, rx) = bounded(1);
        enqueue(&tx, Command::Release(VoiceId(0), 1.0)).unwrap();
        let err = enqueue(&tx, Command::Release(VoiceId(1), 1.0)).unwrap_err();
        assert!(matches!(err, BackendError::QueueFull));
        drop(rx);
        let err = enqueue(&tx, Command::Release(VoiceId(2), 1.0)).unwrap_err();
        assert!(matches!(err, BackendError::Closed));
    }

    #[test]
    fn callback_returns_finished_requests_and_advances_the_clock() {
        let (tx, rx) = bounded(8);
        let (graveyard, retired) = bounded(8);
        let frames = Arc::new(AtomicU64::new(0));
        let mut ends = CallbackEnds { pool: VoicePool::new(8_000, 1.0), rx, graveyard, frames: frames.clone() };
        enqueue(&tx, Command::Play(VoiceId(0), request(0.0, 0.05))).unwrap();
        enqueue(&tx, Command::Play(VoiceId(1), request(0.0, 10.0))).unwrap();

        // more frames than the scratch holds, so the callback renders in chunks
        let mut scratch = vec![0.0f32; 256 * 2];
        let mut out = vec![0.0f32; 800 * 2];
        ends.drain_commands();
        ends.fill(&mut out, &mut scratch, 2);

        assert_eq!(frames.load(Ordering::Acquire), 800);
        assert!(out[1_000..].iter().any(|s| *s != 0.0));
        let back: Vec<f64> = retired.try_iter().map(|r| r.stop).collect();
        assert_eq!(back, vec![0.05]);
        assert_eq!(ends.pool.len(), 1);
    }
}
