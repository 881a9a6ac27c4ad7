//! Shared reverb on the send bus.
//!
//! Schroeder-style: two diffusing all-passes, four damped combs in parallel,
//! then one all-pass per output channel with different lengths for width.
//! Output is 100% wet; the dry path is mixed by the voice pool. Delay lines
//! are allocated once when the reverb is built and never resized while
//! running.

use driftbell_core::dsp::kill_denormals;
use driftbell_core::filters::OnePoleLP;

#[derive(Clone, Debug)]
struct DelayLine {
    buf: Vec<f32>,
    i: usize,
}

impl DelayLine {
    fn new(len: usize) -> Self {
        Self { buf: vec![0.0; len.max(1)], i: 0 }
    }
    #[inline] fn read(&self) -> f32 { self.buf[self.i] }
    #[inline]
    fn write_advance(&mut self, x: f32) {
        self.buf[self.i] = x;
        self.i += 1;
        if self.i >= self.buf.len() { self.i = 0; }
    }
}

#[derive(Clone, Debug)]
struct Allpass {
    d: DelayLine,
    g: f32,
}

impl Allpass {
    fn new(len: usize, g: f32) -> Self { Self { d: DelayLine::new(len), g: g.clamp(-0.999, 0.999) } }
    #[inline]
    fn process(&mut self, x: f32) -> f32 {
        let z = self.d.read();
        let y = z - self.g * x;
        self.d.write_advance(x + self.g * y);
        kill_denormals(y)
    }
}

/// Feedback comb with a low-pass in the loop for high-frequency damping.
#[derive(Clone, Debug)]
struct CombLp {
    d: DelayLine,
    fb: f32,
    lp: OnePoleLP,
}

impl CombLp {
    fn new(len: usize, fb: f32, damp_hz: f32, sr: f32) -> Self {
        Self { d: DelayLine::new(len), fb: fb.clamp(0.0, 0.98), lp: OnePoleLP::new(damp_hz, sr) }
    }
    #[inline]
    fn process(&mut self, x: f32) -> f32 {
        let z = self.d.read();
        let damped = self.lp.process(z);
        self.d.write_advance(x + self.fb * damped);
        kill_denormals(z)
    }
}

#[derive(Clone, Debug)]
pub struct ReverbSend {
    pre: [Allpass; 2],
    combs: [CombLp; 4],
    post_l: Allpass,
    post_r: Allpass,
}

impl ReverbSend {
    /// `room` in [0,1] maps to comb feedback, `damp` in [0,1] darkens the tail.
    pub fn new(sr: f32, room: f32, damp: f32) -> Self {
        let scale = sr.max(1.0) / 48_000.0;
        let len = |n: f32| (n * scale) as usize;
        let fb = 0.6 + 0.37 * room.clamp(0.0, 1.0);
        let cut = 1500.0 + 9000.0 * (1.0 - damp.clamp(0.0, 1.0));
        Self {
            pre: [Allpass::new(len(641.0), 0.72), Allpass::new(len(997.0), 0.70)],
            combs: [
                CombLp::new(len(7789.0), fb, cut, sr),
                CombLp::new(len(8513.0), fb, cut, sr),
                CombLp::new(len(9449.0), fb, cut, sr),
                CombLp::new(len(10867.0), fb, cut, sr),
            ],
            post_l: Allpass::new(len(579.0), 0.65),
            post_r: Allpass::new(len(773.0), 0.61),
        }
    }

    /// Feed one mono send sample, get the wet stereo pair.
    #[inline]
    pub fn process(&mut self, x: f32) -> (f32, f32) {
        let first = self.pre[0].process(x);
        let diffused = self.pre[1].process(first);
        let mut sum = 0.0;
        for c in &mut self.combs {
            sum += c.process(diffused);
        }
        sum *= 0.25;
        (self.post_l.process(sum), self.post_r.process(sum))
    }
}
