//! driftbell core: DSP primitives and parameter automation.
//!
//! Features
//! - `fast-math`: enable approximations (polys/rationals) for sine and tanh
//!
//! Modules
//! - [`dsp`]        : math helpers (phase wrap, semitone ratios, trig, pan law)
//! - [`filters`]    : one-pole low-pass and a resonant TPT low-pass
//! - [`automation`] : piecewise set / linear / exponential parameter curves
//!
//! Everything here is allocation free per sample; only building an
//! [`automation::Automation`] allocates.

pub mod automation;
pub mod dsp;
pub mod filters;

/// Commonly used types/functions for convenience:
pub mod prelude {
    pub use crate::automation::Automation;
    pub use crate::dsp::{
        fast_sin, kill_denormals, pan_gains, semitone_ratio, soft_clip, wrap_phase01,
        EXP_FLOOR, TAU,
    };
    pub use crate::filters::{OnePoleLP, ResonantLp};
}
