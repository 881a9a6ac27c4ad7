//! Driftbell engine: a seeded ambient composer.
//!
//! Crate layout:
//! - [`rng`], [`tonal`], [`movement`], [`arc`] : the decision state
//! - [`composer`] : the step function emitting [`ScoreEvent`]s
//! - [`voices`]   : note events to fully specified voice requests
//! - [`backend`]  : the Audio Backend capability (`AudioBackend`, `BackendProvider`)
//! - [`scheduler`], [`lifecycle`] : live realization and voice-handle bookkeeping
//! - [`offline`], [`wav`] : batch realization, rendering and export
//! - [`session`], [`settings`], [`config`] : the control surface
//! - [`nodes`], [`reverb`], [`mixer`] : the in-process synth behind both backends
//! - `realtime` (feature `realtime`) : `cpal` output stream backend
//!
//! The same seed and config always produce the same timeline, whichever
//! clock drives the composer.

use cfg_if::cfg_if;

pub mod arc;
pub mod backend;
pub mod composer;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod mixer;
pub mod movement;
pub mod nodes;
pub mod offline;
pub mod reverb;
pub mod rng;
pub mod scheduler;
pub mod session;
pub mod settings;
pub mod tonal;
pub mod voices;
pub mod wav;

cfg_if! {
    if #[cfg(feature = "realtime")] {
        pub mod realtime;
        pub use realtime::{CpalProvider, StreamBackend};
    }
}

pub use backend::{AudioBackend, BackendProvider, VoiceId, VoiceKind, VoiceRequest};
pub use composer::{Composition, Drive, NoteEvent, ScoreEvent};
pub use config::{ComposerConfig, SchedulerProfile};
pub use error::{BackendError, SessionError};
pub use movement::Movement;
pub use offline::{AudioBuffer, OfflineRenderer};
pub use scheduler::LiveScheduler;
pub use session::Conductor;
pub use settings::{Settings, SongDuration};
