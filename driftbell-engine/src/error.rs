//! Error types for the engine.

use thiserror::Error;

use crate::backend::VoiceId;

/// Failures reported by an audio backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// No usable audio output (missing device, unsupported host).
    #[error("audio capability unavailable: {0}")]
    Unavailable(String),

    #[error("audio stream error: {0}")]
    Stream(String),

    /// The backend's command queue is full; nothing was queued.
    #[error("audio command queue is full")]
    QueueFull,

    #[error("unknown voice handle {0:?}")]
    UnknownVoice(VoiceId),

    /// The consuming side of the backend has gone away.
    #[error("audio backend closed")]
    Closed,
}

/// Errors surfaced by the session control surface.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("audio backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("nothing to export: start a session first so its seed can be re-rendered")]
    NoSeed,

    #[error("invalid settings: {0}")]
    Settings(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
