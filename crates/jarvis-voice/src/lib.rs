//! Wake-phrase listening for jarvis.
//!
//! The [`WakeListener`] samples short audio windows, skips windows without
//! voice activity, transcribes the rest and publishes a [`WakeEvent`] when
//! the transcript contains the trigger phrase. It performs no automation
//! itself; callers subscribe to events and decide what to do.
//!
//! # Modules
//!
//! - [`capture`]: microphone capture via system commands (SoX `rec`, `arecord`)
//!   and RMS-based voice activity detection.
//! - [`stt`]: speech-to-text provider trait and the Whisper-compatible HTTP client.
//! - [`wake`]: the listener state machine (Idle -> Listening -> Idle).
//! - [`scripted`]: canned audio and transcripts for tests and demos.
//!
//! All audio capture uses subprocesses; no native audio libraries are linked.

pub mod capture;
pub mod scripted;
pub mod stt;
pub mod wake;

use jarvis_types::ErrorKind;

pub use capture::{AudioSource, CommandAudioSource};
pub use stt::{SttProvider, WhisperStt};
pub use wake::{WakeEvent, WakeListener, WakeSettings, WakeStatus};

/// Errors that can occur during voice operations.
#[derive(Debug, thiserror::Error)]
pub enum VoiceError {
    /// No audio device or capture tool; the listener stays degraded.
    #[error("audio unavailable: {0}")]
    Unavailable(String),

    /// A single recording failed.
    #[error("audio capture error: {0}")]
    CaptureError(String),

    /// Speech-to-text transcription failed.
    #[error("STT error: {0}")]
    SttError(String),

    /// Transcription did not finish in time.
    #[error("transcription timed out")]
    Timeout,

    /// HTTP request error.
    #[error("http error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    ConfigError(String),
}

impl VoiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            VoiceError::Unavailable(_) => ErrorKind::CaptureUnavailable,
            VoiceError::Timeout => ErrorKind::Timeout,
            VoiceError::ConfigError(_) => ErrorKind::InvalidArgument,
            VoiceError::CaptureError(_)
            | VoiceError::SttError(_)
            | VoiceError::HttpError(_)
            | VoiceError::IoError(_) => ErrorKind::Backend,
        }
    }
}

/// Convenience alias for voice operation results.
pub type VoiceResult<T> = Result<T, VoiceError>;
