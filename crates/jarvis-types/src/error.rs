//! Error types shared across all jarvis crates.

use serde::{Deserialize, Serialize};

/// Failure taxonomy reported alongside every failed result.
///
/// Each crate keeps its own error enum; all of them map onto one of these
/// kinds so callers can branch on the failure without parsing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Command matched a denylist pattern or was absent from the allowlist.
    PolicyDenied,
    /// A subprocess or a wait-for-template exceeded its time budget.
    Timeout,
    /// Template had zero matches, or a named window/template does not exist.
    NotFound,
    /// Coordinates outside the current screen dimensions.
    OutOfBounds,
    /// No display surface (or audio device) to work with.
    CaptureUnavailable,
    /// The external interpretation service failed or answered ambiguously.
    TranslationFailure,
    /// Sequence step tag not recognized.
    UnknownActionType,
    /// Malformed parameters supplied by the caller.
    InvalidArgument,
    /// Host tool or service failure that fits no other kind.
    Backend,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::PolicyDenied => "policy_denied",
            ErrorKind::Timeout => "timeout",
            ErrorKind::NotFound => "not_found",
            ErrorKind::OutOfBounds => "out_of_bounds",
            ErrorKind::CaptureUnavailable => "capture_unavailable",
            ErrorKind::TranslationFailure => "translation_failure",
            ErrorKind::UnknownActionType => "unknown_action_type",
            ErrorKind::InvalidArgument => "invalid_argument",
            ErrorKind::Backend => "backend",
        };
        f.write_str(s)
    }
}

/// Errors raised by shared infrastructure (configuration, wiring).
#[derive(Debug, thiserror::Error)]
pub enum JarvisError {
    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("history ledger error: {0}")]
    LedgerError(String),

    #[error("component unavailable: {0}")]
    Unavailable(String),
}

impl JarvisError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            JarvisError::ConfigError(_) => ErrorKind::InvalidArgument,
            JarvisError::LedgerError(_) => ErrorKind::Backend,
            JarvisError::Unavailable(_) => ErrorKind::CaptureUnavailable,
        }
    }
}
