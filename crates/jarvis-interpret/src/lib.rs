//! Natural-language interpretation for jarvis.
//!
//! An [`Interpreter`] asks a [`Translator`] (normally an OpenAI-compatible
//! chat completions endpoint) to turn a request into one shell command,
//! re-validates the answer with the policy engine, and falls back to a
//! local phrase table when the service is unreachable or answers with
//! nothing usable.
//!
//! # Modules
//!
//! - [`translator`]: the [`Translator`] trait and the HTTP implementation.
//! - [`fallback`]: deterministic phrase/keyword lookup per platform.
//! - [`adapter`]: the [`Interpreter`] tying both to the policy engine.

pub mod adapter;
pub mod fallback;
pub mod translator;

use jarvis_types::ErrorKind;

pub use adapter::{Interpretation, Interpreter, Method};
pub use fallback::FallbackTable;
pub use translator::{OpenAiTranslator, Translator};

/// Errors from the external translation service.
#[derive(Debug, thiserror::Error)]
pub enum InterpretError {
    #[error("missing API key: environment variable {0} is not set")]
    MissingApiKey(String),

    #[error("translation service returned {status}: {body}")]
    Service { status: u16, body: String },

    #[error("unexpected translation response: {0}")]
    BadResponse(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

impl InterpretError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::TranslationFailure
    }
}

pub type InterpretResult<T> = Result<T, InterpretError>;
