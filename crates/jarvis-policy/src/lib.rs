//! Command policy classifier for jarvis.
//!
//! Classifies candidate shell commands as allowed or denied using a fixed
//! denylist of dangerous substrings followed by an allowlist of command
//! verbs. Tables exist for Windows and Unix hosts; see [`builtin`].

pub mod builtin;
pub mod engine;

use jarvis_types::ErrorKind;
use thiserror::Error;

pub use builtin::{PolicyTable, SafeCommand};
pub use engine::PolicyEngine;

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("{reason}")]
    Denied { command: String, reason: String },
}

impl PolicyError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PolicyError::Denied { .. } => ErrorKind::PolicyDenied,
        }
    }
}
