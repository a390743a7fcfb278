//! Command execution for jarvis.
//!
//! [`CommandExecutor`] classifies a command with the policy engine, runs it
//! through the host shell under a hard timeout, and reports every outcome
//! as an [`ExecutionResult`]. Batches and named command templates are built
//! on top of single execution.

pub mod batch;
pub mod executor;
#[cfg(unix)]
mod kill_group;
pub mod templates;

use jarvis_types::ErrorKind;

pub use batch::BatchResult;
pub use executor::{CommandExecutor, ExecutionResult};
pub use templates::{CommandTemplate, TemplateInfo};

/// Failures raised while running a command. Never escapes
/// [`CommandExecutor::execute`]; it is folded into the result instead.
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error("{reason}")]
    Denied { reason: String },

    #[error("timed out after {secs} seconds")]
    Timeout { secs: u64 },

    #[error("failed to spawn command: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("failed waiting for command: {0}")]
    Wait(#[source] std::io::Error),

    #[error("template '{name}' not found")]
    TemplateNotFound { name: String },
}

impl ExecError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExecError::Denied { .. } => ErrorKind::PolicyDenied,
            ExecError::Timeout { .. } => ErrorKind::Timeout,
            ExecError::Spawn(_) | ExecError::Wait(_) => ErrorKind::Backend,
            ExecError::TemplateNotFound { .. } => ErrorKind::NotFound,
        }
    }
}
