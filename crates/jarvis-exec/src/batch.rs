//! Batch execution: run a list of commands one after another.
//!
//! Every non-blank command runs regardless of earlier failures; each one
//! passes through the full policy check on its own.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::executor::{CommandExecutor, ExecutionResult};
use crate::templates::{self, TemplateInfo};
use crate::ExecError;

/// Outcome of a batch or template run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResult {
    pub batch_name: String,
    pub total_commands: usize,
    pub successful_commands: usize,
    pub results: Vec<ExecutionResult>,
    pub timestamp: DateTime<Utc>,
}

impl BatchResult {
    pub fn all_succeeded(&self) -> bool {
        self.successful_commands == self.total_commands
    }
}

impl CommandExecutor {
    /// Run every non-blank command in order, without short-circuiting.
    pub async fn execute_batch<S: AsRef<str>>(&self, name: &str, commands: &[S]) -> BatchResult {
        let mut results = Vec::new();
        for command in commands.iter().map(AsRef::as_ref) {
            let command = command.trim();
            if command.is_empty() {
                continue;
            }
            results.push(self.execute(command).await);
        }

        let successful_commands = results.iter().filter(|r| r.success).count();
        info!(
            batch = name,
            total = results.len(),
            successful = successful_commands,
            "batch finished"
        );

        BatchResult {
            batch_name: name.to_string(),
            total_commands: results.len(),
            successful_commands,
            results,
            timestamp: Utc::now(),
        }
    }

    /// Run a named template for this executor's platform as a batch.
    pub async fn execute_template(&self, name: &str) -> Result<BatchResult, ExecError> {
        let template = templates::find(self.policy().platform(), name)?;
        Ok(self.execute_batch(template.name, template.commands).await)
    }

    /// Templates available on this executor's platform.
    pub fn list_templates(&self) -> Vec<TemplateInfo> {
        templates::for_platform(self.policy().platform())
            .iter()
            .map(TemplateInfo::from)
            .collect()
    }
}
