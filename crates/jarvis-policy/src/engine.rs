//! Policy classifier.
//!
//! [`PolicyEngine::classify`] is a pure function of the command text and
//! the loaded [`PolicyTable`]: lower-case and trim, scan the whole string
//! for denylisted substrings, then check the first token against the verb
//! allowlist. The denylist runs first, so an allowed verb carrying a
//! dangerous flag later in the string is still blocked.

use jarvis_types::{Command, Platform, Verdict};

use crate::builtin::{PolicyTable, SafeCommand};
use crate::PolicyError;

/// Classifies commands against one platform's table.
#[derive(Debug, Clone, Copy)]
pub struct PolicyEngine {
    table: PolicyTable,
}

impl PolicyEngine {
    pub fn new(table: PolicyTable) -> Self {
        Self { table }
    }

    pub fn for_platform(platform: Platform) -> Self {
        Self::new(PolicyTable::for_platform(platform))
    }

    /// Engine for the platform this binary was built for.
    pub fn host() -> Self {
        Self::for_platform(Platform::current())
    }

    pub fn table(&self) -> &PolicyTable {
        &self.table
    }

    pub fn platform(&self) -> Platform {
        self.table.platform
    }

    /// Classify a raw command string.
    pub fn classify(&self, command: &str) -> Verdict {
        let normalized = command.trim().to_lowercase();

        if let Some(pattern) = self.table.denied_pattern(&normalized) {
            return Verdict::deny(format!("blocked dangerous command pattern: {pattern}"));
        }

        let Some(first) = normalized.split_whitespace().next() else {
            return Verdict::deny("empty command");
        };

        if !self.table.is_verb(first) {
            return Verdict::deny(format!("command '{first}' not in whitelist"));
        }

        Verdict::allow("command is safe")
    }

    /// Classify a [`Command`], turning a deny into an error.
    pub fn check(&self, command: &Command) -> Result<Verdict, PolicyError> {
        let verdict = self.classify(command.text());
        if verdict.allowed {
            Ok(verdict)
        } else {
            tracing::debug!(
                command = %command,
                origin = %command.origin(),
                reason = %verdict.reason,
                "command denied"
            );
            Err(PolicyError::Denied {
                command: command.text().to_string(),
                reason: verdict.reason,
            })
        }
    }

    /// Public listing of verbs and aliases.
    pub fn safe_commands(&self) -> Vec<SafeCommand> {
        self.table.safe_commands()
    }
}

impl Default for PolicyEngine {
    fn default() -> Self {
        Self::host()
    }
}
