use serde::{Deserialize, Serialize};

/// Allow/deny decision for a candidate command.
///
/// Produced once per command by the policy classifier and never mutated.
/// Identical input against the same policy table always yields an equal
/// verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    /// Whether the command may run.
    pub allowed: bool,
    /// Human-readable explanation of the decision.
    pub reason: String,
}

impl Verdict {
    pub fn allow(reason: impl Into<String>) -> Self {
        Self {
            allowed: true,
            reason: reason.into(),
        }
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let decision = if self.allowed { "Allow" } else { "Deny" };
        write!(f, "{decision}: {}", self.reason)
    }
}
