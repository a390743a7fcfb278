//! Commands submitted for classification and execution.
//!
//! A [`Command`] pairs the raw command text with where it came from. It is
//! the primary input to the policy classifier and the executor.

use serde::{Deserialize, Serialize};

/// Where a command string came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandOrigin {
    /// Typed verbatim by the operator.
    Direct,
    /// Produced by the interpretation adapter from natural language.
    Interpreted,
}

impl std::fmt::Display for CommandOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandOrigin::Direct => write!(f, "direct"),
            CommandOrigin::Interpreted => write!(f, "interpreted"),
        }
    }
}

/// A shell command plus its origin. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    text: String,
    origin: CommandOrigin,
}

impl Command {
    pub fn new(text: impl Into<String>, origin: CommandOrigin) -> Self {
        Self {
            text: text.into(),
            origin,
        }
    }

    /// A command typed by the operator.
    pub fn direct(text: impl Into<String>) -> Self {
        Self::new(text, CommandOrigin::Direct)
    }

    /// A command produced by natural-language interpretation.
    pub fn interpreted(text: impl Into<String>) -> Self {
        Self::new(text, CommandOrigin::Interpreted)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn origin(&self) -> CommandOrigin {
        self.origin
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_set_origin() {
        assert_eq!(Command::direct("ls").origin(), CommandOrigin::Direct);
        assert_eq!(
            Command::interpreted("dir").origin(),
            CommandOrigin::Interpreted
        );
    }

    #[test]
    fn command_serializes_origin_tag() {
        let cmd = Command::interpreted("whoami");
        let json = serde_json::to_value(&cmd).unwrap();
        assert_eq!(json["text"], "whoami");
        assert_eq!(json["origin"], "interpreted");
    }
}
