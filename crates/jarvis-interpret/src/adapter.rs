//! The interpretation adapter.
//!
//! [`Interpreter::interpret`] never returns a command the policy engine has
//! not allowed, whichever path produced it.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use jarvis_policy::PolicyEngine;
use jarvis_types::{ErrorKind, InterpreterConfig};

use crate::fallback::FallbackTable;
use crate::translator::{OpenAiTranslator, Translator};
use crate::InterpretResult;

/// Which path produced an interpretation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    Translator,
    FallbackExact,
    FallbackContains,
    FallbackKeyword,
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Method::Translator => write!(f, "translator"),
            Method::FallbackExact => write!(f, "fallback_exact"),
            Method::FallbackContains => write!(f, "fallback_contains"),
            Method::FallbackKeyword => write!(f, "fallback_keyword"),
        }
    }
}

/// Result of interpreting one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interpretation {
    pub success: bool,
    /// The validated command; empty on failure.
    pub command: String,
    /// Original natural-language request.
    pub interpretation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<Method>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    pub timestamp: DateTime<Utc>,
}

impl Interpretation {
    fn accepted(request: &str, command: String, method: Method) -> Self {
        Self {
            success: true,
            command,
            interpretation: request.to_string(),
            method: Some(method),
            error: None,
            error_kind: None,
            timestamp: Utc::now(),
        }
    }

    fn rejected(request: &str, method: Option<Method>, error: String, kind: ErrorKind) -> Self {
        Self {
            success: false,
            command: String::new(),
            interpretation: request.to_string(),
            method,
            error: Some(error),
            error_kind: Some(kind),
            timestamp: Utc::now(),
        }
    }
}

/// Translates requests into policy-approved commands.
pub struct Interpreter {
    policy: PolicyEngine,
    translator: Option<Arc<dyn Translator>>,
    fallback: FallbackTable,
    system_prompt: String,
}

impl Interpreter {
    /// Interpreter with no remote service: fallback table only.
    pub fn local(policy: PolicyEngine) -> Self {
        let fallback = FallbackTable::for_platform(policy.platform());
        let system_prompt = system_prompt(&policy, &fallback);
        Self {
            policy,
            translator: None,
            fallback,
            system_prompt,
        }
    }

    pub fn with_translator(policy: PolicyEngine, translator: Arc<dyn Translator>) -> Self {
        Self {
            translator: Some(translator),
            ..Self::local(policy)
        }
    }

    /// Build from configuration; `enabled = false` means local only.
    pub fn from_config(policy: PolicyEngine, config: &InterpreterConfig) -> InterpretResult<Self> {
        if !config.enabled {
            return Ok(Self::local(policy));
        }
        let translator = OpenAiTranslator::from_config(config)?;
        Ok(Self::with_translator(policy, Arc::new(translator)))
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn fallback(&self) -> &FallbackTable {
        &self.fallback
    }

    /// Whether a remote translation service is configured.
    pub fn has_translator(&self) -> bool {
        self.translator.is_some()
    }

    /// Interpret one natural-language request.
    pub async fn interpret(&self, request: &str) -> Interpretation {
        if request.trim().is_empty() {
            return Interpretation::rejected(
                request,
                None,
                "empty request".into(),
                ErrorKind::InvalidArgument,
            );
        }

        if let Some(translator) = &self.translator {
            match translator.translate(&self.system_prompt, request).await {
                Ok(reply) => {
                    let command = clean_reply(&reply);
                    if command.is_empty() {
                        warn!(provider = translator.name(), "translator returned no command, using fallback");
                    } else {
                        return self.validate(request, command, Method::Translator);
                    }
                }
                Err(e) => {
                    warn!(provider = translator.name(), error = %e, "translation failed, using fallback");
                }
            }
        }

        match self.fallback.lookup(request) {
            Some((command, method)) => self.validate(request, command, method),
            None => {
                let examples = self
                    .fallback
                    .examples(5)
                    .map(|p| format!("\"{p}\""))
                    .collect::<Vec<_>>()
                    .join(", ");
                debug!(request, "no fallback match");
                Interpretation::rejected(
                    request,
                    None,
                    format!("could not interpret request; try phrases like {examples}"),
                    ErrorKind::TranslationFailure,
                )
            }
        }
    }

    fn validate(&self, request: &str, command: String, method: Method) -> Interpretation {
        let verdict = self.policy.classify(&command);
        if verdict.allowed {
            info!(request, command = %command, %method, "request interpreted");
            Interpretation::accepted(request, command, method)
        } else {
            info!(request, command = %command, %method, reason = %verdict.reason, "interpreted command denied");
            Interpretation::rejected(request, Some(method), verdict.reason, ErrorKind::PolicyDenied)
        }
    }
}

fn system_prompt(policy: &PolicyEngine, fallback: &FallbackTable) -> String {
    let verbs = policy.table().verbs().join(", ");
    let examples = fallback
        .phrases()
        .iter()
        .take(8)
        .map(|(phrase, cmd)| format!("- \"{phrase}\" -> \"{cmd}\""))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You are Jarvis, an assistant that converts natural language into {platform} shell commands.\n\
         \n\
         Rules:\n\
         1. Only return a command whose first word is one of: {verbs}\n\
         2. Never return commands that could harm the system or expose sensitive data\n\
         3. Return exactly one command with no explanation, quotes or code fences\n\
         \n\
         Examples:\n\
         {examples}",
        platform = policy.platform(),
    )
}

/// Reduce a service reply to a single bare command line.
fn clean_reply(reply: &str) -> String {
    let line = reply
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty() && !l.starts_with("```"))
        .unwrap_or_default();

    let line = line.strip_prefix("$ ").unwrap_or(line);
    strip_wrapping(line).trim().to_string()
}

fn strip_wrapping(s: &str) -> &str {
    for q in ['`', '"', '\''] {
        if s.len() >= 2 && s.starts_with(q) && s.ends_with(q) {
            return &s[1..s.len() - 1];
        }
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InterpretError;
    use async_trait::async_trait;
    use jarvis_types::Platform;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Canned {
        reply: Result<&'static str, ()>,
        calls: AtomicUsize,
    }

    impl Canned {
        fn ok(reply: &'static str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(reply),
                calls: AtomicUsize::new(0),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                reply: Err(()),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Translator for Canned {
        async fn translate(&self, _system: &str, _request: &str) -> InterpretResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.reply
                .map(str::to_string)
                .map_err(|_| InterpretError::BadResponse("offline".into()))
        }

        fn name(&self) -> &str {
            "canned"
        }
    }

    fn unix() -> PolicyEngine {
        PolicyEngine::for_platform(Platform::Unix)
    }

    #[tokio::test]
    async fn translator_reply_is_cleaned_and_validated() {
        let interp = Interpreter::with_translator(unix(), Canned::ok("```bash\nls -la\n```"));
        let result = interp.interpret("show everything here").await;
        assert!(result.success, "{result:?}");
        assert_eq!(result.command, "ls -la");
        assert_eq!(result.method, Some(Method::Translator));
    }

    #[tokio::test]
    async fn dangerous_translation_is_rejected_without_fallback() {
        let interp = Interpreter::with_translator(unix(), Canned::ok("rm -rf /"));
        let result = interp.interpret("what time is it").await;
        assert!(!result.success);
        assert!(result.command.is_empty());
        assert_eq!(result.error_kind, Some(ErrorKind::PolicyDenied));
        assert_eq!(result.method, Some(Method::Translator));
    }

    #[tokio::test]
    async fn service_failure_uses_fallback_table() {
        let translator = Canned::failing();
        let interp = Interpreter::with_translator(unix(), translator.clone());
        let result = interp.interpret("What time is it?").await;
        assert!(result.success);
        assert_eq!(result.command, "date");
        assert_eq!(result.method, Some(Method::FallbackExact));
        assert_eq!(translator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn blank_reply_uses_fallback_table() {
        let interp = Interpreter::with_translator(unix(), Canned::ok("  \n```\n```"));
        let result = interp.interpret("list running processes").await;
        assert_eq!(result.command, "ps aux");
        assert_eq!(result.method, Some(Method::FallbackExact));
    }

    #[tokio::test]
    async fn no_match_lists_example_phrases() {
        let result = Interpreter::local(unix()).interpret("sing me a song").await;
        assert!(!result.success);
        assert_eq!(result.error_kind, Some(ErrorKind::TranslationFailure));
        assert!(result.error.unwrap().contains("\"show me the files\""));
    }

    #[tokio::test]
    async fn empty_request_is_invalid() {
        let translator = Canned::ok("ls");
        let interp = Interpreter::with_translator(unix(), translator.clone());
        let result = interp.interpret("   ").await;
        assert_eq!(result.error_kind, Some(ErrorKind::InvalidArgument));
        assert_eq!(translator.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn system_prompt_lists_verbs_not_denylist() {
        let interp = Interpreter::local(PolicyEngine::for_platform(Platform::Windows));
        let prompt = interp.system_prompt();
        assert!(prompt.contains("tasklist"));
        assert!(prompt.contains("windows"));
        assert!(!prompt.contains("diskpart"));
    }

    #[test]
    fn clean_reply_strips_wrapping() {
        assert_eq!(clean_reply("`whoami`"), "whoami");
        assert_eq!(clean_reply("\"date\"\nThis prints the date."), "date");
        assert_eq!(clean_reply("$ uptime"), "uptime");
        assert_eq!(clean_reply("echo 'hi'"), "echo 'hi'");
        assert_eq!(clean_reply(""), "");
    }
}
