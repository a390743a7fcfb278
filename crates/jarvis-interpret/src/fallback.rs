//! Deterministic phrase-to-command lookup.
//!
//! Used when the translation service is unavailable. Matching runs in
//! three passes and the first hit wins:
//!
//! 1. the normalized request equals a table phrase;
//! 2. the normalized request contains a table phrase (table order);
//! 3. some word of the request is a policy verb or alias.

use jarvis_policy::PolicyTable;
use jarvis_types::Platform;

use crate::adapter::Method;

const UNIX_PHRASES: &[(&str, &str)] = &[
    ("show me the files", "ls"),
    ("list files", "ls -la"),
    ("where am i", "pwd"),
    ("what time is it", "date"),
    ("what's the date", "date"),
    ("who am i", "whoami"),
    ("what's my ip address", "ip addr"),
    ("show network info", "ip addr"),
    ("list running processes", "ps aux"),
    ("show running processes", "ps aux"),
    ("display system information", "uname -a"),
    ("system information", "uname -a"),
    ("what's my hostname", "hostname"),
    ("disk usage", "df -h"),
    ("memory usage", "free -h"),
    ("how long has the system been up", "uptime"),
    ("clear the screen", "clear"),
    ("open the editor", "nano"),
];

const WINDOWS_PHRASES: &[(&str, &str)] = &[
    ("show me the files", "dir"),
    ("list files", "dir"),
    ("where am i", "cd"),
    ("what time is it", "time /t"),
    ("what's the date", "date /t"),
    ("who am i", "whoami"),
    ("what's my ip address", "ipconfig"),
    ("show network info", "ipconfig"),
    ("list running processes", "tasklist"),
    ("show running processes", "tasklist"),
    ("display system information", "systeminfo"),
    ("system information", "systeminfo"),
    ("what's my hostname", "hostname"),
    ("clear the screen", "cls"),
    ("open notepad", "notepad"),
    ("open calculator", "calc"),
    ("open file explorer", "explorer"),
];

/// Phrase table plus the policy table used for keyword matching.
#[derive(Debug, Clone, Copy)]
pub struct FallbackTable {
    phrases: &'static [(&'static str, &'static str)],
    policy: PolicyTable,
}

impl FallbackTable {
    pub fn for_platform(platform: Platform) -> Self {
        let phrases = match platform {
            Platform::Windows => WINDOWS_PHRASES,
            Platform::Unix => UNIX_PHRASES,
        };
        Self {
            phrases,
            policy: PolicyTable::for_platform(platform),
        }
    }

    pub fn phrases(&self) -> &'static [(&'static str, &'static str)] {
        self.phrases
    }

    /// Up to `n` example phrases, for prompts and guidance messages.
    pub fn examples(&self, n: usize) -> impl Iterator<Item = &'static str> {
        self.phrases.iter().take(n).map(|(phrase, _)| *phrase)
    }

    /// Find a command for `request`, reporting which pass matched.
    pub fn lookup(&self, request: &str) -> Option<(String, Method)> {
        let normalized = normalize(request);
        if normalized.is_empty() {
            return None;
        }

        if let Some((_, cmd)) = self.phrases.iter().find(|(p, _)| *p == normalized) {
            return Some(((*cmd).to_string(), Method::FallbackExact));
        }

        if let Some((_, cmd)) = self
            .phrases
            .iter()
            .find(|(p, _)| normalized.contains(*p))
        {
            return Some(((*cmd).to_string(), Method::FallbackContains));
        }

        normalized
            .split_whitespace()
            .map(|word| word.trim_matches(|c: char| !c.is_alphanumeric() && c != '_' && c != '-'))
            .find_map(|word| self.policy.resolve(word))
            .map(|verb| (verb.to_string(), Method::FallbackKeyword))
    }
}

/// Lower-case, trim, unify apostrophes and drop trailing punctuation.
fn normalize(request: &str) -> String {
    request
        .trim()
        .to_lowercase()
        .replace('\u{2019}', "'")
        .trim_end_matches(['?', '.', '!'])
        .trim()
        .to_string()
}
