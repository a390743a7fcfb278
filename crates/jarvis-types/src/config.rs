//! Configuration types for a jarvis instance.
//!
//! [`JarvisConfig`] is the top-level configuration loaded from
//! `config.toml`. Every section and field has a default, so an empty file
//! (or no file at all) yields a working configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::JarvisError;

/// Name of the per-user / per-workspace configuration directory.
pub const CONFIG_DIR: &str = ".jarvis";

/// Configuration file name inside [`CONFIG_DIR`].
pub const CONFIG_FILENAME: &str = "config.toml";

/// Target OS whose command tables the policy classifier uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Windows,
    Unix,
}

impl Platform {
    /// The platform this binary was compiled for.
    pub fn current() -> Self {
        if cfg!(windows) {
            Platform::Windows
        } else {
            Platform::Unix
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Platform::Windows => write!(f, "windows"),
            Platform::Unix => write!(f, "unix"),
        }
    }
}

impl std::str::FromStr for Platform {
    type Err = JarvisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "windows" | "win" => Ok(Platform::Windows),
            "unix" | "linux" | "macos" => Ok(Platform::Unix),
            other => Err(JarvisError::ConfigError(format!(
                "unknown platform {other:?} (expected windows or unix)"
            ))),
        }
    }
}

/// Which screen-automation implementation to construct at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolkitBackend {
    /// Probe the host; fall back to simulated when no display is present.
    #[default]
    Auto,
    /// Real display, input and OCR tools. Fails if they are missing.
    Live,
    /// In-memory screen and recorded input; never touches the host.
    Simulated,
}

impl std::fmt::Display for ToolkitBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ToolkitBackend::Auto => write!(f, "auto"),
            ToolkitBackend::Live => write!(f, "live"),
            ToolkitBackend::Simulated => write!(f, "simulated"),
        }
    }
}

/// Policy classifier settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Override the command tables; `None` selects by compile target.
    pub platform: Option<Platform>,
}

impl PolicyConfig {
    pub fn effective_platform(&self) -> Platform {
        self.platform.unwrap_or_else(Platform::current)
    }
}

/// Command executor settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Wall-clock budget for one command, in seconds.
    pub timeout_secs: u64,
    /// Working directory for spawned commands; `None` inherits ours.
    pub working_dir: Option<PathBuf>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            working_dir: None,
        }
    }
}

/// Natural-language interpretation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpreterConfig {
    /// Whether to call the remote translation service at all.
    pub enabled: bool,
    /// Base URL of an OpenAI-compatible chat completions API.
    pub base_url: String,
    /// Model identifier sent with each request.
    pub model: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://api.openai.com".into(),
            model: "gpt-4".into(),
            api_key_env: "OPENAI_API_KEY".into(),
            max_tokens: 150,
            temperature: 0.3,
            timeout_secs: 20,
        }
    }
}

/// Screen automation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolkitConfig {
    pub backend: ToolkitBackend,
    /// Where screenshots are written.
    pub screenshot_dir: PathBuf,
    /// Base directory for relative template image paths.
    pub template_dir: PathBuf,
    /// Pause after every successful sequence step, in milliseconds.
    pub step_delay_ms: u64,
    /// Poll interval for wait-for-template, in milliseconds.
    pub poll_interval_ms: u64,
    /// Screen size reported by the simulated backend.
    pub simulated_width: u32,
    pub simulated_height: u32,
}

impl Default for ToolkitConfig {
    fn default() -> Self {
        Self {
            backend: ToolkitBackend::Auto,
            screenshot_dir: PathBuf::from("screenshots"),
            template_dir: PathBuf::from("templates"),
            step_delay_ms: 100,
            poll_interval_ms: 500,
            simulated_width: 1920,
            simulated_height: 1080,
        }
    }
}

/// Speech-to-text service settings for the wake listener.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SttSettings {
    /// Base URL of an OpenAI-compatible transcription API.
    pub base_url: String,
    pub model: String,
    pub api_key_env: String,
    /// BCP-47 language hint.
    pub language: String,
    /// Per-utterance transcription timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for SttSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com".into(),
            model: "whisper-1".into(),
            api_key_env: "OPENAI_API_KEY".into(),
            language: "en".into(),
            timeout_secs: 10,
        }
    }
}

/// Wake-listener settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    /// Default trigger phrase when `start` is called without one.
    pub phrase: String,
    /// Length of each sampled audio window, in seconds.
    pub listen_window_secs: u64,
    /// Minimum gap between two detection signals, in milliseconds.
    pub cooldown_ms: u64,
    /// RMS energy threshold for voice activity (0.0 - 1.0).
    pub vad_threshold: f32,
    /// Audio sample rate in Hz.
    pub sample_rate: u32,
    pub stt: SttSettings,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            phrase: "jarvis".into(),
            listen_window_secs: 2,
            cooldown_ms: 2000,
            vad_threshold: 0.02,
            sample_rate: 16_000,
            stt: SttSettings::default(),
        }
    }
}

/// History ledger settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// SQLite database path.
    pub path: PathBuf,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        Self {
            path: PathBuf::from(home).join(CONFIG_DIR).join("history.db"),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JarvisConfig {
    pub policy: PolicyConfig,
    pub executor: ExecutorConfig,
    pub interpreter: InterpreterConfig,
    pub toolkit: ToolkitConfig,
    pub voice: VoiceConfig,
    pub ledger: LedgerConfig,
}

impl JarvisConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, JarvisError> {
        toml::from_str(content).map_err(|e| JarvisError::ConfigError(format!("invalid config: {e}")))
    }

    /// Reject values that parse but cannot work.
    pub fn validate(&self) -> Result<(), JarvisError> {
        if self.executor.timeout_secs == 0 {
            return Err(JarvisError::ConfigError(
                "executor.timeout_secs must be greater than zero".into(),
            ));
        }
        if self.voice.phrase.trim().is_empty() {
            return Err(JarvisError::ConfigError(
                "voice.phrase cannot be empty".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.voice.vad_threshold) {
            return Err(JarvisError::ConfigError(format!(
                "voice.vad_threshold must be within 0.0..=1.0, got {}",
                self.voice.vad_threshold
            )));
        }
        if self.toolkit.simulated_width == 0 || self.toolkit.simulated_height == 0 {
            return Err(JarvisError::ConfigError(
                "toolkit simulated screen size must be non-zero".into(),
            ));
        }
        Ok(())
    }
}
