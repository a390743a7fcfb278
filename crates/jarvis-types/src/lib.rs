//! Core types shared across all jarvis crates.
//!
//! Defines commands, verdicts, the error taxonomy and configuration used by
//! the policy classifier, executor, interpreter, toolkit and CLI.

pub mod command;
pub mod config;
pub mod config_loader;
pub mod error;
pub mod verdict;

pub use command::{Command, CommandOrigin};
pub use config::{
    ExecutorConfig, InterpreterConfig, JarvisConfig, LedgerConfig, Platform, PolicyConfig,
    SttSettings, ToolkitBackend, ToolkitConfig, VoiceConfig, CONFIG_DIR, CONFIG_FILENAME,
};
pub use config_loader::{ConfigLoader, ConfigSource, EffectiveConfig};
pub use error::{ErrorKind, JarvisError};
pub use verdict::Verdict;
