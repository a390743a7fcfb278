//! Hierarchical configuration loading with multiple sources merged in priority order.
//!
//! The priority chain (later overrides earlier):
//! 1. Built-in defaults ([`JarvisConfig::default()`])
//! 2. User-level: `~/.jarvis/config.toml`
//! 3. Workspace-level: `./.jarvis/config.toml`
//! 4. `JARVIS_*` environment variables
//!
//! Each field in the final [`EffectiveConfig`] is annotated with the
//! [`ConfigSource`] that determined its value.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::{JarvisConfig, CONFIG_DIR, CONFIG_FILENAME};
use crate::JarvisError;

/// Maximum config file size in bytes.
const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024; // 1 MB

/// Where a configuration value came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    BuiltinDefault,
    UserFile(PathBuf),
    WorkspaceFile(PathBuf),
    EnvVar(String),
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::BuiltinDefault => write!(f, "built-in default"),
            ConfigSource::UserFile(p) => write!(f, "user file: {}", p.display()),
            ConfigSource::WorkspaceFile(p) => write!(f, "workspace file: {}", p.display()),
            ConfigSource::EnvVar(name) => write!(f, "env var: {name}"),
        }
    }
}

/// The merged config plus provenance for each field.
#[derive(Debug, Clone)]
pub struct EffectiveConfig {
    pub config: JarvisConfig,
    /// Dot-separated field path -> the source that determined its value.
    pub sources: HashMap<String, ConfigSource>,
    /// Config files that were found and loaded, in priority order.
    pub source_files: Vec<PathBuf>,
}

/// Hierarchical configuration loader.
pub struct ConfigLoader {
    user_config_path: Option<PathBuf>,
    workspace_config_path: Option<PathBuf>,
    read_env: bool,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            user_config_path: None,
            workspace_config_path: None,
            read_env: true,
        }
    }

    /// Override the user config file path.
    #[must_use]
    pub fn with_user_path(mut self, path: PathBuf) -> Self {
        self.user_config_path = Some(path);
        self
    }

    /// Override the workspace config file path.
    #[must_use]
    pub fn with_workspace_path(mut self, path: PathBuf) -> Self {
        self.workspace_config_path = Some(path);
        self
    }

    /// Ignore `JARVIS_*` variables (for tests).
    #[must_use]
    pub fn without_env(mut self) -> Self {
        self.read_env = false;
        self
    }

    /// Load and merge configuration from all sources.
    pub fn load(&self) -> Result<EffectiveConfig, JarvisError> {
        let mut sources = HashMap::new();
        let mut source_files = Vec::new();

        // 1. Built-in defaults
        let default_config = JarvisConfig::default();
        let mut merged = toml::Value::try_from(&default_config)
            .map_err(|e| JarvisError::ConfigError(format!("failed to serialize defaults: {e}")))?;

        if let toml::Value::Table(ref table) = merged {
            for key in table.keys() {
                sources.insert(key.clone(), ConfigSource::BuiltinDefault);
            }
        }

        // 2. User-level config
        let user_path = self.user_config_path.clone().unwrap_or_else(|| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
            PathBuf::from(home).join(CONFIG_DIR).join(CONFIG_FILENAME)
        });
        if user_path.exists() {
            let content = read_config_file(&user_path)?;
            let layer: toml::Value = toml::from_str(&content)
                .map_err(|e| JarvisError::ConfigError(format!("invalid user config: {e}")))?;
            deep_merge(&mut merged, &layer);
            record_sources(&layer, &mut sources, ConfigSource::UserFile(user_path.clone()));
            source_files.push(user_path);
        }

        // 3. Workspace-level config
        let workspace_path = self
            .workspace_config_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(CONFIG_DIR).join(CONFIG_FILENAME));
        if workspace_path.exists() {
            let content = read_config_file(&workspace_path)?;
            let layer: toml::Value = toml::from_str(&content).map_err(|e| {
                JarvisError::ConfigError(format!("invalid workspace config: {e}"))
            })?;
            deep_merge(&mut merged, &layer);
            record_sources(
                &layer,
                &mut sources,
                ConfigSource::WorkspaceFile(workspace_path.clone()),
            );
            source_files.push(workspace_path);
        }

        // 4. Environment variable overrides
        if self.read_env {
            apply_env_overrides(&mut merged, &mut sources, |name| std::env::var(name).ok())?;
        }

        let config: JarvisConfig = merged
            .try_into()
            .map_err(|e| JarvisError::ConfigError(format!("failed to parse merged config: {e}")))?;
        config.validate()?;

        tracing::debug!(files = source_files.len(), "configuration loaded");

        Ok(EffectiveConfig {
            config,
            sources,
            source_files,
        })
    }
}

/// Read a config file with a size limit and a null-byte check.
fn read_config_file(path: &Path) -> Result<String, JarvisError> {
    let metadata = std::fs::metadata(path).map_err(|e| {
        JarvisError::ConfigError(format!("cannot read config file {}: {e}", path.display()))
    })?;

    if metadata.len() > MAX_CONFIG_FILE_SIZE {
        return Err(JarvisError::ConfigError(format!(
            "config file {} exceeds maximum size of {} bytes (actual: {} bytes)",
            path.display(),
            MAX_CONFIG_FILE_SIZE,
            metadata.len()
        )));
    }

    let content = std::fs::read_to_string(path).map_err(|e| {
        JarvisError::ConfigError(format!("cannot read config file {}: {e}", path.display()))
    })?;

    if content.contains('\0') {
        return Err(JarvisError::ConfigError(format!(
            "config file {} contains null bytes",
            path.display()
        )));
    }

    Ok(content)
}

/// Deep-merge `overlay` into `base`. Tables merge field-by-field; arrays
/// and scalars are replaced.
fn deep_merge(base: &mut toml::Value, overlay: &toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                if let Some(base_val) = base_table.get_mut(key) {
                    deep_merge(base_val, overlay_val);
                } else {
                    base_table.insert(key.clone(), overlay_val.clone());
                }
            }
        }
        (base, overlay) => {
            *base = overlay.clone();
        }
    }
}

fn record_sources(
    layer: &toml::Value,
    sources: &mut HashMap<String, ConfigSource>,
    source: ConfigSource,
) {
    if let toml::Value::Table(table) = layer {
        for (key, value) in table {
            sources.insert(key.clone(), source.clone());
            record_nested_sources(value, sources, &source, key);
        }
    }
}

fn record_nested_sources(
    value: &toml::Value,
    sources: &mut HashMap<String, ConfigSource>,
    source: &ConfigSource,
    prefix: &str,
) {
    if let toml::Value::Table(table) = value {
        for (key, val) in table {
            let path = format!("{prefix}.{key}");
            sources.insert(path.clone(), source.clone());
            record_nested_sources(val, sources, source, &path);
        }
    }
}

/// Known environment variable mappings.
pub struct EnvMapping {
    pub env_var: &'static str,
    pub toml_path: &'static [&'static str],
}

/// All supported `JARVIS_*` environment variable mappings.
pub const ENV_MAPPINGS: &[EnvMapping] = &[
    EnvMapping {
        env_var: "JARVIS_POLICY_PLATFORM",
        toml_path: &["policy", "platform"],
    },
    EnvMapping {
        env_var: "JARVIS_TIMEOUT_SECS",
        toml_path: &["executor", "timeout_secs"],
    },
    EnvMapping {
        env_var: "JARVIS_INTERPRETER_URL",
        toml_path: &["interpreter", "base_url"],
    },
    EnvMapping {
        env_var: "JARVIS_INTERPRETER_MODEL",
        toml_path: &["interpreter", "model"],
    },
    EnvMapping {
        env_var: "JARVIS_TOOLKIT_BACKEND",
        toml_path: &["toolkit", "backend"],
    },
    EnvMapping {
        env_var: "JARVIS_WAKE_PHRASE",
        toml_path: &["voice", "phrase"],
    },
    EnvMapping {
        env_var: "JARVIS_LEDGER_PATH",
        toml_path: &["ledger", "path"],
    },
];

fn apply_env_overrides(
    merged: &mut toml::Value,
    sources: &mut HashMap<String, ConfigSource>,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<(), JarvisError> {
    for mapping in ENV_MAPPINGS {
        if let Some(raw_value) = lookup(mapping.env_var) {
            validate_env_value(mapping.env_var, &raw_value)?;

            let toml_val = env_value_to_toml(mapping.env_var, mapping.toml_path, &raw_value)?;
            set_nested_value(merged, mapping.toml_path, toml_val);
            sources.insert(
                mapping.toml_path.join("."),
                ConfigSource::EnvVar(mapping.env_var.to_string()),
            );
        }
    }
    Ok(())
}

fn validate_env_value(var_name: &str, value: &str) -> Result<(), JarvisError> {
    for ch in value.chars() {
        if ch.is_control() && ch != '\t' {
            return Err(JarvisError::ConfigError(format!(
                "environment variable {var_name} contains control character U+{:04X}",
                ch as u32
            )));
        }
    }
    Ok(())
}

fn env_value_to_toml(
    env_var: &str,
    toml_path: &[&str],
    raw: &str,
) -> Result<toml::Value, JarvisError> {
    let last = toml_path.last().copied().unwrap_or_default();

    if last == "timeout_secs" {
        let num: i64 = raw.trim().parse().map_err(|e| {
            JarvisError::ConfigError(format!("environment variable {env_var} must be numeric: {e}"))
        })?;
        return Ok(toml::Value::Integer(num));
    }

    if last == "platform" || last == "backend" {
        return Ok(toml::Value::String(raw.trim().to_ascii_lowercase()));
    }

    Ok(toml::Value::String(raw.to_string()))
}

fn set_nested_value(root: &mut toml::Value, path: &[&str], value: toml::Value) {
    let Some((first, rest)) = path.split_first() else {
        return;
    };
    if let toml::Value::Table(table) = root {
        if rest.is_empty() {
            table.insert((*first).to_string(), value);
        } else {
            let entry = table
                .entry((*first).to_string())
                .or_insert_with(|| toml::Value::Table(toml::map::Map::new()));
            set_nested_value(entry, rest, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Platform, ToolkitBackend};

    fn loader_in(dir: &Path) -> ConfigLoader {
        ConfigLoader::new()
            .with_user_path(dir.join("user.toml"))
            .with_workspace_path(dir.join("workspace.toml"))
            .without_env()
    }

    #[test]
    fn no_files_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let effective = loader_in(dir.path()).load().unwrap();
        assert_eq!(effective.config, JarvisConfig::default());
        assert!(effective.source_files.is_empty());
        assert_eq!(
            effective.sources.get("executor"),
            Some(&ConfigSource::BuiltinDefault)
        );
    }

    #[test]
    fn workspace_overrides_user() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("user.toml"),
            "[executor]\ntimeout_secs = 10\n[voice]\nphrase = \"computer\"\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("workspace.toml"),
            "[executor]\ntimeout_secs = 5\n",
        )
        .unwrap();

        let effective = loader_in(dir.path()).load().unwrap();
        assert_eq!(effective.config.executor.timeout_secs, 5);
        assert_eq!(effective.config.voice.phrase, "computer");
        assert_eq!(effective.source_files.len(), 2);
        assert!(matches!(
            effective.sources.get("executor.timeout_secs"),
            Some(ConfigSource::WorkspaceFile(_))
        ));
        assert!(matches!(
            effective.sources.get("voice.phrase"),
            Some(ConfigSource::UserFile(_))
        ));
    }

    #[test]
    fn invalid_toml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("user.toml"), "[executor\n").unwrap();
        let err = loader_in(dir.path()).load().unwrap_err();
        assert!(err.to_string().contains("invalid user config"));
    }

    #[test]
    fn env_overrides_apply_typed_values() {
        let mut merged = toml::Value::try_from(JarvisConfig::default()).unwrap();
        let mut sources = HashMap::new();
        apply_env_overrides(&mut merged, &mut sources, |name| match name {
            "JARVIS_TIMEOUT_SECS" => Some("7".into()),
            "JARVIS_TOOLKIT_BACKEND" => Some("Simulated".into()),
            "JARVIS_POLICY_PLATFORM" => Some("WINDOWS".into()),
            _ => None,
        })
        .unwrap();

        let config: JarvisConfig = merged.try_into().unwrap();
        assert_eq!(config.executor.timeout_secs, 7);
        assert_eq!(config.toolkit.backend, ToolkitBackend::Simulated);
        assert_eq!(config.policy.platform, Some(Platform::Windows));
        assert_eq!(
            sources.get("executor.timeout_secs"),
            Some(&ConfigSource::EnvVar("JARVIS_TIMEOUT_SECS".into()))
        );
    }

    #[test]
    fn non_numeric_timeout_env_is_rejected() {
        let mut merged = toml::Value::try_from(JarvisConfig::default()).unwrap();
        let mut sources = HashMap::new();
        let err = apply_env_overrides(&mut merged, &mut sources, |name| {
            (name == "JARVIS_TIMEOUT_SECS").then(|| "soon".to_string())
        })
        .unwrap_err();
        assert!(err.to_string().contains("must be numeric"));
    }

    #[test]
    fn control_characters_in_env_are_rejected() {
        assert!(validate_env_value("JARVIS_WAKE_PHRASE", "hey\u{7}").is_err());
        assert!(validate_env_value("JARVIS_WAKE_PHRASE", "hey jarvis").is_ok());
    }
}
