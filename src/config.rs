use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::roots::{CaseSensitivity, EmptyRootsPolicy, PermissionSet, RootsError};

/// Top-level server config, loaded from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Approved root directories.
    pub roots: Vec<PathBuf>,
    pub access: AccessConfig,
    pub sampling: SamplingConfig,
}

/// Access policy section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessConfig {
    /// What to do when `roots` is empty.
    pub empty_roots: EmptyRootsPolicy,
    /// Compare paths case-insensitively. Only for case-insensitive filesystems.
    pub case_insensitive: bool,
}

/// Delegated completion (MCP sampling) section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// How long to wait for the client before falling back.
    pub timeout_ms: u64,
    /// Default completion budget.
    pub max_tokens: u32,
    pub temperature: f32,
    /// Model name hint passed to the client.
    pub model_hint: Option<String>,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            max_tokens: 400,
            temperature: 0.3,
            model_hint: None,
        }
    }
}

impl SamplingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Config {
    /// Load config from a TOML file path. Returns None if file doesn't exist.
    pub fn load(path: &Path) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }

        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFailed(path.to_path_buf(), e))?;
        let config: Self =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseFailed(path.to_path_buf(), e))?;
        config.validate()?;
        Ok(Some(config))
    }

    /// Load an explicitly requested file (which must exist), or the default
    /// location (which may be absent).
    pub fn resolve(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => {
                Self::load(path)?.ok_or_else(|| ConfigError::Missing(path.to_path_buf()))
            }
            None => match default_config_path() {
                Some(path) => {
                    let loaded = Self::load(&path)?;
                    if loaded.is_some() {
                        tracing::debug!(path = %path.display(), "loaded config");
                    }
                    Ok(loaded.unwrap_or_default())
                }
                None => Ok(Self::default()),
            },
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sampling.max_tokens == 0 {
            return Err(ConfigError::Invalid(
                "sampling.max_tokens must be greater than zero".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&self.sampling.temperature) {
            return Err(ConfigError::Invalid(format!(
                "sampling.temperature must be between 0 and 2, got {}",
                self.sampling.temperature
            )));
        }
        Ok(())
    }

    /// Build the permission set described by this config.
    pub fn permission_set(&self) -> Result<PermissionSet, RootsError> {
        let case = if self.access.case_insensitive {
            CaseSensitivity::Insensitive
        } else {
            CaseSensitivity::Sensitive
        };
        Ok(PermissionSet::new(&self.roots)?
            .with_empty_policy(self.access.empty_roots)
            .with_case_sensitivity(case))
    }
}

/// `$XDG_CONFIG_HOME/docscout/config.toml` (or the platform equivalent).
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("docscout").join("config.toml"))
}

/// Errors that can occur when loading config.
#[derive(Debug)]
pub enum ConfigError {
    ReadFailed(PathBuf, std::io::Error),
    ParseFailed(PathBuf, toml::de::Error),
    Missing(PathBuf),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ReadFailed(path, e) => {
                write!(f, "Failed to read config {}: {}", path.display(), e)
            }
            Self::ParseFailed(path, e) => {
                write!(f, "Failed to parse config {}: {}", path.display(), e)
            }
            Self::Missing(path) => write!(f, "Config file not found: {}", path.display()),
            Self::Invalid(msg) => write!(f, "Invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}
