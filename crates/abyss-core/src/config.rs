//! Evaluation limits and report settings.
//!
//! Loaded from YAML (same shape as any other profile file), with an
//! environment override for the execution timeout.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Environment variable naming a YAML config file
pub const CONFIG_PATH_ENV: &str = "ABYSS_CONFIG";

/// Environment variable overriding `exec_timeout_ms`
pub const EXEC_TIMEOUT_ENV: &str = "ABYSS_EXEC_TIMEOUT_MS";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalConfig {
    // === Collaborator size contract ===

    /// Maximum characters in one rich-format field value
    pub field_max_chars: usize,

    /// Maximum characters in one plain message
    pub message_max_chars: usize,

    // === Report ===

    /// Report title
    pub title: String,

    /// Language tag used for fenced code blocks
    pub code_language: String,

    // === Execution budget ===

    /// Wall-clock limit for the execute stage
    pub exec_timeout_ms: u64,

    /// Interpreter steps before the script is stopped
    pub max_steps: u64,

    /// Largest list/map/string a script may build
    pub max_collection_len: usize,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            field_max_chars: 1024,
            message_max_chars: 2000,
            title: "Scripting Result".to_string(),
            code_language: "cs".to_string(),
            exec_timeout_ms: 5_000,
            max_steps: 1_000_000,
            max_collection_len: 100_000,
        }
    }
}

impl EvalConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: EvalConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    /// `ABYSS_CONFIG` file if set, defaults otherwise, then env overrides
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => Self::load(&path)?,
            Err(_) => Self::default(),
        };
        if let Ok(raw) = std::env::var(EXEC_TIMEOUT_ENV) {
            config.exec_timeout_ms = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                name: EXEC_TIMEOUT_ENV,
                value: raw.clone(),
            })?;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn exec_timeout(&self) -> Duration {
        Duration::from_millis(self.exec_timeout_ms)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        // A field must at least hold an empty fence plus the ellipsis
        if self.field_max_chars < 16 {
            return Err(ConfigError::InvalidValue {
                name: "field_max_chars",
                value: self.field_max_chars.to_string(),
            });
        }
        if self.message_max_chars < self.field_max_chars {
            return Err(ConfigError::InvalidValue {
                name: "message_max_chars",
                value: self.message_max_chars.to_string(),
            });
        }
        if self.exec_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                name: "exec_timeout_ms",
                value: "0".to_string(),
            });
        }
        Ok(())
    }
}
