//! Answer-model configuration
//!
//! Each model choice has its own JSON config file under the quizpilot
//! config directory, e.g. `~/.config/quizpilot/deepseek_config.json`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Configuration directory not found")]
    NoConfigDir,
}

/// Which answer provider a session should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModelChoice {
    DeepSeek,
    Gemini,
    Custom,
}

impl ModelChoice {
    /// Display name used in log lines.
    pub fn display_name(&self) -> &'static str {
        match self {
            ModelChoice::DeepSeek => "DeepSeek",
            ModelChoice::Gemini => "Gemini",
            ModelChoice::Custom => "Custom",
        }
    }

    /// File stem for the per-model config file.
    fn file_stem(&self) -> &'static str {
        match self {
            ModelChoice::DeepSeek => "deepseek",
            ModelChoice::Gemini => "gemini",
            ModelChoice::Custom => "custom",
        }
    }
}

impl std::str::FromStr for ModelChoice {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "deepseek" => Ok(ModelChoice::DeepSeek),
            "gemini" => Ok(ModelChoice::Gemini),
            "custom" => Ok(ModelChoice::Custom),
            _ => Err(format!(
                "Invalid model: {}. Use: deepseek, gemini, custom",
                s
            )),
        }
    }
}

/// Connection settings for one answer provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub base_url: String,
    pub model: String,
    #[serde(default)]
    pub api_key: String,
}

impl ModelConfig {
    /// Built-in defaults for a model choice (empty for `Custom`).
    pub fn defaults(choice: ModelChoice) -> Self {
        match choice {
            ModelChoice::DeepSeek => Self {
                base_url: "https://api.deepseek.com/v1".to_string(),
                model: "deepseek-chat".to_string(),
                api_key: String::new(),
            },
            ModelChoice::Gemini => Self {
                base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
                model: "gemini-2.0-flash".to_string(),
                api_key: String::new(),
            },
            ModelChoice::Custom => Self {
                base_url: String::new(),
                model: String::new(),
                api_key: String::new(),
            },
        }
    }

    /// Default config directory (`~/.config/quizpilot`).
    pub fn default_dir() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("quizpilot"))
    }

    fn file_path(dir: &Path, choice: ModelChoice) -> PathBuf {
        dir.join(format!("{}_config.json", choice.file_stem()))
    }

    /// Load the config for `choice` from `dir`, falling back to the
    /// built-in defaults when the file is missing or unreadable.
    pub fn load(dir: &Path, choice: ModelChoice) -> Self {
        let path = Self::file_path(dir, choice);
        if !path.exists() {
            return Self::defaults(choice);
        }
        match std::fs::read_to_string(&path)
            .map_err(ConfigError::from)
            .and_then(|s| serde_json::from_str::<ModelConfig>(&s).map_err(ConfigError::from))
        {
            Ok(config) => config,
            Err(e) => {
                warn!("Failed to read {} config, using defaults: {}", choice.display_name(), e);
                Self::defaults(choice)
            }
        }
    }

    /// Persist the config for `choice` into `dir`, creating it if needed.
    pub fn save(&self, dir: &Path, choice: ModelChoice) -> Result<(), ConfigError> {
        std::fs::create_dir_all(dir)?;
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(Self::file_path(dir, choice), json)?;
        info!("Saved {} model config", choice.display_name());
        Ok(())
    }

    /// Names of the fields that are still unset. Empty means usable.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.api_key.is_empty() {
            missing.push("api_key");
        }
        if self.base_url.is_empty() {
            missing.push("base_url");
        }
        if self.model.is_empty() {
            missing.push("model");
        }
        missing
    }
}
