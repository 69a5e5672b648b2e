use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "https://api.deepseek.com";
pub const DEFAULT_UPLOAD_URL: &str = "https://api.deepseek.com/files";
pub const DEFAULT_MODEL: &str = "deepseek-chat";
pub const DEFAULT_CURRENCY: &str = "CNY";

/// Environment variable that takes precedence over the stored API key.
pub const API_KEY_ENV: &str = "DEEPSEEK_API_KEY";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not determine config directory")]
    NoConfigDir,
    #[error("config I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("config is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Credential, generation parameters and endpoints. Persisted as JSON.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub api_key: Option<String>,
    pub system_prompt: String,
    pub model: String,
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: Option<u32>,
    pub base_url: String,
    pub upload_url: String,
    /// Currency code the balance display looks for.
    pub currency: String,
    pub export_dir: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: None,
            system_prompt: String::new(),
            model: DEFAULT_MODEL.to_string(),
            temperature: 1.0,
            top_p: 1.0,
            max_tokens: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            upload_url: DEFAULT_UPLOAD_URL.to_string(),
            currency: DEFAULT_CURRENCY.to_string(),
            export_dir: None,
        }
    }
}

impl Settings {
    /// A missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let config_content = fs::read_to_string(path)?;
        let settings: Settings = serde_json::from_str(&config_content)?;
        Ok(settings)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(path, config_content)?;
        Ok(())
    }

    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("seekchat").join("config.json"))
    }

    /// The usable credential: trimmed, and `None` when blank.
    pub fn credential(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }
}
