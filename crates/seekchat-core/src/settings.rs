//! Shared settings store with partial updates.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;

use crate::config::{ConfigError, Settings};

/// A partial update. `None` leaves a field alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettingsPatch {
    /// `Some(None)` removes the credential.
    pub api_key: Option<Option<String>>,
    pub system_prompt: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub max_tokens: Option<Option<u32>>,
    pub base_url: Option<String>,
    pub currency: Option<String>,
}

impl SettingsPatch {
    fn apply(self, settings: &mut Settings) {
        if let Some(key) = self.api_key {
            settings.api_key = key.map(|k| k.trim().to_string()).filter(|k| !k.is_empty());
        }
        if let Some(prompt) = self.system_prompt {
            settings.system_prompt = prompt;
        }
        if let Some(model) = self.model {
            settings.model = model;
        }
        if let Some(temperature) = self.temperature {
            settings.temperature = temperature;
        }
        if let Some(top_p) = self.top_p {
            settings.top_p = top_p;
        }
        if let Some(max_tokens) = self.max_tokens {
            settings.max_tokens = max_tokens;
        }
        if let Some(base_url) = self.base_url {
            settings.base_url = base_url;
        }
        if let Some(currency) = self.currency {
            settings.currency = currency;
        }
    }
}

#[derive(Debug)]
struct Inner {
    settings: Settings,
    /// Key as it should be written to disk; differs from `settings.api_key`
    /// when the environment supplied the live one.
    stored_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SettingsStore {
    inner: Arc<Mutex<Inner>>,
    path: Option<PathBuf>,
    revision: Arc<watch::Sender<u64>>,
}

impl SettingsStore {
    /// In-memory store. Patches are not persisted.
    pub fn new(settings: Settings) -> Self {
        Self::build(settings, None, None)
    }

    /// Store backed by a config file. `env_key` (usually from
    /// `DEEPSEEK_API_KEY`) overrides the stored credential without being
    /// written back.
    pub fn with_path(settings: Settings, path: PathBuf, env_key: Option<String>) -> Self {
        Self::build(settings, Some(path), env_key)
    }

    fn build(mut settings: Settings, path: Option<PathBuf>, env_key: Option<String>) -> Self {
        let stored_key = settings.api_key.clone();
        if let Some(key) = env_key.filter(|k| !k.trim().is_empty()) {
            settings.api_key = Some(key);
        }
        let (tx, _rx) = watch::channel(0);
        Self {
            inner: Arc::new(Mutex::new(Inner { settings, stored_key })),
            path,
            revision: Arc::new(tx),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self) -> Settings {
        self.lock().settings.clone()
    }

    pub fn credential(&self) -> Option<String> {
        self.lock().settings.credential().map(str::to_string)
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    /// Apply a partial update, notify subscribers, then persist when the
    /// store is file-backed. The in-memory update stands even if saving fails.
    pub fn patch(&self, patch: SettingsPatch) -> Result<(), ConfigError> {
        let to_save = {
            let mut inner = self.lock();
            if let Some(key) = &patch.api_key {
                inner.stored_key = key.clone();
            }
            patch.apply(&mut inner.settings);
            let mut on_disk = inner.settings.clone();
            on_disk.api_key = inner.stored_key.clone();
            on_disk
        };
        self.revision.send_modify(|rev| *rev += 1);

        if let Some(path) = &self.path {
            to_save.save_to(path)?;
            tracing::debug!(path = %path.display(), "settings saved");
        }
        Ok(())
    }
}

/// Fields editable from the settings screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingField {
    ApiKey,
    Model,
    SystemPrompt,
    Temperature,
    TopP,
    MaxTokens,
    BaseUrl,
    Currency,
}

impl SettingField {
    pub fn all() -> [SettingField; 8] {
        [
            SettingField::ApiKey,
            SettingField::Model,
            SettingField::SystemPrompt,
            SettingField::Temperature,
            SettingField::TopP,
            SettingField::MaxTokens,
            SettingField::BaseUrl,
            SettingField::Currency,
        ]
    }

    pub fn label(&self) -> &'static str {
        match self {
            SettingField::ApiKey => "API key",
            SettingField::Model => "Model",
            SettingField::SystemPrompt => "System prompt",
            SettingField::Temperature => "Temperature",
            SettingField::TopP => "Top P",
            SettingField::MaxTokens => "Max tokens",
            SettingField::BaseUrl => "Base URL",
            SettingField::Currency => "Balance currency",
        }
    }

    /// Raw editable value.
    pub fn value(&self, settings: &Settings) -> String {
        match self {
            SettingField::ApiKey => settings.api_key.clone().unwrap_or_default(),
            SettingField::Model => settings.model.clone(),
            SettingField::SystemPrompt => settings.system_prompt.clone(),
            SettingField::Temperature => settings.temperature.to_string(),
            SettingField::TopP => settings.top_p.to_string(),
            SettingField::MaxTokens => settings
                .max_tokens
                .map(|n| n.to_string())
                .unwrap_or_default(),
            SettingField::BaseUrl => settings.base_url.clone(),
            SettingField::Currency => settings.currency.clone(),
        }
    }

    pub fn is_secret(&self) -> bool {
        matches!(self, SettingField::ApiKey)
    }

    /// Parse user input into a patch for this field.
    pub fn to_patch(&self, input: &str) -> Result<SettingsPatch, ConfigError> {
        let input = input.trim();
        let mut patch = SettingsPatch::default();
        match self {
            SettingField::ApiKey => {
                patch.api_key = Some((!input.is_empty()).then(|| input.to_string()));
            }
            SettingField::Model => {
                if input.is_empty() {
                    return Err(invalid("model", "must not be empty"));
                }
                patch.model = Some(input.to_string());
            }
            SettingField::SystemPrompt => patch.system_prompt = Some(input.to_string()),
            SettingField::Temperature => {
                let value = parse_float("temperature", input)?;
                if !(0.0..=2.0).contains(&value) {
                    return Err(invalid("temperature", "must be between 0 and 2"));
                }
                patch.temperature = Some(value);
            }
            SettingField::TopP => {
                let value = parse_float("top_p", input)?;
                if !(0.0..=1.0).contains(&value) {
                    return Err(invalid("top_p", "must be between 0 and 1"));
                }
                patch.top_p = Some(value);
            }
            SettingField::MaxTokens => {
                if input.is_empty() {
                    patch.max_tokens = Some(None);
                } else {
                    let value: u32 = input
                        .parse()
                        .map_err(|_| invalid("max_tokens", "must be a positive integer"))?;
                    if value == 0 {
                        return Err(invalid("max_tokens", "must be a positive integer"));
                    }
                    patch.max_tokens = Some(Some(value));
                }
            }
            SettingField::BaseUrl => {
                if !input.starts_with("http://") && !input.starts_with("https://") {
                    return Err(invalid("base_url", "must start with http:// or https://"));
                }
                patch.base_url = Some(input.trim_end_matches('/').to_string());
            }
            SettingField::Currency => {
                if input.is_empty() {
                    return Err(invalid("currency", "must not be empty"));
                }
                patch.currency = Some(input.to_uppercase());
            }
        }
        Ok(patch)
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.to_string(),
    }
}

fn parse_float(field: &'static str, input: &str) -> Result<f32, ConfigError> {
    input
        .parse::<f32>()
        .map_err(|_| invalid(field, "must be a number"))
}
