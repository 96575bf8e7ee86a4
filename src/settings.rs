//! The persisted settings record and the resolver that turns it into the
//! credentials and model used for a completion.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::fs;
use tokio::sync::RwLock;

use crate::error::ConfigError;

pub const DEFAULT_SETTINGS_MODEL: &str = "gpt-4o";
pub const OFFLINE_API_KEY: &str = "offline-api-key";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse settings: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Failed to serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

fn default_model() -> String {
    DEFAULT_SETTINGS_MODEL.to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_model(),
            updated_at: None,
        }
    }
}

impl Settings {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            model: model.into(),
            updated_at: None,
        }
    }

    /// The key with surrounding whitespace removed, if any is left.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }

    /// Key suitable for display: first and last four characters only.
    pub fn masked_api_key(&self) -> String {
        match self.api_key() {
            Some(key) if key.chars().count() > 8 => {
                let chars: Vec<char> = key.chars().collect();
                let head: String = chars[..4].iter().collect();
                let tail: String = chars[chars.len() - 4..].iter().collect();
                format!("{}...{}", head, tail)
            }
            Some(_) => "********".to_string(),
            None => "(not set)".to_string(),
        }
    }
}

/// Where the single settings record lives.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get_settings(&self) -> Result<Option<Settings>, SettingsError>;

    async fn save_settings(&self, settings: &Settings) -> Result<(), SettingsError>;
}

/// Settings kept in a TOML file; a missing file means no record yet.
pub struct FileSettingsStore {
    path: PathBuf,
}

impl FileSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SettingsStore for FileSettingsStore {
    async fn get_settings(&self) -> Result<Option<Settings>, SettingsError> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        Ok(Some(toml::from_str(&content)?))
    }

    async fn save_settings(&self, settings: &Settings) -> Result<(), SettingsError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).await?;
        }

        let content = toml::to_string_pretty(settings)?;
        fs::write(&self.path, content).await?;
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemorySettingsStore {
    settings: RwLock<Option<Settings>>,
}

impl InMemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(settings: Settings) -> Self {
        Self {
            settings: RwLock::new(Some(settings)),
        }
    }
}

#[async_trait]
impl SettingsStore for InMemorySettingsStore {
    async fn get_settings(&self) -> Result<Option<Settings>, SettingsError> {
        Ok(self.settings.read().await.clone())
    }

    async fn save_settings(&self, settings: &Settings) -> Result<(), SettingsError> {
        *self.settings.write().await = Some(settings.clone());
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub api_key: String,
    pub model: String,
}

pub struct ConfigResolver {
    store: Arc<dyn SettingsStore>,
    default_model: String,
    offline: bool,
}

impl ConfigResolver {
    pub fn new(store: Arc<dyn SettingsStore>, default_model: impl Into<String>, offline: bool) -> Self {
        Self {
            store,
            default_model: default_model.into(),
            offline,
        }
    }

    pub fn store(&self) -> &Arc<dyn SettingsStore> {
        &self.store
    }

    pub async fn resolve(&self) -> Result<ResolvedConfig, crate::AiError> {
        let settings = self.store.get_settings().await?;

        match settings.as_ref().and_then(|s| s.api_key().map(|key| (key, s))) {
            Some((api_key, settings)) => {
                let model = if settings.model.trim().is_empty() {
                    self.default_model.clone()
                } else {
                    settings.model.trim().to_string()
                };
                Ok(ResolvedConfig {
                    api_key: api_key.to_string(),
                    model,
                })
            }
            None if self.offline => Ok(ResolvedConfig {
                api_key: OFFLINE_API_KEY.to_string(),
                model: self.default_model.clone(),
            }),
            None => Err(ConfigError::MissingApiKey.into()),
        }
    }
}
