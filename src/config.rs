use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::cache::CacheConfig;
use crate::error::ConfigError;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an expert in management and coaching. \
Give concise, concrete advice.";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub provider: ProviderConfig,
    pub cache: CacheConfig,
    pub fallback: FallbackConfig,
    pub settings: SettingsConfig,
    pub templates: TemplateConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    pub fn load<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(&path)
            .map_err(|_| ConfigError::FileNotFound(path.as_ref().display().to_string()))?;

        let config: AppConfig = toml::from_str(&content)
            .map_err(|e| ConfigError::Parse(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    pub fn save<P: AsRef<std::path::Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::Parse(e.to_string()))?;

        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.provider.base_url.trim().is_empty() {
            return Err(ConfigError::Validation("provider base_url cannot be empty".to_string()));
        }

        if self.provider.max_attempts == 0 || self.provider.max_attempts > 10 {
            return Err(ConfigError::Validation("provider max_attempts must be between 1 and 10".to_string()));
        }

        if self.provider.timeout.is_zero() {
            return Err(ConfigError::Validation("provider timeout must be greater than 0".to_string()));
        }

        if self.cache.max_entries == 0 {
            return Err(ConfigError::Validation("cache max_entries must be greater than 0".to_string()));
        }

        if self.cache.max_bytes == 0 {
            return Err(ConfigError::Validation("cache max_bytes must be greater than 0".to_string()));
        }

        if self.cache.ttl.is_zero() {
            return Err(ConfigError::Validation("cache ttl must be greater than 0".to_string()));
        }

        if self.fallback.default_model.trim().is_empty() {
            return Err(ConfigError::Validation("fallback default_model cannot be empty".to_string()));
        }

        for (from, to) in &self.fallback.chain {
            if from.trim().is_empty() || to.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "fallback chain entry '{}' -> '{}' has an empty model name",
                    from, to
                )));
            }
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::Validation(format!("Invalid logging level '{}'. Valid levels: {:?}", self.logging.level, valid_levels)));
        }

        let valid_formats = ["text", "json"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            return Err(ConfigError::Validation(format!("Invalid logging format '{}'. Valid formats: {:?}", self.logging.format, valid_formats)));
        }

        let valid_outputs = ["stdout", "file", "both"];
        if !valid_outputs.contains(&self.logging.output.as_str()) {
            return Err(ConfigError::Validation(format!("Invalid logging output '{}'. Valid outputs: {:?}", self.logging.output, valid_outputs)));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub base_url: String,
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    pub max_attempts: u32,
    pub system_prompt: String,
    /// Answer every request locally with a canned response; no API key needed.
    pub offline: bool,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            timeout: Duration::from_secs(60),
            max_attempts: 3,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            offline: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    pub default_model: String,
    pub chain: HashMap<String, String>,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        let chain = [
            ("gpt-4o", "gpt-4o-2024-05-13"),
            ("gpt-4o-2024-05-13", "gpt-4-turbo-2024-04-09"),
            ("gpt-4-turbo", "gpt-4-turbo-2024-04-09"),
            ("gpt-4-turbo-2024-04-09", "gpt-3.5-turbo-0125"),
            ("gpt-3.5-turbo", "gpt-3.5-turbo-0125"),
        ]
        .into_iter()
        .map(|(from, to)| (from.to_string(), to.to_string()))
        .collect();

        Self {
            default_model: "gpt-3.5-turbo-0125".to_string(),
            chain,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsConfig {
    pub path: PathBuf,
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("settings.toml"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateConfig {
    /// Directory of `*.hbs` files that replace the built-in prompts by name.
    pub template_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
    pub output: String,
    pub file_path: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
            output: "stdout".to_string(),
            file_path: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.cache.max_entries, 100);
        assert_eq!(config.cache.max_bytes, 5 * 1024 * 1024);
        assert_eq!(config.cache.ttl, Duration::from_secs(86_400));
        assert_eq!(config.provider.max_attempts, 3);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [provider]
            offline = true

            [cache]
            ttl = "2h"
            "#,
        )
        .unwrap();

        assert!(config.provider.offline);
        assert_eq!(config.provider.base_url, "https://api.openai.com/v1");
        assert_eq!(config.cache.ttl, Duration::from_secs(7200));
        assert_eq!(config.cache.max_entries, 100);
        assert_eq!(config.fallback.chain.get("gpt-4o").map(String::as_str), Some("gpt-4o-2024-05-13"));
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("coach.toml");

        let mut config = AppConfig::default();
        config.provider.max_attempts = 5;
        config.save(&path).unwrap();

        let loaded = AppConfig::load(&path).unwrap();
        assert_eq!(loaded.provider.max_attempts, 5);
        assert_eq!(loaded.fallback.chain.len(), 5);
    }

    #[test]
    fn test_missing_file() {
        let result = AppConfig::load("/nonexistent/coach.toml");
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_configuration_validation() {
        let mut config = AppConfig::default();
        config.cache.max_entries = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.provider.max_attempts = 11;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.fallback.chain.insert("gpt-4o".to_string(), " ".to_string());
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.logging.format = "xml".to_string();
        assert!(config.validate().is_err());
    }
}
