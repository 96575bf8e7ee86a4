use std::sync::{Arc, Mutex};

use crate::backends::{
    ChatRequest, CompletionProvider, Message, OfflineConnector, OpenAiConnector, ProviderConnector,
};
use crate::cache::{CacheKey, CacheStats, ResponseCache};
use crate::config::AppConfig;
use crate::error::AiError;
use crate::fallback::{AttemptState, FallbackChain};
use crate::settings::{ConfigResolver, Settings, SettingsStore};

pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 1000;

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionOptions {
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub use_cache: bool,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            max_tokens: None,
            temperature: None,
            use_cache: true,
        }
    }
}

impl CompletionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn without_cache(mut self) -> Self {
        self.use_cache = false;
        self
    }

    pub fn effective_max_tokens(&self) -> u32 {
        self.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS)
    }

    pub fn effective_temperature(&self) -> f32 {
        self.temperature.unwrap_or(DEFAULT_TEMPERATURE)
    }

    fn validate(&self) -> Result<(), AiError> {
        let temperature = self.effective_temperature();
        if !temperature.is_finite() || !(0.0..=2.0).contains(&temperature) {
            return Err(AiError::InvalidInput(format!(
                "temperature must be between 0.0 and 2.0, got {}",
                temperature
            )));
        }
        if self.effective_max_tokens() == 0 {
            return Err(AiError::InvalidInput("max_tokens must be greater than 0".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ClientPolicy {
    pub system_prompt: String,
    pub max_attempts: u32,
    pub key_by_requested_model: bool,
}

impl From<&AppConfig> for ClientPolicy {
    fn from(config: &AppConfig) -> Self {
        Self {
            system_prompt: config.provider.system_prompt.clone(),
            max_attempts: config.provider.max_attempts,
            key_by_requested_model: config.cache.key_by_requested_model,
        }
    }
}

struct ProviderHandle {
    api_key: String,
    provider: Arc<dyn CompletionProvider>,
}

/// Completion service: settings resolution, response caching, and model
/// fallback. Build one per process and share it behind an `Arc`.
pub struct AiClient {
    resolver: ConfigResolver,
    connector: Arc<dyn ProviderConnector>,
    handle: Mutex<Option<ProviderHandle>>,
    // Never held across an `.await`.
    cache: Mutex<ResponseCache>,
    fallbacks: FallbackChain,
    policy: ClientPolicy,
}

impl AiClient {
    pub fn new(
        resolver: ConfigResolver,
        connector: Arc<dyn ProviderConnector>,
        cache: ResponseCache,
        fallbacks: FallbackChain,
        policy: ClientPolicy,
    ) -> Self {
        Self {
            resolver,
            connector,
            handle: Mutex::new(None),
            cache: Mutex::new(cache),
            fallbacks,
            policy,
        }
    }

    /// Wire up the client described by `config`, reading settings from `store`.
    pub fn from_config(config: &AppConfig, store: Arc<dyn SettingsStore>) -> Self {
        let fallbacks = FallbackChain::from(&config.fallback);
        let resolver = ConfigResolver::new(store, fallbacks.default_model(), config.provider.offline);
        let connector: Arc<dyn ProviderConnector> = if config.provider.offline {
            Arc::new(OfflineConnector)
        } else {
            Arc::new(OpenAiConnector::new(
                config.provider.base_url.clone(),
                config.provider.timeout,
            ))
        };

        tracing::info!(
            base_url = %config.provider.base_url,
            offline = config.provider.offline,
            max_attempts = config.provider.max_attempts,
            "AI client initialized"
        );

        Self::new(
            resolver,
            connector,
            ResponseCache::new(config.cache.clone()),
            fallbacks,
            ClientPolicy::from(config),
        )
    }

    pub async fn complete(&self, prompt: &str, options: &CompletionOptions) -> Result<String, AiError> {
        options.validate()?;

        let resolved = self.resolver.resolve().await?;

        let temperature = options.effective_temperature();
        let max_tokens = options.effective_max_tokens();
        let requested_key = CacheKey::build(prompt, &resolved.model, temperature, max_tokens);

        if options.use_cache {
            if let Some(cached) = self.lock_cache().get(&requested_key) {
                tracing::debug!(model = %resolved.model, "Returning cached AI response");
                return Ok(cached);
            }
        }

        let provider = self.provider_for(&resolved.api_key)?;

        let mut state = AttemptState::start(resolved.model.clone());
        loop {
            match state {
                AttemptState::Attempting { model, attempt } => {
                    tracing::debug!(model = %model, attempt, "Requesting completion");
                    let request = self.chat_request(prompt, &model, temperature, max_tokens);
                    let outcome = provider.complete(&request).await;
                    state = AttemptState::Attempting { model, attempt }.advance(
                        outcome,
                        &self.fallbacks,
                        self.policy.max_attempts,
                    );
                }
                AttemptState::Succeeded { text, model } => {
                    if options.use_cache && !text.is_empty() {
                        let key = if self.policy.key_by_requested_model || model == resolved.model {
                            requested_key
                        } else {
                            CacheKey::build(prompt, &model, temperature, max_tokens)
                        };
                        self.lock_cache().insert(key, text.clone());
                    }
                    return Ok(text);
                }
                AttemptState::FailedTerminal(error) => {
                    crate::logging::log_error(&error, "AI completion");
                    return Err(error);
                }
            }
        }
    }

    pub async fn current_settings(&self) -> Result<Settings, AiError> {
        Ok(self.resolver.store().get_settings().await?.unwrap_or_default())
    }

    /// Persist new settings. Cached responses are dropped because they were
    /// produced under the previous settings.
    pub async fn update_settings(&self, mut settings: Settings) -> Result<Settings, AiError> {
        settings.updated_at = Some(chrono::Utc::now());
        self.resolver.store().save_settings(&settings).await?;
        self.clear_cache();
        tracing::info!(model = %settings.model, "Settings updated");
        Ok(settings)
    }

    pub fn clear_cache(&self) {
        self.lock_cache().clear();
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.lock_cache().stats().clone()
    }

    fn chat_request(&self, prompt: &str, model: &str, temperature: f32, max_tokens: u32) -> ChatRequest {
        ChatRequest {
            model: model.to_string(),
            messages: vec![
                Message::system(self.policy.system_prompt.clone()),
                Message::user(prompt),
            ],
            temperature,
            max_tokens,
        }
    }

    /// Reuse the provider handle while the API key is unchanged; rebuild it
    /// through the connector when the key differs.
    fn provider_for(&self, api_key: &str) -> Result<Arc<dyn CompletionProvider>, AiError> {
        let mut handle = self.handle.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(current) = handle.as_ref().filter(|h| h.api_key == api_key) {
            return Ok(Arc::clone(&current.provider));
        }

        let provider = self.connector.connect(api_key)?;
        tracing::debug!(provider = provider.name(), "Provider client (re)built for current API key");
        *handle = Some(ProviderHandle {
            api_key: api_key.to_string(),
            provider: Arc::clone(&provider),
        });
        Ok(provider)
    }

    fn lock_cache(&self) -> std::sync::MutexGuard<'_, ResponseCache> {
        self.cache.lock().unwrap_or_else(|e| e.into_inner())
    }
}
