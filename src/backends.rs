use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::error::ProviderError;

pub const OFFLINE_RESPONSE: &str =
    "This is an offline-mode response. No AI provider was contacted.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// The external language-model API.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Send a chat request and get the text of the first choice.
    async fn complete(&self, request: &ChatRequest) -> Result<String, ProviderError>;

    fn name(&self) -> &str;
}

/// Builds a provider handle bound to one API key.
pub trait ProviderConnector: Send + Sync {
    fn connect(&self, api_key: &str) -> Result<Arc<dyn CompletionProvider>, ProviderError>;
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    message: ChoiceMessage,
}

#[derive(Debug, Default, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// OpenAI-compatible chat completions endpoint.
pub struct OpenAiProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OpenAiProvider {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }
}

#[async_trait]
impl CompletionProvider for OpenAiProvider {
    async fn complete(&self, request: &ChatRequest) -> Result<String, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .map(|envelope| envelope.error.message)
                .unwrap_or_else(|_| {
                    if body.is_empty() {
                        status.to_string()
                    } else {
                        body
                    }
                });
            return Err(ProviderError::from_status(status.as_u16(), message));
        }

        let completion: CompletionResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        Ok(completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default())
    }

    fn name(&self) -> &str {
        "openai"
    }
}

pub struct OpenAiConnector {
    base_url: String,
    timeout: Duration,
}

impl OpenAiConnector {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into(),
            timeout,
        }
    }
}

impl ProviderConnector for OpenAiConnector {
    fn connect(&self, api_key: &str) -> Result<Arc<dyn CompletionProvider>, ProviderError> {
        Ok(Arc::new(OpenAiProvider::new(&self.base_url, api_key, self.timeout)?))
    }
}

/// Answers locally without any network access.
pub struct OfflineProvider {
    response: String,
}

impl OfflineProvider {
    pub fn new() -> Self {
        Self::with_response(OFFLINE_RESPONSE)
    }

    pub fn with_response(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
        }
    }
}

impl Default for OfflineProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CompletionProvider for OfflineProvider {
    async fn complete(&self, _request: &ChatRequest) -> Result<String, ProviderError> {
        Ok(self.response.clone())
    }

    fn name(&self) -> &str {
        "offline"
    }
}

pub struct OfflineConnector;

impl ProviderConnector for OfflineConnector {
    fn connect(&self, _api_key: &str) -> Result<Arc<dyn CompletionProvider>, ProviderError> {
        Ok(Arc::new(OfflineProvider::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> ChatRequest {
        ChatRequest {
            model: "gpt-4o".to_string(),
            messages: vec![Message::system("be brief"), Message::user("Hello")],
            temperature: 0.7,
            max_tokens: 1000,
        }
    }

    #[tokio::test]
    async fn test_offline_provider() {
        let provider = OfflineConnector.connect("ignored").unwrap();
        let response = provider.complete(&request()).await.unwrap();
        assert_eq!(response, OFFLINE_RESPONSE);
        assert_eq!(provider.name(), "offline");
    }

    #[test]
    fn test_request_wire_format() {
        let body = serde_json::to_value(request()).unwrap();
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["max_tokens"], 1000);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "Hello");
    }

    #[test]
    fn test_response_without_content_is_empty() {
        let parsed: CompletionResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#).unwrap();
        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        assert_eq!(text, "");
    }

    #[test]
    fn test_connector_trims_base_url() {
        let provider = OpenAiProvider::new("http://localhost:1234/v1/", "sk", Duration::from_secs(5)).unwrap();
        assert_eq!(provider.base_url, "http://localhost:1234/v1");
    }
}
