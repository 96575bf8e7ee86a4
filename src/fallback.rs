//! Model substitution when the provider rejects a model, and the attempt
//! state machine that drives a single completion.

use std::collections::HashMap;

use crate::config::FallbackConfig;
use crate::error::{AiError, ProviderError};
use crate::logging::{log_fallback, log_provider_event};

#[derive(Debug, Clone)]
pub struct FallbackChain {
    links: HashMap<String, String>,
    default_model: String,
}

impl FallbackChain {
    pub fn new(links: HashMap<String, String>, default_model: impl Into<String>) -> Self {
        Self {
            links,
            default_model: default_model.into(),
        }
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    /// The model to try after `model` is rejected. Unknown models go to the
    /// default model, and the default model maps to itself.
    pub fn next<'a>(&'a self, model: &'a str) -> &'a str {
        if model == self.default_model {
            return model;
        }
        self.links
            .get(model)
            .map(String::as_str)
            .unwrap_or(&self.default_model)
    }
}

impl From<&FallbackConfig> for FallbackChain {
    fn from(config: &FallbackConfig) -> Self {
        Self::new(config.chain.clone(), config.default_model.clone())
    }
}

impl Default for FallbackChain {
    fn default() -> Self {
        Self::from(&FallbackConfig::default())
    }
}

#[derive(Debug)]
pub enum AttemptState {
    Attempting { model: String, attempt: u32 },
    Succeeded { text: String, model: String },
    FailedTerminal(AiError),
}

impl AttemptState {
    pub fn start(model: impl Into<String>) -> Self {
        AttemptState::Attempting {
            model: model.into(),
            attempt: 1,
        }
    }

    /// Feed the outcome of the current attempt. Terminal states are returned unchanged.
    pub fn advance(
        self,
        outcome: Result<String, ProviderError>,
        chain: &FallbackChain,
        max_attempts: u32,
    ) -> Self {
        let (model, attempt) = match self {
            AttemptState::Attempting { model, attempt } => (model, attempt),
            terminal => return terminal,
        };

        let error = match outcome {
            Ok(text) => return AttemptState::Succeeded { text, model },
            Err(error) => error,
        };

        log_provider_event("attempt_failed", &model, attempt, error.status());

        if !error.is_fallback_eligible() {
            return AttemptState::FailedTerminal(AiError::Provider(error));
        }

        let next = chain.next(&model).to_string();
        if next == model {
            return AttemptState::FailedTerminal(AiError::NoFallbackAvailable { model, source: error });
        }

        if attempt >= max_attempts {
            return AttemptState::FailedTerminal(AiError::AttemptsExhausted {
                attempts: attempt,
                last_model: model,
            });
        }

        log_fallback(&model, &next, attempt + 1);
        AttemptState::Attempting {
            model: next,
            attempt: attempt + 1,
        }
    }
}
