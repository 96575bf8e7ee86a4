use thiserror::Error;

#[derive(Debug, Error)]
pub enum AiError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Settings error: {0}")]
    Settings(#[from] crate::settings::SettingsError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("No fallback model available after '{model}' was rejected: {source}")]
    NoFallbackAvailable {
        model: String,
        #[source]
        source: ProviderError,
    },

    #[error("Maximum attempts ({attempts}) exceeded; last model tried was '{last_model}'")]
    AttemptsExhausted { attempts: u32, last_model: String },

    #[error("Template error: {0}")]
    Template(#[from] crate::template::TemplateError),

    #[error("No one-on-one sessions to analyze")]
    NoSessions,

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl AiError {
    /// Text to show an end user; route handlers add their own framing.
    pub fn user_message(&self) -> &'static str {
        match self {
            AiError::Config(ConfigError::MissingApiKey) => {
                "API key not configured. Add an API key in settings."
            }
            AiError::Config(_) | AiError::Settings(_) => "The AI settings could not be loaded.",
            AiError::NoFallbackAvailable { .. } | AiError::AttemptsExhausted { .. } => {
                "AI generation temporarily unavailable."
            }
            AiError::Provider(ProviderError::RateLimited { .. }) => {
                "The AI provider is rate limiting requests. Try again shortly."
            }
            AiError::Provider(_) => "AI generation failed.",
            AiError::Template(_) => "The prompt could not be prepared.",
            AiError::NoSessions => "There are no one-on-one sessions to analyze.",
            AiError::InvalidInput(_) => "The request was invalid.",
        }
    }
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Unauthorized ({status}): {message}")]
    Unauthorized { status: u16, message: String },

    #[error("Model not found: {message}")]
    ModelNotFound { message: String },

    #[error("Rate limit exceeded: {message}")]
    RateLimited { message: String },

    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("Request rejected ({status}): {message}")]
    InvalidRequest { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// Classify a non-success HTTP status from the provider.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 | 403 => ProviderError::Unauthorized { status, message },
            404 => ProviderError::ModelNotFound { message },
            429 => ProviderError::RateLimited { message },
            500..=599 => ProviderError::Server { status, message },
            _ => ProviderError::InvalidRequest { status, message },
        }
    }

    /// Only an inaccessible or unknown model is worth retrying on another model.
    pub fn is_fallback_eligible(&self) -> bool {
        matches!(
            self,
            ProviderError::Unauthorized { .. } | ProviderError::ModelNotFound { .. }
        )
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ProviderError::Unauthorized { status, .. }
            | ProviderError::Server { status, .. }
            | ProviderError::InvalidRequest { status, .. } => Some(*status),
            ProviderError::ModelNotFound { .. } => Some(404),
            ProviderError::RateLimited { .. } => Some(429),
            ProviderError::Http(e) => e.status().map(|s| s.as_u16()),
            ProviderError::InvalidResponse(_) => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("API key not configured")]
    MissingApiKey,

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
