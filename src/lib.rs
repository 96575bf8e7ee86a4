//! AI completion client for a one-on-one meeting coaching application:
//! settings resolution, a bounded response cache, model fallback, and the
//! coaching prompts built on top of them.

pub mod advisor;
pub mod backends;
pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod fallback;
pub mod logging;
pub mod prompts;
pub mod records;
pub mod settings;
pub mod template;

pub use advisor::{AnalysisReport, CoachingAdvisor};
pub use backends::{ChatRequest, CompletionProvider, Message, OpenAiProvider, ProviderConnector};
pub use cache::{CacheConfig, CacheKey, CacheStats, ResponseCache};
pub use client::{AiClient, CompletionOptions};
pub use config::AppConfig;
pub use error::{AiError, ConfigError, ProviderError};
pub use fallback::{AttemptState, FallbackChain};
pub use prompts::PromptBuilder;
pub use records::{DateRange, Member, OneOnOne, SessionRecord};
pub use settings::{ConfigResolver, FileSettingsStore, InMemorySettingsStore, Settings, SettingsStore};
pub use template::{Template, TemplateEngine};
