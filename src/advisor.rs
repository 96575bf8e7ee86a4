use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::client::{AiClient, CompletionOptions};
use crate::config::AppConfig;
use crate::error::AiError;
use crate::prompts::PromptBuilder;
use crate::records::{DateRange, Member, OneOnOne, SessionRecord};
use crate::settings::SettingsStore;

const QUESTIONS_MAX_TOKENS: u32 = 1200;
const QUESTIONS_TEMPERATURE: f32 = 0.8;
const ANALYSIS_MAX_TOKENS: u32 = 1500;
const ANALYSIS_TEMPERATURE: f32 = 0.7;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub analysis: String,
    pub sessions_count: usize,
}

/// The AI-backed coaching features: advice and questions for a single
/// meeting, and management-style analyses across many.
pub struct CoachingAdvisor {
    client: Arc<AiClient>,
    prompts: PromptBuilder,
}

impl CoachingAdvisor {
    pub fn new(client: Arc<AiClient>, prompts: PromptBuilder) -> Self {
        Self { client, prompts }
    }

    /// Client and prompts as described by `config`.
    pub fn from_config(config: &AppConfig, store: Arc<dyn SettingsStore>) -> Result<Self, AiError> {
        let prompts = PromptBuilder::from_config(&config.templates)?;
        let client = AiClient::from_config(config, store);
        Ok(Self::new(Arc::new(client), prompts))
    }

    pub fn client(&self) -> &Arc<AiClient> {
        &self.client
    }

    /// Coaching advice for one meeting. The caller stores the result as the
    /// meeting's summary.
    pub async fn generate_advice(&self, one_on_one: &OneOnOne, member: &Member) -> Result<String, AiError> {
        ensure_belongs(one_on_one, member)?;
        let prompt = self.prompts.coaching_advice(one_on_one, member)?;
        self.client.complete(&prompt, &CompletionOptions::default()).await
    }

    pub async fn generate_questions(&self, one_on_one: &OneOnOne, member: &Member) -> Result<String, AiError> {
        ensure_belongs(one_on_one, member)?;
        let prompt = self.prompts.next_session_questions(one_on_one, member)?;
        let options = CompletionOptions::new()
            .max_tokens(QUESTIONS_MAX_TOKENS)
            .temperature(QUESTIONS_TEMPERATURE);
        self.client.complete(&prompt, &options).await
    }

    /// Management style as seen through one member's meetings within `range`.
    pub async fn analyze_management_style(
        &self,
        member: &Member,
        sessions: &[OneOnOne],
        range: DateRange,
    ) -> Result<AnalysisReport, AiError> {
        let mut selected: Vec<OneOnOne> = sessions
            .iter()
            .filter(|s| s.member_id == member.id && range.contains(s.date))
            .cloned()
            .collect();
        if selected.is_empty() {
            return Err(AiError::NoSessions);
        }
        selected.sort_by(|a, b| b.date.cmp(&a.date));

        let prompt = self.prompts.management_style(&selected, member)?;
        let analysis = self.client.complete(&prompt, &analysis_options()).await?;

        tracing::info!(member_id = member.id, sessions = selected.len(), "Management style analysis generated");
        Ok(AnalysisReport {
            analysis,
            sessions_count: selected.len(),
        })
    }

    /// Management style across every member's meetings within `range`.
    pub async fn overall_analysis(&self, records: &[SessionRecord], range: DateRange) -> Result<AnalysisReport, AiError> {
        let mut selected: Vec<SessionRecord> = records
            .iter()
            .filter(|r| range.contains(r.session.date))
            .cloned()
            .collect();
        if selected.is_empty() {
            return Err(AiError::NoSessions);
        }
        selected.sort_by(|a, b| b.session.date.cmp(&a.session.date));

        let prompt = self.prompts.overall_management_style(&selected)?;
        let analysis = self.client.complete(&prompt, &analysis_options()).await?;

        tracing::info!(sessions = selected.len(), "Overall management style analysis generated");
        Ok(AnalysisReport {
            analysis,
            sessions_count: selected.len(),
        })
    }
}

fn analysis_options() -> CompletionOptions {
    CompletionOptions::new()
        .max_tokens(ANALYSIS_MAX_TOKENS)
        .temperature(ANALYSIS_TEMPERATURE)
}

fn ensure_belongs(one_on_one: &OneOnOne, member: &Member) -> Result<(), AiError> {
    if one_on_one.member_id != member.id {
        return Err(AiError::InvalidInput(format!(
            "one-on-one {} belongs to member {}, not {}",
            one_on_one.id, one_on_one.member_id, member.id
        )));
    }
    Ok(())
}
