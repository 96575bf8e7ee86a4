use mockito::{Matcher, Server, ServerGuard};
use one_on_one_coach::{
    AiClient, AiError, AppConfig, CoachingAdvisor, CompletionOptions, ConfigError, DateRange,
    FileSettingsStore, Member, OneOnOne, ProviderError, SessionRecord, Settings, SettingsStore,
};
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;

const COMPLETIONS_PATH: &str = "/v1/chat/completions";

fn completion_body(text: &str) -> String {
    json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": text },
            "finish_reason": "stop"
        }]
    })
    .to_string()
}

fn error_body(message: &str) -> String {
    json!({ "error": { "message": message, "type": "invalid_request_error" } }).to_string()
}

fn model_is(model: &str) -> Matcher {
    Matcher::PartialJson(json!({ "model": model }))
}

struct Fixture {
    server: ServerGuard,
    config: AppConfig,
    store: Arc<FileSettingsStore>,
    _dir: TempDir,
}

impl Fixture {
    async fn new(settings: Option<Settings>) -> Self {
        let server = Server::new_async().await;
        let dir = TempDir::new().unwrap();

        let mut config = AppConfig::default();
        config.provider.base_url = format!("{}/v1", server.url());
        config.settings.path = dir.path().join("settings.toml");

        let store = Arc::new(FileSettingsStore::new(config.settings.path.clone()));
        if let Some(settings) = settings {
            store.save_settings(&settings).await.unwrap();
        }

        Self {
            server,
            config,
            store,
            _dir: dir,
        }
    }

    fn client(&self) -> AiClient {
        AiClient::from_config(&self.config, self.store.clone())
    }
}

#[tokio::test]
async fn test_completion_is_cached_across_calls() {
    let mut fixture = Fixture::new(Some(Settings::new("sk-integration", "gpt-4o"))).await;
    let mock = fixture
        .server
        .mock("POST", COMPLETIONS_PATH)
        .match_header("authorization", "Bearer sk-integration")
        .match_body(Matcher::AllOf(vec![
            model_is("gpt-4o"),
            Matcher::PartialJson(json!({ "max_tokens": 500 })),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(completion_body("Key points: ..."))
        .expect(1)
        .create_async()
        .await;

    let client = fixture.client();
    let options = CompletionOptions::new().temperature(0.7).max_tokens(500);

    let first = client.complete("summarize this 1:1", &options).await.unwrap();
    let second = client.complete("summarize this 1:1", &options).await.unwrap();

    assert_eq!(first, "Key points: ...");
    assert_eq!(second, first);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_forbidden_model_falls_back() {
    let mut fixture = Fixture::new(Some(Settings::new("sk-integration", "gpt-4o"))).await;
    let rejected = fixture
        .server
        .mock("POST", COMPLETIONS_PATH)
        .match_body(model_is("gpt-4o"))
        .with_status(403)
        .with_body(error_body("You do not have access to model gpt-4o"))
        .expect(1)
        .create_async()
        .await;
    let fallback = fixture
        .server
        .mock("POST", COMPLETIONS_PATH)
        .match_body(model_is("gpt-4o-2024-05-13"))
        .with_status(200)
        .with_body(completion_body("Answer from the pinned snapshot"))
        .expect(1)
        .create_async()
        .await;

    let text = fixture
        .client()
        .complete("prompt", &CompletionOptions::default())
        .await
        .unwrap();

    assert_eq!(text, "Answer from the pinned snapshot");
    rejected.assert_async().await;
    fallback.assert_async().await;
}

#[tokio::test]
async fn test_rate_limit_is_not_retried() {
    let mut fixture = Fixture::new(Some(Settings::new("sk-integration", "gpt-4o"))).await;
    let mock = fixture
        .server
        .mock("POST", COMPLETIONS_PATH)
        .with_status(429)
        .with_body(error_body("Rate limit reached"))
        .expect(1)
        .create_async()
        .await;

    let result = fixture
        .client()
        .complete("prompt", &CompletionOptions::default())
        .await;

    match result {
        Err(AiError::Provider(ProviderError::RateLimited { message })) => {
            assert_eq!(message, "Rate limit reached");
        }
        other => panic!("expected rate limit error, got {:?}", other),
    }
    mock.assert_async().await;
}

#[tokio::test]
async fn test_server_error_is_terminal() {
    let mut fixture = Fixture::new(Some(Settings::new("sk-integration", "gpt-4o"))).await;
    let mock = fixture
        .server
        .mock("POST", COMPLETIONS_PATH)
        .with_status(500)
        .with_body("upstream failure")
        .expect(1)
        .create_async()
        .await;

    let result = fixture
        .client()
        .complete("prompt", &CompletionOptions::default())
        .await;

    assert!(matches!(
        result,
        Err(AiError::Provider(ProviderError::Server { status: 500, .. }))
    ));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_every_model_rejected_exhausts_attempts() {
    let mut fixture = Fixture::new(Some(Settings::new("sk-integration", "gpt-4o"))).await;
    let mock = fixture
        .server
        .mock("POST", COMPLETIONS_PATH)
        .with_status(404)
        .with_body(error_body("The model does not exist"))
        .expect(3)
        .create_async()
        .await;

    let result = fixture
        .client()
        .complete("prompt", &CompletionOptions::default())
        .await;

    match result {
        Err(error @ AiError::AttemptsExhausted { .. }) => {
            assert_eq!(error.user_message(), "AI generation temporarily unavailable.");
        }
        other => panic!("expected exhausted attempts, got {:?}", other),
    }
    mock.assert_async().await;
}

#[tokio::test]
async fn test_missing_settings_record_makes_no_request() {
    let mut fixture = Fixture::new(None).await;
    let mock = fixture
        .server
        .mock("POST", COMPLETIONS_PATH)
        .expect(0)
        .create_async()
        .await;

    let result = fixture
        .client()
        .complete("prompt", &CompletionOptions::default())
        .await;

    assert!(matches!(result, Err(AiError::Config(ConfigError::MissingApiKey))));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_updated_key_is_used_and_persisted() {
    let mut fixture = Fixture::new(Some(Settings::new("sk-old", "gpt-4o"))).await;
    let old_key = fixture
        .server
        .mock("POST", COMPLETIONS_PATH)
        .match_header("authorization", "Bearer sk-old")
        .with_body(completion_body("old"))
        .expect(1)
        .create_async()
        .await;
    let new_key = fixture
        .server
        .mock("POST", COMPLETIONS_PATH)
        .match_header("authorization", "Bearer sk-new")
        .with_body(completion_body("new"))
        .expect(1)
        .create_async()
        .await;

    let client = fixture.client();
    assert_eq!(client.complete("p", &CompletionOptions::default()).await.unwrap(), "old");

    client.update_settings(Settings::new("sk-new", "gpt-4o")).await.unwrap();
    assert_eq!(client.complete("p", &CompletionOptions::default()).await.unwrap(), "new");

    let stored = fixture.store.get_settings().await.unwrap().unwrap();
    assert_eq!(stored.api_key.as_deref(), Some("sk-new"));
    assert!(stored.updated_at.is_some());

    old_key.assert_async().await;
    new_key.assert_async().await;
}

#[tokio::test]
async fn test_advisor_questions_over_http() {
    let mut fixture = Fixture::new(Some(Settings::new("sk-integration", "gpt-4o"))).await;
    let mock = fixture
        .server
        .mock("POST", COMPLETIONS_PATH)
        .match_body(Matcher::AllOf(vec![
            Matcher::PartialJson(json!({ "max_tokens": 1200 })),
            Matcher::Regex("Aiko Tanaka".to_string()),
            Matcher::Regex("Prepare the design review".to_string()),
        ]))
        .with_body(completion_body("1. How did the design review go?"))
        .expect(1)
        .create_async()
        .await;

    let advisor = CoachingAdvisor::from_config(&fixture.config, fixture.store.clone()).unwrap();
    let member = Member::new(1, "Aiko Tanaka", "Engineer");
    let session = OneOnOne::new(5, 1, "2024-05-01".parse().unwrap(), "Discussed workload.")
        .with_next_actions("Prepare the design review");

    let questions = advisor.generate_questions(&session, &member).await.unwrap();

    assert_eq!(questions, "1. How did the design review go?");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_overall_analysis_over_http() {
    let mut fixture = Fixture::new(Some(Settings::new("sk-integration", "gpt-4o"))).await;
    let mock = fixture
        .server
        .mock("POST", COMPLETIONS_PATH)
        .match_body(Matcher::AllOf(vec![
            Matcher::PartialJson(json!({ "max_tokens": 1500 })),
            Matcher::Regex("Total sessions: 2".to_string()),
        ]))
        .with_body(completion_body("Overall: supportive style"))
        .expect(1)
        .create_async()
        .await;

    let records: Vec<SessionRecord> = serde_json::from_value(json!([
        {
            "id": 1, "memberId": 1, "date": "2024-04-01", "content": "Sprint retro",
            "member": { "id": 1, "name": "Aiko", "jobTitle": "Engineer" }
        },
        {
            "id": 2, "memberId": 2, "date": "2024-04-03", "content": "Career goals",
            "member": { "id": 2, "name": "Ben", "jobTitle": "Designer" }
        }
    ]))
    .unwrap();

    let advisor = CoachingAdvisor::from_config(&fixture.config, fixture.store.clone()).unwrap();
    let report = advisor.overall_analysis(&records, DateRange::all()).await.unwrap();

    assert_eq!(report.sessions_count, 2);
    assert_eq!(report.analysis, "Overall: supportive style");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_offline_config_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("coach.toml");
    std::fs::write(
        &path,
        r#"
        [provider]
        offline = true

        [cache]
        max_entries = 10
        "#,
    )
    .unwrap();

    let config = AppConfig::load(&path).unwrap();
    let store = Arc::new(FileSettingsStore::new(dir.path().join("settings.toml")));
    let client = AiClient::from_config(&config, store);

    let text = client.complete("hello", &CompletionOptions::default()).await.unwrap();
    assert_eq!(text, one_on_one_coach::backends::OFFLINE_RESPONSE);
    assert_eq!(client.cache_stats().total_entries, 1);
}
