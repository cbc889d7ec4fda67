use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use oneline_engine::{
    ApiKey, ExtractedText, FailureKind, GeminiClient, GeminiSettings, GenerationFailure,
    ModelClient, PipelineError, Prompt, Stage, StageContext, Summarizer, SummarizerSettings,
    MIN_TEXT_CHARS,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ENDPOINT: &str = "/v1beta/models/gemini-1.5-flash:generateContent";
const GOOD_SUMMARY: &str = "新計画が発表され、来月から段階的に始まる見通しだ。";

fn page_text() -> ExtractedText {
    let raw = "関係者は新しい計画を発表し、今後の展開に期待が寄せられている。\n".repeat(10);
    ExtractedText::from_raw(&raw, MIN_TEXT_CHARS).expect("long enough")
}

fn model_reply(text: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "candidates": [{ "content": { "role": "model", "parts": [{ "text": text }] } }]
    }))
}

fn summarizer_for(server: &MockServer, attempt_timeout: Duration) -> Summarizer {
    let settings = GeminiSettings {
        api_key: Some(ApiKey::new("test-key").unwrap()),
        api_base: server.uri(),
        ..GeminiSettings::default()
    };
    let client = GeminiClient::new(&settings).expect("client builds");
    Summarizer::new(
        Arc::new(client),
        SummarizerSettings {
            attempt_timeout,
            ..SummarizerSettings::default()
        },
    )
}

fn ctx() -> StageContext {
    StageContext::new(Duration::from_secs(10))
}

#[tokio::test]
async fn valid_first_answer_is_returned_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .and(header("x-goog-api-key", "test-key"))
        .and(body_string_contains("【例】"))
        .respond_with(model_reply(GOOD_SUMMARY))
        .expect(1)
        .mount(&server)
        .await;

    let summary = summarizer_for(&server, Duration::from_secs(2))
        .summarize(&page_text(), &ctx())
        .await
        .expect("summary");
    assert_eq!(summary.as_str(), GOOD_SUMMARY);
}

#[tokio::test]
async fn wrapping_quotes_and_whitespace_are_cleaned() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(model_reply(&format!("  「{GOOD_SUMMARY}」\n")))
        .mount(&server)
        .await;

    let summary = summarizer_for(&server, Duration::from_secs(2))
        .summarize(&page_text(), &ctx())
        .await
        .expect("summary");
    assert_eq!(summary.as_str(), GOOD_SUMMARY);
}

#[tokio::test]
async fn english_answer_triggers_one_stricter_retry() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .and(body_string_contains("【例】"))
        .respond_with(model_reply("The company announced a new plan."))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .and(body_string_contains("前回の出力は"))
        .respond_with(model_reply(GOOD_SUMMARY))
        .expect(1)
        .mount(&server)
        .await;

    let summary = summarizer_for(&server, Duration::from_secs(2))
        .summarize(&page_text(), &ctx())
        .await
        .expect("retry succeeds");
    assert_eq!(summary.as_str(), GOOD_SUMMARY);
}

#[tokio::test]
async fn second_rejection_is_terminal() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(model_reply("新計画を発表した。来月から始まる。"))
        .expect(2)
        .mount(&server)
        .await;

    let err = summarizer_for(&server, Duration::from_secs(2))
        .summarize(&page_text(), &ctx())
        .await
        .unwrap_err();
    assert_eq!(
        err.kind,
        FailureKind::GenerationFailed(GenerationFailure::FormatRejected)
    );
    assert_eq!(err.message, "summary did not satisfy format constraints");
}

#[tokio::test]
async fn api_error_is_retried_and_retry_failure_is_returned() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&server)
        .await;

    let err = summarizer_for(&server, Duration::from_secs(2))
        .summarize(&page_text(), &ctx())
        .await
        .unwrap_err();
    assert_eq!(
        err.kind,
        FailureKind::GenerationFailed(GenerationFailure::ApiStatus(500))
    );
    assert_eq!(err.message, "model API error (HTTP 500)");
}

#[tokio::test]
async fn empty_candidates_count_as_empty_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "candidates": [] })))
        .expect(2)
        .mount(&server)
        .await;

    let err = summarizer_for(&server, Duration::from_secs(2))
        .summarize(&page_text(), &ctx())
        .await
        .unwrap_err();
    assert_eq!(
        err.kind,
        FailureKind::GenerationFailed(GenerationFailure::EmptyResponse)
    );
    assert_eq!(err.message, "empty model response");
}

#[tokio::test]
async fn first_attempt_timeout_still_retries() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .and(body_string_contains("【例】"))
        .respond_with(model_reply(GOOD_SUMMARY).set_delay(Duration::from_secs(3)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .and(body_string_contains("前回の出力は"))
        .respond_with(model_reply(GOOD_SUMMARY))
        .expect(1)
        .mount(&server)
        .await;

    let summary = summarizer_for(&server, Duration::from_millis(300))
        .summarize(&page_text(), &ctx())
        .await
        .expect("retry succeeds");
    assert_eq!(summary.as_str(), GOOD_SUMMARY);
}

#[tokio::test]
async fn retry_timeout_is_terminal() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(model_reply(GOOD_SUMMARY).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let err = summarizer_for(&server, Duration::from_millis(200))
        .summarize(&page_text(), &ctx())
        .await
        .unwrap_err();
    assert_eq!(
        err.kind,
        FailureKind::Timeout {
            stage: Stage::Summarizing
        }
    );
    assert_eq!(err.message, "summary generation timed out");
}

#[tokio::test]
async fn long_answer_is_cut_at_last_clause_mark() {
    let server = MockServer::start().await;
    let long = format!("{}、{}", "あ".repeat(30), "い".repeat(70));
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(model_reply(&long))
        .mount(&server)
        .await;

    let summary = summarizer_for(&server, Duration::from_secs(2))
        .summarize(&page_text(), &ctx())
        .await
        .expect("summary");
    assert_eq!(summary.as_str(), format!("{}、", "あ".repeat(30)));
}

#[tokio::test]
async fn missing_credential_never_calls_the_api() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(model_reply(GOOD_SUMMARY))
        .expect(0)
        .mount(&server)
        .await;

    let settings = GeminiSettings {
        api_base: server.uri(),
        ..GeminiSettings::default()
    };
    let client = GeminiClient::new(&settings).expect("client builds");
    let summarizer = Summarizer::new(Arc::new(client), SummarizerSettings::default());
    let err = summarizer.summarize(&page_text(), &ctx()).await.unwrap_err();
    assert_eq!(
        err.kind,
        FailureKind::GenerationFailed(GenerationFailure::MissingCredential)
    );
    assert_eq!(err.message, "missing credential");
}

/// Counts calls and fails every one with the configured error.
struct FailingModel {
    calls: AtomicUsize,
    failure: GenerationFailure,
}

#[async_trait::async_trait]
impl ModelClient for FailingModel {
    async fn generate(
        &self,
        _prompt: &Prompt,
        _ctx: &StageContext,
    ) -> Result<String, PipelineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(PipelineError::new(FailureKind::GenerationFailed(self.failure)))
    }
}

#[tokio::test]
async fn credential_failure_from_model_is_not_retried() {
    let model = Arc::new(FailingModel {
        calls: AtomicUsize::new(0),
        failure: GenerationFailure::MissingCredential,
    });
    let summarizer = Summarizer::new(model.clone(), SummarizerSettings::default());
    let err = summarizer.summarize(&page_text(), &ctx()).await.unwrap_err();
    assert_eq!(
        err.kind,
        FailureKind::GenerationFailed(GenerationFailure::MissingCredential)
    );
    assert_eq!(model.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn transport_failure_is_retried_once() {
    let model = Arc::new(FailingModel {
        calls: AtomicUsize::new(0),
        failure: GenerationFailure::Transport,
    });
    let summarizer = Summarizer::new(model.clone(), SummarizerSettings::default());
    let err = summarizer.summarize(&page_text(), &ctx()).await.unwrap_err();
    assert_eq!(err.message, "model API request failed");
    assert_eq!(model.calls.load(Ordering::SeqCst), 2);
}
