//! HTTP reasoning adapters against mock provider APIs.

use serde_json::json;
use veracity_core::schemas::{claims_schema, verdict_schema};
use veracity_providers::{CompletionRequest, ReasoningClient, ReasoningError};
use veracity_types::Provider;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{claude_body, gemini_body, gemini_path, mock_client, openai_body};

const VERDICT: &str = r#"{"is_consistent":true,"reason":"passage 1 agrees"}"#;

fn verdict_request() -> CompletionRequest<'static> {
    CompletionRequest {
        system: "Judge the claim.",
        prompt: "CLAIM:\nThe library burned down in 1995.",
        schema: verdict_schema(),
    }
}

#[tokio::test]
async fn gemini_sends_schema_and_key_header() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(gemini_path()))
        .and(header("x-goog-api-key", "test-key"))
        .and(body_partial_json(json!({
            "generationConfig": { "responseMimeType": "application/json" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_body(VERDICT)))
        .expect(1)
        .mount(&server)
        .await;

    let client = mock_client(Provider::Gemini, &server);
    let text = client.complete(&verdict_request()).await.unwrap();
    assert_eq!(text, VERDICT);
}

#[tokio::test]
async fn claude_sends_version_header() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/messages"))
        .and(header("x-api-key", "test-key"))
        .and(header("anthropic-version", "2023-06-01"))
        .and(body_partial_json(json!({ "model": "claude-haiku-4-5" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(claude_body(VERDICT)))
        .expect(1)
        .mount(&server)
        .await;

    let client = mock_client(Provider::Claude, &server);
    assert_eq!(client.complete(&verdict_request()).await.unwrap(), VERDICT);
}

#[tokio::test]
async fn openai_sends_strict_json_schema() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/responses"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(json!({
            "text": { "format": { "type": "json_schema", "name": "claims", "strict": true } }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(openai_body("{\"facts\":[]}")))
        .expect(1)
        .mount(&server)
        .await;

    let client = mock_client(Provider::OpenAI, &server);
    let request = CompletionRequest {
        system: "Split.",
        prompt: "NARRATIVE:\nNothing happened.",
        schema: claims_schema(),
    };
    assert_eq!(client.complete(&request).await.unwrap(), "{\"facts\":[]}");
}

#[tokio::test]
async fn rate_limit_is_not_retried_by_transport() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(gemini_path()))
        .respond_with(ResponseTemplate::new(429).set_body_string("Resource has been exhausted"))
        .expect(1)
        .mount(&server)
        .await;

    let client = mock_client(Provider::Gemini, &server);
    let err = client.complete(&verdict_request()).await.unwrap_err();
    assert!(matches!(err, ReasoningError::RateLimited { status: 429, .. }));
    assert!(err.is_rate_limited());
}

#[tokio::test]
async fn server_errors_are_retried_then_transient() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/messages"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .expect(3)
        .mount(&server)
        .await;

    let client = mock_client(Provider::Claude, &server);
    let err = client.complete(&verdict_request()).await.unwrap_err();
    assert!(matches!(err, ReasoningError::Transient(_)));
    assert!(!err.is_rate_limited());
}

#[tokio::test]
async fn auth_failure_is_permanent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/responses"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({ "error": { "message": "Incorrect API key provided" } })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = mock_client(Provider::OpenAI, &server);
    let err = client.complete(&verdict_request()).await.unwrap_err();
    assert!(matches!(err, ReasoningError::Permanent(ref msg) if msg.contains("Incorrect API key")));
}

#[tokio::test]
async fn quota_message_behind_non_429_status_is_rate_limited() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(gemini_path()))
        .respond_with(
            ResponseTemplate::new(400).set_body_string("Quota exceeded for quota metric"),
        )
        .mount(&server)
        .await;

    let client = mock_client(Provider::Gemini, &server);
    let err = client.complete(&verdict_request()).await.unwrap_err();
    assert!(matches!(err, ReasoningError::Permanent(_)));
    assert!(err.is_rate_limited());
}
