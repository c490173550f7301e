//! Shared test utilities and fixtures

#![allow(dead_code)]

use std::time::Duration;

use serde_json::{Value, json};
use veracity_core::BackoffPolicy;
use veracity_providers::retry::RetryConfig;
use veracity_providers::{ApiConfig, ClientOptions, HttpReasoningClient};
use veracity_types::{ApiKey, Provider};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const STORY: &str = "The library, built in 1890, burned down in 1995. \
                         Mayor Thomas rebuilt it two years later.";

pub const STORY_FACTS: [&str; 3] = [
    "The library was built in 1890.",
    "The library burned down in 1995.",
    "Mayor Thomas rebuilt the library two years after it burned down.",
];

/// No waiting between verification attempts.
pub fn immediate_policy(max_attempts: u32) -> BackoffPolicy {
    BackoffPolicy::new(Duration::ZERO, Duration::ZERO, Duration::ZERO, max_attempts).unwrap()
}

pub fn fast_retry() -> RetryConfig {
    RetryConfig {
        max_retries: 2,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        jitter_factor: 0.0,
    }
}

/// HTTP reasoning client pointed at a mock server.
pub fn mock_client(provider: Provider, server: &MockServer) -> HttpReasoningClient {
    let config = ApiConfig::new(ApiKey::new(provider, "test-key"), provider.default_model()).unwrap();
    HttpReasoningClient::new(
        config,
        ClientOptions {
            base_url: Some(server.uri()),
            timeout: Duration::from_secs(5),
            retry: fast_retry(),
        },
    )
    .unwrap()
}

/// `generateContent` envelope carrying `text`.
pub fn gemini_body(text: &str) -> Value {
    json!({
        "candidates": [{
            "content": { "role": "model", "parts": [{ "text": text }] },
            "finishReason": "STOP"
        }],
        "usageMetadata": { "promptTokenCount": 10, "candidatesTokenCount": 5 }
    })
}

pub fn claude_body(text: &str) -> Value {
    json!({
        "id": "msg_test",
        "type": "message",
        "role": "assistant",
        "content": [{ "type": "text", "text": text }],
        "stop_reason": "end_turn"
    })
}

pub fn openai_body(text: &str) -> Value {
    json!({
        "id": "resp_test",
        "object": "response",
        "output": [{
            "id": "msg_test",
            "type": "message",
            "role": "assistant",
            "content": [{ "type": "output_text", "text": text }]
        }]
    })
}

pub fn gemini_path() -> String {
    format!("/models/{}:generateContent", Provider::Gemini.default_model())
}

/// Retrieval server returning `docs` for every query.
pub async fn mount_retrieval(server: &MockServer, docs: Value) {
    Mock::given(method("POST"))
        .and(path("/v1/retrieve"))
        .respond_with(ResponseTemplate::new(200).set_body_json(docs))
        .mount(server)
        .await;
}

/// The user-turn text of a Gemini request body.
pub fn gemini_prompt(request: &wiremock::Request) -> String {
    let body: Value = serde_json::from_slice(&request.body).unwrap_or(Value::Null);
    body["contents"][0]["parts"][0]["text"]
        .as_str()
        .unwrap_or_default()
        .to_string()
}

pub fn gemini_system(request: &wiremock::Request) -> String {
    let body: Value = serde_json::from_slice(&request.body).unwrap_or(Value::Null);
    body["system_instruction"]["parts"][0]["text"]
        .as_str()
        .unwrap_or_default()
        .to_string()
}
