//! Anthropic Messages API, non-streaming.
//!
//! The Messages API has no response-format parameter, so the JSON Schema is
//! appended to the system prompt and the reply is validated on our side.

use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::{Value, json};

use crate::{CompletionRequest, HttpReasoningClient, ReasoningError, secret_header};

pub const API_BASE_URL: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 4096;

pub(crate) async fn complete(
    client: &HttpReasoningClient,
    request: &CompletionRequest<'_>,
) -> Result<String, ReasoningError> {
    let url = format!("{}/messages", client.base_url());

    let mut headers = HeaderMap::new();
    headers.insert("x-api-key", secret_header(client.config().api_key())?);
    headers.insert(
        "anthropic-version",
        HeaderValue::from_static(ANTHROPIC_VERSION),
    );

    let body = build_request_body(client.config().model().as_str(), request);
    let response = client.post_json(&url, headers, &body).await?;
    extract_text(&response)
}

#[must_use]
pub fn build_request_body(model: &str, request: &CompletionRequest<'_>) -> Value {
    json!({
        "model": model,
        "max_tokens": MAX_TOKENS,
        "stream": false,
        "system": system_with_schema(request),
        "messages": [
            {
                "role": "user",
                "content": request.prompt
            }
        ]
    })
}

fn system_with_schema(request: &CompletionRequest<'_>) -> String {
    format!(
        "{}\n\nRespond with a single JSON object and nothing else. \
         It must validate against this JSON Schema:\n{}",
        request.system.trim_end(),
        request.schema.as_json()
    )
}

/// Concatenate the `text` content blocks of a Messages response.
pub fn extract_text(response: &Value) -> Result<String, ReasoningError> {
    let text: String = response["content"]
        .as_array()
        .into_iter()
        .flatten()
        .filter(|block| block["type"].as_str().unwrap_or("text") == "text")
        .filter_map(|block| block["text"].as_str())
        .collect();

    if text.trim().is_empty() {
        let stop = response["stop_reason"].as_str().unwrap_or("unknown");
        return Err(ReasoningError::Permanent(format!(
            "Claude returned no text (stop_reason: {stop})"
        )));
    }

    Ok(text)
}
