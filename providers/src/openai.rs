//! OpenAI Responses API with strict `json_schema` output.

use reqwest::header::{AUTHORIZATION, HeaderMap};
use serde_json::{Value, json};

use crate::{CompletionRequest, HttpReasoningClient, ReasoningError, secret_header};

pub const API_BASE_URL: &str = "https://api.openai.com/v1";

pub(crate) async fn complete(
    client: &HttpReasoningClient,
    request: &CompletionRequest<'_>,
) -> Result<String, ReasoningError> {
    let url = format!("{}/responses", client.base_url());

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        secret_header(&format!("Bearer {}", client.config().api_key()))?,
    );

    let body = build_request_body(client.config().model().as_str(), request);
    let response = client.post_json(&url, headers, &body).await?;
    extract_text(&response)
}

#[must_use]
pub fn build_request_body(model: &str, request: &CompletionRequest<'_>) -> Value {
    json!({
        "model": model,
        "stream": false,
        "instructions": request.system,
        "input": [
            {
                "role": "user",
                "content": request.prompt
            }
        ],
        "text": {
            "format": {
                "type": "json_schema",
                "name": request.schema.name(),
                "schema": request.schema.as_json(),
                "strict": true
            }
        }
    })
}

/// Text of the first `message` output item.
///
/// Reasoning models emit `reasoning` items ahead of the message; those are
/// skipped. A `refusal` content block is reported as a permanent failure.
pub fn extract_text(response: &Value) -> Result<String, ReasoningError> {
    if let Some(message) = response["error"]["message"].as_str() {
        return Err(ReasoningError::Permanent(format!("OpenAI error: {message}")));
    }

    let content = response["output"]
        .as_array()
        .into_iter()
        .flatten()
        .find(|item| item["type"].as_str() == Some("message"))
        .and_then(|item| item["content"].as_array())
        .ok_or_else(|| ReasoningError::Permanent("OpenAI response has no message output".into()))?;

    if let Some(refusal) = content
        .iter()
        .find(|block| block["type"].as_str() == Some("refusal"))
        .and_then(|block| block["refusal"].as_str())
    {
        return Err(ReasoningError::Permanent(format!(
            "OpenAI refused the request: {refusal}"
        )));
    }

    let text: String = content
        .iter()
        .filter(|block| block["type"].as_str() == Some("output_text"))
        .filter_map(|block| block["text"].as_str())
        .collect();

    if text.trim().is_empty() {
        return Err(ReasoningError::Permanent("OpenAI returned no text".into()));
    }
    Ok(text)
}
