//! Google Gemini `generateContent` with a constrained JSON response.
//!
//! The schema goes into `generationConfig.responseSchema`. Gemini accepts an
//! OpenAPI subset there, so `additionalProperties` is stripped first.

use reqwest::header::HeaderMap;
use serde_json::{Value, json};

use crate::{CompletionRequest, HttpReasoningClient, ReasoningError, secret_header};

pub const API_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

const TEMPERATURE: f64 = 0.1;

pub(crate) async fn complete(
    client: &HttpReasoningClient,
    request: &CompletionRequest<'_>,
) -> Result<String, ReasoningError> {
    let model = client.config().model();
    let url = format!("{}/models/{}:generateContent", client.base_url(), model);

    let mut headers = HeaderMap::new();
    headers.insert("x-goog-api-key", secret_header(client.config().api_key())?);

    let body = build_request_body(request);
    let response = client.post_json(&url, headers, &body).await?;
    extract_text(&response)
}

#[must_use]
pub fn build_request_body(request: &CompletionRequest<'_>) -> Value {
    json!({
        "system_instruction": {
            "parts": [{ "text": request.system }]
        },
        "contents": [
            {
                "role": "user",
                "parts": [{ "text": request.prompt }]
            }
        ],
        "generationConfig": {
            "temperature": TEMPERATURE,
            "responseMimeType": "application/json",
            "responseSchema": request.schema.without_additional_properties()
        }
    })
}

/// Pull the concatenated text parts of the first candidate.
pub fn extract_text(response: &Value) -> Result<String, ReasoningError> {
    if let Some(reason) = response["promptFeedback"]["blockReason"].as_str() {
        return Err(ReasoningError::Permanent(format!(
            "Gemini blocked the prompt: {reason}"
        )));
    }

    let candidate = response["candidates"]
        .as_array()
        .and_then(|candidates| candidates.first())
        .ok_or_else(|| ReasoningError::Permanent("Gemini response has no candidates".into()))?;

    let text: String = candidate["content"]["parts"]
        .as_array()
        .into_iter()
        .flatten()
        .filter(|part| !part["thought"].as_bool().unwrap_or(false))
        .filter_map(|part| part["text"].as_str())
        .collect();

    if text.trim().is_empty() {
        let finish = candidate["finishReason"].as_str().unwrap_or("unknown");
        return Err(ReasoningError::Permanent(format!(
            "Gemini returned no text (finishReason: {finish})"
        )));
    }

    Ok(text)
}
