//! Reasoning service failure taxonomy.
//!
//! Callers make exactly one decision from an error: is this backpressure
//! (wait and try again) or not. [`ReasoningError::is_rate_limited`] is the
//! single place that answers it.

use reqwest::StatusCode;
use thiserror::Error;

use crate::schema::SchemaError;

const RATE_LIMIT_SIGNATURES: &[&str] = &[
    "too many requests",
    "quota",
    "rate limit",
    "rate_limit",
    "resource exhausted",
    "resource_exhausted",
];

/// Status code accepted as a standalone token only, so ids like `req_84291`
/// or a year like 1429 do not count.
const RATE_LIMIT_STATUS: &str = "429";

#[derive(Debug, Error)]
pub enum ReasoningError {
    /// Explicit backpressure from the service.
    #[error("rate limited ({status}): {message}")]
    RateLimited { status: u16, message: String },
    /// Network-level or 5xx failure that survived transport retries.
    #[error("transient failure: {0}")]
    Transient(String),
    /// Rejected request (auth, bad request) or unusable response envelope.
    #[error("request failed: {0}")]
    Permanent(String),
    /// The service answered, but not in the requested structure.
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

impl ReasoningError {
    /// Classify an HTTP error response.
    #[must_use]
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let message = format!("API error {status}: {}", body.trim());
        match status.as_u16() {
            429 => Self::RateLimited {
                status: 429,
                message,
            },
            408 | 500..=599 => Self::Transient(message),
            _ => Self::Permanent(message),
        }
    }

    /// Whether the failure is a backpressure signal worth waiting out.
    ///
    /// Besides the explicit variant, every message is scanned for rate-limit
    /// signatures: gateways and SDK shims frequently wrap a quota error in a
    /// generic status or inside an otherwise malformed body.
    #[must_use]
    pub fn is_rate_limited(&self) -> bool {
        match self {
            Self::RateLimited { .. } => true,
            other => is_rate_limit_message(&other.to_string()),
        }
    }
}

#[must_use]
pub fn is_rate_limit_message(raw: &str) -> bool {
    let lower = raw.to_ascii_lowercase();
    RATE_LIMIT_SIGNATURES
        .iter()
        .any(|signature| lower.contains(signature))
        || lower
            .split(|c: char| !c.is_ascii_alphanumeric())
            .any(|token| token == RATE_LIMIT_STATUS)
}
