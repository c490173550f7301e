//! Corpus retrieval.
//!
//! The core only consumes the [`RetrievalService`] query contract; index
//! construction and nearest-neighbor search live behind it.
//! [`HttpRetrievalService`] talks to a vector-store server that exposes
//! `POST /v1/retrieve` with a `{"query", "k"}` body.

use std::fmt::Write as _;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use veracity_providers::{
    EndpointError, base_client_builder, read_capped_error_body, validate_endpoint,
};
use veracity_types::ContextSnippet;

/// Number of snippets requested per claim unless configured otherwise.
pub const DEFAULT_K: usize = 3;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

const UNKNOWN_PROVENANCE: &str = "unknown";

#[derive(Debug, Error)]
pub enum RetrievalError {
    /// The service could not be queried or answered with something unusable.
    #[error("retrieval unavailable: {0}")]
    Unavailable(String),
}

pub type RetrievalFut<'a> =
    Pin<Box<dyn Future<Output = Result<Vec<ContextSnippet>, RetrievalError>> + Send + 'a>>;

/// Given a claim and a result count, return ordered context snippets.
///
/// Snippets come back most relevant first with `relevance_rank` starting at 1.
pub trait RetrievalService: Send + Sync {
    fn query<'a>(&'a self, claim_text: &'a str, k: usize) -> RetrievalFut<'a>;
}

impl<T: RetrievalService + ?Sized> RetrievalService for std::sync::Arc<T> {
    fn query<'a>(&'a self, claim_text: &'a str, k: usize) -> RetrievalFut<'a> {
        (**self).query(claim_text, k)
    }
}

/// Render snippets as the numbered context block used in verification prompts.
#[must_use]
pub fn format_context(snippets: &[ContextSnippet]) -> String {
    if snippets.is_empty() {
        return "(no context retrieved)".to_string();
    }
    let mut out = String::new();
    for snippet in snippets {
        let _ = writeln!(
            out,
            "[{}] (source: {})\n{}\n",
            snippet.relevance_rank,
            snippet.provenance,
            snippet.text.trim()
        );
    }
    out.trim_end().to_string()
}

// ============================================================================
// HTTP adapter
// ============================================================================

#[derive(Serialize)]
struct RetrieveRequest<'a> {
    query: &'a str,
    k: usize,
}

#[derive(Debug, Deserialize)]
struct RetrievedDocument {
    text: String,
    #[serde(default)]
    dist: Option<f64>,
    #[serde(default)]
    metadata: Option<DocumentMetadata>,
}

#[derive(Debug, Default, Deserialize)]
struct DocumentMetadata {
    #[serde(default)]
    path: Option<String>,
}

#[derive(Debug, Clone)]
pub struct HttpRetrievalService {
    endpoint: String,
    http: reqwest::Client,
}

#[derive(Debug, Error)]
pub enum RetrievalBuildError {
    #[error(transparent)]
    Endpoint(#[from] EndpointError),
    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

impl HttpRetrievalService {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, RetrievalBuildError> {
        let url = validate_endpoint(endpoint)?;
        let http = base_client_builder(url.scheme() == "https")
            .timeout(timeout)
            .build()?;
        Ok(Self {
            endpoint: format!("{}/v1/retrieve", url.as_str().trim_end_matches('/')),
            http,
        })
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn retrieve(
        &self,
        claim_text: &str,
        k: usize,
    ) -> Result<Vec<ContextSnippet>, RetrievalError> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let response = self
            .http
            .post(&self.endpoint)
            .json(&RetrieveRequest { query: claim_text, k })
            .send()
            .await
            .map_err(|e| RetrievalError::Unavailable(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = read_capped_error_body(response).await;
            return Err(RetrievalError::Unavailable(format!(
                "server error {status}: {}",
                body.trim()
            )));
        }

        let documents: Vec<RetrievedDocument> = response
            .json()
            .await
            .map_err(|e| RetrievalError::Unavailable(format!("undecodable response: {e}")))?;

        tracing::debug!(
            requested = k,
            returned = documents.len(),
            best_dist = documents.first().and_then(|d| d.dist),
            "Retrieved context"
        );

        Ok(into_snippets(documents, k))
    }
}

impl RetrievalService for HttpRetrievalService {
    fn query<'a>(&'a self, claim_text: &'a str, k: usize) -> RetrievalFut<'a> {
        Box::pin(self.retrieve(claim_text, k))
    }
}

fn into_snippets(documents: Vec<RetrievedDocument>, k: usize) -> Vec<ContextSnippet> {
    documents
        .into_iter()
        .take(k)
        .enumerate()
        .map(|(index, document)| {
            let provenance = document
                .metadata
                .and_then(|m| m.path)
                .filter(|p| !p.trim().is_empty())
                .unwrap_or_else(|| UNKNOWN_PROVENANCE.to_string());
            ContextSnippet::new(document.text, index + 1, provenance)
        })
        .collect()
}
