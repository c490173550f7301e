//! Reasoning service clients with structured JSON responses.
//!
//! # Architecture
//!
//! - [`ReasoningClient`] - object-safe seam the core depends on
//! - [`HttpReasoningClient`] - HTTP implementation dispatching on [`Provider`]
//! - [`gemini`], [`claude`], [`openai`] - provider request bodies and response envelopes
//! - [`retry`] - transport-level retry for flaky networks (never for 429)
//!
//! # Configuration
//!
//! Use [`ApiConfig`] to bundle the API key and model. The constructor rejects
//! a key and model that belong to different providers, so a mismatch cannot
//! reach the wire. Model and credentials are fixed at construction; a
//! [`CompletionRequest`] only carries the prompt and the expected schema.
//!
//! # Errors
//!
//! Every failure is a [`ReasoningError`]. Callers that need to distinguish
//! backpressure from everything else use [`ReasoningError::is_rate_limited`].

pub mod claude;
mod error;
pub mod gemini;
pub mod openai;
pub mod retry;
mod schema;

pub use error::{ReasoningError, is_rate_limit_message};
pub use schema::{ResponseSchema, SchemaError, strip_code_fence};
pub use veracity_types;

use std::future::Future;
use std::net::IpAddr;
use std::pin::Pin;
use std::time::Duration;

use reqwest::header::HeaderMap;
use serde_json::Value;
use thiserror::Error;
use url::Url;
use veracity_types::{ApiKey, ModelName, Provider};

use crate::retry::{RetryConfig, RetryOutcome};

const CONNECT_TIMEOUT_SECS: u64 = 30;
const TCP_KEEPALIVE_SECS: u64 = 60;
const POOL_MAX_IDLE_PER_HOST: usize = 16;
const POOL_IDLE_TIMEOUT_SECS: u64 = 90;

const MAX_ERROR_BODY_BYTES: usize = 32 * 1024;

/// Default request timeout for a single reasoning call.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

pub type ReasoningFut<'a> =
    Pin<Box<dyn Future<Output = Result<String, ReasoningError>> + Send + 'a>>;

/// One structured completion.
///
/// `schema` is both sent to the provider and the contract the caller will
/// parse the returned text against.
#[derive(Debug, Clone, Copy)]
pub struct CompletionRequest<'a> {
    pub system: &'a str,
    pub prompt: &'a str,
    pub schema: &'a ResponseSchema,
}

/// Abstraction over a text-reasoning service.
///
/// Returns the raw structured text; parsing is left to the caller so that a
/// schema mismatch can be handled per call site.
pub trait ReasoningClient: Send + Sync {
    fn complete<'a>(&'a self, request: &'a CompletionRequest<'a>) -> ReasoningFut<'a>;
}

impl<T: ReasoningClient + ?Sized> ReasoningClient for std::sync::Arc<T> {
    fn complete<'a>(&'a self, request: &'a CompletionRequest<'a>) -> ReasoningFut<'a> {
        (**self).complete(request)
    }
}

// ============================================================================
// Endpoints & HTTP client
// ============================================================================

#[derive(Debug, Error)]
pub enum EndpointError {
    #[error("invalid endpoint URL '{url}': {source}")]
    Invalid {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("endpoint '{url}' must use https (plain http is only allowed for loopback hosts)")]
    Insecure { url: String },
    #[error("endpoint '{url}' has unsupported scheme '{scheme}'")]
    UnsupportedScheme { url: String, scheme: String },
}

/// Parse and vet a service endpoint.
///
/// `https` is always accepted. `http` is accepted only for loopback hosts
/// (`localhost`, `127.0.0.0/8`, `::1`), which covers local vector stores and
/// test servers.
pub fn validate_endpoint(raw: &str) -> Result<Url, EndpointError> {
    let url = Url::parse(raw.trim()).map_err(|source| EndpointError::Invalid {
        url: raw.to_string(),
        source,
    })?;

    match url.scheme() {
        "https" => Ok(url),
        "http" if is_loopback(&url) => Ok(url),
        "http" => Err(EndpointError::Insecure {
            url: raw.to_string(),
        }),
        other => Err(EndpointError::UnsupportedScheme {
            url: raw.to_string(),
            scheme: other.to_string(),
        }),
    }
}

fn is_loopback(url: &Url) -> bool {
    match url.host() {
        Some(url::Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
        Some(url::Host::Ipv4(ip)) => IpAddr::V4(ip).is_loopback(),
        Some(url::Host::Ipv6(ip)) => IpAddr::V6(ip).is_loopback(),
        None => false,
    }
}

/// Shared client settings: no redirects, keepalive, bounded connect time.
///
/// `https_only` should be true unless the target was vetted as loopback by
/// [`validate_endpoint`].
#[must_use]
pub fn base_client_builder(https_only: bool) -> reqwest::ClientBuilder {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .redirect(reqwest::redirect::Policy::none())
        .https_only(https_only)
        .tcp_keepalive(Some(Duration::from_secs(TCP_KEEPALIVE_SECS)))
        .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
        .pool_idle_timeout(Some(Duration::from_secs(POOL_IDLE_TIMEOUT_SECS)))
}

/// Read an error body, truncated to 32 KiB.
pub async fn read_capped_error_body(response: reqwest::Response) -> String {
    use futures_util::StreamExt;
    let mut body = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let Ok(chunk) = chunk else { break };
        body.extend_from_slice(&chunk);
        if body.len() > MAX_ERROR_BODY_BYTES {
            body.truncate(MAX_ERROR_BODY_BYTES);
            let text = String::from_utf8_lossy(&body);
            return format!("{text}...(truncated)");
        }
    }
    String::from_utf8_lossy(&body).into_owned()
}

// ============================================================================
// ApiConfig
// ============================================================================

/// API key + model, guaranteed to target the same provider.
///
/// ```rust
/// use veracity_providers::ApiConfig;
/// use veracity_types::{ApiKey, Provider};
///
/// let config = ApiConfig::new(
///     ApiKey::new(Provider::Gemini, "test"),
///     Provider::Gemini.default_model(),
/// )
/// .unwrap();
/// assert_eq!(config.provider(), Provider::Gemini);
/// ```
#[derive(Debug, Clone)]
pub struct ApiConfig {
    api_key: ApiKey,
    model: ModelName,
}

#[derive(Debug, Error)]
pub enum ApiConfigError {
    #[error("API key provider {key:?} does not match model provider {model:?}")]
    ProviderMismatch { key: Provider, model: Provider },
}

impl ApiConfig {
    pub fn new(api_key: ApiKey, model: ModelName) -> Result<Self, ApiConfigError> {
        let key_provider = api_key.provider();
        let model_provider = model.provider();
        if key_provider != model_provider {
            return Err(ApiConfigError::ProviderMismatch {
                key: key_provider,
                model: model_provider,
            });
        }

        Ok(Self { api_key, model })
    }

    #[must_use]
    pub fn provider(&self) -> Provider {
        self.api_key.provider()
    }

    #[must_use]
    pub fn api_key(&self) -> &str {
        self.api_key.expose_secret()
    }

    #[must_use]
    pub fn model(&self) -> &ModelName {
        &self.model
    }
}

// ============================================================================
// HttpReasoningClient
// ============================================================================

#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Override the provider's canonical base URL.
    pub base_url: Option<String>,
    pub timeout: Duration,
    pub retry: RetryConfig,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            retry: RetryConfig::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ClientBuildError {
    #[error(transparent)]
    Endpoint(#[from] EndpointError),
    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

/// [`ReasoningClient`] over the providers' HTTP APIs.
#[derive(Debug, Clone)]
pub struct HttpReasoningClient {
    config: ApiConfig,
    base_url: String,
    http: reqwest::Client,
    retry: RetryConfig,
}

impl HttpReasoningClient {
    pub fn new(config: ApiConfig, options: ClientOptions) -> Result<Self, ClientBuildError> {
        let raw_base = options
            .base_url
            .as_deref()
            .unwrap_or_else(|| default_base_url(config.provider()));
        let url = validate_endpoint(raw_base)?;

        let http = base_client_builder(url.scheme() == "https")
            .timeout(options.timeout)
            .build()?;

        Ok(Self {
            config,
            base_url: url.as_str().trim_end_matches('/').to_string(),
            http,
            retry: options.retry,
        })
    }

    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// POST a JSON body with transport retry and decode the JSON reply.
    pub(crate) async fn post_json(
        &self,
        url: &str,
        headers: HeaderMap,
        body: &Value,
    ) -> Result<Value, ReasoningError> {
        let outcome = retry::send_with_retry(
            || self.http.post(url).headers(headers.clone()).json(body),
            &self.retry,
        )
        .await;

        let response = into_success(outcome).await?;
        response
            .json::<Value>()
            .await
            .map_err(|e| ReasoningError::Permanent(format!("unreadable response body: {e}")))
    }
}

impl ReasoningClient for HttpReasoningClient {
    fn complete<'a>(&'a self, request: &'a CompletionRequest<'a>) -> ReasoningFut<'a> {
        Box::pin(async move {
            let provider = self.config.provider();
            tracing::debug!(
                provider = provider.as_str(),
                model = %self.config.model(),
                schema = request.schema.name(),
                "Sending reasoning request"
            );
            match provider {
                Provider::Gemini => gemini::complete(self, request).await,
                Provider::Claude => claude::complete(self, request).await,
                Provider::OpenAI => openai::complete(self, request).await,
            }
        })
    }
}

#[must_use]
pub fn default_base_url(provider: Provider) -> &'static str {
    match provider {
        Provider::Gemini => gemini::API_BASE_URL,
        Provider::Claude => claude::API_BASE_URL,
        Provider::OpenAI => openai::API_BASE_URL,
    }
}

async fn into_success(outcome: RetryOutcome) -> Result<reqwest::Response, ReasoningError> {
    match outcome {
        RetryOutcome::Success(response) => Ok(response),
        RetryOutcome::HttpError(response) => {
            let status = response.status();
            let body = read_capped_error_body(response).await;
            Err(ReasoningError::from_status(status, &body))
        }
        RetryOutcome::ConnectionError { attempts, source } => Err(ReasoningError::Transient(
            format!("request failed after {attempts} attempts: {source}"),
        )),
        RetryOutcome::NonRetryable(e) => {
            Err(ReasoningError::Permanent(format!("request failed: {e}")))
        }
    }
}

fn secret_header(value: &str) -> Result<reqwest::header::HeaderValue, ReasoningError> {
    let mut value = reqwest::header::HeaderValue::from_str(value)
        .map_err(|_| ReasoningError::Permanent("API key is not a valid header value".into()))?;
    value.set_sensitive(true);
    Ok(value)
}
