//! `~/.veracity/config.toml` loading and resolution.
//!
//! Every section and key is optional. String values may reference
//! environment variables as `${VAR}`; missing variables expand to the empty
//! string, which is then treated as unset.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use veracity_core::{BackoffConfigError, BackoffPolicy, DEFAULT_CONCURRENCY, PipelineConfig};
use veracity_providers::ClientOptions;
use veracity_types::{ApiKey, ModelName, ModelParseError, Provider, ProviderParseError};

pub const DEFAULT_RETRIEVAL_ENDPOINT: &str = "http://127.0.0.1:8000";

#[derive(Debug, Default, Deserialize)]
pub struct VeracityConfig {
    pub reasoning: Option<ReasoningConfig>,
    pub api_keys: Option<ApiKeys>,
    pub retrieval: Option<RetrievalConfig>,
    pub verification: Option<VerificationConfig>,
    pub batch: Option<BatchConfig>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl ConfigError {
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => path,
        }
    }
}

/// Failure to turn configuration into runnable settings.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error(transparent)]
    Provider(#[from] ProviderParseError),
    #[error(transparent)]
    Model(#[from] ModelParseError),
    #[error("no API key for {provider}: set [api_keys].{section} or one of {env_vars:?}")]
    MissingApiKey {
        provider: Provider,
        section: &'static str,
        env_vars: &'static [&'static str],
    },
    #[error("invalid [verification] settings: {0}")]
    Backoff(#[from] BackoffConfigError),
}

#[derive(Debug, Default, Deserialize)]
pub struct ReasoningConfig {
    /// `gemini`, `claude` or `openai` (aliases accepted).
    pub provider: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Default, Deserialize)]
pub struct ApiKeys {
    pub google: Option<String>,
    pub anthropic: Option<String>,
    pub openai: Option<String>,
}

// Manual Debug impl to prevent leaking API keys in logs.
impl std::fmt::Debug for ApiKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fn mask(opt: Option<&String>) -> &'static str {
            if opt.is_some() { "[REDACTED]" } else { "None" }
        }
        f.debug_struct("ApiKeys")
            .field("google", &mask(self.google.as_ref()))
            .field("anthropic", &mask(self.anthropic.as_ref()))
            .field("openai", &mask(self.openai.as_ref()))
            .finish()
    }
}

impl ApiKeys {
    fn for_provider(&self, provider: Provider) -> Option<&String> {
        match provider {
            Provider::Gemini => self.google.as_ref(),
            Provider::Claude => self.anthropic.as_ref(),
            Provider::OpenAI => self.openai.as_ref(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct RetrievalConfig {
    pub endpoint: Option<String>,
    pub k: Option<usize>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct VerificationConfig {
    pub initial_delay_secs: Option<u64>,
    pub jitter_secs: Option<u64>,
    pub max_delay_secs: Option<u64>,
    pub max_attempts: Option<u32>,
    /// Per-claim wall-clock bound. Unset means no deadline.
    pub claim_deadline_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct BatchConfig {
    pub concurrency: Option<usize>,
}

/// Replace `${VAR}` with the variable's value (empty if unset).
///
/// An unclosed `${` is kept literally.
#[must_use]
pub fn expand_env_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            break;
        };
        out.push_str(&rest[..start]);
        let var = &after[..end];
        if !var.is_empty() {
            out.push_str(&std::env::var(var).unwrap_or_default());
        }
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    out
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value
        .map(|raw| expand_env_vars(raw).trim().to_string())
        .filter(|v| !v.is_empty())
}

impl VeracityConfig {
    /// Load from the default path. `Ok(None)` when there is no config file.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        let Some(path) = config_path() else {
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }
        Self::load_from(&path).map(Some)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read config at {:?}: {}", path, err);
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: err,
                });
            }
        };

        match toml::from_str(&content) {
            Ok(config) => Ok(config),
            Err(err) => {
                tracing::warn!("Failed to parse config at {:?}: {}", path, err);
                Err(ConfigError::Parse {
                    path: path.to_path_buf(),
                    source: err,
                })
            }
        }
    }

    pub fn provider(&self) -> Result<Provider, ResolveError> {
        match self.reasoning.as_ref().and_then(|r| r.provider.as_deref()) {
            Some(raw) => Ok(Provider::parse(raw)?),
            None => Ok(Provider::default()),
        }
    }

    /// Configured model, or the provider's default.
    pub fn model(&self, provider: Provider) -> Result<ModelName, ResolveError> {
        match self.reasoning.as_ref().and_then(|r| r.model.as_deref()) {
            Some(raw) => Ok(ModelName::parse(provider, raw)?),
            None => Ok(provider.default_model()),
        }
    }

    /// `[api_keys]` entry first, then the provider's environment variables.
    pub fn api_key(&self, provider: Provider) -> Result<ApiKey, ResolveError> {
        self.api_key_with(provider, |var| std::env::var(var).ok())
    }

    /// [`Self::api_key`] with an explicit environment lookup.
    pub fn api_key_with(
        &self,
        provider: Provider,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<ApiKey, ResolveError> {
        let configured = self
            .api_keys
            .as_ref()
            .and_then(|keys| non_empty(keys.for_provider(provider)));

        let key = configured.or_else(|| {
            provider
                .env_vars()
                .iter()
                .filter_map(|var| env(var))
                .map(|v| v.trim().to_string())
                .find(|v| !v.is_empty())
        });

        key.map(|k| ApiKey::new(provider, k))
            .ok_or(ResolveError::MissingApiKey {
                provider,
                section: api_key_section(provider),
                env_vars: provider.env_vars(),
            })
    }

    #[must_use]
    pub fn client_options(&self) -> ClientOptions {
        let defaults = ClientOptions::default();
        let reasoning = self.reasoning.as_ref();
        ClientOptions {
            base_url: reasoning.and_then(|r| non_empty(r.base_url.as_ref())),
            timeout: reasoning
                .and_then(|r| r.timeout_secs)
                .map_or(defaults.timeout, Duration::from_secs),
            ..defaults
        }
    }

    #[must_use]
    pub fn retrieval_endpoint(&self) -> String {
        self.retrieval
            .as_ref()
            .and_then(|r| non_empty(r.endpoint.as_ref()))
            .unwrap_or_else(|| DEFAULT_RETRIEVAL_ENDPOINT.to_string())
    }

    #[must_use]
    pub fn retrieval_timeout(&self) -> Duration {
        Duration::from_secs(
            self.retrieval
                .as_ref()
                .and_then(|r| r.timeout_secs)
                .unwrap_or(veracity_retrieval::DEFAULT_TIMEOUT_SECS),
        )
    }

    pub fn backoff_policy(&self) -> Result<BackoffPolicy, ResolveError> {
        let defaults = BackoffPolicy::default();
        let Some(v) = self.verification.as_ref() else {
            return Ok(defaults);
        };
        let secs_or = |value: Option<u64>, default: Duration| value.map_or(default, Duration::from_secs);
        Ok(BackoffPolicy::new(
            secs_or(v.initial_delay_secs, defaults.initial_delay()),
            secs_or(v.jitter_secs, defaults.jitter()),
            secs_or(v.max_delay_secs, defaults.max_delay()),
            v.max_attempts.unwrap_or(defaults.max_attempts()),
        )?)
    }

    #[must_use]
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            k: self
                .retrieval
                .as_ref()
                .and_then(|r| r.k)
                .unwrap_or(veracity_retrieval::DEFAULT_K),
            concurrency: self
                .batch
                .as_ref()
                .and_then(|b| b.concurrency)
                .unwrap_or(DEFAULT_CONCURRENCY),
            claim_deadline: self
                .verification
                .as_ref()
                .and_then(|v| v.claim_deadline_secs)
                .map(Duration::from_secs),
        }
    }
}

fn api_key_section(provider: Provider) -> &'static str {
    match provider {
        Provider::Gemini => "google",
        Provider::Claude => "anthropic",
        Provider::OpenAI => "openai",
    }
}

#[must_use]
pub fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".veracity").join("config.toml"))
}
