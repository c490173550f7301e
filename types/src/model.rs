//! Reasoning provider, model and credential value types.

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    Gemini,
    Claude,
    OpenAI,
}

const PROVIDER_PARSE_VALUES: &[&str] = &[
    "gemini",
    "google",
    "claude",
    "anthropic",
    "openai",
    "gpt",
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid provider value '{raw}'; expected one of: {expected:?}")]
pub struct ProviderParseError {
    raw: String,
    expected: &'static [&'static str],
}

impl ProviderParseError {
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }
}

impl Provider {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Gemini => "gemini",
            Provider::Claude => "claude",
            Provider::OpenAI => "openai",
        }
    }

    #[must_use]
    pub fn display_name(&self) -> &'static str {
        match self {
            Provider::Gemini => "Gemini",
            Provider::Claude => "Claude",
            Provider::OpenAI => "GPT",
        }
    }

    /// Environment variables consulted for this provider's API key, in order.
    #[must_use]
    pub fn env_vars(&self) -> &'static [&'static str] {
        match self {
            Provider::Gemini => &["GEMINI_API_KEY", "GOOGLE_API_KEY"],
            Provider::Claude => &["ANTHROPIC_API_KEY"],
            Provider::OpenAI => &["OPENAI_API_KEY"],
        }
    }

    /// Cheap, fast model used when no model is configured.
    #[must_use]
    pub fn default_model(&self) -> ModelName {
        let id = match self {
            Provider::Gemini => "gemini-flash-latest",
            Provider::Claude => "claude-haiku-4-5",
            Provider::OpenAI => "gpt-5-nano",
        };
        ModelName {
            provider: *self,
            name: Cow::Borrowed(id),
        }
    }

    pub fn parse(s: &str) -> Result<Self, ProviderParseError> {
        let trimmed = s.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "gemini" | "google" => Ok(Provider::Gemini),
            "claude" | "anthropic" => Ok(Provider::Claude),
            "openai" | "gpt" | "chatgpt" => Ok(Provider::OpenAI),
            _ => Err(ProviderParseError {
                raw: trimmed.to_string(),
                expected: PROVIDER_PARSE_VALUES,
            }),
        }
    }

    #[must_use]
    pub fn all() -> &'static [Provider] {
        &[Provider::Gemini, Provider::Claude, Provider::OpenAI]
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelParseError {
    #[error("model name cannot be empty")]
    EmptyInput,
    #[error("Gemini model must start with gemini- (got {0})")]
    GeminiPrefix(String),
    #[error("Claude model must start with claude- (got {0})")]
    ClaudePrefix(String),
    #[error("OpenAI model must start with gpt- (got {0})")]
    OpenAIPrefix(String),
}

/// A model identifier bound to the provider that serves it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ModelName {
    provider: Provider,
    #[serde(rename = "model")]
    name: Cow<'static, str>,
}

impl ModelName {
    pub fn parse(provider: Provider, raw: &str) -> Result<Self, ModelParseError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ModelParseError::EmptyInput);
        }

        let lower = trimmed.to_ascii_lowercase();
        match provider {
            Provider::Gemini if !lower.starts_with("gemini-") => {
                return Err(ModelParseError::GeminiPrefix(trimmed.to_string()));
            }
            Provider::Claude if !lower.starts_with("claude-") => {
                return Err(ModelParseError::ClaudePrefix(trimmed.to_string()));
            }
            Provider::OpenAI if !lower.starts_with("gpt-") => {
                return Err(ModelParseError::OpenAIPrefix(trimmed.to_string()));
            }
            _ => {}
        }

        Ok(Self {
            provider,
            name: Cow::Owned(trimmed.to_string()),
        })
    }

    #[must_use]
    pub const fn provider(&self) -> Provider {
        self.provider
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        self.name.as_ref()
    }
}

impl fmt::Display for ModelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.name.fmt(f)
    }
}

/// Provider-tagged API credential. The secret never appears in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub enum ApiKey {
    Gemini(String),
    Claude(String),
    OpenAI(String),
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiKey::Gemini(_) => write!(f, "ApiKey::Gemini(<redacted>)"),
            ApiKey::Claude(_) => write!(f, "ApiKey::Claude(<redacted>)"),
            ApiKey::OpenAI(_) => write!(f, "ApiKey::OpenAI(<redacted>)"),
        }
    }
}

impl ApiKey {
    #[must_use]
    pub fn new(provider: Provider, key: impl Into<String>) -> Self {
        let key = key.into();
        match provider {
            Provider::Gemini => ApiKey::Gemini(key),
            Provider::Claude => ApiKey::Claude(key),
            Provider::OpenAI => ApiKey::OpenAI(key),
        }
    }

    #[must_use]
    pub fn provider(&self) -> Provider {
        match self {
            ApiKey::Gemini(_) => Provider::Gemini,
            ApiKey::Claude(_) => Provider::Claude,
            ApiKey::OpenAI(_) => Provider::OpenAI,
        }
    }

    #[must_use]
    pub fn expose_secret(&self) -> &str {
        match self {
            ApiKey::Gemini(key) | ApiKey::Claude(key) | ApiKey::OpenAI(key) => key,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_parse_aliases() {
        assert_eq!(Provider::parse("gemini").unwrap(), Provider::Gemini);
        assert_eq!(Provider::parse("Google").unwrap(), Provider::Gemini);
        assert_eq!(Provider::parse("anthropic").unwrap(), Provider::Claude);
        assert_eq!(Provider::parse(" OPENAI ").unwrap(), Provider::OpenAI);
        assert!(Provider::parse("").is_err());
        assert_eq!(Provider::parse("grok").unwrap_err().raw(), "grok");
    }

    #[test]
    fn default_models_match_provider() {
        for provider in Provider::all() {
            let model = provider.default_model();
            assert_eq!(model.provider(), *provider);
            assert!(ModelName::parse(*provider, model.as_str()).is_ok());
        }
    }

    #[test]
    fn model_name_requires_provider_prefix() {
        assert!(matches!(
            ModelName::parse(Provider::Gemini, "claude-haiku-4-5"),
            Err(ModelParseError::GeminiPrefix(_))
        ));
        assert!(matches!(
            ModelName::parse(Provider::Claude, "  "),
            Err(ModelParseError::EmptyInput)
        ));
        let model = ModelName::parse(Provider::OpenAI, " gpt-5-mini ").unwrap();
        assert_eq!(model.as_str(), "gpt-5-mini");
    }

    #[test]
    fn api_key_debug_is_redacted() {
        let key = ApiKey::new(Provider::Gemini, "AIza-secret");
        assert_eq!(key.provider(), Provider::Gemini);
        assert_eq!(key.expose_secret(), "AIza-secret");
        assert!(!format!("{key:?}").contains("secret"));
    }
}
