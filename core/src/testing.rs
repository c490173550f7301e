//! In-memory reasoning and retrieval doubles.
//!
//! Available to this crate's tests and, via the `testing` feature, to
//! downstream integration tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use serde_json::json;
use veracity_providers::{CompletionRequest, ReasoningClient, ReasoningError, ReasoningFut};
use veracity_retrieval::{RetrievalError, RetrievalFut, RetrievalService};
use veracity_types::ContextSnippet;

use crate::prompts;

type ReasoningHandler =
    Box<dyn Fn(&CompletionRequest<'_>) -> Result<String, ReasoningError> + Send + Sync>;

/// Which core call a request belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Extract,
    Correct,
    Verify,
}

impl Stage {
    /// Classify a request by its system prompt.
    ///
    /// # Panics
    ///
    /// Panics on a request the core never makes.
    #[must_use]
    pub fn of(request: &CompletionRequest<'_>) -> Self {
        if request.system == prompts::EXTRACT_SYSTEM {
            Self::Extract
        } else if request.system == prompts::CORRECT_SYSTEM {
            Self::Correct
        } else if request.system == prompts::VERIFY_SYSTEM {
            Self::Verify
        } else {
            panic!("unrecognized system prompt: {}", request.system)
        }
    }
}

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub stage: Stage,
    pub schema: &'static str,
    pub prompt: String,
    /// Paused-clock friendly timestamp of the call.
    pub at: tokio::time::Instant,
}

/// A [`ReasoningClient`] driven by a closure and recording every call.
pub struct ScriptedReasoning {
    handler: ReasoningHandler,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedReasoning {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&CompletionRequest<'_>) -> Result<String, ReasoningError> + Send + Sync + 'static,
    {
        Self {
            handler: Box::new(handler),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Replies in order; once the script runs out every call fails permanently.
    #[must_use]
    pub fn sequence(replies: Vec<Result<String, ReasoningError>>) -> Self {
        let replies = Mutex::new(VecDeque::from(replies));
        Self::new(move |_| {
            replies
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .pop_front()
                .unwrap_or_else(|| Err(ReasoningError::Permanent("script exhausted".into())))
        })
    }

    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }
}

impl ReasoningClient for ScriptedReasoning {
    fn complete<'a>(&'a self, request: &'a CompletionRequest<'a>) -> ReasoningFut<'a> {
        self.calls
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(RecordedCall {
                stage: Stage::of(request),
                schema: request.schema.name(),
                prompt: request.prompt.to_string(),
                at: tokio::time::Instant::now(),
            });
        let reply = (self.handler)(request);
        Box::pin(async move { reply })
    }
}

type RetrievalHandler =
    Box<dyn Fn(&str, usize) -> Result<Vec<ContextSnippet>, RetrievalError> + Send + Sync>;

/// A [`RetrievalService`] backed by a closure.
pub struct StaticRetrieval {
    handler: RetrievalHandler,
}

impl StaticRetrieval {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&str, usize) -> Result<Vec<ContextSnippet>, RetrievalError> + Send + Sync + 'static,
    {
        Self {
            handler: Box::new(handler),
        }
    }

    /// Same snippets for every query, truncated to `k`.
    #[must_use]
    pub fn fixed(snippets: Vec<ContextSnippet>) -> Self {
        Self::new(move |_, k| Ok(snippets.iter().take(k).cloned().collect()))
    }

    /// Every query fails with [`RetrievalError::Unavailable`].
    #[must_use]
    pub fn unavailable(message: &str) -> Self {
        let message = message.to_string();
        Self::new(move |_, _| Err(RetrievalError::Unavailable(message.clone())))
    }
}

impl RetrievalService for StaticRetrieval {
    fn query<'a>(&'a self, claim_text: &'a str, k: usize) -> RetrievalFut<'a> {
        let reply = (self.handler)(claim_text, k);
        Box::pin(async move { reply })
    }
}

/// `{"facts": [{"fact": ...}, ...]}`
#[must_use]
pub fn facts_json(facts: &[&str]) -> String {
    let facts: Vec<_> = facts.iter().map(|fact| json!({ "fact": fact })).collect();
    json!({ "facts": facts }).to_string()
}

/// `{"is_consistent": ..., "reason": ...}`
#[must_use]
pub fn verdict_json(is_consistent: bool, reason: &str) -> String {
    json!({ "is_consistent": is_consistent, "reason": reason }).to_string()
}

#[must_use]
pub fn rate_limited() -> ReasoningError {
    ReasoningError::RateLimited {
        status: 429,
        message: "API error 429 Too Many Requests: quota exceeded".to_string(),
    }
}
