//! Core domain types for veracity.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! Everything here can be used from any layer of the application.
//!
//! # Lifecycle
//!
//! ```text
//! Backstory ──decompose──▶ Claim × N ──verify──▶ VerificationVerdict × N ──aggregate──▶ BackstoryVerdict
//! ```
//!
//! Every stage emits new values. Nothing is shared or mutated across stages.

mod model;
mod record;

pub use model::{ApiKey, ModelName, ModelParseError, Provider, ProviderParseError};
pub use record::{BackstoryRecord, ClaimRecord};

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reason recorded on a verdict when the rate-limit retry ceiling was exhausted.
pub const RETRIES_EXHAUSTED_REASON: &str = "max retries exceeded";

// ============================================================================
// NonEmpty String
// ============================================================================

/// A string guaranteed to be non-empty (after trimming).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NonEmptyString(String);

#[derive(Debug, Error)]
#[error("text must not be empty")]
pub struct EmptyStringError;

impl NonEmptyString {
    pub fn new(value: impl Into<String>) -> Result<Self, EmptyStringError> {
        let value = value.into();
        if value.trim().is_empty() {
            Err(EmptyStringError)
        } else {
            Ok(Self(value))
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl TryFrom<String> for NonEmptyString {
    type Error = EmptyStringError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for NonEmptyString {
    type Error = EmptyStringError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<NonEmptyString> for String {
    fn from(value: NonEmptyString) -> Self {
        value.0
    }
}

impl std::ops::Deref for NonEmptyString {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        self.as_str()
    }
}

impl AsRef<str> for NonEmptyString {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for NonEmptyString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Backstory & Claim
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BackstoryId(String);

impl BackstoryId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BackstoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Immutable input narrative; the source of truth for every derived claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Backstory {
    id: BackstoryId,
    raw_text: String,
}

impl Backstory {
    #[must_use]
    pub fn new(id: impl Into<String>, raw_text: impl Into<String>) -> Self {
        Self {
            id: BackstoryId::new(id),
            raw_text: raw_text.into(),
        }
    }

    #[must_use]
    pub fn id(&self) -> &BackstoryId {
        &self.id
    }

    #[must_use]
    pub fn raw_text(&self) -> &str {
        &self.raw_text
    }
}

/// An atomic, independently verifiable statement taken from one backstory.
///
/// `sequence_index` records decomposition order only; nothing downstream
/// depends on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    text: NonEmptyString,
    source_backstory_id: BackstoryId,
    sequence_index: usize,
}

impl Claim {
    #[must_use]
    pub fn new(text: NonEmptyString, source_backstory_id: BackstoryId, sequence_index: usize) -> Self {
        Self {
            text,
            source_backstory_id,
            sequence_index,
        }
    }

    /// A claim that was not produced by decomposition (ad-hoc verification).
    #[must_use]
    pub fn standalone(text: NonEmptyString) -> Self {
        Self::new(text, BackstoryId::new(""), 0)
    }

    #[must_use]
    pub fn text(&self) -> &str {
        self.text.as_str()
    }

    #[must_use]
    pub fn source_backstory_id(&self) -> &BackstoryId {
        &self.source_backstory_id
    }

    #[must_use]
    pub const fn sequence_index(&self) -> usize {
        self.sequence_index
    }
}

/// A retrieved corpus fragment. Read-only to the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextSnippet {
    pub text: String,
    /// 1-based position in the retrieval result (1 = most relevant).
    pub relevance_rank: usize,
    /// Where the fragment came from (file path or document id).
    pub provenance: String,
}

impl ContextSnippet {
    #[must_use]
    pub fn new(text: impl Into<String>, relevance_rank: usize, provenance: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            relevance_rank,
            provenance: provenance.into(),
        }
    }
}

// ============================================================================
// Verdicts
// ============================================================================

/// Consistency verdict for exactly one claim. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationVerdict {
    claim: Claim,
    is_consistent: bool,
    reason: String,
    retrieved_context: Vec<ContextSnippet>,
}

impl VerificationVerdict {
    #[must_use]
    pub fn new(
        claim: Claim,
        is_consistent: bool,
        reason: impl Into<String>,
        retrieved_context: Vec<ContextSnippet>,
    ) -> Self {
        Self {
            claim,
            is_consistent,
            reason: reason.into(),
            retrieved_context,
        }
    }

    /// Conservative verdict used whenever a judgment could not be obtained.
    #[must_use]
    pub fn fail_closed(
        claim: Claim,
        reason: impl Into<String>,
        retrieved_context: Vec<ContextSnippet>,
    ) -> Self {
        Self::new(claim, false, reason, retrieved_context)
    }

    #[must_use]
    pub fn claim(&self) -> &Claim {
        &self.claim
    }

    #[must_use]
    pub const fn is_consistent(&self) -> bool {
        self.is_consistent
    }

    #[must_use]
    pub fn reason(&self) -> &str {
        &self.reason
    }

    #[must_use]
    pub fn retrieved_context(&self) -> &[ContextSnippet] {
        &self.retrieved_context
    }

    /// True when this verdict came from the exhausted-retries fallback.
    #[must_use]
    pub fn is_retries_exhausted(&self) -> bool {
        self.reason == RETRIES_EXHAUSTED_REASON
    }
}

/// Backstory-level judgment derived from its per-claim verdicts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackstoryVerdict {
    backstory_id: BackstoryId,
    is_consistent: bool,
    per_claim: Vec<VerificationVerdict>,
}

impl BackstoryVerdict {
    #[must_use]
    pub fn new(
        backstory_id: BackstoryId,
        is_consistent: bool,
        per_claim: Vec<VerificationVerdict>,
    ) -> Self {
        Self {
            backstory_id,
            is_consistent,
            per_claim,
        }
    }

    #[must_use]
    pub fn backstory_id(&self) -> &BackstoryId {
        &self.backstory_id
    }

    #[must_use]
    pub const fn is_consistent(&self) -> bool {
        self.is_consistent
    }

    #[must_use]
    pub fn per_claim(&self) -> &[VerificationVerdict] {
        &self.per_claim
    }

    #[must_use]
    pub fn inconsistent_claims(&self) -> impl Iterator<Item = &VerificationVerdict> {
        self.per_claim.iter().filter(|v| !v.is_consistent())
    }
}
