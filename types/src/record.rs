//! Flat output records for the batch boundary.
//!
//! How these are written (JSONL, tables) is an adapter concern; this module
//! only fixes their shape.

use serde::{Deserialize, Serialize};

use crate::{BackstoryVerdict, VerificationVerdict};

/// One row per verified claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimRecord {
    pub backstory_id: String,
    pub claim: String,
    /// JSON-serialized `Vec<ContextSnippet>`.
    pub context: String,
    pub is_consistent: bool,
    pub reason: String,
}

impl ClaimRecord {
    #[must_use]
    pub fn from_verdict(verdict: &VerificationVerdict) -> Self {
        let context = serde_json::to_string(verdict.retrieved_context())
            .unwrap_or_else(|_| "[]".to_string());
        Self {
            backstory_id: verdict.claim().source_backstory_id().to_string(),
            claim: verdict.claim().text().to_string(),
            context,
            is_consistent: verdict.is_consistent(),
            reason: verdict.reason().to_string(),
        }
    }

    /// Expand a backstory verdict into its per-claim rows, in claim order.
    #[must_use]
    pub fn from_backstory_verdict(verdict: &BackstoryVerdict) -> Vec<Self> {
        verdict.per_claim().iter().map(Self::from_verdict).collect()
    }
}

/// One row per backstory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackstoryRecord {
    pub backstory_id: String,
    pub is_consistent: bool,
    pub claims: usize,
    pub inconsistent_claims: usize,
}

impl BackstoryRecord {
    #[must_use]
    pub fn from_verdict(verdict: &BackstoryVerdict) -> Self {
        Self {
            backstory_id: verdict.backstory_id().to_string(),
            is_consistent: verdict.is_consistent(),
            claims: verdict.per_claim().len(),
            inconsistent_claims: verdict.inconsistent_claims().count(),
        }
    }
}
