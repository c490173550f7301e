//! Narrative → ordered atomic claims.
//!
//! Two passes over the reasoning service:
//!
//! 1. **Extraction** splits the text into standalone facts. A failed attempt
//!    is retried once; if that fails too the whole text becomes the only
//!    claim.
//! 2. **Self-correction** resubmits the text with the candidates and may only
//!    drop or edit them; an empty answer rejects every candidate. A failed
//!    pass, or one that adds claims, keeps the extraction output.
//!
//! [`ClaimDecomposer::decompose`] is total: it never returns an error.

use std::sync::Arc;

use veracity_providers::{CompletionRequest, ReasoningClient, ReasoningError};
use veracity_types::{Backstory, Claim, NonEmptyString};

use crate::prompts;
use crate::schemas::{FactList, claims_schema};

#[derive(Clone)]
pub struct ClaimDecomposer {
    client: Arc<dyn ReasoningClient>,
}

impl std::fmt::Debug for ClaimDecomposer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClaimDecomposer").finish_non_exhaustive()
    }
}

impl ClaimDecomposer {
    #[must_use]
    pub fn new(client: Arc<dyn ReasoningClient>) -> Self {
        Self { client }
    }

    /// Split `text` into ordered claim strings.
    ///
    /// Blank input yields an empty sequence without calling the service.
    pub async fn decompose(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let extracted = match self.extract_with_retry(text).await {
            Some(claims) => claims,
            None => {
                tracing::warn!("Extraction failed twice; using the full text as a single claim");
                return vec![text.to_string()];
            }
        };

        if extracted.is_empty() {
            return extracted;
        }

        match self.correct(text, &extracted).await {
            Ok(corrected) if corrected.len() > extracted.len() => {
                tracing::warn!(
                    extracted = extracted.len(),
                    corrected = corrected.len(),
                    "Self-correction added claims; keeping extraction output"
                );
                extracted
            }
            Ok(corrected) => {
                tracing::debug!(
                    extracted = extracted.len(),
                    corrected = corrected.len(),
                    "Self-correction applied"
                );
                corrected
            }
            Err(error) => {
                tracing::warn!(%error, "Self-correction failed; keeping extraction output");
                extracted
            }
        }
    }

    /// Decompose a backstory into [`Claim`]s tied to its id.
    pub async fn decompose_backstory(&self, backstory: &Backstory) -> Vec<Claim> {
        self.decompose(backstory.raw_text())
            .await
            .into_iter()
            .filter_map(|text| NonEmptyString::new(text).ok())
            .enumerate()
            .map(|(index, text)| Claim::new(text, backstory.id().clone(), index))
            .collect()
    }

    async fn extract_with_retry(&self, text: &str) -> Option<Vec<String>> {
        match self.extract(text).await {
            Ok(claims) => return Some(claims),
            Err(error) => tracing::warn!(%error, "Extraction failed; retrying once"),
        }
        match self.extract(text).await {
            Ok(claims) => Some(claims),
            Err(error) => {
                tracing::warn!(%error, "Extraction retry failed");
                None
            }
        }
    }

    async fn extract(&self, text: &str) -> Result<Vec<String>, ReasoningError> {
        let prompt = prompts::extraction_prompt(text);
        self.request_claims(prompts::EXTRACT_SYSTEM, &prompt).await
    }

    async fn correct(&self, text: &str, candidates: &[String]) -> Result<Vec<String>, ReasoningError> {
        let prompt = prompts::correction_prompt(text, candidates);
        self.request_claims(prompts::CORRECT_SYSTEM, &prompt).await
    }

    async fn request_claims(&self, system: &str, prompt: &str) -> Result<Vec<String>, ReasoningError> {
        let schema = claims_schema();
        let request = CompletionRequest {
            system,
            prompt,
            schema,
        };
        let raw = self.client.complete(&request).await?;
        let list: FactList = schema.parse(&raw)?;
        Ok(list.into_claims())
    }
}
