//! Backstory and batch orchestration.
//!
//! Claims of a backstory, and backstories of a batch, run concurrently. A
//! shared semaphore bounds in-flight reasoning work: one permit per
//! decomposition and one per claim while it is retrieved and verified.
//! Permits are never nested, so a saturated limiter cannot deadlock.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::sync::{Semaphore, SemaphorePermit};
use veracity_providers::ReasoningClient;
use veracity_retrieval::{DEFAULT_K, RetrievalError, RetrievalService};
use veracity_types::{Backstory, BackstoryVerdict, Claim, VerificationVerdict};

use crate::aggregator;
use crate::backoff::BackoffPolicy;
use crate::decomposer::ClaimDecomposer;
use crate::preview;
use crate::verifier::ClaimVerifier;

pub const DEFAULT_CONCURRENCY: usize = 4;
pub const DEADLINE_EXCEEDED_REASON: &str = "verification deadline exceeded";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Snippets retrieved per claim.
    pub k: usize,
    /// Permits in the shared limiter (clamped to at least 1).
    pub concurrency: usize,
    /// Wall-clock bound on one claim's verification, if any.
    pub claim_deadline: Option<Duration>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            k: DEFAULT_K,
            concurrency: DEFAULT_CONCURRENCY,
            claim_deadline: None,
        }
    }
}

pub struct Pipeline {
    decomposer: ClaimDecomposer,
    verifier: ClaimVerifier,
    retrieval: Arc<dyn RetrievalService>,
    limiter: Semaphore,
    config: PipelineConfig,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .field("policy", self.verifier.policy())
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    #[must_use]
    pub fn new(
        reasoning: Arc<dyn ReasoningClient>,
        retrieval: Arc<dyn RetrievalService>,
        policy: BackoffPolicy,
        config: PipelineConfig,
    ) -> Self {
        Self {
            decomposer: ClaimDecomposer::new(Arc::clone(&reasoning)),
            verifier: ClaimVerifier::new(reasoning, policy),
            retrieval,
            limiter: Semaphore::new(config.concurrency.max(1)),
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Decompose under one limiter permit.
    pub async fn decompose(&self, backstory: &Backstory) -> Vec<Claim> {
        let _permit = self.permit().await;
        self.decomposer.decompose_backstory(backstory).await
    }

    /// Retrieve context for `claim` and verify it under one limiter permit.
    ///
    /// Retrieval failure is returned to the caller; every reasoning failure is
    /// already folded into the verdict.
    pub async fn verify_claim(&self, claim: Claim) -> Result<VerificationVerdict, RetrievalError> {
        let _permit = self.permit().await;

        let context = self.retrieval.query(claim.text(), self.config.k).await?;

        let Some(deadline) = self.config.claim_deadline else {
            return Ok(self.verifier.verify(claim, context).await);
        };

        let verification = self.verifier.verify(claim.clone(), context.clone());
        match tokio::time::timeout(deadline, verification).await {
            Ok(verdict) => Ok(verdict),
            Err(_) => {
                tracing::warn!(
                    claim = %preview(claim.text()),
                    deadline_secs = deadline.as_secs(),
                    "Verification deadline exceeded"
                );
                Ok(VerificationVerdict::fail_closed(
                    claim,
                    DEADLINE_EXCEEDED_REASON,
                    context,
                ))
            }
        }
    }

    /// Decompose, verify every claim concurrently, aggregate.
    ///
    /// Always yields one verdict per claim, in decomposition order.
    pub async fn check_backstory(&self, backstory: &Backstory) -> BackstoryVerdict {
        let claims = self.decompose(backstory).await;
        tracing::debug!(
            backstory_id = %backstory.id(),
            claims = claims.len(),
            "Decomposed backstory"
        );

        let verdicts = join_all(claims.into_iter().map(|claim| async move {
            let fallback = claim.clone();
            match self.verify_claim(claim).await {
                Ok(verdict) => verdict,
                Err(error) => {
                    tracing::warn!(
                        backstory_id = %backstory.id(),
                        claim = %preview(fallback.text()),
                        %error,
                        "Retrieval failed; recording inconsistent verdict"
                    );
                    VerificationVerdict::fail_closed(fallback, error.to_string(), Vec::new())
                }
            }
        }))
        .await;

        let verdict = aggregator::aggregate(backstory.id().clone(), verdicts);
        tracing::info!(
            backstory_id = %verdict.backstory_id(),
            is_consistent = verdict.is_consistent(),
            claims = verdict.per_claim().len(),
            inconsistent = verdict.inconsistent_claims().count(),
            "Backstory checked"
        );
        verdict
    }

    /// Check every backstory concurrently. Results keep input order.
    pub async fn check_batch(&self, backstories: &[Backstory]) -> Vec<BackstoryVerdict> {
        tracing::info!(
            backstories = backstories.len(),
            concurrency = self.config.concurrency.max(1),
            "Starting batch"
        );
        let verdicts = join_all(backstories.iter().map(|b| self.check_backstory(b))).await;
        tracing::info!(
            consistent = verdicts.iter().filter(|v| v.is_consistent()).count(),
            total = verdicts.len(),
            "Batch finished"
        );
        verdicts
    }

    async fn permit(&self) -> Option<SemaphorePermit<'_>> {
        // The limiter is never closed.
        self.limiter.acquire().await.ok()
    }
}
