//! Single-claim verification under a rate-limit-aware retry policy.
//!
//! Each verification is an independent state machine:
//!
//! ```text
//!            ┌──────────── rate limited, attempts left ─────────────┐
//!            ▼                                                      │
//!   Backoff(delay) ──sleep delay+jitter──▶ Attempting ──────────────┤
//!                                             │ ok        │ other   │ rate limited, ceiling hit
//!                                             ▼           ▼         ▼
//!                                        Succeeded     Failed   ExhaustedRetries
//! ```
//!
//! No error escapes [`ClaimVerifier::verify`]: `Failed` and
//! `ExhaustedRetries` both produce a fail-closed verdict.

use std::sync::Arc;
use std::time::Duration;

use veracity_providers::{CompletionRequest, ReasoningClient, ReasoningError};
use veracity_types::{Claim, ContextSnippet, RETRIES_EXHAUSTED_REASON, VerificationVerdict};

use crate::backoff::BackoffPolicy;
use crate::schemas::{Judgment, verdict_schema};
use crate::{preview, prompts};

#[derive(Debug)]
enum AttemptState {
    Backoff { attempt: u32, delay: Duration },
    Attempting { attempt: u32, delay: Duration },
    Succeeded(Judgment),
    Failed(String),
    ExhaustedRetries,
}

#[derive(Clone)]
pub struct ClaimVerifier {
    client: Arc<dyn ReasoningClient>,
    policy: BackoffPolicy,
}

impl std::fmt::Debug for ClaimVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClaimVerifier")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl ClaimVerifier {
    #[must_use]
    pub fn new(client: Arc<dyn ReasoningClient>, policy: BackoffPolicy) -> Self {
        Self { client, policy }
    }

    #[must_use]
    pub fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }

    /// Judge `claim` against caller-supplied `context`.
    pub async fn verify(&self, claim: Claim, context: Vec<ContextSnippet>) -> VerificationVerdict {
        let prompt = prompts::verification_prompt(claim.text(), &context);
        let request = CompletionRequest {
            system: prompts::VERIFY_SYSTEM,
            prompt: &prompt,
            schema: verdict_schema(),
        };

        let mut state = AttemptState::Backoff {
            attempt: 1,
            delay: self.policy.initial_delay(),
        };

        loop {
            state = match state {
                AttemptState::Backoff { attempt, delay } => {
                    let wait = self.policy.jittered(delay);
                    tracing::debug!(
                        claim = %preview(claim.text()),
                        attempt,
                        delay_ms = wait.as_millis(),
                        "Waiting before verification attempt"
                    );
                    tokio::time::sleep(wait).await;
                    AttemptState::Attempting { attempt, delay }
                }
                AttemptState::Attempting { attempt, delay } => {
                    match self.attempt(&request).await {
                        Ok(judgment) => AttemptState::Succeeded(judgment),
                        Err(error) if error.is_rate_limited() => {
                            if attempt >= self.policy.max_attempts() {
                                AttemptState::ExhaustedRetries
                            } else {
                                let next = self.policy.grow(delay);
                                tracing::warn!(
                                    claim = %preview(claim.text()),
                                    attempt,
                                    max_attempts = self.policy.max_attempts(),
                                    next_delay_ms = next.as_millis(),
                                    %error,
                                    "Rate limited; backing off"
                                );
                                AttemptState::Backoff {
                                    attempt: attempt + 1,
                                    delay: next,
                                }
                            }
                        }
                        Err(error) => AttemptState::Failed(error.to_string()),
                    }
                }
                AttemptState::Succeeded(judgment) => {
                    return VerificationVerdict::new(
                        claim,
                        judgment.is_consistent,
                        judgment.reason,
                        context,
                    );
                }
                AttemptState::Failed(reason) => {
                    tracing::warn!(
                        claim = %preview(claim.text()),
                        error = %reason,
                        "Verification failed; recording inconsistent verdict"
                    );
                    return VerificationVerdict::fail_closed(claim, reason, context);
                }
                AttemptState::ExhaustedRetries => {
                    tracing::warn!(
                        claim = %preview(claim.text()),
                        max_attempts = self.policy.max_attempts(),
                        "Rate-limit retries exhausted"
                    );
                    return VerificationVerdict::fail_closed(
                        claim,
                        RETRIES_EXHAUSTED_REASON,
                        context,
                    );
                }
            };
        }
    }

    async fn attempt(&self, request: &CompletionRequest<'_>) -> Result<Judgment, ReasoningError> {
        let raw = self.client.complete(request).await?;
        Ok(request.schema.parse(&raw)?)
    }
}
