//! The three-stage claim pipeline.
//!
//! ```text
//! Backstory ─▶ ClaimDecomposer ─▶ claims ─┬▶ RetrievalService ─▶ ClaimVerifier ─┐
//!                                         └▶ ...  (one per claim, concurrent) ─┴▶ aggregate ─▶ BackstoryVerdict
//! ```
//!
//! - [`ClaimDecomposer`] - extraction + self-correction, total over its input
//! - [`ClaimVerifier`] - bounded rate-limit retry with jittered backoff, fail-closed
//! - [`aggregator`] - logical AND over claim verdicts
//! - [`Pipeline`] - per-backstory and batch orchestration under a shared limiter

pub mod aggregator;
mod backoff;
mod decomposer;
mod pipeline;
mod prompts;
pub mod schemas;
mod verifier;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use backoff::{
    BackoffConfigError, BackoffPolicy, DEFAULT_INITIAL_DELAY, DEFAULT_JITTER, DEFAULT_MAX_ATTEMPTS,
    DEFAULT_MAX_DELAY,
};
pub use decomposer::ClaimDecomposer;
pub use pipeline::{DEADLINE_EXCEEDED_REASON, DEFAULT_CONCURRENCY, Pipeline, PipelineConfig};
pub use verifier::ClaimVerifier;

const PREVIEW_CHARS: usize = 60;

/// Short single-line form of a claim for log fields.
pub(crate) fn preview(text: &str) -> String {
    let flat: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut chars = flat.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}
