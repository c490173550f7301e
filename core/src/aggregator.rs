//! Per-claim verdicts → one backstory verdict.

use veracity_types::{BackstoryId, BackstoryVerdict, VerificationVerdict};

/// Logical AND over the verdicts. Empty input is vacuously consistent.
///
/// Exhausted-retries verdicts are already inconsistent; they are checked
/// explicitly so the rule holds even for a hand-built verdict.
#[must_use]
pub fn is_consistent(verdicts: &[VerificationVerdict]) -> bool {
    verdicts
        .iter()
        .all(|verdict| verdict.is_consistent() && !verdict.is_retries_exhausted())
}

#[must_use]
pub fn aggregate(backstory_id: BackstoryId, per_claim: Vec<VerificationVerdict>) -> BackstoryVerdict {
    let consistent = is_consistent(&per_claim);
    BackstoryVerdict::new(backstory_id, consistent, per_claim)
}
