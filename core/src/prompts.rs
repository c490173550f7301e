//! Prompt templates (see `assets/`) and the user messages built around them.

use std::fmt::Write as _;

use veracity_retrieval::format_context;
use veracity_types::ContextSnippet;

pub(crate) const EXTRACT_SYSTEM: &str =
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/assets/extract_claims.md"));
pub(crate) const CORRECT_SYSTEM: &str =
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/assets/correct_claims.md"));
pub(crate) const VERIFY_SYSTEM: &str =
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/assets/verify_claim.md"));

pub(crate) fn extraction_prompt(text: &str) -> String {
    format!("NARRATIVE:\n{}", text.trim())
}

pub(crate) fn correction_prompt(text: &str, candidates: &[String]) -> String {
    let mut listed = String::new();
    for (i, candidate) in candidates.iter().enumerate() {
        let _ = writeln!(listed, "[{i}] {candidate}");
    }
    format!(
        "NARRATIVE:\n{}\n\nCANDIDATE FACTS:\n{}",
        text.trim(),
        listed.trim_end()
    )
}

pub(crate) fn verification_prompt(claim: &str, context: &[ContextSnippet]) -> String {
    format!(
        "CLAIM:\n{}\n\nPASSAGES:\n{}",
        claim.trim(),
        format_context(context)
    )
}
