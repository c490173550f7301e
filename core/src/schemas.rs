//! Fixed response schemas for the two structured calls the core makes.

use std::sync::LazyLock;

use serde::Deserialize;
use serde_json::json;
use veracity_providers::ResponseSchema;

pub const CLAIMS_SCHEMA_NAME: &str = "claims";
pub const VERDICT_SCHEMA_NAME: &str = "verdict";

static CLAIMS: LazyLock<ResponseSchema> = LazyLock::new(|| {
    ResponseSchema::new(
        CLAIMS_SCHEMA_NAME,
        json!({
            "type": "object",
            "properties": {
                "facts": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "fact": { "type": "string" }
                        },
                        "required": ["fact"],
                        "additionalProperties": false
                    }
                }
            },
            "required": ["facts"],
            "additionalProperties": false
        }),
    )
    .expect("claims schema is a valid JSON Schema")
});

static VERDICT: LazyLock<ResponseSchema> = LazyLock::new(|| {
    ResponseSchema::new(
        VERDICT_SCHEMA_NAME,
        json!({
            "type": "object",
            "properties": {
                "is_consistent": { "type": "boolean" },
                "reason": { "type": "string" }
            },
            "required": ["is_consistent", "reason"],
            "additionalProperties": false
        }),
    )
    .expect("verdict schema is a valid JSON Schema")
});

/// `{"facts": [{"fact": string}]}`
#[must_use]
pub fn claims_schema() -> &'static ResponseSchema {
    &CLAIMS
}

/// `{"is_consistent": bool, "reason": string}`
#[must_use]
pub fn verdict_schema() -> &'static ResponseSchema {
    &VERDICT
}

#[derive(Debug, Deserialize)]
pub(crate) struct FactList {
    pub facts: Vec<FactEntry>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FactEntry {
    pub fact: String,
}

impl FactList {
    /// Trimmed facts in order, blanks dropped.
    pub(crate) fn into_claims(self) -> Vec<String> {
        self.facts
            .into_iter()
            .map(|entry| entry.fact.trim().to_string())
            .filter(|fact| !fact.is_empty())
            .collect()
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct Judgment {
    pub is_consistent: bool,
    pub reason: String,
}
