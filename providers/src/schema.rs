//! Fixed response schemas and strongly typed parsing of structured output.
//!
//! A [`ResponseSchema`] is sent to the provider (so it can constrain its
//! output) and then used again on the way back: the raw text is decoded,
//! validated against the same JSON Schema, and only then deserialized into a
//! Rust type. A mismatch at any step is a recoverable [`SchemaError`].

use std::fmt;

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

const EXCERPT_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("response schema '{name}' is not a valid JSON Schema: {message}")]
    InvalidSchema { name: &'static str, message: String },
    #[error("response is not valid JSON ({message}): {excerpt}")]
    InvalidJson { message: String, excerpt: String },
    #[error("response does not match schema '{name}': {message}")]
    Mismatch { name: &'static str, message: String },
}

pub struct ResponseSchema {
    name: &'static str,
    schema: Value,
    validator: jsonschema::Validator,
}

impl fmt::Debug for ResponseSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseSchema")
            .field("name", &self.name)
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

impl ResponseSchema {
    pub fn new(name: &'static str, schema: Value) -> Result<Self, SchemaError> {
        let validator =
            jsonschema::validator_for(&schema).map_err(|e| SchemaError::InvalidSchema {
                name,
                message: e.to_string(),
            })?;
        Ok(Self {
            name,
            schema,
            validator,
        })
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub fn as_json(&self) -> &Value {
        &self.schema
    }

    /// The schema with every `additionalProperties` key removed.
    ///
    /// Gemini's `responseSchema` is an OpenAPI subset that rejects the keyword.
    #[must_use]
    pub fn without_additional_properties(&self) -> Value {
        let mut schema = self.schema.clone();
        remove_additional_properties(&mut schema);
        schema
    }

    /// Decode, validate and deserialize a structured response.
    pub fn parse<T: DeserializeOwned>(&self, raw: &str) -> Result<T, SchemaError> {
        let body = strip_code_fence(raw);
        let value: Value = serde_json::from_str(body).map_err(|e| SchemaError::InvalidJson {
            message: e.to_string(),
            excerpt: excerpt(body),
        })?;

        if let Err(err) = self.validator.validate(&value) {
            return Err(SchemaError::Mismatch {
                name: self.name,
                message: err.to_string(),
            });
        }

        serde_json::from_value(value).map_err(|e| SchemaError::Mismatch {
            name: self.name,
            message: e.to_string(),
        })
    }
}

/// Strip a surrounding markdown code fence (```json ... ```), if present.
#[must_use]
pub fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(rest) = rest.strip_suffix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") on the opening fence line.
    match rest.split_once('\n') {
        Some((_, body)) => body.trim(),
        None => rest.trim(),
    }
}

fn remove_additional_properties(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.remove("additionalProperties");
            for value in map.values_mut() {
                remove_additional_properties(value);
            }
        }
        Value::Array(values) => {
            for value in values {
                remove_additional_properties(value);
            }
        }
        _ => {}
    }
}

fn excerpt(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(EXCERPT_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}
