//! Retrieval adapter wired into claim verification.

use std::sync::Arc;
use std::time::Duration;

use veracity_core::testing::{ScriptedReasoning, verdict_json};
use veracity_core::{Pipeline, PipelineConfig};
use veracity_retrieval::{HttpRetrievalService, RetrievalError};
use veracity_types::{Claim, NonEmptyString};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::immediate_policy;

fn claim(text: &str) -> Claim {
    Claim::standalone(NonEmptyString::new(text).unwrap())
}

#[tokio::test]
async fn configured_k_reaches_the_server() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/retrieve"))
        .and(body_partial_json(serde_json::json!({ "k": 5 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            { "text": "a" }, { "text": "b" }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let pipeline = Pipeline::new(
        Arc::new(ScriptedReasoning::new(|_| Ok(verdict_json(true, "fine")))),
        Arc::new(HttpRetrievalService::new(&server.uri(), Duration::from_secs(5)).unwrap()),
        immediate_policy(1),
        PipelineConfig {
            k: 5,
            ..PipelineConfig::default()
        },
    );

    let verdict = pipeline.verify_claim(claim("A claim.")).await.unwrap();
    assert!(verdict.is_consistent());
    assert_eq!(verdict.retrieved_context().len(), 2);
}

#[tokio::test]
async fn unreachable_store_surfaces_from_verify_claim() {
    // Nothing listens on port 9 of the loopback interface.
    let service = HttpRetrievalService::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
    let reasoning = Arc::new(ScriptedReasoning::new(|_| Ok(verdict_json(true, "fine"))));
    let pipeline = Pipeline::new(
        reasoning.clone(),
        Arc::new(service),
        immediate_policy(1),
        PipelineConfig::default(),
    );

    let err = pipeline.verify_claim(claim("A claim.")).await.unwrap_err();
    assert!(matches!(err, RetrievalError::Unavailable(_)));
    assert_eq!(reasoning.call_count(), 0);
}
