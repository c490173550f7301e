//! Library-story scenario, through doubles and through real HTTP adapters.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use veracity_core::testing::{ScriptedReasoning, Stage, StaticRetrieval, facts_json, verdict_json};
use veracity_core::{BackoffPolicy, ClaimDecomposer, ClaimVerifier, Pipeline, PipelineConfig};
use veracity_retrieval::HttpRetrievalService;
use veracity_types::{Backstory, ContextSnippet, Provider};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{
    STORY, STORY_FACTS, gemini_body, gemini_path, gemini_prompt, gemini_system, immediate_policy,
    mock_client, mount_retrieval,
};

/// Judges by whether the passages mention 2001.
fn judge(prompt: &str) -> String {
    if prompt.contains("library burned in 2001") {
        verdict_json(
            false,
            "Passage 1 says the library burned in 2001, but the claim says 1995.",
        )
    } else {
        verdict_json(true, "Passage 1 confirms the library burned in 1995.")
    }
}

fn story_reasoning() -> ScriptedReasoning {
    ScriptedReasoning::new(|request| match Stage::of(request) {
        Stage::Extract | Stage::Correct => Ok(facts_json(&STORY_FACTS)),
        Stage::Verify => Ok(judge(request.prompt)),
    })
}

#[tokio::test]
async fn decompose_returns_the_three_extracted_facts() {
    let decomposer = ClaimDecomposer::new(Arc::new(story_reasoning()));

    let claims = decomposer.decompose(STORY).await;
    assert_eq!(claims, STORY_FACTS);
    assert!(claims[0].contains("1890"));
    assert!(claims[1].contains("1995"));
    assert!(claims[2].contains("Mayor Thomas"));
}

#[tokio::test(start_paused = true)]
async fn verify_against_supporting_and_contradicting_snippets() {
    let verifier = ClaimVerifier::new(Arc::new(story_reasoning()), BackoffPolicy::default());
    let claim = ClaimDecomposer::new(Arc::new(story_reasoning()))
        .decompose_backstory(&Backstory::new("lib", STORY))
        .await
        .remove(1);
    assert!(claim.text().contains("1995"));

    let supported = verifier
        .verify(
            claim.clone(),
            vec![ContextSnippet::new("library burned in 1995", 1, "town.txt")],
        )
        .await;
    assert!(supported.is_consistent());

    let contradicted = verifier
        .verify(
            claim,
            vec![ContextSnippet::new("library burned in 2001", 1, "town.txt")],
        )
        .await;
    assert!(!contradicted.is_consistent());
    assert!(contradicted.reason().contains("2001"));
    assert!(contradicted.reason().contains("1995"));
}

#[tokio::test(start_paused = true)]
async fn pipeline_flags_backstory_with_one_contradiction() {
    let retrieval = StaticRetrieval::new(|query, _| {
        let text = if query.contains("1995") {
            "library burned in 2001"
        } else {
            "town records agree"
        };
        Ok(vec![ContextSnippet::new(text, 1, "records.txt")])
    });
    let pipeline = Pipeline::new(
        Arc::new(story_reasoning()),
        Arc::new(retrieval),
        BackoffPolicy::default(),
        PipelineConfig::default(),
    );

    let verdict = pipeline.check_backstory(&Backstory::new("lib", STORY)).await;
    assert!(!verdict.is_consistent());
    let flags: Vec<bool> = verdict.per_claim().iter().map(|v| v.is_consistent()).collect();
    assert_eq!(flags, vec![true, false, true]);
}

#[tokio::test]
async fn full_http_path_with_gemini_and_vector_store() {
    let reasoning_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(gemini_path()))
        .respond_with(|request: &wiremock::Request| {
            let system = gemini_system(request);
            let text = if system.starts_with("You check whether a claim") {
                judge(&gemini_prompt(request))
            } else {
                facts_json(&STORY_FACTS)
            };
            ResponseTemplate::new(200).set_body_json(gemini_body(&text))
        })
        .mount(&reasoning_server)
        .await;

    let retrieval_server = MockServer::start().await;
    mount_retrieval(
        &retrieval_server,
        json!([{ "text": "library burned in 1995", "dist": 0.1, "metadata": { "path": "town.txt" } }]),
    )
    .await;

    let pipeline = Pipeline::new(
        Arc::new(mock_client(Provider::Gemini, &reasoning_server)),
        Arc::new(
            HttpRetrievalService::new(&retrieval_server.uri(), Duration::from_secs(5)).unwrap(),
        ),
        immediate_policy(3),
        PipelineConfig::default(),
    );

    let verdicts = pipeline
        .check_batch(&[Backstory::new("lib", STORY), Backstory::new("blank", "  ")])
        .await;

    assert_eq!(verdicts.len(), 2);
    assert!(verdicts[0].is_consistent());
    assert_eq!(verdicts[0].per_claim().len(), 3);
    let context = verdicts[0].per_claim()[1].retrieved_context();
    assert_eq!(context[0].provenance, "town.txt");
    assert_eq!(context[0].relevance_rank, 1);

    assert!(verdicts[1].is_consistent());
    assert!(verdicts[1].per_claim().is_empty());
}

#[tokio::test]
async fn rate_limited_service_exhausts_to_inconsistent() {
    let reasoning_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(gemini_path()))
        .respond_with(|request: &wiremock::Request| {
            if gemini_system(request).starts_with("You check whether a claim") {
                ResponseTemplate::new(429).set_body_json(json!({
                    "error": { "code": 429, "status": "RESOURCE_EXHAUSTED", "message": "Quota exceeded" }
                }))
            } else {
                ResponseTemplate::new(200).set_body_json(gemini_body(&facts_json(&["Only fact."])))
            }
        })
        .mount(&reasoning_server)
        .await;

    let pipeline = Pipeline::new(
        Arc::new(mock_client(Provider::Gemini, &reasoning_server)),
        Arc::new(StaticRetrieval::fixed(vec![])),
        immediate_policy(3),
        PipelineConfig::default(),
    );

    let verdict = pipeline.check_backstory(&Backstory::new("q", "Only fact.")).await;
    assert!(!verdict.is_consistent());
    assert!(verdict.per_claim()[0].is_retries_exhausted());

    let verify_calls = reasoning_server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| gemini_system(r).starts_with("You check whether a claim"))
        .count();
    assert_eq!(verify_calls, 3);
}
