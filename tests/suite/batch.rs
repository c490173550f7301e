//! JSONL in, pipeline, JSONL out.

use std::io::{BufRead, BufReader};
use std::sync::Arc;

use veracity::batch::{
    create_output, read_backstories_from_path, write_backstory_records, write_claim_records,
};
use veracity_core::testing::{ScriptedReasoning, Stage, StaticRetrieval, facts_json, verdict_json};
use veracity_core::{Pipeline, PipelineConfig};
use veracity_types::{BackstoryRecord, ClaimRecord, ContextSnippet};

use crate::common::{STORY, STORY_FACTS, immediate_policy};

fn read_records<T: serde::de::DeserializeOwned>(path: &std::path::Path) -> Vec<T> {
    let file = std::fs::File::open(path).unwrap();
    BufReader::new(file)
        .lines()
        .map(|line| serde_json::from_str(&line.unwrap()).unwrap())
        .collect()
}

#[tokio::test]
async fn batch_round_trip_through_files() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("backstories.jsonl");
    std::fs::write(
        &input,
        format!(
            "{}\n{}\n",
            serde_json::json!({ "id": 101, "content": STORY }),
            serde_json::json!({ "id": "quiet", "backstory": "Nothing of note happened." }),
        ),
    )
    .unwrap();

    let backstories = read_backstories_from_path(&input).unwrap();
    assert_eq!(backstories.len(), 2);

    let reasoning = ScriptedReasoning::new(|request| match Stage::of(request) {
        Stage::Extract | Stage::Correct if request.prompt.contains("library") => {
            Ok(facts_json(&STORY_FACTS))
        }
        Stage::Extract | Stage::Correct => Ok(facts_json(&["Nothing of note happened."])),
        Stage::Verify if request.prompt.contains("burned down in 1995") => {
            Ok(verdict_json(false, "Passage 1 dates the fire to 2001."))
        }
        Stage::Verify => Ok(verdict_json(true, "No passage contradicts the claim.")),
    });
    let pipeline = Pipeline::new(
        Arc::new(reasoning),
        Arc::new(StaticRetrieval::fixed(vec![ContextSnippet::new(
            "The fire of 2001 destroyed the library.",
            1,
            "history.txt",
        )])),
        immediate_policy(2),
        PipelineConfig::default(),
    );
    let verdicts = pipeline.check_batch(&backstories).await;

    let claims_path = dir.path().join("claims.jsonl");
    let verdicts_path = dir.path().join("verdicts.jsonl");
    write_claim_records(create_output(&claims_path).unwrap(), &verdicts).unwrap();
    write_backstory_records(create_output(&verdicts_path).unwrap(), &verdicts).unwrap();

    let claims: Vec<ClaimRecord> = read_records(&claims_path);
    assert_eq!(claims.len(), 4);
    assert!(claims[..3].iter().all(|c| c.backstory_id == "101"));
    assert_eq!(claims[1].claim, STORY_FACTS[1]);
    assert!(!claims[1].is_consistent);
    assert!(claims[1].context.contains("history.txt"));
    assert_eq!(claims[3].backstory_id, "quiet");

    let records: Vec<BackstoryRecord> = read_records(&verdicts_path);
    assert_eq!(
        records,
        vec![
            BackstoryRecord {
                backstory_id: "101".to_string(),
                is_consistent: false,
                claims: 3,
                inconsistent_claims: 1,
            },
            BackstoryRecord {
                backstory_id: "quiet".to_string(),
                is_consistent: true,
                claims: 1,
                inconsistent_claims: 0,
            },
        ]
    );
}

#[test]
fn missing_input_reports_its_path() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("absent.jsonl");
    let err = read_backstories_from_path(&missing).unwrap_err();
    assert!(err.to_string().contains("absent.jsonl"));
}
