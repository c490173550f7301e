//! Batch adapter for the veracity pipeline: JSONL in, JSONL out.

pub mod batch;
