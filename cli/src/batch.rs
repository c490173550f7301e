//! JSONL batch input and output.
//!
//! Input: one object per line, `{"id": ..., "content": "..."}`. `backstory`
//! and `text` are accepted for `content`; numeric ids are stringified. Blank
//! lines are skipped.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use veracity_types::{Backstory, BackstoryRecord, BackstoryVerdict, ClaimRecord};

#[derive(Debug, Error)]
pub enum BatchInputError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("line {line}: {source}")]
    Malformed {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Integer(i64),
    Float(f64),
}

impl RawId {
    fn into_string(self) -> String {
        match self {
            RawId::Text(s) => s,
            RawId::Integer(n) => n.to_string(),
            RawId::Float(n) => n.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct InputLine {
    id: RawId,
    #[serde(alias = "backstory", alias = "text")]
    content: String,
}

/// Parse JSONL backstories. `source` names the input in I/O errors.
pub fn read_backstories(
    reader: impl BufRead,
    source: &Path,
) -> Result<Vec<Backstory>, BatchInputError> {
    let mut backstories = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line.map_err(|source_err| BatchInputError::Io {
            path: source.to_path_buf(),
            source: source_err,
        })?;
        if line.trim().is_empty() {
            continue;
        }
        let parsed: InputLine =
            serde_json::from_str(&line).map_err(|source| BatchInputError::Malformed {
                line: index + 1,
                source,
            })?;
        backstories.push(Backstory::new(parsed.id.into_string(), parsed.content));
    }
    Ok(backstories)
}

pub fn read_backstories_from_path(path: &Path) -> Result<Vec<Backstory>, BatchInputError> {
    let file = File::open(path).map_err(|source| BatchInputError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    read_backstories(BufReader::new(file), path)
}

/// Write one JSON object per line.
pub fn write_jsonl<T: Serialize>(
    mut writer: impl Write,
    records: impl IntoIterator<Item = T>,
) -> std::io::Result<()> {
    for record in records {
        serde_json::to_writer(&mut writer, &record)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()
}

/// Per-claim records for every backstory, in batch then claim order.
pub fn write_claim_records(writer: impl Write, verdicts: &[BackstoryVerdict]) -> std::io::Result<()> {
    write_jsonl(
        writer,
        verdicts.iter().flat_map(ClaimRecord::from_backstory_verdict),
    )
}

pub fn write_backstory_records(
    writer: impl Write,
    verdicts: &[BackstoryVerdict],
) -> std::io::Result<()> {
    write_jsonl(writer, verdicts.iter().map(BackstoryRecord::from_verdict))
}

/// Plain-text claims, one per line. Internal whitespace runs (newlines
/// included) collapse to a single space.
pub fn write_claim_lines(
    mut writer: impl Write,
    claims: impl IntoIterator<Item = impl AsRef<str>>,
) -> std::io::Result<()> {
    for claim in claims {
        let mut words = claim.as_ref().split_whitespace();
        if let Some(first) = words.next() {
            writer.write_all(first.as_bytes())?;
            for word in words {
                writer.write_all(b" ")?;
                writer.write_all(word.as_bytes())?;
            }
        }
        writer.write_all(b"\n")?;
    }
    writer.flush()
}

pub fn create_output(path: &Path) -> std::io::Result<BufWriter<File>> {
    File::create(path).map(BufWriter::new)
}
