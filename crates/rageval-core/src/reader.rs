//! Structured file reader for evaluation inputs.
//!
//! Accepts a JSON array of records, or JSON Lines when the extension is
//! `.jsonl`/`.ndjson`. Records are deserialized into any serde model.

use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::Error;
use crate::traits::QuestionSource;
use crate::types::Question;

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonReader;

impl JsonReader {
    pub fn new() -> Self { Self }

    pub fn read_as_model<T: DeserializeOwned>(&self, path: &Path) -> Result<Vec<T>, Error> {
        if !path.exists() {
            return Err(Error::NotFound(path.display().to_string()));
        }
        let raw = fs::read_to_string(path).map_err(|e| Error::Parse { path: path.display().to_string(), message: e.to_string() })?;
        let records = if is_json_lines(path) { parse_lines(path, &raw)? } else { parse_array(path, &raw)? };
        debug!(path = %path.display(), records = records.len(), "read structured file");
        Ok(records)
    }
}

impl QuestionSource for JsonReader {
    fn read_all(&self, path: &Path) -> anyhow::Result<Vec<Question>> {
        Ok(self.read_as_model::<Question>(path)?)
    }
}

fn is_json_lines(path: &Path) -> bool {
    matches!(path.extension().and_then(|s| s.to_str()), Some("jsonl" | "ndjson"))
}

fn parse_array<T: DeserializeOwned>(path: &Path, raw: &str) -> Result<Vec<T>, Error> {
    serde_json::from_str(raw).map_err(|e| Error::Parse { path: path.display().to_string(), message: e.to_string() })
}

fn parse_lines<T: DeserializeOwned>(path: &Path, raw: &str) -> Result<Vec<T>, Error> {
    let mut out = Vec::new();
    for (line_no, line) in raw.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() { continue; }
        let record = serde_json::from_str(line).map_err(|e| Error::Parse {
            path: path.display().to_string(),
            message: format!("line {}: {}", line_no + 1, e),
        })?;
        out.push(record);
    }
    Ok(out)
}
