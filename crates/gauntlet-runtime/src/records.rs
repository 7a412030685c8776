//! Persisted record schema and JSONL I/O.
//!
//! Dialog inputs and eval outputs are both one JSON object per line. The
//! reader is tolerant by design: only fully parseable lines are trusted, so
//! a truncated tail from a crash cannot poison a resume. The writer appends
//! one record at a time and makes it durable before the next turn starts.

use gauntlet_core::InstructionSpec;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use thiserror::Error;

/// Errors from record I/O.
#[derive(Error, Debug)]
pub enum RecordError {
    #[error("Record file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Record serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// One input turn of a dialog file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DialogTurn {
    /// 1-based turn number.
    pub turn: u32,

    /// Topic in force for this turn.
    pub active_topic: String,

    /// The verified user utterance to send to the responder.
    pub user_query_verified: String,

    /// Instructions active on this turn.
    #[serde(default)]
    pub instructions: Vec<InstructionSpec>,
}

/// Per-turn evaluation result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct TurnEval {
    /// Conjunction of every individual verdict.
    pub overall_ok: bool,

    /// Boolean verdict per instruction id.
    pub details: BTreeMap<String, bool>,

    /// `(score, rationale)` per rated instruction id.
    pub sub_details: BTreeMap<String, (f64, String)>,
}

/// One appended line of an eval output file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvalRecord {
    pub turn: u32,
    pub active_topic: String,
    pub user_query_verified: String,
    pub instructions: Vec<InstructionSpec>,
    pub response: String,
    pub eval: TurnEval,
    /// Remaining consecutive-failure budget after this turn; `null` when no
    /// budget is configured. `Some(0)` marks the terminal record.
    pub remaining_patience: Option<u32>,
}

/// Read every well-formed line of a JSONL file; blank and malformed lines are
/// skipped.
pub fn read_jsonl<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, RecordError> {
    let raw = std::fs::read_to_string(path)?;
    let mut records = Vec::new();
    for (idx, line) in raw.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str(line) {
            Ok(record) => records.push(record),
            Err(e) => {
                tracing::warn!(line = idx + 1, error = %e, path = %path.display(),
                    "skipping malformed record line");
            }
        }
    }
    Ok(records)
}

/// Append-only writer that makes each record durable immediately.
pub struct EvalWriter {
    file: File,
}

impl EvalWriter {
    /// Open (or create) an output file for appending. Parent directories are
    /// created as needed; a truncated tail from a crash is terminated with a
    /// newline so the next record starts on its own line.
    pub fn append_to(path: &Path) -> Result<Self, RecordError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        let len = file.metadata()?.len();
        if len > 0 {
            let raw = std::fs::read(path)?;
            if raw.last() != Some(&b'\n') {
                file.write_all(b"\n")?;
            }
        }
        Ok(Self { file })
    }

    /// Append one record and flush it to disk before returning.
    pub fn append(&mut self, record: &EvalRecord) -> Result<(), RecordError> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');
        self.file.write_all(line.as_bytes())?;
        self.file.sync_data()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_record(turn: u32, ok: bool) -> EvalRecord {
        EvalRecord {
            turn,
            active_topic: "t".to_string(),
            user_query_verified: "q".to_string(),
            instructions: vec![InstructionSpec {
                id: "format".to_string(),
                args: json!({"mode": "json"}),
            }],
            response: "{}".to_string(),
            eval: TurnEval {
                overall_ok: ok,
                details: BTreeMap::from([("format".to_string(), ok)]),
                sub_details: BTreeMap::new(),
            },
            remaining_patience: Some(3),
        }
    }

    #[test]
    fn test_record_wire_shape() {
        let mut record = sample_record(1, true);
        record
            .eval
            .sub_details
            .insert("emotion".to_string(), (7.0, "warm".to_string()));
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["turn"], 1);
        assert_eq!(value["eval"]["overall_ok"], true);
        assert_eq!(value["eval"]["details"]["format"], true);
        assert_eq!(value["eval"]["sub_details"]["emotion"][0], 7.0);
        assert_eq!(value["eval"]["sub_details"]["emotion"][1], "warm");
        assert_eq!(value["remaining_patience"], 3);
    }

    #[test]
    fn test_null_patience_round_trips() {
        let mut record = sample_record(1, true);
        record.remaining_patience = None;
        let line = serde_json::to_string(&record).unwrap();
        assert!(line.contains("\"remaining_patience\":null"));
        let back: EvalRecord = serde_json::from_str(&line).unwrap();
        assert_eq!(back.remaining_patience, None);
    }

    #[test]
    fn test_reader_skips_malformed_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("eval_0.jsonl");
        let good = serde_json::to_string(&sample_record(1, true)).unwrap();
        let content = format!("{good}\nnot json at all\n{{\"turn\": 2, \"trunc");
        std::fs::write(&path, content).unwrap();

        let records: Vec<EvalRecord> = read_jsonl(&path).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].turn, 1);
    }

    #[test]
    fn test_writer_appends_and_reader_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/eval_7.jsonl");
        {
            let mut writer = EvalWriter::append_to(&path).unwrap();
            writer.append(&sample_record(1, true)).unwrap();
            writer.append(&sample_record(2, false)).unwrap();
        }
        let records: Vec<EvalRecord> = read_jsonl(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].turn, 2);
        assert!(!records[1].eval.overall_ok);
    }

    #[test]
    fn test_dialog_turn_parses_wire_form() {
        let line = json!({
            "turn": 3,
            "active_topic": "crusades",
            "user_query_verified": "Tell me more, but start with 'T'.",
            "instructions": [{"id": "startwith", "args": {"mode": "letter", "value": "T"}}]
        });
        let turn: DialogTurn = serde_json::from_value(line).unwrap();
        assert_eq!(turn.turn, 3);
        assert_eq!(turn.instructions.len(), 1);
        assert_eq!(turn.instructions[0].id, "startwith");
    }
}
