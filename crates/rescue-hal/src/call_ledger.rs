//! Append-only JSONL log of every capability call.
//!
//! Each record is written with its own open-append-close so a crash loses at
//! most the record being written.  A failed write is retried once; after
//! that the failure is logged and the caller carries on.

use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rescue_types::ActionResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum CallLedgerError {
    #[error("call ledger I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("call ledger serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// One line of the call ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallRecord {
    pub timestamp: DateTime<Utc>,
    /// "woz", "bridge" or "sim".
    pub backend: String,
    pub action: String,
    pub args: Value,
    pub reason: String,
    pub success: bool,
    pub simulated: bool,
}

#[derive(Debug, Clone)]
pub struct CallLedger {
    path: PathBuf,
}

impl CallLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `record`, retrying once on failure.
    pub fn append(&self, record: &CallRecord) -> Result<(), CallLedgerError> {
        match self.try_append(record) {
            Ok(()) => Ok(()),
            Err(first) => {
                warn!(path = %self.path.display(), error = %first, "call ledger write failed, retrying");
                self.try_append(record)
            }
        }
    }

    /// Build a record for a finished call and append it.  Write failures are
    /// logged and swallowed.
    pub fn record(&self, backend: &str, action: &str, args: Value, reason: &str, result: &ActionResult) {
        let record = CallRecord {
            timestamp: Utc::now(),
            backend: backend.to_string(),
            action: action.to_string(),
            args,
            reason: reason.to_string(),
            success: result.success,
            simulated: result.simulated,
        };
        if let Err(e) = self.append(&record) {
            warn!(path = %self.path.display(), error = %e, action, "dropping call ledger record");
        }
    }

    /// Every well-formed record in file order.  Malformed lines are skipped;
    /// a missing file is an empty ledger.
    pub fn read_all(&self) -> Result<Vec<CallRecord>, CallLedgerError> {
        let file = match fs::File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut records = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(&line) {
                Ok(r) => records.push(r),
                Err(e) => warn!(error = %e, "skipping malformed call ledger line"),
            }
        }
        Ok(records)
    }

    fn try_append(&self, record: &CallRecord) -> Result<(), CallLedgerError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let line = serde_json::to_string(record)?;
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(file, "{line}")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn records_are_appended_in_order() {
        let dir = TempDir::new().unwrap();
        let ledger = CallLedger::new(dir.path().join("artifacts").join("action_calls.jsonl"));

        let ok = ActionResult::ok(json!({}), true);
        ledger.record("woz", "speak", json!({ "text": "hello" }), "phase_announce", &ok);
        ledger.record("woz", "stop", json!({}), "shutdown", &ok);

        let records = ledger.read_all().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].action, "speak");
        assert_eq!(records[0].args["text"], "hello");
        assert_eq!(records[1].reason, "shutdown");
        assert!(records[1].simulated);
    }

    #[test]
    fn missing_file_reads_as_empty() {
        let dir = TempDir::new().unwrap();
        let ledger = CallLedger::new(dir.path().join("nothing.jsonl"));
        assert!(ledger.read_all().unwrap().is_empty());
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("calls.jsonl");
        let ledger = CallLedger::new(&path);
        ledger.record("sim", "explore_step", json!({}), "search", &ActionResult::ok(json!({}), true));
        fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .and_then(|mut f| writeln!(f, "{{not json"))
            .unwrap();
        ledger.record("sim", "stop", json!({}), "done", &ActionResult::failed(json!({}), true));

        let records = ledger.read_all().unwrap();
        assert_eq!(records.len(), 2);
        assert!(!records[1].success);
    }

    #[test]
    fn unwritable_path_does_not_panic() {
        let dir = TempDir::new().unwrap();
        // A directory where the file should be.
        let path = dir.path().join("calls.jsonl");
        fs::create_dir_all(&path).unwrap();
        let ledger = CallLedger::new(&path);
        ledger.record("sim", "stop", json!({}), "x", &ActionResult::ok(json!({}), true));
        assert!(ledger
            .append(&CallRecord {
                timestamp: Utc::now(),
                backend: "sim".into(),
                action: "stop".into(),
                args: json!({}),
                reason: "x".into(),
                success: true,
                simulated: true,
            })
            .is_err());
    }
}
