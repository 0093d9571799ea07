//! [`EvidenceLedger`] – append-only, session-scoped provenance log.
//!
//! Records are stored one JSON object per line.  Ids are `E1`, `E2`, ... and
//! are assigned by scanning the file for the highest existing `E<digits>`
//! id, so numbering survives process restarts without a separate counter.
//! Records are never rewritten.
//!
//! Appends within one process are serialized through a lock shared by all
//! clones of the ledger; each append opens, writes one line and closes the
//! file.  A failed append is retried once.
//!
//! # Example
//!
//! ```
//! use rescue_memory::evidence::{EvidenceLedger, NewEvidence};
//! use rescue_types::EvidenceKind;
//!
//! let dir = tempfile::tempdir().unwrap();
//! let ledger = EvidenceLedger::open(dir.path().join("evidence.jsonl")).unwrap();
//!
//! let id = ledger
//!     .append(NewEvidence::new(EvidenceKind::ModelOutput, "human_detector").summary("Person detected"))
//!     .unwrap();
//! assert_eq!(id, "E1");
//! assert_eq!(ledger.list().unwrap().len(), 1);
//! ```

use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use rescue_types::EvidenceKind;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

// ─────────────────────────────────────────────────────────────────────────────
// Error type
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Evidence ledger I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Evidence ledger serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Evidence ledger lock poisoned")]
    Poisoned,
}

// ─────────────────────────────────────────────────────────────────────────────
// Records
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceRecord {
    pub id: String,
    /// Unix seconds.
    pub timestamp: f64,
    #[serde(rename = "type")]
    pub kind: EvidenceKind,
    pub source: String,
    #[serde(default)]
    pub file_path: String,
    /// Always within [0, 1].
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl EvidenceRecord {
    /// Numeric part of the id, if it has the `E<digits>` shape.
    pub fn sequence(&self) -> Option<u64> {
        parse_evidence_id(&self.id)
    }
}

/// `"E12"` → `Some(12)`; anything else → `None`.
pub fn parse_evidence_id(id: &str) -> Option<u64> {
    let digits = id.strip_prefix('E')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Fields for a record about to be appended.  Only `kind` and `source` are
/// required.
#[derive(Debug, Clone)]
pub struct NewEvidence {
    kind: EvidenceKind,
    source: String,
    timestamp: Option<f64>,
    file_path: Option<String>,
    confidence: Option<f64>,
    summary: Option<String>,
    metadata: Map<String, Value>,
}

impl NewEvidence {
    pub fn new(kind: EvidenceKind, source: impl Into<String>) -> Self {
        Self {
            kind,
            source: source.into(),
            timestamp: None,
            file_path: None,
            confidence: None,
            summary: None,
            metadata: Map::new(),
        }
    }

    pub fn at(mut self, timestamp: f64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn file_path(mut self, path: impl Into<String>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    pub fn confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    pub fn meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    fn into_record(self, id: String) -> EvidenceRecord {
        let confidence = self.confidence.filter(|c| !c.is_nan()).unwrap_or(0.0).clamp(0.0, 1.0);
        EvidenceRecord {
            id,
            timestamp: self.timestamp.unwrap_or_else(now_unix),
            kind: self.kind,
            source: self.source,
            file_path: self.file_path.unwrap_or_default(),
            confidence,
            summary: self.summary.unwrap_or_default(),
            metadata: self.metadata,
        }
    }
}

fn now_unix() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

// ─────────────────────────────────────────────────────────────────────────────
// EvidenceLedger
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct EvidenceLedger {
    path: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl EvidenceLedger {
    /// Open (or prepare to create) the ledger at `path`.  Parent directories
    /// are created; the file itself appears on first append.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        Ok(Self {
            path,
            lock: Arc::new(Mutex::new(())),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record and return its id.
    pub fn append(&self, evidence: NewEvidence) -> Result<String, LedgerError> {
        let _guard = self.lock.lock().map_err(|_| LedgerError::Poisoned)?;
        match self.try_append(evidence.clone()) {
            Ok(id) => Ok(id),
            Err(first) => {
                warn!(path = %self.path.display(), error = %first, "evidence append failed, retrying");
                self.try_append(evidence)
            }
        }
    }

    /// Every well-formed record in file order.  A missing file is an empty
    /// ledger; malformed lines are skipped.
    pub fn list(&self) -> Result<Vec<EvidenceRecord>, LedgerError> {
        let mut out = Vec::new();
        for line in self.lines()? {
            match serde_json::from_str::<EvidenceRecord>(&line) {
                Ok(record) => out.push(record),
                Err(e) => debug!(error = %e, "skipping malformed evidence line"),
            }
        }
        Ok(out)
    }

    fn try_append(&self, evidence: NewEvidence) -> Result<String, LedgerError> {
        let id = format!("E{}", self.max_sequence()? + 1);
        let record = evidence.into_record(id.clone());
        let line = serde_json::to_string(&record)?;
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(file, "{line}")?;
        Ok(id)
    }

    /// Highest `E<n>` found in the file, 0 when there is none.  Lines that
    /// are not valid records still count if they carry a well-formed id.
    fn max_sequence(&self) -> Result<u64, LedgerError> {
        let max = self
            .lines()?
            .iter()
            .filter_map(|line| serde_json::from_str::<Value>(line).ok())
            .filter_map(|v| v.get("id").and_then(Value::as_str).and_then(parse_evidence_id))
            .max()
            .unwrap_or(0);
        Ok(max)
    }

    fn lines(&self) -> Result<Vec<String>, LedgerError> {
        let file = match fs::File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut out = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            if !line.trim().is_empty() {
                out.push(line);
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use tempfile::TempDir;

    fn ledger(dir: &TempDir) -> EvidenceLedger {
        EvidenceLedger::open(dir.path().join("session").join("evidence.jsonl")).unwrap()
    }

    fn note(summary: &str) -> NewEvidence {
        NewEvidence::new(EvidenceKind::OperatorNote, "test").summary(summary)
    }

    #[test]
    fn ids_are_sequential_from_one() {
        let dir = TempDir::new().unwrap();
        let ledger = ledger(&dir);
        let ids: Vec<_> = (0..3).map(|i| ledger.append(note(&i.to_string())).unwrap()).collect();
        assert_eq!(ids, vec!["E1", "E2", "E3"]);
    }

    #[test]
    fn reopening_continues_the_sequence() {
        let dir = TempDir::new().unwrap();
        ledger(&dir).append(note("a")).unwrap();
        ledger(&dir).append(note("b")).unwrap();

        let reopened = ledger(&dir);
        assert_eq!(reopened.append(note("c")).unwrap(), "E3");
        let summaries: Vec<_> = reopened.list().unwrap().into_iter().map(|r| r.summary).collect();
        assert_eq!(summaries, vec!["a", "b", "c"]);
    }

    #[test]
    fn ids_continue_past_malformed_and_foreign_lines() {
        let dir = TempDir::new().unwrap();
        let ledger = ledger(&dir);
        ledger.append(note("a")).unwrap();
        let mut f = OpenOptions::new().append(true).open(ledger.path()).unwrap();
        writeln!(f, "garbage").unwrap();
        writeln!(f, r#"{{"id":"E7"}}"#).unwrap();
        writeln!(f, r#"{{"id":"X99"}}"#).unwrap();
        drop(f);

        assert_eq!(ledger.append(note("b")).unwrap(), "E8");
        // Only complete records are listed.
        assert_eq!(ledger.list().unwrap().len(), 2);
    }

    #[test]
    fn defaults_and_clamping() {
        let dir = TempDir::new().unwrap();
        let ledger = ledger(&dir);
        ledger
            .append(NewEvidence::new(EvidenceKind::ModelOutput, "human_detector").confidence(1.4))
            .unwrap();
        ledger
            .append(NewEvidence::new(EvidenceKind::Image, "camera").confidence(-0.2).at(12.5))
            .unwrap();

        let records = ledger.list().unwrap();
        assert_eq!(records[0].confidence, 1.0);
        assert_eq!(records[0].file_path, "");
        assert!(records[0].timestamp > 0.0);
        assert_eq!(records[1].confidence, 0.0);
        assert_eq!(records[1].timestamp, 12.5);
    }

    #[test]
    fn record_serializes_kind_as_type() {
        let dir = TempDir::new().unwrap();
        let ledger = ledger(&dir);
        ledger
            .append(note("x").meta("question_key", "pain").file_path("frames/a.jpg"))
            .unwrap();
        let raw = fs::read_to_string(ledger.path()).unwrap();
        let v: Value = serde_json::from_str(raw.lines().next().unwrap()).unwrap();
        assert_eq!(v["type"], "operator_note");
        assert_eq!(v["metadata"]["question_key"], "pain");
        assert_eq!(v["file_path"], "frames/a.jpg");
    }

    #[test]
    fn missing_file_lists_empty() {
        let dir = TempDir::new().unwrap();
        assert!(ledger(&dir).list().unwrap().is_empty());
    }

    #[test]
    fn unwritable_path_fails_after_retry_without_panicking() {
        let dir = TempDir::new().unwrap();
        // The ledger path is a directory, so every read and write fails.
        let ledger = EvidenceLedger::open(dir.path()).unwrap();

        assert!(matches!(ledger.append(note("lost")), Err(LedgerError::Io(_))));
        assert!(ledger.list().is_err());
        assert!(dir.path().is_dir());
    }

    #[test]
    fn concurrent_clones_never_reuse_ids() {
        let dir = TempDir::new().unwrap();
        let ledger = ledger(&dir);
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let l = ledger.clone();
                thread::spawn(move || {
                    for i in 0..5 {
                        l.append(note(&format!("{t}-{i}"))).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let mut seqs: Vec<_> = ledger.list().unwrap().iter().filter_map(|r| r.sequence()).collect();
        seqs.sort_unstable();
        assert_eq!(seqs, (1..=20).collect::<Vec<u64>>());
    }

    #[test]
    fn evidence_id_parsing() {
        assert_eq!(parse_evidence_id("E42"), Some(42));
        assert_eq!(parse_evidence_id("E"), None);
        assert_eq!(parse_evidence_id("E-1"), None);
        assert_eq!(parse_evidence_id("e3"), None);
    }
}
