//! Mission memory: the evidence ledger and the report assembled from it.

pub mod evidence;
pub mod report;

pub use evidence::{EvidenceLedger, EvidenceRecord, LedgerError, NewEvidence, parse_evidence_id};
pub use report::{Claim, MissionReport, QUESTION_KEY, ReportBuilder};
