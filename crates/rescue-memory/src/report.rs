//! Report assembly – turns the evidence ledger and triage answers into an
//! ordered list of evidence-cited claims.
//!
//! A claim that cannot cite at least one evidence id is dropped.  Claims are
//! ordered by the earliest evidence they cite, so the report reads in the
//! order things were observed.

use chrono::{DateTime, Utc};
use rescue_types::{MissionPhase, PhaseTransition, TriageAnswers};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::evidence::EvidenceRecord;

/// Metadata key linking a dialogue evidence record to its triage question.
pub const QUESTION_KEY: &str = "question_key";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    pub statement: String,
    /// Never empty.
    pub evidence_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissionReport {
    pub session_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub final_phase: MissionPhase,
    pub phase_log: Vec<PhaseTransition>,
    pub triage_answers: TriageAnswers,
    pub claims: Vec<Claim>,
    pub evidence: Vec<EvidenceRecord>,
}

impl MissionReport {
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

pub struct ReportBuilder {
    session_id: Uuid,
    final_phase: MissionPhase,
    phase_log: Vec<PhaseTransition>,
    answers: TriageAnswers,
    extra: Vec<Claim>,
}

impl ReportBuilder {
    pub fn new(session_id: Uuid) -> Self {
        Self {
            session_id,
            final_phase: MissionPhase::Report,
            phase_log: Vec::new(),
            answers: TriageAnswers::new(),
            extra: Vec::new(),
        }
    }

    pub fn final_phase(mut self, phase: MissionPhase) -> Self {
        self.final_phase = phase;
        self
    }

    pub fn phase_log(mut self, log: &[PhaseTransition]) -> Self {
        self.phase_log = log.to_vec();
        self
    }

    pub fn answers(mut self, answers: &TriageAnswers) -> Self {
        self.answers = answers.clone();
        self
    }

    /// An additional claim.  Ids not present in the ledger are discarded when
    /// the report is built.
    pub fn claim(mut self, statement: impl Into<String>, evidence_ids: Vec<String>) -> Self {
        self.extra.push(Claim {
            statement: statement.into(),
            evidence_ids,
        });
        self
    }

    pub fn build(self, evidence: Vec<EvidenceRecord>) -> MissionReport {
        let mut claims = Vec::new();

        // Observations that stand on their own.
        for record in &evidence {
            if record.metadata.contains_key(QUESTION_KEY) || record.summary.trim().is_empty() {
                continue;
            }
            claims.push(Claim {
                statement: record.summary.clone(),
                evidence_ids: vec![record.id.clone()],
            });
        }

        // Triage answers, cited by the dialogue records that produced them.
        for (key, value) in &self.answers {
            let ids: Vec<String> = evidence
                .iter()
                .filter(|r| r.metadata.get(QUESTION_KEY).and_then(Value::as_str) == Some(key.as_str()))
                .map(|r| r.id.clone())
                .collect();
            if ids.is_empty() {
                debug!(question = %key, "dropping uncited triage answer from report");
                continue;
            }
            claims.push(Claim {
                statement: format!("{key}: {value}"),
                evidence_ids: ids,
            });
        }

        for mut claim in self.extra {
            claim.evidence_ids.retain(|id| evidence.iter().any(|r| &r.id == id));
            if claim.evidence_ids.is_empty() {
                debug!(statement = %claim.statement, "dropping uncited claim from report");
                continue;
            }
            claims.push(claim);
        }

        claims.sort_by_key(|c| first_citation(c, &evidence));

        MissionReport {
            session_id: self.session_id,
            generated_at: Utc::now(),
            final_phase: self.final_phase,
            phase_log: self.phase_log,
            triage_answers: self.answers,
            claims,
            evidence,
        }
    }
}

/// Ledger position of the earliest record a claim cites.
fn first_citation(claim: &Claim, evidence: &[EvidenceRecord]) -> usize {
    claim
        .evidence_ids
        .iter()
        .filter_map(|id| evidence.iter().position(|r| &r.id == id))
        .min()
        .unwrap_or(usize::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rescue_types::{AnswerValue, EvidenceKind};
    use serde_json::{Map, json};

    fn record(id: &str, kind: EvidenceKind, summary: &str, question: Option<&str>) -> EvidenceRecord {
        let mut metadata = Map::new();
        if let Some(q) = question {
            metadata.insert(QUESTION_KEY.into(), json!(q));
        }
        EvidenceRecord {
            id: id.into(),
            timestamp: 0.0,
            kind,
            source: "test".into(),
            file_path: String::new(),
            confidence: 0.9,
            summary: summary.into(),
            metadata,
        }
    }

    #[test]
    fn every_claim_cites_existing_evidence() {
        let evidence = vec![
            record("E1", EvidenceKind::ModelOutput, "Person detected", None),
            record("E2", EvidenceKind::Text, "Breathing difficulty reported.", Some("breathing_difficulty")),
            record("E3", EvidenceKind::Image, "", None),
        ];
        let mut answers = TriageAnswers::new();
        answers.insert("breathing_difficulty".into(), AnswerValue::Bool(true));
        answers.insert("mobility".into(), AnswerValue::Bool(false));

        let report = ReportBuilder::new(Uuid::new_v4())
            .answers(&answers)
            .claim("Photo of left leg", vec!["E3".into()])
            .claim("Invented", vec!["E99".into()])
            .build(evidence);

        let statements: Vec<_> = report.claims.iter().map(|c| c.statement.as_str()).collect();
        assert_eq!(statements, vec!["Person detected", "breathing_difficulty: yes", "Photo of left leg"]);
        for claim in &report.claims {
            assert!(!claim.evidence_ids.is_empty());
        }
        // Uncited answers stay in the raw answer map but make no claim.
        assert!(report.triage_answers.contains_key("mobility"));
    }

    #[test]
    fn answer_claims_cite_every_matching_record() {
        let evidence = vec![
            record("E1", EvidenceKind::Text, "Pain level noted.", Some("pain_scale")),
            record("E2", EvidenceKind::Text, "Pain level noted.", Some("pain_scale")),
        ];
        let mut answers = TriageAnswers::new();
        answers.insert("pain_scale".into(), AnswerValue::Scale(7));

        let report = ReportBuilder::new(Uuid::new_v4()).answers(&answers).build(evidence);
        assert_eq!(report.claims.len(), 1);
        assert_eq!(report.claims[0].statement, "pain_scale: 7/10");
        assert_eq!(report.claims[0].evidence_ids, vec!["E1", "E2"]);
    }

    #[test]
    fn empty_ledger_yields_no_claims() {
        let report = ReportBuilder::new(Uuid::new_v4())
            .final_phase(MissionPhase::Report)
            .build(Vec::new());
        assert!(report.claims.is_empty());
        assert_eq!(report.to_json()["final_phase"], "report");
    }
}
