//! Triage scripts: ordered questions plus acknowledgement markers.
//!
//! Two built-in scripts are provided:
//!
//! - [`TriageScript::linear`] – a short fixed questionnaire.
//! - [`TriageScript::march`] – a MARCH-ordered assessment (Massive
//!   hemorrhage, Airway, Respiration, Circulation, Head/Hypothermia) with a
//!   conditional follow-up on bleeding location.
//!
//! Scripts are built once and never mutated.

use rescue_types::{AnswerValue, TriageAnswers};
use serde::{Deserialize, Serialize};

use crate::parser::AnswerType;

/// Spoken when the runner reaches an acknowledgement marker.
pub const ACKNOWLEDGE_UTTERANCE: &str = "Noted. Sending to command center.";

/// Predicate over the answers collected so far.
pub type StepCondition = fn(&TriageAnswers) -> bool;

/// A single question in a script.
#[derive(Debug, Clone)]
pub struct TriageStep {
    pub key: &'static str,
    pub question: &'static str,
    pub expected: AnswerType,
    /// When set, the step is asked only if this returns `true`.
    pub condition: Option<StepCondition>,
}

impl TriageStep {
    pub fn new(key: &'static str, question: &'static str, expected: AnswerType) -> Self {
        Self {
            key,
            question,
            expected,
            condition: None,
        }
    }

    /// Ask this step only when `condition` holds.
    pub fn when(mut self, condition: StepCondition) -> Self {
        self.condition = Some(condition);
        self
    }

    /// Steps without a condition are always asked.
    pub fn applies(&self, answers: &TriageAnswers) -> bool {
        self.condition.is_none_or(|rule| rule(answers))
    }
}

#[derive(Debug, Clone)]
pub enum ScriptEntry {
    Question(TriageStep),
    /// Say [`ACKNOWLEDGE_UTTERANCE`] and continue.
    Acknowledge,
}

/// Which built-in script a mission uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptKind {
    Linear,
    #[default]
    March,
}

impl ScriptKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "linear" => Some(ScriptKind::Linear),
            "march" => Some(ScriptKind::March),
            _ => None,
        }
    }
}

/// An immutable, ordered triage questionnaire.
#[derive(Debug, Clone)]
pub struct TriageScript {
    name: String,
    entries: Vec<ScriptEntry>,
}

impl TriageScript {
    pub fn new(name: impl Into<String>, entries: Vec<ScriptEntry>) -> Self {
        Self {
            name: name.into(),
            entries,
        }
    }

    pub fn from_kind(kind: ScriptKind) -> Self {
        match kind {
            ScriptKind::Linear => Self::linear(),
            ScriptKind::March => Self::march(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entries(&self) -> &[ScriptEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ScriptEntry> {
        self.entries.get(index)
    }

    /// Look up a question by key.
    pub fn step(&self, key: &str) -> Option<&TriageStep> {
        self.entries.iter().find_map(|e| match e {
            ScriptEntry::Question(step) if step.key == key => Some(step),
            _ => None,
        })
    }

    pub fn linear() -> Self {
        use AnswerType::*;
        Self::new(
            "linear",
            vec![
                q("initial", "Are you hurt? Do you need help?", FreeText),
                ScriptEntry::Acknowledge,
                q("consent_photos", "Is it okay if I take photos to help medics triage you?", YesNo),
                q(
                    "immediate_danger",
                    "Do you see or smell fire, smoke, water, or unstable debris nearby?",
                    YesNo,
                ),
                q("breathing_difficulty", "Are you having any trouble breathing?", YesNo),
                q("bleeding", "Are you bleeding heavily? If yes, where?", FreeText),
                q("pain", "Where does it hurt most?", FreeText),
                q("pain_scale", "Rate your pain from 0 to 10.", Scale0To10),
                q("mobility", "Can you move your arms and legs? Are you trapped or pinned?", FreeText),
            ],
        )
    }

    pub fn march() -> Self {
        use AnswerType::*;
        Self::new(
            "march",
            vec![
                q("initial", "Are you hurt? Do you need help?", FreeText),
                ScriptEntry::Acknowledge,
                q("massive_bleeding", "Is there heavy bleeding right now?", YesNo),
                ScriptEntry::Question(
                    TriageStep::new("massive_bleeding_where", "Where is the bleeding?", FreeText)
                        .when(heavy_bleeding_reported),
                ),
                q("airway_talking", "Can you talk to me clearly?", YesNo),
                q("breathing_trouble", "Are you having trouble breathing?", YesNo),
                q("chest_injury", "Any chest injury or a hole in the chest?", YesNo),
                q("shock_signs", "Do you feel dizzy, faint, or very cold and clammy?", YesNo),
                q("small_bleeds", "Any other bleeding or wounds I should know about?", FreeText),
                q("head_injury", "Did you hit your head or black out?", YesNo),
                q("keep_warm", "Are you feeling very cold right now?", YesNo),
                q("pain", "Where does it hurt most?", FreeText),
                q("pain_scale", "Rate your pain from 0 to 10.", Scale0To10),
                q("mobility", "Can you move your arms and legs? Are you trapped or pinned?", FreeText),
                q("consent_photos", "Is it okay if I take photos to help medics triage you?", YesNo),
            ],
        )
    }
}

fn q(key: &'static str, question: &'static str, expected: AnswerType) -> ScriptEntry {
    ScriptEntry::Question(TriageStep::new(key, question, expected))
}

fn heavy_bleeding_reported(answers: &TriageAnswers) -> bool {
    matches!(answers.get("massive_bleeding"), Some(AnswerValue::Bool(true)))
}
