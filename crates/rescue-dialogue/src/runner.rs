//! [`DialogueRunner`] – stateless, single-step advancement through a
//! [`TriageScript`].
//!
//! The caller owns all state (step index, pending question key, answers) and
//! hands it back on every call.  One call:
//!
//! 1. parses the last reply against the pending question's answer type and
//!    reports any extracted value in [`RunnerOutput::answers_delta`],
//! 2. skips questions whose condition is false for the merged answers,
//!    stopping at the first applicable question or acknowledgement marker,
//! 3. emits `Ask`, `Say` or `Done`.
//!
//! A missing or unparseable reply never stalls the script: the question is
//! left unanswered and the runner moves on.

use rescue_types::TriageAnswers;
use serde::{Deserialize, Serialize};

use crate::parser::parse_for;
use crate::script::{ACKNOWLEDGE_UTTERANCE, ScriptEntry, TriageScript};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Instruction {
    Ask,
    Say,
    Done,
}

/// What the robot should do next, plus the state to hand back next time.
#[derive(Debug, Clone, PartialEq)]
pub struct RunnerOutput {
    pub instruction: Instruction,
    pub utterance: Option<String>,
    pub next_step_index: usize,
    pub pending_question_key: Option<String>,
    /// Answers extracted from the reply passed in.
    pub answers_delta: TriageAnswers,
}

/// Walks a borrowed [`TriageScript`].
///
/// # Example
///
/// ```
/// use rescue_dialogue::runner::{DialogueRunner, Instruction};
/// use rescue_dialogue::script::TriageScript;
/// use rescue_types::TriageAnswers;
///
/// let script = TriageScript::march();
/// let runner = DialogueRunner::new(&script);
///
/// let first = runner.step(0, None, None, &TriageAnswers::new());
/// assert_eq!(first.instruction, Instruction::Ask);
/// assert_eq!(first.pending_question_key.as_deref(), Some("initial"));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct DialogueRunner<'a> {
    script: &'a TriageScript,
}

impl<'a> DialogueRunner<'a> {
    pub fn new(script: &'a TriageScript) -> Self {
        Self { script }
    }

    pub fn script(&self) -> &'a TriageScript {
        self.script
    }

    pub fn step(
        &self,
        step_index: usize,
        last_response: Option<&str>,
        pending_question_key: Option<&str>,
        answers: &TriageAnswers,
    ) -> RunnerOutput {
        let mut answers_delta = TriageAnswers::new();

        // 1. Parse the reply to the question we were waiting on.
        let reply = last_response.map(str::trim).filter(|r| !r.is_empty());
        if let (Some(reply), Some(key)) = (reply, pending_question_key) {
            if let Some(step) = self.script.step(key) {
                if let Some(value) = parse_for(step.expected, reply) {
                    answers_delta.insert(step.key.to_string(), value);
                }
            }
        }

        let mut merged = answers.clone();
        merged.extend(answers_delta.clone());

        // 2. Skip questions that do not apply.
        let mut index = step_index;
        while let Some(ScriptEntry::Question(step)) = self.script.get(index) {
            if step.applies(&merged) {
                break;
            }
            index += 1;
        }

        // 3. Emit.
        match self.script.get(index) {
            None => RunnerOutput {
                instruction: Instruction::Done,
                utterance: None,
                next_step_index: index,
                pending_question_key: None,
                answers_delta,
            },
            Some(ScriptEntry::Acknowledge) => RunnerOutput {
                instruction: Instruction::Say,
                utterance: Some(ACKNOWLEDGE_UTTERANCE.to_string()),
                next_step_index: index + 1,
                pending_question_key: None,
                answers_delta,
            },
            Some(ScriptEntry::Question(step)) => RunnerOutput {
                instruction: Instruction::Ask,
                utterance: Some(step.question.to_string()),
                next_step_index: index + 1,
                pending_question_key: Some(step.key.to_string()),
                answers_delta,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use rescue_types::AnswerValue;

    use super::*;
    use crate::parser::AnswerType;
    use crate::script::TriageStep;

    fn short_script() -> TriageScript {
        TriageScript::new(
            "short",
            vec![
                ScriptEntry::Question(TriageStep::new(
                    "initial",
                    "Are you hurt? Do you need help?",
                    AnswerType::FreeText,
                )),
                ScriptEntry::Acknowledge,
                ScriptEntry::Question(TriageStep::new(
                    "consent_photos",
                    "Is it okay if I take photos to help medics triage you?",
                    AnswerType::YesNo,
                )),
            ],
        )
    }

    #[test]
    fn walks_a_short_script_end_to_end() {
        let script = short_script();
        let runner = DialogueRunner::new(&script);
        let mut answers = TriageAnswers::new();

        let out = runner.step(0, None, None, &answers);
        assert_eq!(out.instruction, Instruction::Ask);
        assert_eq!(out.utterance.as_deref(), Some("Are you hurt? Do you need help?"));
        assert_eq!(out.next_step_index, 1);
        assert_eq!(out.pending_question_key.as_deref(), Some("initial"));

        let out = runner.step(1, Some("my leg hurts"), Some("initial"), &answers);
        assert_eq!(out.instruction, Instruction::Say);
        assert_eq!(out.utterance.as_deref(), Some(ACKNOWLEDGE_UTTERANCE));
        assert_eq!(out.next_step_index, 2);
        assert_eq!(
            out.answers_delta.get("initial"),
            Some(&AnswerValue::Text("my leg hurts".into()))
        );
        answers.extend(out.answers_delta);

        let out = runner.step(2, None, None, &answers);
        assert_eq!(out.instruction, Instruction::Ask);
        assert_eq!(out.pending_question_key.as_deref(), Some("consent_photos"));
        assert_eq!(out.next_step_index, 3);

        let out = runner.step(3, Some("yes"), Some("consent_photos"), &answers);
        assert_eq!(out.instruction, Instruction::Done);
        assert_eq!(out.utterance, None);
        assert_eq!(out.answers_delta.get("consent_photos"), Some(&AnswerValue::Bool(true)));
    }

    #[test]
    fn unparseable_reply_moves_on_without_an_answer() {
        let script = short_script();
        let runner = DialogueRunner::new(&script);
        let out = runner.step(3, Some("hmm"), Some("consent_photos"), &TriageAnswers::new());
        assert_eq!(out.instruction, Instruction::Done);
        assert!(out.answers_delta.is_empty());
    }

    #[test]
    fn blank_reply_is_ignored() {
        let script = short_script();
        let runner = DialogueRunner::new(&script);
        let out = runner.step(1, Some("   "), Some("initial"), &TriageAnswers::new());
        assert!(out.answers_delta.is_empty());
        assert_eq!(out.instruction, Instruction::Say);
    }

    #[test]
    fn reply_for_unknown_key_is_ignored() {
        let script = short_script();
        let runner = DialogueRunner::new(&script);
        let out = runner.step(2, Some("yes"), Some("not_in_script"), &TriageAnswers::new());
        assert!(out.answers_delta.is_empty());
        assert_eq!(out.pending_question_key.as_deref(), Some("consent_photos"));
    }

    #[test]
    fn march_skips_bleeding_location_when_bleeding_denied() {
        let script = TriageScript::march();
        let runner = DialogueRunner::new(&script);
        // massive_bleeding was asked at index 2, so the runner resumes at 3.
        let out = runner.step(3, Some("no"), Some("massive_bleeding"), &TriageAnswers::new());
        assert_eq!(out.answers_delta.get("massive_bleeding"), Some(&AnswerValue::Bool(false)));
        assert_eq!(out.pending_question_key.as_deref(), Some("airway_talking"));
    }

    #[test]
    fn march_asks_bleeding_location_when_bleeding_confirmed() {
        let script = TriageScript::march();
        let runner = DialogueRunner::new(&script);
        let out = runner.step(3, Some("yes"), Some("massive_bleeding"), &TriageAnswers::new());
        assert_eq!(out.pending_question_key.as_deref(), Some("massive_bleeding_where"));
        assert_eq!(out.utterance.as_deref(), Some("Where is the bleeding?"));
    }

    #[test]
    fn index_past_the_end_is_done_and_never_moves_back() {
        let script = short_script();
        let runner = DialogueRunner::new(&script);
        let out = runner.step(99, None, None, &TriageAnswers::new());
        assert_eq!(out.instruction, Instruction::Done);
        assert_eq!(out.next_step_index, 99);

        let at_end = runner.step(script.len(), None, None, &TriageAnswers::new());
        assert_eq!(at_end.next_step_index, script.len());
    }

    #[test]
    fn empty_script_is_immediately_done() {
        let script = TriageScript::new("empty", Vec::new());
        let runner = DialogueRunner::new(&script);
        assert_eq!(
            runner.step(0, None, None, &TriageAnswers::new()).instruction,
            Instruction::Done
        );
    }
}
