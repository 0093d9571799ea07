//! [`TriageSession`] – the stateful conversation built on [`DialogueRunner`].
//!
//! The session holds the step index, the key of the question awaiting a
//! reply and every answer collected so far.  On top of the plain runner it
//! inserts at most one body-part follow-up per question.

use rescue_types::{AnswerValue, TriageAnswers};
use tracing::debug;

use crate::followup::{
    body_part_key, detail_key, detect_body_part, should_insert_followup, FOLLOWUP_QUESTION,
};
use crate::runner::{DialogueRunner, Instruction, RunnerOutput};
use crate::script::TriageScript;

/// One turn of the conversation.
#[derive(Debug, Clone, PartialEq)]
pub struct DialogueTurn {
    pub instruction: Instruction,
    pub utterance: Option<String>,
    /// Answers recorded while producing this turn, with the raw reply they
    /// came from.
    pub recorded: Vec<RecordedAnswer>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedAnswer {
    pub key: String,
    pub value: AnswerValue,
    pub reply: String,
}

/// Stateful triage conversation.
///
/// # Example
///
/// ```
/// use rescue_dialogue::runner::Instruction;
/// use rescue_dialogue::script::TriageScript;
/// use rescue_dialogue::session::TriageSession;
///
/// let mut session = TriageSession::new(TriageScript::linear());
/// let turn = session.advance(None);
/// assert_eq!(turn.instruction, Instruction::Ask);
///
/// let turn = session.advance(Some("I'm stuck under a beam"));
/// assert_eq!(turn.instruction, Instruction::Say);
/// assert!(session.answers().contains_key("initial"));
/// ```
#[derive(Debug, Clone)]
pub struct TriageSession {
    script: TriageScript,
    step_index: usize,
    pending_key: Option<String>,
    /// Parent question of an outstanding follow-up.
    followup_for: Option<String>,
    answers: TriageAnswers,
    finished: bool,
}

impl TriageSession {
    pub fn new(script: TriageScript) -> Self {
        Self {
            script,
            step_index: 0,
            pending_key: None,
            followup_for: None,
            answers: TriageAnswers::new(),
            finished: false,
        }
    }

    pub fn script(&self) -> &TriageScript {
        &self.script
    }

    pub fn answers(&self) -> &TriageAnswers {
        &self.answers
    }

    pub fn step_index(&self) -> usize {
        self.step_index
    }

    pub fn pending_key(&self) -> Option<&str> {
        self.pending_key.as_deref()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Feed the reply to the previous turn (if any) and get the next turn.
    pub fn advance(&mut self, reply: Option<&str>) -> DialogueTurn {
        let reply = reply.map(str::trim).filter(|r| !r.is_empty());
        let mut recorded = Vec::new();

        // Reply to a follow-up: store it verbatim, then resume the script.
        if let Some(parent) = self.followup_for.take() {
            if let Some(text) = reply {
                self.record(&mut recorded, detail_key(&parent), AnswerValue::Text(text.into()), text);
            }
            self.pending_key = None;
            let out = self.run(None);
            return self.finish_turn(out, recorded);
        }

        let pending = self.pending_key.take();
        let out = self.run_with(reply, pending.as_deref());
        for (key, value) in &out.answers_delta {
            self.record(&mut recorded, key.clone(), value.clone(), reply.unwrap_or_default());
        }

        if let (Some(text), Some(key)) = (reply, pending.as_deref()) {
            if should_insert_followup(key, text) {
                if let Some(part) = detect_body_part(text) {
                    self.record(
                        &mut recorded,
                        body_part_key(key),
                        AnswerValue::Text(part.to_string()),
                        text,
                    );
                }
                debug!(question = key, "inserting body-part follow-up");
                // Hold the script position; the runner output is discarded
                // and recomputed once the follow-up is answered.
                self.followup_for = Some(key.to_string());
                self.pending_key = Some(detail_key(key));
                return DialogueTurn {
                    instruction: Instruction::Ask,
                    utterance: Some(FOLLOWUP_QUESTION.to_string()),
                    recorded,
                };
            }
        }

        self.finish_turn(out, recorded)
    }

    fn run(&self, reply: Option<&str>) -> RunnerOutput {
        self.run_with(reply, None)
    }

    fn run_with(&self, reply: Option<&str>, pending: Option<&str>) -> RunnerOutput {
        DialogueRunner::new(&self.script).step(self.step_index, reply, pending, &self.answers)
    }

    fn record(&mut self, recorded: &mut Vec<RecordedAnswer>, key: String, value: AnswerValue, reply: &str) {
        self.answers.insert(key.clone(), value.clone());
        recorded.push(RecordedAnswer {
            key,
            value,
            reply: reply.to_string(),
        });
    }

    fn finish_turn(&mut self, out: RunnerOutput, recorded: Vec<RecordedAnswer>) -> DialogueTurn {
        self.step_index = out.next_step_index;
        self.pending_key = out.pending_question_key;
        self.finished = out.instruction == Instruction::Done;
        DialogueTurn {
            instruction: out.instruction,
            utterance: out.utterance,
            recorded,
        }
    }
}
