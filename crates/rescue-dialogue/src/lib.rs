//! `rescue-dialogue` – Deterministic Triage Conversation
//!
//! Scripted, LLM-free questioning of a found person.  Everything here is
//! pure or owns its own state; nothing talks to hardware.
//!
//! # Modules
//!
//! - [`parser`] – yes/no, 0–10 scale and free-text answer extraction.
//! - [`script`] – [`TriageScript`][script::TriageScript]: the built-in
//!   linear and MARCH questionnaires.
//! - [`runner`] – [`DialogueRunner`][runner::DialogueRunner]: stateless
//!   one-step advancement with conditional skipping.
//! - [`followup`] – body-part detection, the location follow-up question and
//!   acknowledgement summaries.
//! - [`session`] – [`TriageSession`][session::TriageSession]: the stateful
//!   conversation the mission drives one turn per tick.

pub mod followup;
pub mod parser;
pub mod runner;
pub mod script;
pub mod session;

pub use parser::AnswerType;
pub use runner::{DialogueRunner, Instruction, RunnerOutput};
pub use script::{ScriptEntry, ScriptKind, TriageScript, TriageStep};
pub use session::{DialogueTurn, RecordedAnswer, TriageSession};
