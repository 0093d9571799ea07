//! `rescue-runtime` – The Mission Loop
//!
//! Drives a found-person rescue through its phases: search, approach, clear
//! debris, talk the person through triage, document injuries and report to
//! the command center.
//!
//! # Modules
//!
//! - [`mission`] – [`MissionController`][mission::MissionController]:
//!   the phase-sequenced loop.  Each tick checks the phase deadline, asks the
//!   reasoner (if enabled), and otherwise runs the phase's deterministic
//!   behaviour.  Every action goes through an
//!   [`ActionCapability`][rescue_hal::ActionCapability] and every failure is
//!   handled by the [`PhasePolicy`][rescue_kernel::PhasePolicy].
//! - [`reasoner`] – [`Reasoner`][reasoner::Reasoner]:
//!   the advisory model.  [`LlmReasoner`][reasoner::LlmReasoner] talks to an
//!   OpenAI-compatible chat endpoint with
//!   [`SAFETY_RULES`][reasoner::SAFETY_RULES] as the system prompt and the
//!   [`ActionProposal`][rescue_types::ActionProposal] JSON Schema injected via
//!   `response_format`.  Proposals are untrusted and always pass through
//!   [`guardrail::inspect`][rescue_kernel::guardrail::inspect].
//! - [`config`] – [`MissionConfig`][config::MissionConfig]: timeouts,
//!   thresholds and motion steps.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]:
//!   initialises the global `tracing` subscriber with an optional OTLP span
//!   exporter.  Set `OTEL_EXPORTER_OTLP_ENDPOINT` to enable live trace export.

pub mod config;
pub mod mission;
pub mod reasoner;
pub mod telemetry;

pub use config::MissionConfig;
pub use mission::{MissionController, TickInput, CALLOUT_UTTERANCE, CLOSING_UTTERANCE, SILENCE_UTTERANCE};
pub use reasoner::{
    ChatMessage, LlmReasoner, ObservationSummary, Reasoner, ReasonerError, ReasoningRequest, Role,
    ScriptedReasoner, SAFETY_RULES,
};
pub use telemetry::{init_tracing, TracerProviderGuard};
