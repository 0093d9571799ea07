//! `rescue-kernel` – Safety & Phase Policy
//!
//! The rule layer of the rescue robot.  It does not think; it decides what
//! the mission is allowed to do.
//!
//! # Modules
//!
//! - [`guardrail`] – [`validate`][guardrail::validate]: the single
//!   interception point for reasoner proposals.  Anything that is not on the
//!   action allow-list is dropped; optional fields are trimmed, capped and
//!   clamped into a [`SanitizedDecision`][rescue_types::SanitizedDecision].
//! - [`phase_policy`] – [`PhasePolicy`][phase_policy::PhasePolicy]:
//!   the declarative transition table (allowed edges, per-phase timeouts,
//!   fallback targets and failure handling).
//! - [`phase_clock`] – [`PhaseClock`][phase_clock::PhaseClock]:
//!   tracks time spent in the current phase and reports when it has run past
//!   its timeout.
//! - [`loop_guard`] – [`LoopGuard`][loop_guard::LoopGuard]: detects a
//!   reasoner that keeps proposing the same thing.

pub mod guardrail;
pub mod loop_guard;
pub mod phase_clock;
pub mod phase_policy;

pub use guardrail::{validate, Rejection};
pub use loop_guard::LoopGuard;
pub use phase_clock::{Interval, PhaseClock, PhaseHealth};
pub use phase_policy::{FailurePolicy, PhasePolicy};
