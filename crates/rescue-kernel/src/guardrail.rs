//! Guardrail – the only path from an untrusted reasoner proposal to a
//! [`SanitizedDecision`].
//!
//! Proposals arrive as arbitrary JSON.  [`validate`] never fails and never
//! panics: anything it cannot make sense of yields `None`, which the caller
//! treats as "no advice this tick" and falls through to deterministic
//! behaviour.
//!
//! Checks, in order:
//!
//! 1. The proposal must be a JSON object with an `action` string that matches
//!    the allow-list after trimming and lowercasing.  Otherwise the whole
//!    proposal is rejected.
//! 2. `confidence` is coerced to a float (0.0 when absent or unusable).
//! 3. `say` is trimmed, dropped when empty, and capped at [`MAX_SAY_CHARS`].
//! 4. `wait_for_response_s` is coerced to a float and clamped into
//!    `[WAIT_FOR_RESPONSE_MIN_S, WAIT_FOR_RESPONSE_MAX_S]`; unusable values
//!    are dropped.
//! 5. `next_phase` is kept only when it names a known phase.
//!
//! Optional fields never cause the proposal as a whole to be rejected.
//!
//! # Example
//!
//! ```
//! use rescue_kernel::guardrail;
//! use rescue_types::ProposedAction;
//! use serde_json::json;
//!
//! let raw = json!({ "action": " ASK ", "say": "  Can you hear me? ", "wait_for_response_s": 99 });
//! let decision = guardrail::validate(Some(&raw)).unwrap();
//! assert_eq!(decision.action, ProposedAction::Ask);
//! assert_eq!(decision.say.as_deref(), Some("Can you hear me?"));
//! assert_eq!(decision.wait_for_response_s, Some(25.0));
//!
//! assert!(guardrail::validate(Some(&json!({ "action": "self_destruct" }))).is_none());
//! ```

use std::fmt;

use rescue_types::{MissionPhase, ProposedAction, SanitizedDecision};
use serde_json::Value;

pub const WAIT_FOR_RESPONSE_MIN_S: f64 = 0.0;
pub const WAIT_FOR_RESPONSE_MAX_S: f64 = 25.0;
pub const MAX_SAY_CHARS: usize = 500;

/// Why a proposal was thrown away.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// The reasoner produced nothing.
    Missing,
    /// The proposal was valid JSON but not an object.
    NotAnObject,
    /// No `action` field, or it was not a string.
    MissingAction,
    /// `action` is not on the allow-list.
    UnknownAction(String),
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::Missing => f.write_str("no proposal"),
            Rejection::NotAnObject => f.write_str("proposal is not an object"),
            Rejection::MissingAction => f.write_str("proposal has no action"),
            Rejection::UnknownAction(a) => write!(f, "action {a:?} is not allowed"),
        }
    }
}

/// Sanitize `proposal`, or return `None` when it must be ignored entirely.
pub fn validate(proposal: Option<&Value>) -> Option<SanitizedDecision> {
    inspect(proposal).ok()
}

/// Like [`validate`], but reports why a proposal was rejected so the caller
/// can log it.
pub fn inspect(proposal: Option<&Value>) -> Result<SanitizedDecision, Rejection> {
    let obj = proposal
        .ok_or(Rejection::Missing)?
        .as_object()
        .ok_or(Rejection::NotAnObject)?;

    let action_name = obj
        .get("action")
        .and_then(Value::as_str)
        .ok_or(Rejection::MissingAction)?;
    let action = ProposedAction::from_name(action_name)
        .ok_or_else(|| Rejection::UnknownAction(action_name.trim().to_string()))?;

    let confidence = obj.get("confidence").and_then(coerce_f64).unwrap_or(0.0);

    let say = obj
        .get("say")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.chars().take(MAX_SAY_CHARS).collect::<String>());

    let wait_for_response_s = obj
        .get("wait_for_response_s")
        .and_then(coerce_f64)
        .filter(|w| !w.is_nan())
        .map(|w| w.clamp(WAIT_FOR_RESPONSE_MIN_S, WAIT_FOR_RESPONSE_MAX_S));

    let next_phase = obj
        .get("next_phase")
        .and_then(Value::as_str)
        .and_then(MissionPhase::from_name);

    Ok(SanitizedDecision {
        action,
        confidence,
        say,
        wait_for_response_s,
        next_phase,
    })
}

/// Numbers pass through; numeric strings are parsed; everything else is unusable.
fn coerce_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}
