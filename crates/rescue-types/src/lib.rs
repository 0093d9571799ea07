use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

// ────────────────────────────────────────────────────────────────────────────
// Mission phases
// ────────────────────────────────────────────────────────────────────────────

/// The discrete stages of a rescue mission, in their nominal order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum MissionPhase {
    Search,
    Approach,
    ClearDebris,
    AssistCommunicate,
    Document,
    Report,
    Done,
}

impl MissionPhase {
    pub const ALL: [MissionPhase; 7] = [
        MissionPhase::Search,
        MissionPhase::Approach,
        MissionPhase::ClearDebris,
        MissionPhase::AssistCommunicate,
        MissionPhase::Document,
        MissionPhase::Report,
        MissionPhase::Done,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MissionPhase::Search => "search",
            MissionPhase::Approach => "approach",
            MissionPhase::ClearDebris => "clear_debris",
            MissionPhase::AssistCommunicate => "assist_communicate",
            MissionPhase::Document => "document",
            MissionPhase::Report => "report",
            MissionPhase::Done => "done",
        }
    }

    /// Lenient lookup: surrounding whitespace and letter case are ignored.
    pub fn from_name(name: &str) -> Option<Self> {
        let wanted = name.trim().to_lowercase();
        Self::ALL.into_iter().find(|p| p.as_str() == wanted)
    }

    /// The phase that follows this one in nominal order (`None` for `Done`).
    pub fn next(&self) -> Option<Self> {
        let idx = Self::ALL.iter().position(|p| p == self)?;
        Self::ALL.get(idx + 1).copied()
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, MissionPhase::Done)
    }

    /// Sentence spoken aloud when the robot enters this phase.
    pub fn announcement(&self) -> &'static str {
        match self {
            MissionPhase::Search => "Looking for person.",
            MissionPhase::Approach => "Person detected. Approaching.",
            MissionPhase::ClearDebris => "Assessing debris.",
            MissionPhase::AssistCommunicate => {
                "Figuring out your medical condition. I will ask a few questions."
            }
            MissionPhase::Document => "Capturing images for the medics.",
            MissionPhase::Report => "Sending report to command center.",
            MissionPhase::Done => "Mission complete. Standing by.",
        }
    }
}

impl fmt::Display for MissionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the mission's phase log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseTransition {
    pub from: MissionPhase,
    pub to: MissionPhase,
    /// e.g. "human_detected", "timeout", "manual_next"
    pub reason: String,
    /// Seconds since mission start.
    pub elapsed_s: f64,
}

// ────────────────────────────────────────────────────────────────────────────
// Reasoner proposals and sanitized decisions
// ────────────────────────────────────────────────────────────────────────────

/// The closed set of actions a reasoning collaborator may propose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ProposedAction {
    Stop,
    RotateLeft,
    RotateRight,
    ForwardSlow,
    BackUp,
    Wait,
    Ask,
    Say,
}

impl ProposedAction {
    pub const ALL: [ProposedAction; 8] = [
        ProposedAction::Stop,
        ProposedAction::RotateLeft,
        ProposedAction::RotateRight,
        ProposedAction::ForwardSlow,
        ProposedAction::BackUp,
        ProposedAction::Wait,
        ProposedAction::Ask,
        ProposedAction::Say,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProposedAction::Stop => "stop",
            ProposedAction::RotateLeft => "rotate_left",
            ProposedAction::RotateRight => "rotate_right",
            ProposedAction::ForwardSlow => "forward_slow",
            ProposedAction::BackUp => "back_up",
            ProposedAction::Wait => "wait",
            ProposedAction::Ask => "ask",
            ProposedAction::Say => "say",
        }
    }

    /// Trimmed, case-insensitive lookup against the allow-list.
    pub fn from_name(name: &str) -> Option<Self> {
        let wanted = name.trim().to_lowercase();
        Self::ALL.into_iter().find(|a| a.as_str() == wanted)
    }

    /// `true` for actions that put words in the robot's mouth.
    pub fn is_verbal(&self) -> bool {
        matches!(self, ProposedAction::Ask | ProposedAction::Say)
    }
}

impl fmt::Display for ProposedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shape the reasoning collaborator is asked to produce.
///
/// This is only advertised as a JSON schema; replies are treated as untrusted
/// `serde_json::Value`s and go through the guardrail before use.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ActionProposal {
    pub action: ProposedAction,
    /// Self-reported confidence in [0, 1].
    pub confidence: f64,
    /// Sentence to speak for `ask` / `say`.
    pub say: Option<String>,
    /// Seconds to listen for a reply after speaking.
    pub wait_for_response_s: Option<f64>,
    /// Suggested phase to move to.
    pub next_phase: Option<MissionPhase>,
}

/// A proposal that passed the guardrail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SanitizedDecision {
    pub action: ProposedAction,
    /// Passed through as given (0.0 when absent).
    pub confidence: f64,
    pub say: Option<String>,
    pub wait_for_response_s: Option<f64>,
    pub next_phase: Option<MissionPhase>,
}

// ────────────────────────────────────────────────────────────────────────────
// Action capability vocabulary
// ────────────────────────────────────────────────────────────────────────────

/// Outcome of a single capability invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    pub success: bool,
    pub details: serde_json::Value,
    /// `true` when no physical robot acted on the call.
    pub simulated: bool,
}

impl ActionResult {
    pub fn ok(details: serde_json::Value, simulated: bool) -> Self {
        Self {
            success: true,
            details,
            simulated,
        }
    }

    pub fn failed(details: serde_json::Value, simulated: bool) -> Self {
        Self {
            success: false,
            details,
            simulated,
        }
    }
}

/// Planar robot pose in the mission frame.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    pub x: f64,
    pub y: f64,
    /// Heading in radians.
    pub yaw: f64,
}

impl Pose {
    pub fn new(x: f64, y: f64, yaw: f64) -> Self {
        Self { x, y, yaw }
    }

    /// Pose reached by travelling `distance` metres along `bearing` (relative
    /// to the current heading), facing the direction of travel.
    pub fn offset(&self, distance: f64, bearing: f64) -> Self {
        let heading = self.yaw + bearing;
        Self {
            x: self.x + distance * heading.cos(),
            y: self.y + distance * heading.sin(),
            yaw: heading,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebrisStrategy {
    Push,
    Lift,
    MarkOnly,
}

impl DebrisStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            DebrisStrategy::Push => "push",
            DebrisStrategy::Lift => "lift",
            DebrisStrategy::MarkOnly => "mark_only",
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Evidence and triage answers
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceKind {
    Image,
    Audio,
    Text,
    ModelOutput,
    OperatorNote,
}

/// A parsed triage answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Bool(bool),
    Scale(u8),
    Text(String),
}

impl AnswerValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AnswerValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for AnswerValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnswerValue::Bool(true) => f.write_str("yes"),
            AnswerValue::Bool(false) => f.write_str("no"),
            AnswerValue::Scale(n) => write!(f, "{n}/10"),
            AnswerValue::Text(t) => f.write_str(t),
        }
    }
}

/// Question key → parsed answer. Ordered so reports are stable.
pub type TriageAnswers = BTreeMap<String, AnswerValue>;

// ────────────────────────────────────────────────────────────────────────────
// Telemetry events
// ────────────────────────────────────────────────────────────────────────────

/// Unified event wrapper for the mission telemetry bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissionEvent {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// e.g. "rescue-runtime::mission"
    pub source: String,
    pub payload: EventPayload,
}

impl MissionEvent {
    pub fn new(source: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: source.into(),
            payload,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventPayload {
    PhaseChanged {
        from: MissionPhase,
        to: MissionPhase,
        reason: String,
    },
    Utterance {
        text: String,
        reason: String,
    },
    VictimResponse {
        text: String,
    },
    ActionCalled {
        action: String,
        success: bool,
        reason: String,
    },
    EvidenceRecorded {
        evidence_id: String,
        summary: Option<String>,
    },
    /// Rejected proposals, denied transitions and similar notices.
    Notice {
        message: String,
    },
}

impl EventPayload {
    pub fn notice(message: impl Into<String>) -> Self {
        EventPayload::Notice {
            message: message.into(),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

/// Cross-crate error type.
#[derive(Error, Debug, Serialize, Deserialize)]
pub enum RescueError {
    #[error("Transition denied: {from} -> {to}")]
    TransitionDenied { from: MissionPhase, to: MissionPhase },

    #[error("Capability failure on {action}: {details}")]
    CapabilityFailed { action: String, details: String },

    #[error("Serialization Error: {0}")]
    Serialization(String),

    #[error("Configuration Error: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_names_are_lenient() {
        assert_eq!(MissionPhase::from_name("  Clear_Debris "), Some(MissionPhase::ClearDebris));
        assert_eq!(MissionPhase::from_name("DONE"), Some(MissionPhase::Done));
        assert_eq!(MissionPhase::from_name("lunch"), None);
    }

    #[test]
    fn phases_advance_in_nominal_order() {
        assert_eq!(MissionPhase::Search.next(), Some(MissionPhase::Approach));
        assert_eq!(MissionPhase::Report.next(), Some(MissionPhase::Done));
        assert_eq!(MissionPhase::Done.next(), None);
        assert!(MissionPhase::Done.is_terminal());
    }

    #[test]
    fn phase_serializes_as_snake_case() {
        let json = serde_json::to_string(&MissionPhase::AssistCommunicate).unwrap();
        assert_eq!(json, "\"assist_communicate\"");
    }

    #[test]
    fn proposed_action_lookup_ignores_case_and_whitespace() {
        assert_eq!(ProposedAction::from_name(" ROTATE_LEFT"), Some(ProposedAction::RotateLeft));
        assert_eq!(ProposedAction::from_name("jump"), None);
        assert!(ProposedAction::Ask.is_verbal());
        assert!(!ProposedAction::BackUp.is_verbal());
    }

    #[test]
    fn pose_offset_moves_along_heading() {
        let p = Pose::new(1.0, 2.0, 0.0).offset(2.0, 0.0);
        assert!((p.x - 3.0).abs() < 1e-9);
        assert!((p.y - 2.0).abs() < 1e-9);

        let q = Pose::default().offset(1.0, std::f64::consts::FRAC_PI_2);
        assert!(q.x.abs() < 1e-9);
        assert!((q.y - 1.0).abs() < 1e-9);
    }

    #[test]
    fn answer_values_serialize_untagged() {
        let mut answers = TriageAnswers::new();
        answers.insert("consent_photos".into(), AnswerValue::Bool(true));
        answers.insert("pain_scale".into(), AnswerValue::Scale(7));
        answers.insert("initial".into(), AnswerValue::Text("my leg".into()));
        let json = serde_json::to_value(&answers).unwrap();
        assert_eq!(json["consent_photos"], true);
        assert_eq!(json["pain_scale"], 7);
        assert_eq!(json["initial"], "my leg");
    }

    #[test]
    fn event_payload_is_tagged_by_kind() {
        let event = MissionEvent::new(
            "rescue-runtime::mission",
            EventPayload::PhaseChanged {
                from: MissionPhase::Search,
                to: MissionPhase::Approach,
                reason: "human_detected".into(),
            },
        );
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["payload"]["kind"], "phase_changed");
        assert_eq!(json["payload"]["to"], "approach");
    }

    #[test]
    fn notice_serializes_with_message_field() {
        let event = MissionEvent::new("test", EventPayload::notice("proposal rejected"));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["payload"]["kind"], "notice");
        assert_eq!(json["payload"]["message"], "proposal rejected");
    }

    #[test]
    fn rescue_error_display() {
        let err = RescueError::TransitionDenied {
            from: MissionPhase::Document,
            to: MissionPhase::Search,
        };
        assert!(err.to_string().contains("document -> search"));

        let err2 = RescueError::CapabilityFailed {
            action: "navigate_to".into(),
            details: "bridge unreachable".into(),
        };
        assert!(err2.to_string().contains("navigate_to"));

        let err3 = RescueError::Config("bad toml".into());
        assert_eq!(err3.to_string(), "Configuration Error: bad toml");
    }
}
