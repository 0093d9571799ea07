//! The reasoning collaborator – an external model that proposes the next
//! action.
//!
//! Proposals come back as raw [`serde_json::Value`]s.  Nothing here trusts
//! them: the mission passes every proposal through
//! [`rescue_kernel::guardrail`] before acting on it.
//!
//! [`LlmReasoner`] talks to any OpenAI-compatible `/v1/chat/completions`
//! endpoint (OpenAI, [Ollama](https://ollama.com), llama.cpp server) and
//! advertises the [`ActionProposal`] JSON schema through `response_format`.
//!
//! # Example
//!
//! ```rust,no_run
//! use rescue_runtime::reasoner::{LlmReasoner, Reasoner, ReasoningRequest};
//! use rescue_types::MissionPhase;
//!
//! let mut reasoner = LlmReasoner::new("http://localhost:11434", "llama3");
//! let request = ReasoningRequest::new(MissionPhase::Search);
//! // Requires a running model server.
//! let _raw = reasoner.propose(&request);
//! ```

use std::collections::VecDeque;
use std::time::Duration;

use rescue_types::{ActionProposal, MissionPhase, TriageAnswers};
use schemars::schema_for;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, warn};

// ─────────────────────────────────────────────────────────────────────────────
// Safety rules
// ─────────────────────────────────────────────────────────────────────────────

/// System prompt sent with every request.
pub const SAFETY_RULES: &str = "\
You are a disaster response robot performing search and rescue triage.
Propose the next robot action from the observation and conversation state.
Output one JSON object only. Safety is critical: never invent new actions.

Allowed actions: stop, rotate_left, rotate_right, forward_slow, back_up, wait, ask, say.
- ask: the robot speaks and then listens. Set \"say\" and optionally \"wait_for_response_s\" (10 to 18 seconds).
- say: the robot speaks only. Set \"say\" to one short sentence.
- confidence must be between 0 and 1.
- next_phase, when set, must be one of: search, approach, clear_debris, assist_communicate, document, report, done.
- Do not repeat the same action more than 3 times in a row.";

/// Extra instruction appended while talking to the found person.
const DIALOGUE_HINT: &str = "\
You are talking to a victim during triage. Use last_response and triage_answers to ask one short, \
empathetic follow-up question. Use action 'ask' with wait_for_response_s between 12 and 18.";

// ─────────────────────────────────────────────────────────────────────────────
// Error type
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum ReasonerError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Unexpected response format: {0}")]
    BadResponse(String),
}

// ─────────────────────────────────────────────────────────────────────────────
// Request context
// ─────────────────────────────────────────────────────────────────────────────

/// What the robot currently sees, in the reasoner's vocabulary.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ObservationSummary {
    pub person_found: bool,
    pub person_confidence: f64,
    pub person_bearing_rad: Option<f64>,
    pub person_distance_m: Option<f64>,
    pub debris_found: bool,
}

/// Everything the reasoner is told on one call.
#[derive(Debug, Clone, Serialize)]
pub struct ReasoningRequest {
    pub phase: MissionPhase,
    pub last_prompt: Option<String>,
    pub last_response: Option<String>,
    pub triage_answers: TriageAnswers,
    pub triage_step_index: usize,
    pub observation: ObservationSummary,
}

impl ReasoningRequest {
    pub fn new(phase: MissionPhase) -> Self {
        Self {
            phase,
            last_prompt: None,
            last_response: None,
            triage_answers: TriageAnswers::new(),
            triage_step_index: 0,
            observation: ObservationSummary::default(),
        }
    }

    /// The user-turn text sent to the model.
    pub fn to_prompt(&self) -> String {
        let mut state = json!({
            "phase": self.phase,
            "last_response": self.last_response,
        });
        if self.phase == MissionPhase::AssistCommunicate {
            state["last_prompt"] = json!(self.last_prompt);
            state["triage_answers"] = json!(self.triage_answers);
            state["triage_step_index"] = json!(self.triage_step_index);
        }
        let mut parts = vec![
            "Current observation summary:".to_string(),
            json!(self.observation).to_string(),
            String::new(),
            "Conversation state:".to_string(),
            state.to_string(),
        ];
        if self.phase == MissionPhase::AssistCommunicate {
            parts.push(String::new());
            parts.push(DIALOGUE_HINT.to_string());
        }
        parts.push(String::new());
        parts.push(
            "Respond with a single JSON object: action, say, wait_for_response_s, next_phase, confidence."
                .to_string(),
        );
        parts.join("\n")
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Reasoner trait
// ─────────────────────────────────────────────────────────────────────────────

pub trait Reasoner: Send {
    /// An untrusted proposal.  Errors mean "no advice this tick".
    fn propose(&mut self, request: &ReasoningRequest) -> Result<Value, ReasonerError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// OpenAI-compatible chat messages
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
    json_schema: Value,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f64,
    stream: bool,
    response_format: ResponseFormat,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChatMessage,
}

/// The JSON schema advertised in `response_format`.
pub fn proposal_schema() -> Value {
    let schema = serde_json::to_value(schema_for!(ActionProposal)).unwrap_or(Value::Null);
    json!({ "name": "robot_action", "schema": schema })
}

/// Extract a JSON object from model output, tolerating a surrounding
/// markdown code fence.  `None` for anything that is not an object.
pub fn parse_proposal(content: &str) -> Option<Value> {
    let mut text = content.trim();
    if let Some(rest) = text.strip_prefix("```") {
        // Drop the info string ("json") on the opening fence line.
        text = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
        text = text.trim_end().strip_suffix("```").unwrap_or(text);
    }
    match serde_json::from_str::<Value>(text.trim()) {
        Ok(v) if v.is_object() => Some(v),
        _ => None,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// LlmReasoner
// ─────────────────────────────────────────────────────────────────────────────

pub struct LlmReasoner {
    base_url: String,
    model: String,
    api_key: Option<String>,
    temperature: f64,
    max_retries: u32,
    client: reqwest::blocking::Client,
}

impl LlmReasoner {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: None,
            temperature: 0.3,
            max_retries: 2,
            client: build_client(Duration::from_secs(20)),
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        let key = key.into();
        self.api_key = (!key.is_empty()).then_some(key);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = build_client(timeout);
        self
    }

    /// Clamped into [0, 0.4]; higher values make proposals erratic.
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature.clamp(0.0, 0.4);
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn messages(&self, request: &ReasoningRequest) -> Vec<ChatMessage> {
        vec![
            ChatMessage {
                role: Role::System,
                content: SAFETY_RULES.to_string(),
            },
            ChatMessage {
                role: Role::User,
                content: request.to_prompt(),
            },
        ]
    }

    fn complete(&self, messages: &[ChatMessage]) -> Result<String, ReasonerError> {
        let body = ChatRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
            stream: false,
            response_format: ResponseFormat {
                kind: "json_schema",
                json_schema: proposal_schema(),
            },
        };
        let mut req = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .json(&body);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        let response: ChatResponse = req.send()?.error_for_status()?.json()?;
        response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| ReasonerError::BadResponse("empty choices array".into()))
    }
}

impl Reasoner for LlmReasoner {
    fn propose(&mut self, request: &ReasoningRequest) -> Result<Value, ReasonerError> {
        let messages = self.messages(request);
        let mut last_error = ReasonerError::BadResponse("no attempt made".into());
        for attempt in 1..=self.max_retries + 1 {
            match self.complete(&messages) {
                Ok(content) => match parse_proposal(&content) {
                    Some(value) => return Ok(value),
                    None => {
                        let preview: String = content.chars().take(200).collect();
                        warn!(attempt, output = %preview, "reasoner output is not a JSON object");
                        last_error = ReasonerError::BadResponse(preview);
                    }
                },
                Err(e) => {
                    warn!(attempt, error = %e, "reasoner request failed");
                    last_error = e;
                }
            }
        }
        Err(last_error)
    }
}

fn build_client(timeout: Duration) -> reqwest::blocking::Client {
    reqwest::blocking::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| reqwest::blocking::Client::new())
}

// ─────────────────────────────────────────────────────────────────────────────
// ScriptedReasoner
// ─────────────────────────────────────────────────────────────────────────────

/// Replays canned proposals; errors once they run out.  Used for rehearsals
/// and tests.
pub struct ScriptedReasoner {
    proposals: VecDeque<Value>,
    requests: Vec<ReasoningRequest>,
}

impl ScriptedReasoner {
    pub fn new(proposals: impl IntoIterator<Item = Value>) -> Self {
        Self {
            proposals: proposals.into_iter().collect(),
            requests: Vec::new(),
        }
    }

    /// Requests received so far.
    pub fn requests(&self) -> &[ReasoningRequest] {
        &self.requests
    }
}

impl Reasoner for ScriptedReasoner {
    fn propose(&mut self, request: &ReasoningRequest) -> Result<Value, ReasonerError> {
        self.requests.push(request.clone());
        let next = self.proposals.pop_front();
        debug!(phase = %request.phase, has_proposal = next.is_some(), "scripted reasoner consulted");
        next.ok_or_else(|| ReasonerError::BadResponse("scripted proposals exhausted".into()))
    }
}
