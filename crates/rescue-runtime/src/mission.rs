//! [`MissionController`] – the phase-sequenced rescue loop.
//!
//! One call to [`MissionController::tick`] runs the current phase to
//! completion for this step:
//!
//! 1. **Deadline** – if the phase has outlived its timeout, the fallback
//!    edge from the [`PhasePolicy`] is taken and the tick ends.
//! 2. **Advice** – where the phase allows it, the reasoner is consulted.
//!    Its proposal goes through the guardrail, a confidence threshold and
//!    the [`LoopGuard`]; whatever survives is dispatched.
//! 3. **Default path** – otherwise the phase's deterministic behaviour runs
//!    (callouts and exploration, approach, debris handling, the scripted
//!    triage, documentation, reporting).
//!
//! Every action goes through the [`ActionCapability`] the controller was
//! built with.  A failed action is never ignored: the phase's
//! [`FailurePolicy`] either retries it once or takes the fallback edge.
//!
//! The loop is single-threaded.  The only blocking points are
//! [`Listener::listen`] (bounded by the response timeout) and whatever the
//! capability itself blocks on (e.g. operator confirmation).
//!
//! # Example
//!
//! ```rust
//! use std::time::{Duration, Instant};
//! use rescue_hal::{ScriptedListener, SimActions};
//! use rescue_memory::EvidenceLedger;
//! use rescue_perception::OperatorFlags;
//! use rescue_runtime::{MissionConfig, MissionController, TickInput};
//! use rescue_types::MissionPhase;
//!
//! let dir = tempfile::tempdir().unwrap();
//! let ledger = EvidenceLedger::open(dir.path().join("evidence.jsonl")).unwrap();
//! let mut mission = MissionController::new(
//!     MissionConfig::default(),
//!     Box::new(SimActions::new()),
//!     Box::new(ScriptedListener::new(Vec::<Option<String>>::new())),
//!     ledger,
//! );
//!
//! let t0 = Instant::now();
//! let input = TickInput { frame: None, flags: OperatorFlags { human: true, ..Default::default() } };
//! assert!(mission.tick(t0, &input));
//! assert_eq!(mission.phase(), MissionPhase::Approach);
//! ```

use std::time::Instant;

use rescue_dialogue::followup::{ack_sentence, summarize_answer};
use rescue_dialogue::{DialogueTurn, Instruction, TriageScript, TriageSession};
use rescue_hal::camera::CameraFrame;
use rescue_hal::capability::{self, ActionCapability};
use rescue_hal::listener::Listener;
use rescue_kernel::guardrail;
use rescue_kernel::{FailurePolicy, Interval, LoopGuard, PhaseClock, PhaseHealth, PhasePolicy};
use rescue_memory::{EvidenceLedger, NewEvidence, ReportBuilder, QUESTION_KEY};
use rescue_middleware::EventBus;
use rescue_perception::{Detection, OperatorFlags, PerceptionSuite};
use rescue_types::{
    ActionResult, DebrisStrategy, EventPayload, EvidenceKind, MissionPhase, PhaseTransition, Pose,
    ProposedAction, SanitizedDecision, TriageAnswers,
};
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{seconds, MissionConfig};
use crate::reasoner::{ObservationSummary, Reasoner, ReasoningRequest};

/// `source` of every event this module publishes.
pub const EVENT_SOURCE: &str = "rescue-runtime::mission";

pub const CALLOUT_UTTERANCE: &str = "Calling out... Can you respond?";
pub const SILENCE_UTTERANCE: &str = "No response detected. I'll proceed with visual inspection only and send what I see to the command center.";
pub const CLOSING_UTTERANCE: &str = "Thank you. Help is on the way. Try to stay still and keep talking to me if anything changes.";

/// Used when a person is reported without a range estimate.
const DEFAULT_PERSON_DISTANCE_M: f64 = 1.5;

/// Per-tick inputs gathered by the caller.
#[derive(Debug, Clone, Copy, Default)]
pub struct TickInput<'a> {
    pub frame: Option<&'a CameraFrame>,
    pub flags: OperatorFlags,
}

pub struct MissionController {
    config: MissionConfig,
    session_id: Uuid,
    policy: PhasePolicy,
    clock: Option<PhaseClock>,
    callout: Interval,
    actions: Box<dyn ActionCapability>,
    listener: Box<dyn Listener>,
    perception: PerceptionSuite,
    reasoner: Option<Box<dyn Reasoner>>,
    loop_guard: LoopGuard,
    ledger: EvidenceLedger,
    bus: Option<EventBus>,

    phase: MissionPhase,
    announced: bool,
    phase_log: Vec<PhaseTransition>,
    ticks: u64,

    triage: TriageSession,
    /// Reply heard after the last scripted question, fed to the next turn.
    pending_reply: Option<String>,
    silent_prompts: u32,
    last_prompt: Option<String>,
    last_response: Option<String>,

    pose: Pose,
    target: Option<Pose>,
    observation: ObservationSummary,
}

impl MissionController {
    pub fn new(
        config: MissionConfig,
        actions: Box<dyn ActionCapability>,
        listener: Box<dyn Listener>,
        ledger: EvidenceLedger,
    ) -> Self {
        let policy = PhasePolicy::standard(config.phase_timeout());
        let callout = Interval::new(config.callout_interval());
        let loop_guard = LoopGuard::new(config.loop_guard_threshold);
        let triage = TriageSession::new(TriageScript::from_kind(config.script));
        Self {
            session_id: Uuid::new_v4(),
            policy,
            clock: None,
            callout,
            actions,
            listener,
            perception: PerceptionSuite::operator_driven(),
            reasoner: None,
            loop_guard,
            ledger,
            bus: None,
            phase: MissionPhase::Search,
            announced: false,
            phase_log: Vec::new(),
            ticks: 0,
            triage,
            pending_reply: None,
            silent_prompts: 0,
            last_prompt: None,
            last_response: None,
            pose: Pose::default(),
            target: None,
            observation: ObservationSummary::default(),
            config,
        }
    }

    /// Consulted only when `use_reasoner` is set in the config.
    pub fn with_reasoner(mut self, reasoner: Box<dyn Reasoner>) -> Self {
        self.reasoner = Some(reasoner);
        self
    }

    pub fn with_perception(mut self, perception: PerceptionSuite) -> Self {
        self.perception = perception;
        self
    }

    pub fn with_bus(mut self, bus: EventBus) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Replace the transition table (e.g. to tighten a single timeout).
    pub fn with_policy(mut self, policy: PhasePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Start somewhere other than `Search`.
    pub fn starting_at(mut self, phase: MissionPhase) -> Self {
        self.phase = phase;
        self
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    pub fn phase(&self) -> MissionPhase {
        self.phase
    }

    pub fn is_done(&self) -> bool {
        self.phase.is_terminal()
    }

    pub fn phase_log(&self) -> &[PhaseTransition] {
        &self.phase_log
    }

    pub fn answers(&self) -> &TriageAnswers {
        self.triage.answers()
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn pose(&self) -> Pose {
        self.pose
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn ledger(&self) -> &EvidenceLedger {
        &self.ledger
    }

    // -------------------------------------------------------------------------
    // Loop
    // -------------------------------------------------------------------------

    /// Run one step.  Returns `false` once the mission is over (phase `Done`
    /// or the tick limit was reached).
    pub fn tick(&mut self, now: Instant, input: &TickInput<'_>) -> bool {
        if self.phase.is_terminal() {
            return false;
        }
        if self.config.max_ticks > 0 && self.ticks >= self.config.max_ticks {
            info!(ticks = self.ticks, "tick limit reached");
            return false;
        }
        self.ticks += 1;

        if self.clock.is_none() {
            let timeout = self.policy.timeout_for(self.phase);
            self.clock = Some(PhaseClock::start(self.phase, now, timeout));
        }
        if !self.announced {
            self.announce();
        }

        if self.clock.as_ref().map(|c| c.health(now)) == Some(PhaseHealth::TimedOut) {
            let target = self.policy.fallback_for(self.phase).unwrap_or(MissionPhase::Done);
            warn!(phase = %self.phase, fallback = %target, "phase timed out");
            if !self.transition(target, "timeout", now) {
                self.transition_unchecked(MissionPhase::Done, "timeout", now);
            }
            return !self.phase.is_terminal();
        }

        match self.phase {
            MissionPhase::Search => self.tick_search(now, input),
            MissionPhase::Approach => self.tick_approach(now),
            MissionPhase::ClearDebris => self.tick_clear_debris(now, input),
            MissionPhase::AssistCommunicate => self.tick_assist(now),
            MissionPhase::Document => self.tick_document(now, input),
            MissionPhase::Report => self.tick_report(now),
            MissionPhase::Done => {}
        }
        !self.phase.is_terminal()
    }

    /// Operator override: advance to the next phase in nominal order.
    pub fn force_next_phase(&mut self, now: Instant) -> bool {
        match self.phase.next() {
            Some(next) => {
                self.ensure_clock(now);
                self.transition(next, "manual_next", now)
            }
            None => false,
        }
    }

    /// Speak a message relayed by the command center operator.
    pub fn relay_operator_message(&mut self, text: &str) -> ActionResult {
        self.record_evidence(
            NewEvidence::new(EvidenceKind::OperatorNote, "command_center")
                .summary(format!("Operator message relayed: {text}")),
        );
        self.call(capability::SPEAK, "operator_message", |a| a.speak(text, "operator_message"))
    }

    /// Halt the robot.  Always routed through the capability's `stop`.
    pub fn shutdown(&mut self, reason: &str) -> ActionResult {
        info!(phase = %self.phase, reason, "mission shutting down");
        self.emit(EventPayload::notice(format!("shutdown: {reason}")));
        self.call(capability::STOP, reason, |a| a.stop(reason))
    }

    // -------------------------------------------------------------------------
    // Phases
    // -------------------------------------------------------------------------

    fn tick_search(&mut self, now: Instant, input: &TickInput<'_>) {
        let detection = self.perception.human.detect(input.frame, &input.flags);
        self.observe_person(&detection);

        if detection.found && detection.confidence >= self.config.human_confidence_threshold {
            let (distance, bearing) = detection
                .best()
                .map(|f| {
                    (
                        f.distance_m.unwrap_or(DEFAULT_PERSON_DISTANCE_M),
                        f.bearing_rad.unwrap_or(0.0),
                    )
                })
                .unwrap_or((DEFAULT_PERSON_DISTANCE_M, 0.0));
            let travel = (distance - self.config.approach_standoff_m).max(0.0);
            self.target = Some(self.pose.offset(travel, bearing));
            self.record_evidence(
                NewEvidence::new(EvidenceKind::ModelOutput, "human_detector")
                    .confidence(detection.confidence)
                    .summary("Person detected")
                    .meta("bearing_rad", bearing)
                    .meta("distance_m", distance),
            );
            self.transition(MissionPhase::Approach, "human_detected", now);
            return;
        }

        let threshold = self.config.search_confidence_threshold;
        if let Some(decision) = self.consult(threshold) {
            self.apply_decision(&decision, now);
            return;
        }

        if self.callout.due(now)
            && !self.say(CALLOUT_UTTERANCE, "search_callout", now)
        {
            return;
        }
        self.dispatch(capability::EXPLORE_STEP, "search_explore", now, |a| {
            a.explore_step("search_explore")
        });
    }

    fn tick_approach(&mut self, now: Instant) {
        let threshold = self.config.search_confidence_threshold;
        if let Some(decision) = self.consult(threshold) {
            self.apply_decision(&decision, now);
            return;
        }

        let target = self.target.unwrap_or(self.pose);
        let result = self.dispatch(capability::NAVIGATE_TO, "approach_person", now, |a| {
            a.navigate_to(target, "approach_person")
        });
        if result.is_some() {
            self.pose = target;
            self.transition(MissionPhase::ClearDebris, "reached_person", now);
        }
    }

    fn tick_clear_debris(&mut self, now: Instant, input: &TickInput<'_>) {
        let detection = self.perception.debris.detect(input.frame, &input.flags);
        self.observation.debris_found = detection.found;
        if !detection.found {
            self.transition(MissionPhase::AssistCommunicate, "no_debris", now);
            return;
        }

        let movable = detection.best().and_then(|f| f.movable).unwrap_or(true);
        let strategy = if movable {
            DebrisStrategy::Push
        } else {
            DebrisStrategy::MarkOnly
        };
        self.record_evidence(
            NewEvidence::new(EvidenceKind::ModelOutput, "debris_detector")
                .confidence(detection.confidence)
                .summary(if movable {
                    "Movable debris detected near the person"
                } else {
                    "Immovable debris detected near the person; marked for responders"
                })
                .meta("strategy", strategy.as_str()),
        );
        let result = self.dispatch(capability::CLEAR_DEBRIS, "clear_path_to_person", now, |a| {
            a.clear_debris(strategy, "clear_path_to_person")
        });
        if result.is_some() {
            self.transition(MissionPhase::AssistCommunicate, "debris_handled", now);
        }
    }

    fn tick_assist(&mut self, now: Instant) {
        let threshold = self.config.dialogue_confidence_threshold;
        if let Some(decision) = self.consult(threshold) {
            if decision.action.is_verbal() && decision.say.is_some() {
                self.apply_decision(&decision, now);
                return;
            }
            debug!(action = %decision.action, "non-verbal proposal ignored during dialogue");
        }

        let reply = self.pending_reply.take();
        let turn = self.triage.advance(reply.as_deref());
        self.record_answers(&turn);

        match turn.instruction {
            Instruction::Ask => {
                let Some(question) = turn.utterance else {
                    return;
                };
                let reason = format!("triage_question:{}", self.triage.pending_key().unwrap_or("unknown"));
                if !self.say(&question, &reason, now) {
                    return;
                }
                self.last_prompt = Some(question);
                let timeout = self.config.response_timeout();
                match self.listen(timeout) {
                    Some(text) => self.pending_reply = Some(text),
                    None => {
                        if self.silent_prompts >= self.config.max_silent_prompts {
                            self.say(SILENCE_UTTERANCE, "no_response", now);
                            self.transition(MissionPhase::Document, "no_response", now);
                        }
                    }
                }
            }
            Instruction::Say => {
                if let Some(text) = turn.utterance {
                    self.say(&text, "triage_acknowledge", now);
                }
            }
            Instruction::Done => {
                if self.say(CLOSING_UTTERANCE, "triage_complete", now) {
                    self.transition(MissionPhase::Document, "triage_complete", now);
                }
            }
        }
    }

    fn tick_document(&mut self, now: Instant, input: &TickInput<'_>) {
        let consent = self.triage.answers().get("consent_photos").and_then(|v| v.as_bool());
        if consent == Some(false) {
            self.record_evidence(
                NewEvidence::new(EvidenceKind::OperatorNote, "mission")
                    .summary("Photo consent declined; no images captured"),
            );
            self.transition(MissionPhase::Report, "photo_consent_declined", now);
            return;
        }

        let Some(result) = self.dispatch(capability::SCAN_INJURIES, "document_injuries", now, |a| {
            a.scan_injuries("document_injuries")
        }) else {
            return;
        };

        let image_path = result.details.get("image_path").and_then(Value::as_str).map(str::to_string);
        if let Some(path) = &image_path {
            self.record_evidence(
                NewEvidence::new(EvidenceKind::Image, "camera")
                    .file_path(path.clone())
                    .summary("Injury documentation image captured"),
            );
        }

        let detection = self.perception.injury.detect(input.frame, &input.flags);
        for finding in &detection.findings {
            let summary = match finding.body_region.as_deref() {
                Some(region) if region != "unspecified" => {
                    format!("Possible {} on {region}", finding.label.replace('_', " "))
                }
                _ => format!("Possible {}", finding.label.replace('_', " ")),
            };
            let mut evidence = NewEvidence::new(EvidenceKind::ModelOutput, "injury_detector")
                .confidence(finding.confidence)
                .summary(summary);
            if let Some(path) = &image_path {
                evidence = evidence.file_path(path.clone());
            }
            self.record_evidence(evidence);
        }

        self.transition(MissionPhase::Report, "documentation_complete", now);
    }

    fn tick_report(&mut self, now: Instant) {
        let evidence = match self.ledger.list() {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "evidence ledger unreadable; reporting without evidence");
                Vec::new()
            }
        };
        let report = ReportBuilder::new(self.session_id)
            .final_phase(self.phase)
            .phase_log(&self.phase_log)
            .answers(self.triage.answers())
            .build(evidence);
        info!(claims = report.claims.len(), "mission report assembled");
        let payload = report.to_json();

        let sent = self.dispatch(capability::SEND_REPORT, "mission_report", now, |a| {
            a.send_report(&payload, "mission_report")
        });
        if sent.is_some() {
            self.transition(MissionPhase::Done, "report_sent", now);
        }
    }

    // -------------------------------------------------------------------------
    // Reasoner
    // -------------------------------------------------------------------------

    /// Ask the reasoner and return a decision worth acting on, if any.
    fn consult(&mut self, threshold: f64) -> Option<SanitizedDecision> {
        if !self.config.use_reasoner {
            return None;
        }
        let request = self.reasoning_request();
        let reasoner = self.reasoner.as_mut()?;
        let raw = match reasoner.propose(&request) {
            Ok(value) => Some(value),
            Err(e) => {
                debug!(error = %e, "no proposal from reasoner");
                None
            }
        };

        let decision = match guardrail::inspect(raw.as_ref()) {
            Ok(decision) => decision,
            Err(guardrail::Rejection::Missing) => return None,
            Err(rejection) => {
                info!(phase = %self.phase, %rejection, "proposal rejected by guardrail");
                self.emit(EventPayload::notice(format!("proposal rejected: {rejection}")));
                return None;
            }
        };
        if decision.confidence < threshold {
            debug!(confidence = decision.confidence, threshold, "proposal below confidence threshold");
            return None;
        }
        if self.loop_guard.record(&decision) {
            warn!(action = %decision.action, "reasoner is repeating itself; using default path");
            self.emit(EventPayload::notice(format!("repeated proposal ignored: {}", decision.action)));
            return None;
        }
        Some(decision)
    }

    fn reasoning_request(&self) -> ReasoningRequest {
        ReasoningRequest {
            phase: self.phase,
            last_prompt: self.last_prompt.clone(),
            last_response: self.last_response.clone(),
            triage_answers: self.triage.answers().clone(),
            triage_step_index: self.triage.step_index(),
            observation: self.observation.clone(),
        }
    }

    fn apply_decision(&mut self, decision: &SanitizedDecision, now: Instant) {
        let reason = format!("reasoner:{}", decision.action);
        info!(phase = %self.phase, action = %decision.action, confidence = decision.confidence, "acting on proposal");

        let step = self.config.motion_step_m;
        let turn = self.config.rotate_step_rad;
        let motion = match decision.action {
            ProposedAction::RotateLeft => Some(self.pose.offset(0.0, turn)),
            ProposedAction::RotateRight => Some(self.pose.offset(0.0, -turn)),
            ProposedAction::ForwardSlow => Some(self.pose.offset(step, 0.0)),
            ProposedAction::BackUp => Some(self.pose.offset(-step, 0.0)),
            _ => None,
        };

        let completed = match decision.action {
            ProposedAction::Stop => self
                .dispatch(capability::STOP, &reason, now, |a| a.stop(&reason))
                .is_some(),
            ProposedAction::Wait => true,
            ProposedAction::Say => match &decision.say {
                Some(text) => self.say(text, &reason, now),
                None => true,
            },
            ProposedAction::Ask => match &decision.say {
                Some(text) => {
                    let spoken = self.say(text, &reason, now);
                    if spoken {
                        self.last_prompt = Some(text.clone());
                        let timeout = decision
                            .wait_for_response_s
                            .map(seconds)
                            .unwrap_or_else(|| self.config.response_timeout());
                        if let Some(reply) = self.listen(timeout) {
                            self.record_evidence(
                                NewEvidence::new(EvidenceKind::Text, "victim")
                                    .summary(format!("Person said: {reply}"))
                                    .meta("prompt", text.clone()),
                            );
                        }
                    }
                    spoken
                }
                None => true,
            },
            ProposedAction::RotateLeft
            | ProposedAction::RotateRight
            | ProposedAction::ForwardSlow
            | ProposedAction::BackUp => match motion {
                Some(target) => {
                    let ok = self
                        .dispatch(capability::NAVIGATE_TO, &reason, now, |a| a.navigate_to(target, &reason))
                        .is_some();
                    if ok {
                        self.pose = target;
                    }
                    ok
                }
                None => true,
            },
        };

        if completed {
            if let Some(next) = decision.next_phase {
                if next != self.phase {
                    self.transition(next, "reasoner_next_phase", now);
                }
            }
        }
    }

    // -------------------------------------------------------------------------
    // Dialogue helpers
    // -------------------------------------------------------------------------

    /// Listen for a reply.  Silence and unavailable channels both count
    /// towards the silent-prompt limit.
    fn listen(&mut self, timeout: std::time::Duration) -> Option<String> {
        let heard = match self.listener.listen(timeout) {
            Ok(reply) => reply.map(|r| r.trim().to_string()).filter(|r| !r.is_empty()),
            Err(e) => {
                warn!(listener = self.listener.name(), error = %e, "no listening channel");
                None
            }
        };
        match &heard {
            Some(text) => {
                info!(response = %text, "person responded");
                self.silent_prompts = 0;
                self.last_response = Some(text.clone());
                self.emit(EventPayload::VictimResponse { text: text.clone() });
            }
            None => {
                self.silent_prompts += 1;
                info!(silent_prompts = self.silent_prompts, "no response");
            }
        }
        heard
    }

    /// Write each answer from `turn` to the ledger and acknowledge the first
    /// informative one aloud.
    fn record_answers(&mut self, turn: &DialogueTurn) {
        let mut acknowledgement = None;
        for answer in &turn.recorded {
            let summary = summarize_answer(&answer.key, &answer.reply);
            self.record_evidence(
                NewEvidence::new(EvidenceKind::Text, "triage_dialogue")
                    .confidence(1.0)
                    .summary(summary.clone())
                    .meta(QUESTION_KEY, answer.key.clone())
                    .meta("raw_response", answer.reply.clone())
                    .meta("value", json!(answer.value)),
            );
            if acknowledgement.is_none() && summary != "Noted." {
                acknowledgement = Some(ack_sentence(&summary));
            }
        }
        // Scripted acknowledgements already confirm receipt.
        if turn.instruction != Instruction::Say {
            if let Some(text) = acknowledgement {
                self.call(capability::SPEAK, "triage_answer_ack", |a| a.speak(&text, "triage_answer_ack"));
                self.emit(EventPayload::Utterance {
                    text,
                    reason: "triage_answer_ack".into(),
                });
            }
        }
    }

    fn observe_person(&mut self, detection: &Detection) {
        let best = detection.best();
        self.observation.person_found = detection.found;
        self.observation.person_confidence = detection.confidence;
        self.observation.person_bearing_rad = best.and_then(|f| f.bearing_rad);
        self.observation.person_distance_m = best.and_then(|f| f.distance_m);
    }

    // -------------------------------------------------------------------------
    // Transitions
    // -------------------------------------------------------------------------

    /// Move to `to` if the policy permits it.  Denied transitions are logged
    /// and published, and the mission stays where it is.
    fn transition(&mut self, to: MissionPhase, reason: &str, now: Instant) -> bool {
        if to == self.phase {
            return false;
        }
        if let Err(e) = self.policy.check(self.phase, to) {
            warn!(from = %self.phase, %to, reason, "{e}");
            self.emit(EventPayload::notice(e.to_string()));
            return false;
        }
        self.transition_unchecked(to, reason, now);
        true
    }

    fn transition_unchecked(&mut self, to: MissionPhase, reason: &str, now: Instant) {
        let from = self.phase;
        let next_timeout = self.policy.timeout_for(to);
        let clock = self.ensure_clock(now);
        let elapsed_s = clock.mission_elapsed(now).as_secs_f64();
        clock.enter(to, now, next_timeout);

        info!(%from, %to, reason, elapsed_s, "phase transition");
        self.phase_log.push(PhaseTransition {
            from,
            to,
            reason: reason.to_string(),
            elapsed_s,
        });
        self.emit(EventPayload::PhaseChanged {
            from,
            to,
            reason: reason.to_string(),
        });

        self.phase = to;
        self.silent_prompts = 0;
        self.callout.reset();
        self.loop_guard.reset();
        self.announce();
        if to.is_terminal() {
            self.call(capability::STOP, "mission_complete", |a| a.stop("mission_complete"));
        }
    }

    fn ensure_clock(&mut self, now: Instant) -> &mut PhaseClock {
        let timeout = self.policy.timeout_for(self.phase);
        let phase = self.phase;
        self.clock.get_or_insert_with(|| PhaseClock::start(phase, now, timeout))
    }

    /// Speak the fixed announcement for the current phase.  Failures are
    /// logged but never trigger a fallback.
    fn announce(&mut self) {
        self.announced = true;
        let text = self.phase.announcement();
        let reason = format!("phase_announcement:{}", self.phase);
        self.call(capability::SPEAK, &reason, |a| a.speak(text, &reason));
        self.emit(EventPayload::Utterance {
            text: text.to_string(),
            reason,
        });
    }

    // -------------------------------------------------------------------------
    // Action dispatch
    // -------------------------------------------------------------------------

    /// Speak through [`dispatch`](Self::dispatch); `true` when it was heard.
    fn say(&mut self, text: &str, reason: &str, now: Instant) -> bool {
        let spoken = self
            .dispatch(capability::SPEAK, reason, now, |a| a.speak(text, reason))
            .is_some();
        if spoken {
            self.emit(EventPayload::Utterance {
                text: text.to_string(),
                reason: reason.to_string(),
            });
        }
        spoken
    }

    /// Invoke an action under the current phase's failure policy.  Returns
    /// the successful result, or `None` after the fallback edge was taken.
    fn dispatch<F>(&mut self, action: &str, reason: &str, now: Instant, mut f: F) -> Option<ActionResult>
    where
        F: FnMut(&mut dyn ActionCapability) -> ActionResult,
    {
        let result = self.call(action, reason, &mut f);
        if result.success {
            return Some(result);
        }

        let phase = self.phase;
        if self.policy.failure_policy(phase) == FailurePolicy::RetryOnce {
            warn!(%phase, action, reason, "action failed, retrying once");
            let retry = self.call(action, reason, &mut f);
            if retry.success {
                return Some(retry);
            }
        }

        let target = self.policy.fallback_for(phase).unwrap_or(MissionPhase::Done);
        warn!(%phase, action, fallback = %target, "action failed, taking fallback");
        let why = format!("capability_failed:{action}");
        if !self.transition(target, &why, now) {
            self.transition_unchecked(MissionPhase::Done, &why, now);
        }
        None
    }

    /// Invoke an action once, log it and publish it.  No failure policy.
    fn call<F>(&mut self, action: &str, reason: &str, mut f: F) -> ActionResult
    where
        F: FnMut(&mut dyn ActionCapability) -> ActionResult,
    {
        let result = f(self.actions.as_mut());
        if result.success {
            debug!(phase = %self.phase, action, reason, "action ok");
            if let Some(pose) = result
                .details
                .get("pose")
                .and_then(|p| serde_json::from_value::<Pose>(p.clone()).ok())
            {
                self.pose = pose;
            }
        } else {
            warn!(phase = %self.phase, action, reason, details = %result.details, "action failed");
        }
        self.emit(EventPayload::ActionCalled {
            action: action.to_string(),
            success: result.success,
            reason: reason.to_string(),
        });
        result
    }

    // -------------------------------------------------------------------------
    // Evidence and events
    // -------------------------------------------------------------------------

    fn record_evidence(&mut self, evidence: NewEvidence) -> Option<String> {
        match self.ledger.append(evidence) {
            Ok(id) => {
                debug!(evidence_id = %id, "evidence recorded");
                self.emit(EventPayload::EvidenceRecorded {
                    evidence_id: id.clone(),
                    summary: None,
                });
                Some(id)
            }
            Err(e) => {
                warn!(error = %e, "evidence append failed; continuing without it");
                None
            }
        }
    }

    fn emit(&self, payload: EventPayload) {
        if let Some(bus) = &self.bus {
            bus.emit(EVENT_SOURCE, payload);
        }
    }
}
