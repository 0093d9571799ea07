//! In-process simulation backend for tests and dry runs.
//!
//! [`SimActions`] succeeds instantly, tracks a pretend pose, and records
//! every call in a shared [`SimLog`] so a test can hand the backend to a
//! mission and still inspect what happened.  Failures can be injected per
//! action with [`SimActions::fail_next`].
//!
//! # Example
//!
//! ```rust
//! use rescue_hal::capability::ActionCapability;
//! use rescue_hal::sim::SimActions;
//!
//! let mut sim = SimActions::new().fail_next("navigate_to", 1);
//! let log = sim.log();
//!
//! assert!(sim.speak("Looking for person.", "phase_announce").success);
//! assert!(!sim.navigate_to(Default::default(), "approach").success);
//! assert!(sim.navigate_to(Default::default(), "approach").success);
//!
//! assert_eq!(log.spoken(), vec!["Looking for person.".to_string()]);
//! assert_eq!(log.count("navigate_to"), 2);
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use rescue_types::{ActionResult, DebrisStrategy, Pose, RescueError};
use serde_json::{json, Value};

use crate::call_ledger::CallLedger;
use crate::camera::{Camera, CameraFrame};
use crate::capability::{self, ActionCapability};

const BACKEND: &str = "sim";

/// One recorded call.
#[derive(Debug, Clone, PartialEq)]
pub struct SimCall {
    pub action: String,
    pub args: Value,
    pub reason: String,
    pub success: bool,
}

/// Shared view of the calls a [`SimActions`] has received.
#[derive(Debug, Clone, Default)]
pub struct SimLog(Arc<Mutex<Vec<SimCall>>>);

impl SimLog {
    pub fn calls(&self) -> Vec<SimCall> {
        self.0.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn actions(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.action).collect()
    }

    pub fn count(&self, action: &str) -> usize {
        self.calls().iter().filter(|c| c.action == action).count()
    }

    /// Text of every successful `speak` call, in order.
    pub fn spoken(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.action == capability::SPEAK && c.success)
            .filter_map(|c| c.args["text"].as_str().map(str::to_string))
            .collect()
    }

    /// Payloads of every successful `send_report` call.
    pub fn reports(&self) -> Vec<Value> {
        self.calls()
            .into_iter()
            .filter(|c| c.action == capability::SEND_REPORT && c.success)
            .map(|c| c.args["report"].clone())
            .collect()
    }

    /// Reasons given for calls to `action`, in order.
    pub fn reasons(&self, action: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.action == action)
            .map(|c| c.reason)
            .collect()
    }

    fn push(&self, call: SimCall) {
        if let Ok(mut calls) = self.0.lock() {
            calls.push(call);
        }
    }
}

#[derive(Debug, Default)]
pub struct SimActions {
    log: SimLog,
    failures: HashMap<String, u32>,
    ledger: Option<CallLedger>,
    pose: Pose,
    reports: Vec<Value>,
}

impl SimActions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `times` calls to `action` fail.
    pub fn fail_next(mut self, action: &str, times: u32) -> Self {
        self.failures.insert(action.to_string(), times);
        self
    }

    /// Also append every call to a JSONL call ledger.
    pub fn with_ledger(mut self, ledger: CallLedger) -> Self {
        self.ledger = Some(ledger);
        self
    }

    pub fn log(&self) -> SimLog {
        self.log.clone()
    }

    pub fn pose(&self) -> Pose {
        self.pose
    }

    /// Reports received through `send_report`.
    pub fn reports(&self) -> &[Value] {
        &self.reports
    }

    /// Record one call.  On success the pretend pose moves to `moved_to`
    /// (when given) and the result reports the new pose.
    fn call(&mut self, action: &str, args: Value, reason: &str, moved_to: Option<Pose>) -> ActionResult {
        let fail = match self.failures.get_mut(action) {
            Some(n) if *n > 0 => {
                *n -= 1;
                true
            }
            _ => false,
        };
        let result = if fail {
            ActionResult::failed(json!({ "error": "injected failure" }), true)
        } else {
            if let Some(pose) = moved_to {
                self.pose = pose;
            }
            ActionResult::ok(json!({ "pose": { "x": self.pose.x, "y": self.pose.y, "yaw": self.pose.yaw } }), true)
        };
        if let Some(ledger) = &self.ledger {
            ledger.record(BACKEND, action, args.clone(), reason, &result);
        }
        self.log.push(SimCall {
            action: action.to_string(),
            args,
            reason: reason.to_string(),
            success: result.success,
        });
        result
    }
}

impl ActionCapability for SimActions {
    fn navigate_to(&mut self, target: Pose, reason: &str) -> ActionResult {
        self.call(
            capability::NAVIGATE_TO,
            json!({ "x": target.x, "y": target.y, "yaw": target.yaw }),
            reason,
            Some(target),
        )
    }

    fn explore_step(&mut self, reason: &str) -> ActionResult {
        let turned = self.pose.offset(0.0, std::f64::consts::FRAC_PI_4);
        self.call(capability::EXPLORE_STEP, json!({}), reason, Some(turned))
    }

    fn stop(&mut self, reason: &str) -> ActionResult {
        self.call(capability::STOP, json!({}), reason, None)
    }

    fn speak(&mut self, text: &str, reason: &str) -> ActionResult {
        self.call(capability::SPEAK, json!({ "text": text }), reason, None)
    }

    fn clear_debris(&mut self, strategy: DebrisStrategy, reason: &str) -> ActionResult {
        self.call(capability::CLEAR_DEBRIS, json!({ "strategy": strategy.as_str() }), reason, None)
    }

    fn scan_injuries(&mut self, reason: &str) -> ActionResult {
        self.call(capability::SCAN_INJURIES, json!({}), reason, None)
    }

    fn send_report(&mut self, report: &Value, reason: &str) -> ActionResult {
        let result = self.call(capability::SEND_REPORT, json!({ "report": report }), reason, None);
        if result.success {
            self.reports.push(report.clone());
        }
        result
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Stub camera
// ────────────────────────────────────────────────────────────────────────────

/// A simulated camera that returns a blank 4×4 greyscale frame.
pub struct SimCamera {
    id: String,
}

impl SimCamera {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

impl Camera for SimCamera {
    fn id(&self) -> &str {
        &self.id
    }

    fn capture(&mut self) -> Result<CameraFrame, RescueError> {
        Ok(CameraFrame::blank(4, 4))
    }
}
