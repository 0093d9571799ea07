//! The [`ActionCapability`] trait: the seven things a mission may ask the
//! robot to do.
//!
//! Implementations: [`WozActions`][crate::woz::WozActions] (console +
//! operator), [`BridgeActions`][crate::bridge::BridgeActions] (HTTP robot
//! bridge) and [`SimActions`][crate::sim::SimActions] (in-memory fake).
//!
//! Every call carries a human-readable `reason` and returns an
//! [`ActionResult`]; failures are values, not errors.  Every implementation
//! appends one record per call to an append-only call ledger.

use rescue_types::{ActionResult, DebrisStrategy, Pose};
use serde_json::Value;

pub const NAVIGATE_TO: &str = "navigate_to";
pub const EXPLORE_STEP: &str = "explore_step";
pub const STOP: &str = "stop";
pub const SPEAK: &str = "speak";
pub const CLEAR_DEBRIS: &str = "clear_debris";
pub const SCAN_INJURIES: &str = "scan_injuries";
pub const SEND_REPORT: &str = "send_report";

pub trait ActionCapability: Send {
    fn navigate_to(&mut self, target: Pose, reason: &str) -> ActionResult;
    fn explore_step(&mut self, reason: &str) -> ActionResult;
    fn stop(&mut self, reason: &str) -> ActionResult;
    fn speak(&mut self, text: &str, reason: &str) -> ActionResult;
    fn clear_debris(&mut self, strategy: DebrisStrategy, reason: &str) -> ActionResult;
    fn scan_injuries(&mut self, reason: &str) -> ActionResult;
    fn send_report(&mut self, report: &Value, reason: &str) -> ActionResult;
}
