//! HTTP robot-bridge backend.
//!
//! The bridge is a small server running on the robot:
//!
//! | Endpoint | Use |
//! |----------|-----|
//! | `GET /health` | connectivity probe |
//! | `GET /state` | telemetry snapshot |
//! | `GET /frame` | latest camera frame as JPEG (503 when none) |
//! | `POST /speak {text}` | text-to-speech |
//! | `POST /velocity {vx, wz}` | motion command (403 when motion is disabled) |
//! | `POST /stop` | stop all motion, always allowed |
//!
//! Navigation is open-loop: one velocity command towards the target per
//! call.  Reports go to the command center (`POST /report`) when one is
//! configured, otherwise to `<artifacts>/reports/`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use reqwest::StatusCode;
use reqwest::blocking::Client;
use rescue_types::{ActionResult, DebrisStrategy, Pose, RescueError};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::call_ledger::CallLedger;
use crate::camera::{Camera, CameraFrame, FrameFormat};
use crate::capability::{self, ActionCapability};
use crate::woz::write_report_file;

const BACKEND: &str = "bridge";

pub const MAX_LINEAR_MPS: f64 = 0.3;
pub const MAX_ANGULAR_RPS: f64 = 0.6;
pub const EXPLORE_ANGULAR_RPS: f64 = 0.3;
pub const PUSH_LINEAR_MPS: f64 = 0.1;
/// Heading error (rad) above which navigation turns in place.
const TURN_IN_PLACE_RAD: f64 = 0.5;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("motion is disabled on the bridge")]
    MotionDisabled,

    #[error("bridge returned status {0}")]
    Status(u16),
}

// ────────────────────────────────────────────────────────────────────────────
// Low-level client
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct BridgeClient {
    base_url: String,
    http: Client,
}

impl BridgeClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, BridgeError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    pub fn health(&self) -> Result<Value, BridgeError> {
        let resp = self.http.get(self.url("/health")).send()?.error_for_status()?;
        Ok(resp.json()?)
    }

    pub fn state(&self) -> Result<Value, BridgeError> {
        let resp = self.http.get(self.url("/state")).send()?.error_for_status()?;
        Ok(resp.json()?)
    }

    /// `Ok(None)` when the bridge has no frame yet.
    pub fn frame_jpeg(&self) -> Result<Option<Vec<u8>>, BridgeError> {
        let resp = self.http.get(self.url("/frame")).send()?;
        if resp.status() == StatusCode::SERVICE_UNAVAILABLE {
            return Ok(None);
        }
        let bytes = resp.error_for_status()?.bytes()?;
        Ok(Some(bytes.to_vec()))
    }

    pub fn speak(&self, text: &str) -> Result<(), BridgeError> {
        let resp = self
            .http
            .post(self.url("/speak"))
            .json(&json!({ "text": text }))
            .send()?
            .error_for_status()?;
        let body: Value = resp.json()?;
        match body.get("status").and_then(Value::as_str) {
            Some("ok") => Ok(()),
            _ => Err(BridgeError::Status(200)),
        }
    }

    pub fn set_velocity(&self, vx: f64, wz: f64) -> Result<(), BridgeError> {
        let resp = self
            .http
            .post(self.url("/velocity"))
            .json(&json!({ "vx": vx, "wz": wz }))
            .send()?;
        if resp.status() == StatusCode::FORBIDDEN {
            return Err(BridgeError::MotionDisabled);
        }
        resp.error_for_status()?;
        Ok(())
    }

    pub fn stop(&self) -> Result<(), BridgeError> {
        self.http.post(self.url("/stop")).send()?.error_for_status()?;
        Ok(())
    }
}

/// Open-loop velocity command that moves `from` towards `to`.
///
/// Turns in place while the heading error is large, otherwise drives forward
/// with a proportional heading correction.  Both components are capped.
pub fn drive_command(from: Pose, to: Pose) -> (f64, f64) {
    let (dx, dy) = (to.x - from.x, to.y - from.y);
    let distance = dx.hypot(dy);
    if distance < 1e-6 {
        return (0.0, 0.0);
    }
    let error = normalize_angle(dy.atan2(dx) - from.yaw);
    let wz = error.clamp(-MAX_ANGULAR_RPS, MAX_ANGULAR_RPS);
    let vx = if error.abs() > TURN_IN_PLACE_RAD {
        0.0
    } else {
        (0.5 * distance).min(MAX_LINEAR_MPS)
    };
    (vx, wz)
}

fn normalize_angle(a: f64) -> f64 {
    let tau = std::f64::consts::TAU;
    let mut a = a % tau;
    if a > std::f64::consts::PI {
        a -= tau;
    } else if a < -std::f64::consts::PI {
        a += tau;
    }
    a
}

// ────────────────────────────────────────────────────────────────────────────
// ActionCapability over the bridge
// ────────────────────────────────────────────────────────────────────────────

pub struct BridgeActions {
    client: BridgeClient,
    ledger: CallLedger,
    artifacts_dir: PathBuf,
    command_center: Option<String>,
    reports_http: Client,
    pose: Pose,
}

impl BridgeActions {
    pub fn new(client: BridgeClient, artifacts_dir: impl AsRef<Path>) -> Self {
        let dir = artifacts_dir.as_ref().to_path_buf();
        Self {
            client,
            ledger: CallLedger::new(dir.join("action_calls.jsonl")),
            artifacts_dir: dir,
            command_center: None,
            reports_http: Client::new(),
            pose: Pose::default(),
        }
    }

    /// POST reports to `<url>/report` instead of writing them to disk.
    pub fn with_command_center(mut self, url: impl Into<String>) -> Self {
        let url = url.into().trim_end_matches('/').to_string();
        self.command_center = (!url.is_empty()).then_some(url);
        self
    }

    pub fn ledger(&self) -> &CallLedger {
        &self.ledger
    }

    fn finish(&self, action: &str, args: Value, reason: &str, outcome: Result<Value, BridgeError>) -> ActionResult {
        let result = match outcome {
            Ok(details) => ActionResult::ok(details, false),
            Err(e) => {
                warn!(action, error = %e, "bridge call failed");
                ActionResult::failed(json!({ "error": e.to_string() }), false)
            }
        };
        self.ledger.record(BACKEND, action, args, reason, &result);
        result
    }

    fn save_frame(&self, jpeg: &[u8]) -> std::io::Result<PathBuf> {
        let dir = self.artifacts_dir.join("frames");
        fs::create_dir_all(&dir)?;
        let path = dir.join(format!("scan_{}.jpg", Utc::now().format("%Y%m%d_%H%M%S%.3f")));
        fs::write(&path, jpeg)?;
        Ok(path)
    }
}

impl ActionCapability for BridgeActions {
    fn navigate_to(&mut self, target: Pose, reason: &str) -> ActionResult {
        let (vx, wz) = drive_command(self.pose, target);
        debug!(vx, wz, "navigate_to velocity command");
        let outcome = self.client.set_velocity(vx, wz).map(|()| json!({ "vx": vx, "wz": wz }));
        if outcome.is_ok() {
            self.pose = target;
        }
        self.finish(
            capability::NAVIGATE_TO,
            json!({ "x": target.x, "y": target.y, "yaw": target.yaw }),
            reason,
            outcome,
        )
    }

    fn explore_step(&mut self, reason: &str) -> ActionResult {
        let outcome = self
            .client
            .set_velocity(0.0, EXPLORE_ANGULAR_RPS)
            .map(|()| json!({ "vx": 0.0, "wz": EXPLORE_ANGULAR_RPS }));
        self.finish(capability::EXPLORE_STEP, json!({}), reason, outcome)
    }

    fn stop(&mut self, reason: &str) -> ActionResult {
        let outcome = self.client.stop().map(|()| json!({}));
        self.finish(capability::STOP, json!({}), reason, outcome)
    }

    fn speak(&mut self, text: &str, reason: &str) -> ActionResult {
        let outcome = self.client.speak(text).map(|()| json!({}));
        self.finish(capability::SPEAK, json!({ "text": text }), reason, outcome)
    }

    fn clear_debris(&mut self, strategy: DebrisStrategy, reason: &str) -> ActionResult {
        let args = json!({ "strategy": strategy.as_str() });
        let outcome = match strategy {
            DebrisStrategy::Push => self
                .client
                .set_velocity(PUSH_LINEAR_MPS, 0.0)
                .map(|()| json!({ "vx": PUSH_LINEAR_MPS })),
            DebrisStrategy::MarkOnly => Ok(json!({ "marked": true })),
            DebrisStrategy::Lift => {
                let result = ActionResult::failed(json!({ "error": "lift is not supported by the bridge" }), false);
                self.ledger.record(BACKEND, capability::CLEAR_DEBRIS, args, reason, &result);
                return result;
            }
        };
        self.finish(capability::CLEAR_DEBRIS, args, reason, outcome)
    }

    fn scan_injuries(&mut self, reason: &str) -> ActionResult {
        let result = match self.client.frame_jpeg() {
            Ok(Some(jpeg)) => match self.save_frame(&jpeg) {
                Ok(path) => ActionResult::ok(json!({ "image_path": path.display().to_string() }), false),
                Err(e) => ActionResult::failed(json!({ "error": e.to_string() }), false),
            },
            Ok(None) => ActionResult::failed(json!({ "error": "no frame available" }), false),
            Err(e) => ActionResult::failed(json!({ "error": e.to_string() }), false),
        };
        self.ledger.record(BACKEND, capability::SCAN_INJURIES, json!({}), reason, &result);
        result
    }

    fn send_report(&mut self, report: &Value, reason: &str) -> ActionResult {
        let args = json!({ "bytes": report.to_string().len() });
        let result = match &self.command_center {
            Some(base) => {
                let sent = self
                    .reports_http
                    .post(format!("{base}/report"))
                    .json(report)
                    .send()
                    .and_then(|r| r.error_for_status());
                match sent {
                    Ok(_) => {
                        info!(url = %base, "report delivered to command center");
                        ActionResult::ok(json!({ "delivered_to": base }), false)
                    }
                    Err(e) => ActionResult::failed(json!({ "error": e.to_string() }), false),
                }
            }
            None => match write_report_file(&self.artifacts_dir.join("reports"), report) {
                Ok(path) => ActionResult::ok(json!({ "path": path.display().to_string() }), false),
                Err(e) => ActionResult::failed(json!({ "error": e.to_string() }), false),
            },
        };
        self.ledger.record(BACKEND, capability::SEND_REPORT, args, reason, &result);
        result
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Camera over the bridge
// ────────────────────────────────────────────────────────────────────────────

pub struct BridgeCamera {
    client: BridgeClient,
}

impl BridgeCamera {
    pub fn new(client: BridgeClient) -> Self {
        Self { client }
    }
}

impl Camera for BridgeCamera {
    fn id(&self) -> &str {
        "bridge_frame"
    }

    fn capture(&mut self) -> Result<CameraFrame, RescueError> {
        let failed = |details: String| RescueError::CapabilityFailed {
            action: "capture_frame".into(),
            details,
        };
        match self.client.frame_jpeg() {
            Ok(Some(data)) => Ok(CameraFrame {
                width: 0,
                height: 0,
                format: FrameFormat::Jpeg,
                data,
            }),
            Ok(None) => Err(failed("no frame available".into())),
            Err(e) => Err(failed(e.to_string())),
        }
    }
}
