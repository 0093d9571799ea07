//! Detector contract and the operator-driven stand-ins used until real
//! vision models are wired in.
//!
//! A [`Detector`] looks at the latest [`CameraFrame`] (if any) together with
//! the session's [`OperatorFlags`] and reports a [`Detection`].  The flags
//! are passed in on every call; detectors hold no hidden shared state.

use std::collections::VecDeque;

use rescue_hal::camera::CameraFrame;
use serde::{Deserialize, Serialize};
use tracing::trace;

/// One thing a detector found.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub label: String,
    pub confidence: f64,
    /// Bearing relative to the robot heading, radians.
    #[serde(default)]
    pub bearing_rad: Option<f64>,
    #[serde(default)]
    pub distance_m: Option<f64>,
    /// For debris: whether it can be pushed aside.
    #[serde(default)]
    pub movable: Option<bool>,
    /// For injuries: where on the body.
    #[serde(default)]
    pub body_region: Option<String>,
}

impl Finding {
    pub fn new(label: impl Into<String>, confidence: f64) -> Self {
        Self {
            label: label.into(),
            confidence,
            bearing_rad: None,
            distance_m: None,
            movable: None,
            body_region: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Detection {
    pub found: bool,
    /// Best finding confidence, 0.0 when nothing was found.
    pub confidence: f64,
    pub findings: Vec<Finding>,
}

impl Detection {
    pub fn nothing() -> Self {
        Self::default()
    }

    pub fn from_findings(findings: Vec<Finding>) -> Self {
        let confidence = findings.iter().map(|f| f.confidence).fold(0.0, f64::max);
        Self {
            found: !findings.is_empty(),
            confidence,
            findings,
        }
    }

    pub fn best(&self) -> Option<&Finding> {
        self.findings
            .iter()
            .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
    }
}

/// Per-session toggles an operator flips from the console.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OperatorFlags {
    pub human: bool,
    pub debris: bool,
    pub injury: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorKind {
    Human,
    Debris,
    Injury,
}

impl DetectorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectorKind::Human => "human_detector",
            DetectorKind::Debris => "debris_detector",
            DetectorKind::Injury => "injury_detector",
        }
    }
}

pub trait Detector: Send {
    fn kind(&self) -> DetectorKind;

    fn detect(&mut self, frame: Option<&CameraFrame>, flags: &OperatorFlags) -> Detection;
}

// ────────────────────────────────────────────────────────────────────────────
// Operator toggle detector
// ────────────────────────────────────────────────────────────────────────────

/// Reports a fixed finding whenever the operator's flag for its kind is set.
pub struct ToggleDetector {
    kind: DetectorKind,
    finding: Finding,
}

impl ToggleDetector {
    pub const CONFIDENCE: f64 = 0.9;

    pub fn new(kind: DetectorKind) -> Self {
        let finding = match kind {
            DetectorKind::Human => Finding {
                bearing_rad: Some(0.0),
                distance_m: Some(1.5),
                ..Finding::new("person", Self::CONFIDENCE)
            },
            DetectorKind::Debris => Finding {
                movable: Some(true),
                ..Finding::new("debris", Self::CONFIDENCE)
            },
            DetectorKind::Injury => Finding {
                body_region: Some("unspecified".into()),
                ..Finding::new("visible_injury", Self::CONFIDENCE)
            },
        };
        Self { kind, finding }
    }

    /// Replace the finding reported when the flag is on.
    pub fn with_finding(mut self, finding: Finding) -> Self {
        self.finding = finding;
        self
    }
}

impl Detector for ToggleDetector {
    fn kind(&self) -> DetectorKind {
        self.kind
    }

    fn detect(&mut self, _frame: Option<&CameraFrame>, flags: &OperatorFlags) -> Detection {
        let on = match self.kind {
            DetectorKind::Human => flags.human,
            DetectorKind::Debris => flags.debris,
            DetectorKind::Injury => flags.injury,
        };
        if on {
            trace!(detector = self.kind.as_str(), label = %self.finding.label, "operator toggle on");
            Detection::from_findings(vec![self.finding.clone()])
        } else {
            Detection::nothing()
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Scripted detector
// ────────────────────────────────────────────────────────────────────────────

/// Plays back a fixed sequence of detections, then reports nothing.
pub struct ScriptedDetector {
    kind: DetectorKind,
    queue: VecDeque<Detection>,
}

impl ScriptedDetector {
    pub fn new(kind: DetectorKind, detections: impl IntoIterator<Item = Detection>) -> Self {
        Self {
            kind,
            queue: detections.into_iter().collect(),
        }
    }
}

impl Detector for ScriptedDetector {
    fn kind(&self) -> DetectorKind {
        self.kind
    }

    fn detect(&mut self, _frame: Option<&CameraFrame>, _flags: &OperatorFlags) -> Detection {
        self.queue.pop_front().unwrap_or_default()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Suite
// ────────────────────────────────────────────────────────────────────────────

/// The three detectors a mission consults.
pub struct PerceptionSuite {
    pub human: Box<dyn Detector>,
    pub debris: Box<dyn Detector>,
    pub injury: Box<dyn Detector>,
}

impl PerceptionSuite {
    /// Operator-toggle detectors for all three kinds.
    pub fn operator_driven() -> Self {
        Self {
            human: Box::new(ToggleDetector::new(DetectorKind::Human)),
            debris: Box::new(ToggleDetector::new(DetectorKind::Debris)),
            injury: Box::new(ToggleDetector::new(DetectorKind::Injury)),
        }
    }
}

impl Default for PerceptionSuite {
    fn default() -> Self {
        Self::operator_driven()
    }
}
