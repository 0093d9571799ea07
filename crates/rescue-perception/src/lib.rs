//! `rescue-perception` – what the robot sees.
//!
//! The mission consults three detectors: people, debris and visible
//! injuries.  Real vision models plug in behind the
//! [`Detector`][detector::Detector] trait; until then
//! [`ToggleDetector`][detector::ToggleDetector] lets an operator flip
//! detections on and off from the console.

pub mod detector;

pub use detector::{
    Detection, Detector, DetectorKind, Finding, OperatorFlags, PerceptionSuite, ScriptedDetector,
    ToggleDetector,
};
