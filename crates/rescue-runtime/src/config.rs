//! [`MissionConfig`] – tunables for one mission.
//!
//! Durations are stored as seconds so the struct can be embedded directly
//! in the CLI's TOML config; the `*_timeout()` style accessors turn them
//! into [`Duration`]s and treat negative or non-finite values as zero.

use std::time::Duration;

use rescue_dialogue::ScriptKind;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MissionConfig {
    /// How long any phase may run before its fallback is forced.
    pub phase_timeout_s: f64,
    /// Minimum gap between search callouts.
    pub callout_interval_s: f64,
    /// How long to listen for a reply after a question.
    pub response_timeout_s: f64,
    /// Stop after this many ticks; 0 means no limit.
    pub max_ticks: u64,
    pub script: ScriptKind,
    pub use_reasoner: bool,
    /// Minimum reasoner confidence acted on while searching or approaching.
    pub search_confidence_threshold: f64,
    /// Minimum reasoner confidence acted on while talking to the person.
    pub dialogue_confidence_threshold: f64,
    /// Minimum detector confidence that counts as a person found.
    pub human_confidence_threshold: f64,
    /// Consecutive unanswered questions before giving up on dialogue.
    pub max_silent_prompts: u32,
    /// Identical reasoner proposals in a row before they are ignored.
    pub loop_guard_threshold: usize,
    /// Distance covered by `forward_slow` / `back_up`.
    pub motion_step_m: f64,
    /// Turn applied by `rotate_left` / `rotate_right`.
    pub rotate_step_rad: f64,
    /// Distance to keep from the person when approaching.
    pub approach_standoff_m: f64,
}

impl Default for MissionConfig {
    fn default() -> Self {
        Self {
            phase_timeout_s: 120.0,
            callout_interval_s: 5.0,
            response_timeout_s: 8.0,
            max_ticks: 0,
            script: ScriptKind::March,
            use_reasoner: false,
            search_confidence_threshold: 0.6,
            dialogue_confidence_threshold: 0.5,
            human_confidence_threshold: 0.5,
            max_silent_prompts: 2,
            loop_guard_threshold: 3,
            motion_step_m: 0.3,
            rotate_step_rad: std::f64::consts::FRAC_PI_4,
            approach_standoff_m: 0.5,
        }
    }
}

impl MissionConfig {
    pub fn phase_timeout(&self) -> Duration {
        seconds(self.phase_timeout_s)
    }

    pub fn callout_interval(&self) -> Duration {
        seconds(self.callout_interval_s)
    }

    pub fn response_timeout(&self) -> Duration {
        seconds(self.response_timeout_s)
    }
}

/// Lenient seconds → [`Duration`].  Negative and NaN are zero; values too
/// large for a `Duration` (including infinity) saturate to [`Duration::MAX`].
pub fn seconds(s: f64) -> Duration {
    if s.is_nan() || s <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(s).unwrap_or(Duration::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = MissionConfig::default();
        assert_eq!(c.phase_timeout(), Duration::from_secs(120));
        assert_eq!(c.callout_interval(), Duration::from_secs(5));
        assert_eq!(c.response_timeout(), Duration::from_secs(8));
        assert_eq!(c.script, ScriptKind::March);
        assert_eq!(c.max_silent_prompts, 2);
        assert_eq!(c.loop_guard_threshold, 3);
    }

    #[test]
    fn seconds_clamp_to_the_duration_range() {
        assert_eq!(seconds(-4.0), Duration::ZERO);
        assert_eq!(seconds(f64::NAN), Duration::ZERO);
        assert_eq!(seconds(f64::NEG_INFINITY), Duration::ZERO);
        assert_eq!(seconds(f64::INFINITY), Duration::MAX);
        assert_eq!(seconds(1e30), Duration::MAX);
        assert_eq!(seconds(1.5), Duration::from_millis(1500));
    }

    #[test]
    fn partial_config_fills_in_defaults() {
        let c: MissionConfig = serde_json::from_str(r#"{"script":"linear","max_ticks":50}"#).unwrap();
        assert_eq!(c.script, ScriptKind::Linear);
        assert_eq!(c.max_ticks, 50);
        assert_eq!(c.phase_timeout_s, 120.0);
    }
}
