//! [`PhaseClock`] – per-phase deadline tracking.
//!
//! The mission re-arms the clock on every phase change and asks
//! [`PhaseClock::health`] once per tick.  All methods take the current
//! [`Instant`] explicitly so the mission loop (and its tests) control time.
//!
//! [`Interval`] covers the smaller periodic duties inside a phase, such as
//! calling out every few seconds while searching.

use std::time::{Duration, Instant};

use rescue_types::MissionPhase;

/// Deadline state of the current phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseHealth {
    /// The phase is within its time budget (or has none).
    OnTime,
    /// The phase has run past its timeout.
    TimedOut,
}

/// Tracks when the mission started and when the current phase was entered.
///
/// # Example
///
/// ```
/// use std::time::{Duration, Instant};
/// use rescue_kernel::phase_clock::{PhaseClock, PhaseHealth};
/// use rescue_types::MissionPhase;
///
/// let t0 = Instant::now();
/// let clock = PhaseClock::start(MissionPhase::Search, t0, Some(Duration::from_secs(120)));
///
/// assert_eq!(clock.health(t0 + Duration::from_secs(60)), PhaseHealth::OnTime);
/// assert_eq!(clock.health(t0 + Duration::from_secs(121)), PhaseHealth::TimedOut);
/// ```
#[derive(Debug, Clone)]
pub struct PhaseClock {
    mission_started: Instant,
    phase: MissionPhase,
    entered_at: Instant,
    timeout: Option<Duration>,
}

impl PhaseClock {
    pub fn start(phase: MissionPhase, now: Instant, timeout: Option<Duration>) -> Self {
        Self {
            mission_started: now,
            phase,
            entered_at: now,
            timeout,
        }
    }

    /// Re-arm the clock for `phase`.  The mission start time is kept.
    pub fn enter(&mut self, phase: MissionPhase, now: Instant, timeout: Option<Duration>) {
        self.phase = phase;
        self.entered_at = now;
        self.timeout = timeout;
    }

    pub fn phase(&self) -> MissionPhase {
        self.phase
    }

    /// Time spent in the current phase.
    pub fn in_phase(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.entered_at)
    }

    /// Time since the mission started.
    pub fn mission_elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.mission_started)
    }

    pub fn health(&self, now: Instant) -> PhaseHealth {
        match self.timeout {
            Some(limit) if self.in_phase(now) > limit => PhaseHealth::TimedOut,
            _ => PhaseHealth::OnTime,
        }
    }
}

/// A periodic duty that fires at most once per `period`.
#[derive(Debug, Clone)]
pub struct Interval {
    period: Duration,
    last: Option<Instant>,
}

impl Interval {
    pub fn new(period: Duration) -> Self {
        Self { period, last: None }
    }

    /// `true` (and the interval restarts) when the duty should run at `now`.
    /// The first call always fires.
    pub fn due(&mut self, now: Instant) -> bool {
        let fire = match self.last {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.period,
        };
        if fire {
            self.last = Some(now);
        }
        fire
    }

    /// Forget the last firing so the next [`Interval::due`] fires.
    pub fn reset(&mut self) {
        self.last = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    #[test]
    fn fresh_phase_is_on_time() {
        let t0 = Instant::now();
        let clock = PhaseClock::start(MissionPhase::Search, t0, Some(secs(5)));
        assert_eq!(clock.health(t0), PhaseHealth::OnTime);
    }

    #[test]
    fn phase_times_out_after_limit() {
        let t0 = Instant::now();
        let clock = PhaseClock::start(MissionPhase::Approach, t0, Some(secs(5)));
        assert_eq!(clock.health(t0 + secs(5)), PhaseHealth::OnTime);
        assert_eq!(clock.health(t0 + secs(6)), PhaseHealth::TimedOut);
    }

    #[test]
    fn phase_without_timeout_never_expires() {
        let t0 = Instant::now();
        let clock = PhaseClock::start(MissionPhase::Done, t0, None);
        assert_eq!(clock.health(t0 + secs(86_400)), PhaseHealth::OnTime);
    }

    #[test]
    fn entering_a_phase_resets_the_deadline_but_not_mission_time() {
        let t0 = Instant::now();
        let mut clock = PhaseClock::start(MissionPhase::Search, t0, Some(secs(5)));
        clock.enter(MissionPhase::Approach, t0 + secs(4), Some(secs(5)));

        assert_eq!(clock.phase(), MissionPhase::Approach);
        assert_eq!(clock.health(t0 + secs(8)), PhaseHealth::OnTime);
        assert_eq!(clock.in_phase(t0 + secs(8)), secs(4));
        assert_eq!(clock.mission_elapsed(t0 + secs(8)), secs(8));
    }

    #[test]
    fn time_before_entry_saturates_to_zero() {
        let t0 = Instant::now();
        let clock = PhaseClock::start(MissionPhase::Search, t0 + secs(10), Some(secs(1)));
        assert_eq!(clock.in_phase(t0), Duration::ZERO);
    }

    #[test]
    fn interval_fires_first_then_once_per_period() {
        let t0 = Instant::now();
        let mut callout = Interval::new(secs(5));
        assert!(callout.due(t0));
        assert!(!callout.due(t0 + secs(3)));
        assert!(callout.due(t0 + secs(5)));
        assert!(!callout.due(t0 + secs(9)));
        assert!(callout.due(t0 + secs(10)));
    }

    #[test]
    fn interval_reset_fires_immediately() {
        let t0 = Instant::now();
        let mut callout = Interval::new(secs(5));
        assert!(callout.due(t0));
        callout.reset();
        assert!(callout.due(t0 + secs(1)));
    }
}
