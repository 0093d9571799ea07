//! [`PhasePolicy`] – the declarative transition table for a mission.
//!
//! Three things are configured per phase:
//!
//! - which phases it may move to ([`PhasePolicy::permit`] / [`PhasePolicy::check`]),
//! - how long it may last before it is abandoned ([`PhasePolicy::timeout_for`]),
//! - where to go when it times out or a capability fails
//!   ([`PhasePolicy::fallback_for`], [`PhasePolicy::failure_policy`]).
//!
//! Fallback edges are part of the table: [`PhasePolicy::set_fallback`] also
//! permits the edge, so a forced transition is never one the policy would
//! deny.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use rescue_types::{MissionPhase, RescueError};

/// What the mission does when a capability call fails in a given phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Try the call once more; if that also fails, take the fallback edge.
    RetryOnce,
    /// Take the fallback edge immediately.
    Fallback,
}

/// Allowed transitions, timeouts and fallbacks for every phase.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use rescue_kernel::phase_policy::PhasePolicy;
/// use rescue_types::MissionPhase;
///
/// let policy = PhasePolicy::standard(Duration::from_secs(120));
///
/// assert!(policy.check(MissionPhase::Search, MissionPhase::Approach).is_ok());
/// assert!(policy.check(MissionPhase::Done, MissionPhase::Search).is_err());
/// assert_eq!(policy.fallback_for(MissionPhase::Approach), Some(MissionPhase::Search));
/// ```
#[derive(Debug, Clone, Default)]
pub struct PhasePolicy {
    allowed: HashMap<MissionPhase, HashSet<MissionPhase>>,
    timeouts: HashMap<MissionPhase, Duration>,
    fallbacks: HashMap<MissionPhase, MissionPhase>,
    on_failure: HashMap<MissionPhase, FailurePolicy>,
}

impl PhasePolicy {
    /// An empty policy: nothing is permitted and no phase ever times out.
    pub fn new() -> Self {
        Self::default()
    }

    /// The rescue mission table.
    ///
    /// Every phase may advance to its nominal successor.  Additionally,
    /// `Approach` may drop back to `Search` when the person is lost, phases
    /// may skip ahead when there is nothing to do, and every non-terminal
    /// phase times out after `phase_timeout`.
    pub fn standard(phase_timeout: Duration) -> Self {
        use MissionPhase::*;

        let mut policy = Self::new();
        for phase in MissionPhase::ALL {
            if let Some(next) = phase.next() {
                policy.permit(phase, next);
                policy.set_timeout(phase, phase_timeout);
            }
        }

        policy.permit(Approach, AssistCommunicate);
        policy.permit(ClearDebris, Document);
        policy.permit(AssistCommunicate, Report);
        policy.permit(Document, Done);

        policy.set_fallback(Search, Report, FailurePolicy::RetryOnce);
        policy.set_fallback(Approach, Search, FailurePolicy::RetryOnce);
        policy.set_fallback(ClearDebris, AssistCommunicate, FailurePolicy::Fallback);
        policy.set_fallback(AssistCommunicate, Document, FailurePolicy::RetryOnce);
        policy.set_fallback(Document, Report, FailurePolicy::RetryOnce);
        policy.set_fallback(Report, Done, FailurePolicy::RetryOnce);
        policy
    }

    /// Permit `from → to`.  Duplicate permits are ignored.
    pub fn permit(&mut self, from: MissionPhase, to: MissionPhase) {
        self.allowed.entry(from).or_default().insert(to);
    }

    /// Remove `from → to`.  No-op if it was never permitted.
    pub fn forbid(&mut self, from: MissionPhase, to: MissionPhase) {
        if let Some(set) = self.allowed.get_mut(&from) {
            set.remove(&to);
        }
    }

    pub fn is_permitted(&self, from: MissionPhase, to: MissionPhase) -> bool {
        self.allowed
            .get(&from)
            .map(|s| s.contains(&to))
            .unwrap_or(false)
    }

    /// `Ok(())` when `from → to` is permitted, [`RescueError::TransitionDenied`]
    /// otherwise.
    pub fn check(&self, from: MissionPhase, to: MissionPhase) -> Result<(), RescueError> {
        if self.is_permitted(from, to) {
            Ok(())
        } else {
            Err(RescueError::TransitionDenied { from, to })
        }
    }

    pub fn set_timeout(&mut self, phase: MissionPhase, timeout: Duration) {
        self.timeouts.insert(phase, timeout);
    }

    /// `None` means the phase never times out.
    pub fn timeout_for(&self, phase: MissionPhase) -> Option<Duration> {
        self.timeouts.get(&phase).copied()
    }

    /// Configure where `phase` goes on timeout or capability failure.
    pub fn set_fallback(&mut self, phase: MissionPhase, target: MissionPhase, on_failure: FailurePolicy) {
        self.permit(phase, target);
        self.fallbacks.insert(phase, target);
        self.on_failure.insert(phase, on_failure);
    }

    pub fn fallback_for(&self, phase: MissionPhase) -> Option<MissionPhase> {
        self.fallbacks.get(&phase).copied()
    }

    /// Defaults to [`FailurePolicy::Fallback`] for unconfigured phases.
    pub fn failure_policy(&self, phase: MissionPhase) -> FailurePolicy {
        self.on_failure
            .get(&phase)
            .copied()
            .unwrap_or(FailurePolicy::Fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use MissionPhase::*;

    fn standard() -> PhasePolicy {
        PhasePolicy::standard(Duration::from_secs(120))
    }

    #[test]
    fn nominal_successors_are_permitted() {
        let policy = standard();
        for phase in MissionPhase::ALL {
            if let Some(next) = phase.next() {
                assert!(policy.is_permitted(phase, next), "{phase} -> {next}");
            }
        }
    }

    #[test]
    fn approach_may_return_to_search() {
        assert!(standard().check(Approach, Search).is_ok());
    }

    #[test]
    fn backward_jumps_are_denied() {
        let policy = standard();
        let result = policy.check(Document, Search);
        assert!(matches!(
            result,
            Err(RescueError::TransitionDenied { from: Document, to: Search })
        ));
        assert!(policy.check(Report, AssistCommunicate).is_err());
    }

    #[test]
    fn done_is_terminal() {
        let policy = standard();
        for phase in MissionPhase::ALL {
            assert!(!policy.is_permitted(Done, phase));
        }
        assert!(policy.timeout_for(Done).is_none());
        assert!(policy.fallback_for(Done).is_none());
    }

    #[test]
    fn every_fallback_edge_is_permitted() {
        let policy = standard();
        for phase in MissionPhase::ALL {
            if let Some(target) = policy.fallback_for(phase) {
                assert!(policy.is_permitted(phase, target), "{phase} -> {target}");
            }
        }
    }

    #[test]
    fn timeouts_apply_to_every_live_phase() {
        let policy = PhasePolicy::standard(Duration::from_secs(30));
        for phase in MissionPhase::ALL.into_iter().filter(|p| !p.is_terminal()) {
            assert_eq!(policy.timeout_for(phase), Some(Duration::from_secs(30)));
        }
    }

    #[test]
    fn debris_failures_fall_back_immediately() {
        let policy = standard();
        assert_eq!(policy.failure_policy(ClearDebris), FailurePolicy::Fallback);
        assert_eq!(policy.failure_policy(Approach), FailurePolicy::RetryOnce);
    }

    #[test]
    fn forbid_removes_an_edge() {
        let mut policy = standard();
        policy.forbid(Approach, Search);
        assert!(policy.check(Approach, Search).is_err());
        // Forbidding something never permitted is a no-op.
        policy.forbid(Done, Search);
    }

    #[test]
    fn empty_policy_denies_everything() {
        let policy = PhasePolicy::new();
        assert!(policy.check(Search, Approach).is_err());
        assert_eq!(policy.failure_policy(Search), FailurePolicy::Fallback);
    }
}
