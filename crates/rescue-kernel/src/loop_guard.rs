//! [`LoopGuard`] – repeated-proposal detector.
//!
//! A reasoner that keeps proposing the same thing is not making progress.
//! The guard keeps a rolling window of the last `threshold` proposal
//! fingerprints (action plus spoken text).  When every entry in a full window
//! is identical, [`LoopGuard::record`] returns `true` and the caller should
//! discard the proposal and take its deterministic path instead.
//!
//! # Example
//!
//! ```rust
//! use rescue_kernel::loop_guard::LoopGuard;
//!
//! let mut guard = LoopGuard::new(3);
//!
//! assert!(!guard.record_key("rotate_left"));
//! assert!(!guard.record_key("rotate_left"));
//! assert!(guard.record_key("rotate_left")); // third repeat
//!
//! guard.reset();
//! assert!(!guard.record_key("rotate_left"));
//! ```

use std::collections::VecDeque;

use rescue_types::SanitizedDecision;

pub struct LoopGuard {
    threshold: usize,
    history: VecDeque<String>,
}

impl LoopGuard {
    /// `threshold` of 0 disables the guard.
    pub fn new(threshold: usize) -> Self {
        Self {
            threshold,
            history: VecDeque::with_capacity(threshold),
        }
    }

    /// Record a sanitized decision; `true` when it completes a run of
    /// `threshold` identical decisions.
    pub fn record(&mut self, decision: &SanitizedDecision) -> bool {
        self.record_key(&fingerprint(decision))
    }

    pub fn record_key(&mut self, key: &str) -> bool {
        if self.threshold == 0 {
            return false;
        }
        self.history.push_back(key.to_string());
        while self.history.len() > self.threshold {
            self.history.pop_front();
        }
        self.is_stuck()
    }

    pub fn is_stuck(&self) -> bool {
        if self.threshold == 0 || self.history.len() < self.threshold {
            return false;
        }
        let first = &self.history[0];
        self.history.iter().all(|a| a == first)
    }

    pub fn reset(&mut self) {
        self.history.clear();
    }
}

/// Action and normalised `say` text.  Confidence and timing are ignored so
/// that a reasoner nudging its numbers still counts as repeating itself.
fn fingerprint(decision: &SanitizedDecision) -> String {
    let say = decision.say.as_deref().unwrap_or("").trim().to_lowercase();
    format!("{}|{}", decision.action, say)
}
