// Decision arbitration
//
// The agent renders its verdict through a tool call; the candidate can
// end the interview early; timers can force a conclusion. Exactly one
// of these may produce the final result. The arbiter owns that
// guarantee with a tagged state machine instead of guard booleans, so
// finalizing twice is structurally impossible.

use serde::{Deserialize, Serialize};
use tracing::warn;

/// The agent's pass/fail call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub passed: bool,
    pub reason: String,
}

/// What a decision submission did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    /// First decision of the session; finalization should begin.
    Accepted,
    /// A decision already exists; this one is logged and ignored.
    DuplicateIgnored,
    /// The session already finalized; nothing to do.
    AlreadyFinalized,
}

#[derive(Debug)]
enum DecisionState {
    Undecided,
    Decided(Verdict),
    Finalized,
}

/// Owns the single-fire guarantee on the final result.
#[derive(Debug)]
pub struct DecisionArbiter {
    state: DecisionState,
}

impl DecisionArbiter {
    pub fn new() -> Self {
        Self {
            state: DecisionState::Undecided,
        }
    }

    /// Record the agent's decision. Only the first one counts.
    pub fn submit(&mut self, verdict: Verdict) -> Submission {
        match &self.state {
            DecisionState::Undecided => {
                self.state = DecisionState::Decided(verdict);
                Submission::Accepted
            }
            DecisionState::Decided(existing) => {
                warn!(
                    "Duplicate agent decision ignored (existing: passed={})",
                    existing.passed
                );
                Submission::DuplicateIgnored
            }
            DecisionState::Finalized => {
                warn!("Agent decision arrived after finalization, ignored");
                Submission::AlreadyFinalized
            }
        }
    }

    /// The stored agent verdict, if any.
    pub fn decided(&self) -> Option<&Verdict> {
        match &self.state {
            DecisionState::Decided(verdict) => Some(verdict),
            _ => None,
        }
    }

    /// Take the one-and-only final verdict.
    ///
    /// The agent's stored decision is authoritative once rendered;
    /// `fallback` is used only when no decision exists (manual stop,
    /// security violation, hard timeout). Returns None if the session
    /// already finalized; every later signal is a no-op.
    pub fn finalize_with(&mut self, fallback: impl FnOnce() -> Verdict) -> Option<Verdict> {
        match std::mem::replace(&mut self.state, DecisionState::Finalized) {
            DecisionState::Undecided => Some(fallback()),
            DecisionState::Decided(verdict) => Some(verdict),
            DecisionState::Finalized => None,
        }
    }

    pub fn is_finalized(&self) -> bool {
        matches!(self.state, DecisionState::Finalized)
    }
}

impl Default for DecisionArbiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pass() -> Verdict {
        Verdict {
            passed: true,
            reason: "Answered all questions correctly".to_string(),
        }
    }

    fn fail() -> Verdict {
        Verdict {
            passed: false,
            reason: "Second decision, must be ignored".to_string(),
        }
    }

    fn terminated() -> Verdict {
        Verdict {
            passed: false,
            reason: "Terminated by candidate".to_string(),
        }
    }

    #[test]
    fn test_second_decision_is_ignored() {
        let mut arbiter = DecisionArbiter::new();

        assert_eq!(arbiter.submit(pass()), Submission::Accepted);
        assert_eq!(arbiter.submit(fail()), Submission::DuplicateIgnored);

        // Only the first decision is finalized
        let verdict = arbiter.finalize_with(terminated).unwrap();
        assert!(verdict.passed);
        assert_eq!(verdict.reason, "Answered all questions correctly");
    }

    #[test]
    fn test_manual_stop_before_decision_uses_fallback() {
        let mut arbiter = DecisionArbiter::new();

        let verdict = arbiter.finalize_with(terminated).unwrap();
        assert!(!verdict.passed);
        assert_eq!(verdict.reason, "Terminated by candidate");
    }

    #[test]
    fn test_manual_stop_after_decision_uses_agent_verdict() {
        let mut arbiter = DecisionArbiter::new();
        arbiter.submit(pass());

        // The candidate clicked "end interview" after the agent decided:
        // the agent's verdict wins, not the generic termination reason
        let verdict = arbiter.finalize_with(terminated).unwrap();
        assert!(verdict.passed);
        assert_eq!(verdict.reason, "Answered all questions correctly");
    }

    #[test]
    fn test_finalization_is_idempotent() {
        let mut arbiter = DecisionArbiter::new();

        assert!(arbiter.finalize_with(terminated).is_some());
        assert!(arbiter.finalize_with(terminated).is_none());
        assert!(arbiter.finalize_with(pass).is_none());
        assert!(arbiter.is_finalized());
    }

    #[test]
    fn test_decision_after_finalization_is_noop() {
        let mut arbiter = DecisionArbiter::new();
        arbiter.finalize_with(terminated);

        assert_eq!(arbiter.submit(pass()), Submission::AlreadyFinalized);
        assert!(arbiter.finalize_with(pass).is_none());
    }
}
