// Connection supervision
//
// Owns the session's connection lifecycle state and the reconnect
// budget. A close/error shortly after a connect attempt began is a
// configuration failure (the transport rejected the session outright)
// and is never retried; anything later is a transient drop retried with
// exponential backoff until the budget is spent.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

/// Session connection lifecycle state.
///
/// Mutated only by the supervisor and the session engine. `Ended` is
/// terminal: no transition ever leaves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Idle,
    Initializing,
    Connecting,
    Connected,
    Reconnecting,
    Error,
    Ended,
}

/// Reconnect allowance for one session.
///
/// Reset to zero only on a newly established connection.
#[derive(Debug, Clone)]
pub struct RetryBudget {
    attempts: u32,
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl RetryBudget {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            attempts: 0,
            max_attempts,
            base_delay,
            max_delay,
        }
    }

    /// Delay before the next reconnect, or None once the budget is spent.
    ///
    /// Schedule doubles per attempt (1s, 2s, 4s with the defaults),
    /// capped at `max_delay`.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.attempts >= self.max_attempts {
            return None;
        }

        let delay = (self.base_delay * 2u32.saturating_pow(self.attempts)).min(self.max_delay);
        self.attempts += 1;
        Some(delay)
    }

    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

impl Default for RetryBudget {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1), Duration::from_secs(5))
    }
}

/// How a close/error during or after a connect attempt is classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropDisposition {
    /// Transport rejected the session outright. Fatal, never retried.
    ConfigurationFailure,
    /// Transient drop; reconnect after the delay.
    Reconnect { delay: Duration, attempt: u32 },
    /// Transient drop with the retry budget spent.
    RetriesExhausted { attempts: u32 },
    /// Intentional shutdown in progress; no retry is scheduled.
    Suppressed,
}

pub struct ConnectionSupervisor {
    state: ConnectionState,
    budget: RetryBudget,
    /// A drop earlier than this after a connect attempt began counts as
    /// an outright rejection.
    rejection_window: Duration,
    shutting_down: bool,
}

impl ConnectionSupervisor {
    pub fn new(budget: RetryBudget, rejection_window: Duration) -> Self {
        Self {
            state: ConnectionState::Idle,
            budget,
            rejection_window,
            shutting_down: false,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn attempts(&self) -> u32 {
        self.budget.attempts()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down
    }

    /// Move to a new lifecycle state. `Ended` is absorbing.
    pub fn set_state(&mut self, state: ConnectionState) {
        if self.state == ConnectionState::Ended {
            return;
        }
        self.state = state;
    }

    /// A connect attempt is starting.
    pub fn begin_attempt(&mut self) {
        let state = if self.budget.attempts() == 0 {
            ConnectionState::Connecting
        } else {
            ConnectionState::Reconnecting
        };
        self.set_state(state);
    }

    /// Connection established: the budget resets for the new link.
    pub fn on_open(&mut self) {
        self.budget.reset();
        self.set_state(ConnectionState::Connected);
        info!("Dialogue transport connected");
    }

    /// Classify a close/error, given the elapsed time since the current
    /// connect attempt began.
    pub fn on_drop(&mut self, since_attempt: Duration) -> DropDisposition {
        if self.shutting_down {
            return DropDisposition::Suppressed;
        }

        if since_attempt < self.rejection_window {
            warn!(
                "Transport dropped {}ms after connect attempt: classified as rejection",
                since_attempt.as_millis()
            );
            self.set_state(ConnectionState::Error);
            return DropDisposition::ConfigurationFailure;
        }

        match self.budget.next_delay() {
            Some(delay) => {
                self.set_state(ConnectionState::Reconnecting);
                DropDisposition::Reconnect {
                    delay,
                    attempt: self.budget.attempts(),
                }
            }
            None => {
                self.set_state(ConnectionState::Error);
                DropDisposition::RetriesExhausted {
                    attempts: self.budget.attempts(),
                }
            }
        }
    }

    /// Intentional shutdown: suppress all further retry scheduling.
    pub fn shutdown(&mut self) {
        self.shutting_down = true;
    }

    /// Terminal transition.
    pub fn end(&mut self) {
        self.state = ConnectionState::Ended;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LATE: Duration = Duration::from_secs(30);

    fn supervisor() -> ConnectionSupervisor {
        ConnectionSupervisor::new(RetryBudget::default(), Duration::from_secs(1))
    }

    #[test]
    fn test_fast_drop_is_configuration_failure() {
        let mut sup = supervisor();
        sup.begin_attempt();

        let disposition = sup.on_drop(Duration::from_millis(400));

        assert_eq!(disposition, DropDisposition::ConfigurationFailure);
        assert_eq!(sup.state(), ConnectionState::Error);
        // Zero retries consumed
        assert_eq!(sup.attempts(), 0);
    }

    #[test]
    fn test_backoff_schedule_and_exhaustion() {
        let mut sup = supervisor();
        sup.begin_attempt();
        sup.on_open();

        // Three transient drops: delays 1s, 2s, 4s
        for expected_secs in [1u64, 2, 4] {
            match sup.on_drop(LATE) {
                DropDisposition::Reconnect { delay, .. } => {
                    assert_eq!(delay, Duration::from_secs(expected_secs));
                }
                other => panic!("expected reconnect, got {:?}", other),
            }
        }

        // Budget spent: no 4th attempt is scheduled
        assert_eq!(
            sup.on_drop(LATE),
            DropDisposition::RetriesExhausted { attempts: 3 }
        );
        assert_eq!(sup.state(), ConnectionState::Error);
    }

    #[test]
    fn test_delay_capped_at_max() {
        let mut budget = RetryBudget::new(5, Duration::from_secs(1), Duration::from_secs(5));

        assert_eq!(budget.next_delay(), Some(Duration::from_secs(1)));
        assert_eq!(budget.next_delay(), Some(Duration::from_secs(2)));
        assert_eq!(budget.next_delay(), Some(Duration::from_secs(4)));
        // 8s would exceed the cap
        assert_eq!(budget.next_delay(), Some(Duration::from_secs(5)));
        assert_eq!(budget.next_delay(), Some(Duration::from_secs(5)));
        assert_eq!(budget.next_delay(), None);
    }

    #[test]
    fn test_budget_resets_on_new_connection() {
        let mut sup = supervisor();

        sup.begin_attempt();
        sup.on_open();

        match sup.on_drop(LATE) {
            DropDisposition::Reconnect { attempt, .. } => assert_eq!(attempt, 1),
            other => panic!("expected reconnect, got {:?}", other),
        }

        // Reconnect succeeded: a later drop starts the schedule over
        sup.on_open();
        assert_eq!(sup.attempts(), 0);

        match sup.on_drop(LATE) {
            DropDisposition::Reconnect { delay, attempt } => {
                assert_eq!(delay, Duration::from_secs(1));
                assert_eq!(attempt, 1);
            }
            other => panic!("expected reconnect, got {:?}", other),
        }
    }

    #[test]
    fn test_shutdown_suppresses_retries() {
        let mut sup = supervisor();
        sup.begin_attempt();
        sup.on_open();

        sup.shutdown();
        assert_eq!(sup.on_drop(LATE), DropDisposition::Suppressed);
    }

    #[test]
    fn test_ended_state_is_absorbing() {
        let mut sup = supervisor();
        sup.end();

        sup.set_state(ConnectionState::Connected);
        sup.begin_attempt();
        sup.on_open();

        assert_eq!(sup.state(), ConnectionState::Ended);
    }
}
