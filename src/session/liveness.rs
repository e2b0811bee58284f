// Liveness supervision
//
// Two independent clocks run against the candidate: a silence timer
// that escalates through strikes when nobody is saying anything, and a
// hard time budget that forces a conclusion with or without the agent's
// cooperation. The monitor is a pure state machine driven by the
// engine's one-second tick, so every escalation path is testable
// without timers.

use std::time::Duration;
use tracing::debug;

/// Knobs for silence and time-budget supervision.
#[derive(Debug, Clone)]
pub struct LivenessConfig {
    /// Candidate silence tolerated before a strike.
    pub silence_threshold: Duration,
    /// Strikes before the forced-fail escalation.
    pub strike_limit: u32,
    /// Hard overall budget, counted only while connected.
    pub time_budget: Duration,
    /// Wait after budget expiry before forcing a timeout failure.
    pub decision_grace: Duration,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            silence_threshold: Duration::from_secs(8),
            strike_limit: 3,
            time_budget: Duration::from_secs(600),
            decision_grace: Duration::from_secs(3),
        }
    }
}

/// Escalation steps the monitor asks the engine to take.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LivenessAction {
    /// Prompt the agent to check in with the candidate.
    CheckIn { strike: u32 },
    /// Final strike: instruct the agent to terminate and fail.
    ForceFail { strike: u32 },
    /// Budget exhausted: tell the agent to conclude immediately.
    BudgetExpired,
    /// Grace elapsed with no decision: force a timeout failure.
    TimeoutFinalize,
}

pub struct LivenessMonitor {
    config: LivenessConfig,
    /// Session-clock time of the last observed speech or issued strike.
    last_speech: Duration,
    strikes: u32,
    /// Time accumulated while connected; the budget counts against this.
    connected_time: Duration,
    expiry_notified: bool,
    grace_deadline: Option<Duration>,
    timed_out: bool,
}

impl LivenessMonitor {
    pub fn new(config: LivenessConfig) -> Self {
        Self {
            config,
            last_speech: Duration::ZERO,
            strikes: 0,
            connected_time: Duration::ZERO,
            expiry_notified: false,
            grace_deadline: None,
            timed_out: false,
        }
    }

    /// Speech energy crossed the threshold: clear strikes, restart the
    /// silence timer.
    pub fn observe_speech(&mut self, now: Duration) {
        if self.strikes > 0 {
            debug!("Speech observed, resetting {} silence strikes", self.strikes);
        }
        self.last_speech = now;
        self.strikes = 0;
    }

    pub fn strikes(&self) -> u32 {
        self.strikes
    }

    pub fn remaining_budget(&self) -> Duration {
        self.config.time_budget.saturating_sub(self.connected_time)
    }

    /// One supervision step.
    ///
    /// `elapsed` is the time since the previous tick; `agent_speaking`
    /// suppresses silence strikes (the candidate is never penalized
    /// while the agent itself is talking). Nothing runs while
    /// disconnected: reconnect windows neither strike nor burn budget.
    pub fn tick(
        &mut self,
        now: Duration,
        elapsed: Duration,
        connected: bool,
        agent_speaking: bool,
    ) -> Vec<LivenessAction> {
        let mut actions = Vec::new();

        if !connected {
            // Don't let the silence clock accuse the candidate for a
            // reconnect window either
            self.last_speech = now;
            return actions;
        }

        self.connected_time += elapsed;

        // Hard backstop, independent of the agent's cooperation
        if self.connected_time >= self.config.time_budget {
            if !self.expiry_notified {
                self.expiry_notified = true;
                self.grace_deadline = Some(now + self.config.decision_grace);
                actions.push(LivenessAction::BudgetExpired);
            } else if let Some(deadline) = self.grace_deadline {
                if now >= deadline && !self.timed_out {
                    self.timed_out = true;
                    actions.push(LivenessAction::TimeoutFinalize);
                }
            }
        }

        // Silence strikes pause while the agent is talking
        if !agent_speaking
            && self.strikes < self.config.strike_limit
            && now.saturating_sub(self.last_speech) >= self.config.silence_threshold
        {
            self.strikes += 1;
            // Issuing a strike restarts the timer: a grace window before
            // the next escalation
            self.last_speech = now;

            if self.strikes >= self.config.strike_limit {
                actions.push(LivenessAction::ForceFail {
                    strike: self.strikes,
                });
            } else {
                actions.push(LivenessAction::CheckIn {
                    strike: self.strikes,
                });
            }
        }

        actions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TICK: Duration = Duration::from_secs(1);

    fn monitor(budget_secs: u64) -> LivenessMonitor {
        LivenessMonitor::new(LivenessConfig {
            silence_threshold: Duration::from_secs(8),
            strike_limit: 3,
            time_budget: Duration::from_secs(budget_secs),
            decision_grace: Duration::from_secs(3),
        })
    }

    /// Drive the monitor second by second, collecting actions.
    fn run_ticks(
        monitor: &mut LivenessMonitor,
        start_secs: u64,
        count: u64,
        agent_speaking: bool,
    ) -> Vec<LivenessAction> {
        let mut actions = Vec::new();
        for i in 0..count {
            let now = Duration::from_secs(start_secs + i + 1);
            actions.extend(monitor.tick(now, TICK, true, agent_speaking));
        }
        actions
    }

    #[test]
    fn test_three_strikes_escalate_to_forced_fail() {
        let mut m = monitor(600);

        // 8s silence -> strike 1, then 8s more -> strike 2, then strike 3
        let actions = run_ticks(&mut m, 0, 24, false);

        assert_eq!(
            actions,
            vec![
                LivenessAction::CheckIn { strike: 1 },
                LivenessAction::CheckIn { strike: 2 },
                LivenessAction::ForceFail { strike: 3 },
            ]
        );

        // No further strikes after the limit
        let more = run_ticks(&mut m, 24, 20, false);
        assert!(more.is_empty());
    }

    #[test]
    fn test_speech_resets_strike_counter() {
        let mut m = monitor(600);

        let actions = run_ticks(&mut m, 0, 16, false);
        assert_eq!(actions.len(), 2);
        assert_eq!(m.strikes(), 2);

        m.observe_speech(Duration::from_secs(17));
        assert_eq!(m.strikes(), 0);

        // Timer restarted: the next strike is again strike 1
        let actions = run_ticks(&mut m, 17, 8, false);
        assert_eq!(actions, vec![LivenessAction::CheckIn { strike: 1 }]);
    }

    #[test]
    fn test_no_strikes_while_agent_is_speaking() {
        let mut m = monitor(600);

        let actions = run_ticks(&mut m, 0, 30, true);
        assert!(actions.is_empty());
        assert_eq!(m.strikes(), 0);
    }

    #[test]
    fn test_no_supervision_while_disconnected() {
        let mut m = monitor(600);

        let mut actions = Vec::new();
        for i in 0..30u64 {
            actions.extend(m.tick(Duration::from_secs(i + 1), TICK, false, false));
        }

        assert!(actions.is_empty());
        assert_eq!(m.remaining_budget(), Duration::from_secs(600));
    }

    #[test]
    fn test_budget_expiry_then_grace_then_timeout() {
        let mut m = monitor(10);

        // Agent speaking throughout so only budget actions fire
        let actions = run_ticks(&mut m, 0, 10, true);
        assert_eq!(actions, vec![LivenessAction::BudgetExpired]);

        // Within the 3s grace: nothing yet
        let actions = run_ticks(&mut m, 10, 2, true);
        assert!(actions.is_empty());

        // Grace elapsed: force-finalize exactly once
        let actions = run_ticks(&mut m, 12, 5, true);
        assert_eq!(actions, vec![LivenessAction::TimeoutFinalize]);
    }

    #[test]
    fn test_remaining_budget_counts_down() {
        let mut m = monitor(600);

        run_ticks(&mut m, 0, 5, true);
        assert_eq!(m.remaining_budget(), Duration::from_secs(595));
    }
}
