//! Supervised-target lifecycle state machine
//!
//! Pure state machine: receives events, returns (new_state, action).
//! The supervisors execute the I/O implied by each action.
//!
//! ```text
//! NotStarted -> Starting -> Healthy -> Stopped
//!                  |
//!                  +-> Failed   (retry budget exhausted / process exited)
//! ```
//!
//! `Stopped` and `Failed` may be re-entered into `Starting` by a new spawn,
//! which is how a simulator gets restarted between test cases.

use std::time::Duration;

/// Bounded health-check retry budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBudget {
    pub max_attempts: u32,
    pub interval: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisorState {
    NotStarted,
    /// Spawned; `attempt` is the 1-based number of the probe in flight
    Starting { attempt: u32 },
    Healthy,
    Failed { error: String },
    Stopped,
}

#[derive(Debug)]
pub enum SupervisorEvent {
    /// Process spawned / server task launched
    Spawned,
    ProbeSucceeded,
    ProbeFailed(String),
    /// The target went away before it became healthy
    Exited(String),
    StopRequested,
}

#[derive(Debug, PartialEq, Eq)]
pub enum SupervisorAction {
    /// Issue a health probe now
    Probe,
    /// Sleep, then probe again
    Wait { delay: Duration },
    /// Tear the target down and report the failure
    Terminate { error: String },
    None,
}

/// Handle a state transition. Pure function: no I/O.
pub fn handle_event(
    state: SupervisorState,
    event: SupervisorEvent,
    budget: RetryBudget,
) -> (SupervisorState, SupervisorAction) {
    match (state, event) {
        // --- (re)start ---
        (
            SupervisorState::NotStarted | SupervisorState::Stopped | SupervisorState::Failed { .. },
            SupervisorEvent::Spawned,
        ) => (
            SupervisorState::Starting { attempt: 1 },
            SupervisorAction::Probe,
        ),

        // --- Starting ---
        (SupervisorState::Starting { .. }, SupervisorEvent::ProbeSucceeded) => {
            (SupervisorState::Healthy, SupervisorAction::None)
        }

        (SupervisorState::Starting { attempt }, SupervisorEvent::ProbeFailed(_))
            if attempt < budget.max_attempts =>
        {
            (
                SupervisorState::Starting {
                    attempt: attempt + 1,
                },
                SupervisorAction::Wait {
                    delay: budget.interval,
                },
            )
        }

        (SupervisorState::Starting { attempt }, SupervisorEvent::ProbeFailed(last)) => {
            let error = format!("not healthy after {attempt} attempts, last error: {last}");
            (
                SupervisorState::Failed {
                    error: error.clone(),
                },
                SupervisorAction::Terminate { error },
            )
        }

        (SupervisorState::Starting { .. }, SupervisorEvent::Exited(reason)) => (
            SupervisorState::Failed {
                error: reason.clone(),
            },
            SupervisorAction::Terminate { error: reason },
        ),

        // --- stop: Failed stays Failed so the cause remains visible ---
        (state @ SupervisorState::Failed { .. }, SupervisorEvent::StopRequested) => {
            (state, SupervisorAction::None)
        }

        (_, SupervisorEvent::StopRequested) => (SupervisorState::Stopped, SupervisorAction::None),

        // --- Invalid/unhandled transition: stay in current state ---
        (state, _event) => (state, SupervisorAction::None),
    }
}
