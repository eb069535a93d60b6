use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

pub mod portfolio;

/// Represents the lifecycle status of the portfolio environment.
///
/// # Lifecycle
///
/// The environment follows a finite state machine (FSM) with the following valid transitions.
/// Other transitions return an error.
///
/// ```md
/// Current State (optional step context)   | Action  | Next State    | Notes
/// ----------------------------------------|---------|---------------|-------------------------------
/// `Uninitialized`                         | reset() | Ready         | Holdings initialized
/// `Ready`                                 | (none)  | Running       | Immediately, within reset()
/// `Running` (last date or loss breaker)   | step()  | Terminated    | Episode ends
/// `Running`                               | step()  | Running       | Continue within episode
/// any                                     | reset() | Running       | Restart the episode
/// any                                     | close() | Running       | Same as reset()
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EnvStatus {
    /// Constructed, `reset()` was never called.
    #[default]
    Uninitialized,

    /// Holdings are initialized, the first observation is not yet emitted.
    Ready,

    /// An episode is active and the environment accepts `step()` calls.
    Running,

    /// The active episode has ended. Only `reset()` or `close()` are allowed.
    Terminated,
}

impl EnvStatus {
    pub fn is_uninitialized(&self) -> bool {
        matches!(self, Self::Uninitialized)
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }

    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }

    pub fn is_terminated(&self) -> bool {
        matches!(self, Self::Terminated)
    }
}

/// Result classification of a single step.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum StepOutcome {
    #[default]
    InProgress,
    /// The loss circuit breaker fired.
    Terminated,
    /// The last decision date was reached.
    Truncated,
}

impl StepOutcome {
    pub fn is_terminated(&self) -> bool {
        matches!(self, Self::Terminated)
    }

    pub fn is_truncated(&self) -> bool {
        matches!(self, Self::Truncated)
    }

    pub fn is_terminal(&self) -> bool {
        self.is_terminated() || self.is_truncated()
    }
}
