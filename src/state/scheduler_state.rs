/// Scheduler lifecycle state definitions
///
/// A scheduler only ever moves forward through these states.
use std::fmt;

/// Represents the current lifecycle state of a scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchedulerState {
    /// Engine launched, worker pool not yet accepting work
    Constructed,

    /// Accepting and executing requests
    Running,

    /// `stop()` in progress: draining or force-terminating workers
    Stopping,

    /// Workers gone and engine released
    Stopped,
}

impl SchedulerState {
    /// Returns true if `post` may submit work in this state
    pub fn is_accepting(&self) -> bool {
        matches!(self, Self::Running)
    }

    /// Returns true once `stop()` has begun
    pub fn is_shutting_down(&self) -> bool {
        matches!(self, Self::Stopping | Self::Stopped)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped)
    }

    /// Returns true if moving from `self` to `next` is allowed
    ///
    /// `Running -> Stopped` is permitted directly for schedulers that never
    /// had any work to drain.
    pub fn can_transition_to(&self, next: SchedulerState) -> bool {
        matches!(
            (self, next),
            (Self::Constructed, Self::Running)
                | (Self::Running, Self::Stopping)
                | (Self::Running, Self::Stopped)
                | (Self::Stopping, Self::Stopped)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Constructed => "constructed",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
