/// Job state definitions for tracking the lifecycle of a crawl job
use std::fmt;

/// Represents the current state of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobState {
    /// Job has been created but no worker has picked it up yet
    Pending,

    /// Job is being executed by exactly one worker
    Running,

    /// Every target was walked to exhaustion without an error
    Completed,

    /// An error was recorded and not recovered
    Failed,
}

impl JobState {
    /// Returns true if moving from this state to `to` is a legal transition
    ///
    /// The only legal transitions are `Pending -> Running` and
    /// `Running -> {Completed, Failed}`.
    pub fn can_transition_to(&self, to: JobState) -> bool {
        matches!(
            (self, to),
            (Self::Pending, Self::Running)
                | (Self::Running, Self::Completed)
                | (Self::Running, Self::Failed)
        )
    }

    fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
