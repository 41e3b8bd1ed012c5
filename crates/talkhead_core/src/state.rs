/// The controller's view of one remote job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JobPhase {
    #[default]
    Submitted,
    Queued,
    Running,
    CancelRequested,
    Succeeded,
    Failed,
    Cancelled,
    /// Polling gave up; the remote outcome is unknown.
    Abandoned,
}

impl JobPhase {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobPhase::Succeeded | JobPhase::Failed | JobPhase::Cancelled
        )
    }

    /// No further remote calls are allowed for this job.
    pub fn is_settled(self) -> bool {
        self.is_terminal() || self == JobPhase::Abandoned
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct JobState {
    phase: JobPhase,
    consecutive_failures: u32,
    retry_budget: u32,
    polls_scheduled: u32,
}

impl JobState {
    /// `retry_budget` is how many consecutive failed polls are retried before giving up.
    pub fn new(retry_budget: u32) -> Self {
        Self {
            retry_budget,
            ..Self::default()
        }
    }

    pub fn phase(&self) -> JobPhase {
        self.phase
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn polls_scheduled(&self) -> u32 {
        self.polls_scheduled
    }

    pub(crate) fn set_phase(&mut self, phase: JobPhase) {
        self.phase = phase;
    }

    pub(crate) fn reset_failures(&mut self) {
        self.consecutive_failures = 0;
    }

    /// Records a failure and reports whether the retry budget is exhausted.
    pub(crate) fn record_failure(&mut self) -> bool {
        self.consecutive_failures += 1;
        self.consecutive_failures > self.retry_budget
    }

    pub(crate) fn note_poll_scheduled(&mut self) {
        self.polls_scheduled += 1;
    }
}
