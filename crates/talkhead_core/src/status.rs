use std::fmt;

/// Server-reported state of a render job. Re-read on every poll, never cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Queued,
    Running,
    Succeeded(String),
    Failed(String),
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Succeeded(_) | JobStatus::Failed(_) | JobStatus::Cancelled
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Succeeded(_) => "succeeded",
            JobStatus::Failed(_) => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Succeeded(url) => write!(f, "succeeded ({url})"),
            JobStatus::Failed(reason) => write!(f, "failed: {reason}"),
            other => write!(f, "{}", other.label()),
        }
    }
}

/// What the service said about a cancellation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelAck {
    Acknowledged,
    /// The job had already finished; nothing was cancelled.
    AlreadyTerminal,
    NotAcknowledged(String),
}

impl fmt::Display for CancelAck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelAck::Acknowledged => write!(f, "cancellation acknowledged by the service"),
            CancelAck::AlreadyTerminal => {
                write!(f, "job had already finished; cancellation was a no-op")
            }
            CancelAck::NotAcknowledged(reason) => {
                write!(f, "cancellation not acknowledged: {reason}")
            }
        }
    }
}
