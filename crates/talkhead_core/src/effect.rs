use crate::CancelAck;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Poll { delay: PollDelay },
    SendCancel,
    Finish(WaitOutcome),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollDelay {
    Immediate,
    /// The regular cadence between status queries.
    Interval,
    /// Retry after the given number of consecutive failures.
    Backoff { attempt: u32 },
}

/// How the wait loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome {
    Succeeded { artifact_url: String },
    Failed { reason: String },
    /// `ack` is `None` when the service reported the cancellation on its own.
    Cancelled { ack: Option<CancelAck> },
    /// Gave up polling; the remote job was left running.
    PollingFailed { attempts: u32, last_error: String },
}
