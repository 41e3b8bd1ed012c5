use crate::{CancelAck, JobStatus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// The job was submitted (or resumed) and the wait loop is starting.
    Started,
    /// A status query returned and was decoded.
    StatusObserved(JobStatus),
    /// A status query failed. Failures that are not `retryable` end the wait at once.
    PollFailed { message: String, retryable: bool },
    /// The operator asked to stop waiting.
    Interrupted,
    /// The cancellation request returned.
    CancelCompleted(CancelAck),
}
