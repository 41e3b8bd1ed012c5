use crate::{Effect, JobPhase, JobState, JobStatus, Msg, PollDelay, WaitOutcome};

/// Pure update function: applies a message to the job state and returns the effects to run.
///
/// Once the job is settled every message is ignored, so nothing can trigger a
/// poll or a cancel after a terminal status. While a cancel is outstanding only
/// its completion is accepted.
pub fn update(mut state: JobState, msg: Msg) -> (JobState, Vec<Effect>) {
    if state.phase().is_settled() {
        return (state, Vec::new());
    }

    let effects = match (state.phase(), msg) {
        (JobPhase::CancelRequested, Msg::CancelCompleted(ack)) => {
            state.set_phase(JobPhase::Cancelled);
            vec![Effect::Finish(WaitOutcome::Cancelled { ack: Some(ack) })]
        }
        (JobPhase::CancelRequested, _) => Vec::new(),
        (_, Msg::CancelCompleted(_)) => Vec::new(),
        (JobPhase::Submitted, Msg::Started) => schedule_poll(&mut state, PollDelay::Immediate),
        (_, Msg::Started) => Vec::new(),
        (_, Msg::StatusObserved(status)) => {
            state.reset_failures();
            match status {
                JobStatus::Queued => {
                    state.set_phase(JobPhase::Queued);
                    schedule_poll(&mut state, PollDelay::Interval)
                }
                JobStatus::Running => {
                    state.set_phase(JobPhase::Running);
                    schedule_poll(&mut state, PollDelay::Interval)
                }
                JobStatus::Succeeded(artifact_url) => {
                    state.set_phase(JobPhase::Succeeded);
                    vec![Effect::Finish(WaitOutcome::Succeeded { artifact_url })]
                }
                JobStatus::Failed(reason) => {
                    state.set_phase(JobPhase::Failed);
                    vec![Effect::Finish(WaitOutcome::Failed { reason })]
                }
                JobStatus::Cancelled => {
                    state.set_phase(JobPhase::Cancelled);
                    vec![Effect::Finish(WaitOutcome::Cancelled { ack: None })]
                }
            }
        }
        (_, Msg::PollFailed { message, retryable }) => {
            let exhausted = state.record_failure();
            if exhausted || !retryable {
                state.set_phase(JobPhase::Abandoned);
                vec![Effect::Finish(WaitOutcome::PollingFailed {
                    attempts: state.consecutive_failures(),
                    last_error: message,
                })]
            } else {
                let attempt = state.consecutive_failures();
                schedule_poll(&mut state, PollDelay::Backoff { attempt })
            }
        }
        (_, Msg::Interrupted) => {
            state.set_phase(JobPhase::CancelRequested);
            vec![Effect::SendCancel]
        }
    };

    (state, effects)
}

fn schedule_poll(state: &mut JobState, delay: PollDelay) -> Vec<Effect> {
    state.note_poll_scheduled();
    vec![Effect::Poll { delay }]
}
