use talkhead_engine::{PipelineError, PipelineFailure, ProbeError, RenderError};

pub const SUCCESS: u8 = 0;
pub const STAGE_FAILURE: u8 = 1;
pub const INPUT: u8 = 2;
pub const DECLINED: u8 = 3;
/// Conventional 128 + SIGINT.
pub const CANCELLED: u8 = 130;

pub fn code_for(error: &PipelineError) -> u8 {
    match &error.failure {
        PipelineFailure::Input(_)
        | PipelineFailure::Probe(ProbeError::NotFound(_))
        | PipelineFailure::Render(RenderError::InvalidMedia { .. }) => INPUT,
        PipelineFailure::ConfirmationDeclined => DECLINED,
        PipelineFailure::UserCancelled { .. } => CANCELLED,
        _ => STAGE_FAILURE,
    }
}

/// How to pick up a job that is still running remotely after this run gave up on it.
pub fn resume_hint(error: &PipelineError) -> Option<String> {
    match &error.failure {
        PipelineFailure::Render(RenderError::PollingFailed { request_id, .. }) => Some(format!(
            "fetch it later with: talkhead --resume-job {request_id}"
        )),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use talkhead_core::CancelAck;
    use talkhead_engine::{BillableExposure, Stage};

    fn error(stage: Stage, failure: PipelineFailure) -> PipelineError {
        PipelineError {
            stage,
            exposure: BillableExposure::default(),
            request_id: None,
            failure,
        }
    }

    #[test]
    fn failures_map_to_distinct_codes() {
        assert_eq!(
            code_for(&error(Stage::Input, PipelineFailure::Input("x".into()))),
            INPUT
        );
        assert_eq!(
            code_for(&error(
                Stage::Probe,
                PipelineFailure::Probe(ProbeError::NotFound(PathBuf::from("a.wav")))
            )),
            INPUT
        );
        assert_eq!(
            code_for(&error(
                Stage::Confirmation,
                PipelineFailure::ConfirmationDeclined
            )),
            DECLINED
        );
        assert_eq!(
            code_for(&error(
                Stage::Cancellation,
                PipelineFailure::UserCancelled {
                    ack: Some(CancelAck::Acknowledged)
                }
            )),
            CANCELLED
        );
        assert_eq!(
            code_for(&error(
                Stage::Polling,
                PipelineFailure::JobFailed {
                    reason: "no face".into()
                }
            )),
            STAGE_FAILURE
        );
        assert_eq!(
            code_for(&error(Stage::Polling, PipelineFailure::RemoteCancelled)),
            STAGE_FAILURE
        );
    }

    #[test]
    fn every_failure_is_non_zero() {
        let failure = error(
            Stage::Polling,
            PipelineFailure::Render(RenderError::PollingFailed {
                request_id: "r".into(),
                attempts: 5,
                last_error: "503".into(),
            }),
        );
        assert_ne!(code_for(&failure), SUCCESS);
    }

    #[test]
    fn only_abandoned_polling_suggests_resuming() {
        let abandoned = error(
            Stage::Polling,
            PipelineFailure::Render(RenderError::PollingFailed {
                request_id: "req-7".into(),
                attempts: 5,
                last_error: "503".into(),
            }),
        );
        assert_eq!(
            resume_hint(&abandoned).as_deref(),
            Some("fetch it later with: talkhead --resume-job req-7")
        );
        assert!(!abandoned.to_string().contains("--resume-job"));

        let declined = error(Stage::Confirmation, PipelineFailure::ConfirmationDeclined);
        assert_eq!(resume_hint(&declined), None);
    }
}
