use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use talkhead_core::{
    update, CancelAck, Effect, JobPhase, JobState, Msg, PollDelay, RenderRequest, WaitOutcome,
};
use talkhead_logging::{talkhead_debug, talkhead_info, talkhead_warn};
use tokio_util::sync::CancellationToken;

use crate::media::resolve_media;
use crate::{
    ArtifactFetcher, JobHandle, ProgressSink, RemoteError, RenderError, RenderEvent,
    RenderPayload, RenderService, RenderSettings, StatusReport,
};

/// How a wait ended, plus what was learned on the way.
#[derive(Debug, Clone, PartialEq)]
pub struct WaitReport {
    pub outcome: WaitOutcome,
    pub rendered_duration: Option<f64>,
    pub polls: u32,
}

/// Drives one remote render job: submit, wait (with cancellation), retrieve.
///
/// The controller never decides a job's state on its own. Every decision in
/// the wait loop comes from `talkhead_core::update` applied to what the
/// service reported.
pub struct JobController {
    service: Arc<dyn RenderService>,
    fetcher: Arc<dyn ArtifactFetcher>,
    settings: RenderSettings,
}

impl JobController {
    pub fn new(
        service: Arc<dyn RenderService>,
        fetcher: Arc<dyn ArtifactFetcher>,
        settings: RenderSettings,
    ) -> Self {
        Self {
            service,
            fetcher,
            settings,
        }
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    /// Submits once. Rejections are final.
    pub async fn submit(&self, request: &RenderRequest) -> Result<JobHandle, RenderError> {
        let payload = RenderPayload {
            image_url: resolve_media("image", request.image()).await?,
            audio_url: resolve_media("audio", request.audio()).await?,
            prompt: request.prompt_or_default().to_string(),
        };
        let handle = self.service.submit(&payload).await?;
        talkhead_info!("render job {} submitted", handle.request_id());
        Ok(handle)
    }

    pub fn resume(&self, request_id: &str) -> JobHandle {
        self.service.handle_for(request_id)
    }

    /// One status query, no retries.
    pub async fn poll(&self, handle: &JobHandle) -> Result<StatusReport, RemoteError> {
        self.service.status(handle).await
    }

    /// Sends a cancellation unless the job is already settled, in which case it is a no-op.
    pub async fn cancel(&self, handle: &JobHandle, phase: JobPhase) -> CancelAck {
        if phase.is_settled() {
            talkhead_debug!(
                "job {} already settled ({:?}); not cancelling",
                handle.request_id(),
                phase
            );
            return CancelAck::AlreadyTerminal;
        }
        self.service.cancel(handle).await
    }

    /// Polls until the job settles or `token` fires.
    ///
    /// A poll that is in flight when the token fires is interpreted first; the
    /// cancellation is sent afterwards and nothing else is queried.
    pub async fn wait(
        &self,
        handle: &JobHandle,
        token: &CancellationToken,
        sink: &dyn ProgressSink,
    ) -> WaitReport {
        let mut logs_seen = 0usize;
        let mut rendered_duration = None;
        let mut polls = 0u32;

        let (mut state, effects) = update(
            JobState::new(self.settings.poll_retry_budget),
            Msg::Started,
        );
        let mut pending: VecDeque<Effect> = effects.into();

        while let Some(effect) = pending.pop_front() {
            let msg = match effect {
                Effect::Finish(outcome) => {
                    talkhead_info!(
                        "job {} finished waiting after {} polls: {:?}",
                        handle.request_id(),
                        polls,
                        outcome
                    );
                    return WaitReport {
                        outcome,
                        rendered_duration,
                        polls,
                    };
                }
                Effect::SendCancel => {
                    sink.emit(RenderEvent::CancelRequested {
                        request_id: handle.request_id().to_string(),
                    });
                    Msg::CancelCompleted(self.cancel(handle, state.phase()).await)
                }
                Effect::Poll { delay } => {
                    if !self.pause(delay, token).await {
                        Msg::Interrupted
                    } else {
                        polls += 1;
                        match self.poll(handle).await {
                            Ok(report) => {
                                for message in report.logs.iter().skip(logs_seen) {
                                    sink.emit(RenderEvent::RemoteLog {
                                        message: message.clone(),
                                    });
                                }
                                logs_seen = logs_seen.max(report.logs.len());
                                if report.rendered_duration.is_some() {
                                    rendered_duration = report.rendered_duration;
                                }
                                sink.emit(RenderEvent::Status {
                                    status: report.status.clone(),
                                    queue_position: report.queue_position,
                                });
                                Msg::StatusObserved(report.status)
                            }
                            Err(err) => {
                                talkhead_warn!(
                                    "status query for {} failed: {}",
                                    handle.request_id(),
                                    err
                                );
                                sink.emit(RenderEvent::PollRetry {
                                    attempt: state.consecutive_failures() + 1,
                                    error: err.to_string(),
                                });
                                Msg::PollFailed {
                                    retryable: err.is_transient(),
                                    message: err.to_string(),
                                }
                            }
                        }
                    }
                }
            };

            let (next, effects) = update(state, msg);
            state = next;
            pending.extend(effects);

            // Act on an interrupt only once the latest response has been applied.
            if token.is_cancelled() {
                let (next, effects) = update(state, Msg::Interrupted);
                state = next;
                if !effects.is_empty() {
                    pending = effects.into();
                }
            }
        }

        // `update` always ends with a Finish effect; reaching here means it did not.
        WaitReport {
            outcome: WaitOutcome::PollingFailed {
                attempts: state.consecutive_failures(),
                last_error: "wait loop ended without an outcome".to_string(),
            },
            rendered_duration,
            polls,
        }
    }

    /// Downloads the artifact, retrying transient failures a few times.
    pub async fn retrieve(
        &self,
        artifact_url: &str,
        token: &CancellationToken,
        sink: &dyn ProgressSink,
    ) -> Result<Vec<u8>, RenderError> {
        let max_attempts = self.settings.download_retries + 1;
        let mut attempt = 0;
        loop {
            attempt += 1;
            let result = tokio::select! {
                _ = token.cancelled() => return Err(RenderError::DownloadInterrupted),
                result = self.fetcher.fetch(artifact_url, sink) => result,
            };
            match result {
                Ok(bytes) => {
                    talkhead_info!("downloaded artifact ({} bytes)", bytes.len());
                    return Ok(bytes);
                }
                Err(err) if err.is_transient() && attempt < max_attempts => {
                    talkhead_warn!(
                        "download attempt {}/{} failed: {}",
                        attempt,
                        max_attempts,
                        err
                    );
                    if !self.sleep_unless_cancelled(self.settings.backoff(attempt), token).await {
                        return Err(RenderError::DownloadInterrupted);
                    }
                }
                Err(err) => {
                    return Err(RenderError::DownloadFailed {
                        attempts: attempt,
                        source: err,
                    });
                }
            }
        }
    }

    /// Returns false when interrupted instead of reaching the scheduled poll.
    async fn pause(&self, delay: PollDelay, token: &CancellationToken) -> bool {
        self.sleep_unless_cancelled(self.settings.delay_for(delay), token)
            .await
    }

    async fn sleep_unless_cancelled(&self, duration: Duration, token: &CancellationToken) -> bool {
        if token.is_cancelled() {
            return false;
        }
        if duration.is_zero() {
            return true;
        }
        tokio::select! {
            _ = token.cancelled() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }
}
