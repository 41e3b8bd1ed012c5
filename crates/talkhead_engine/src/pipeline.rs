use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use talkhead_core::{
    confirm, estimate, CancelAck, ConfirmationProvider, CostError, CostEstimate, MediaRef,
    RenderRequest, WaitOutcome,
};
use talkhead_logging::{talkhead_info, talkhead_warn};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::persist::{speech_path_for, write_artifact};
use crate::{
    DurationProber, JobController, JobHandle, PersistError, ProbeError, ProgressSink, RenderError,
    RenderEvent, SpeechRequest, SpeechSynthesizer, SynthesisError,
};

/// Where the narration comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum AudioSource {
    /// Synthesize it first; billed separately from the render.
    Speech(SpeechRequest),
    File(PathBuf),
}

/// One run of the pipeline, fixed before anything is called.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelinePlan {
    pub image: MediaRef,
    pub audio: AudioSource,
    pub prompt: Option<String>,
    pub output: PathBuf,
    pub rate_per_sec: f64,
    pub auto_approve: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Input,
    Synthesis,
    Probe,
    Estimate,
    Confirmation,
    Submission,
    Polling,
    Cancellation,
    Retrieval,
    Write,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Input => "input",
            Stage::Synthesis => "speech synthesis",
            Stage::Probe => "duration probe",
            Stage::Estimate => "cost estimate",
            Stage::Confirmation => "confirmation",
            Stage::Submission => "submission",
            Stage::Polling => "polling",
            Stage::Cancellation => "cancellation",
            Stage::Retrieval => "retrieval",
            Stage::Write => "write",
        };
        f.write_str(name)
    }
}

/// Which paid calls had already been made when the run stopped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BillableExposure {
    pub speech_synthesized: bool,
    pub render_submitted: bool,
}

impl BillableExposure {
    pub fn any(&self) -> bool {
        self.speech_synthesized || self.render_submitted
    }
}

impl fmt::Display for BillableExposure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.speech_synthesized, self.render_submitted) {
            (false, false) => write!(f, "no billable operation was started"),
            (true, false) => write!(f, "speech synthesis was billed; no render was submitted"),
            (false, true) => write!(f, "a render job was submitted and may be billed"),
            (true, true) => write!(
                f,
                "speech synthesis was billed and a render job was submitted"
            ),
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineFailure {
    #[error("{0}")]
    Input(String),
    #[error("cost declined; nothing was submitted")]
    ConfirmationDeclined,
    #[error(transparent)]
    Synthesis(#[from] SynthesisError),
    #[error(transparent)]
    Probe(#[from] ProbeError),
    #[error(transparent)]
    Cost(#[from] CostError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error("render job failed: {reason}")]
    JobFailed { reason: String },
    #[error("render job was cancelled by the service")]
    RemoteCancelled,
    #[error("cancelled by operator{}", cancel_note(.ack))]
    UserCancelled { ack: Option<CancelAck> },
    #[error(transparent)]
    Persist(#[from] PersistError),
}

#[derive(Debug, Error)]
#[error("{stage} failed: {failure} ({exposure})")]
pub struct PipelineError {
    pub stage: Stage,
    pub exposure: BillableExposure,
    /// The request id of a submitted job, so it can be resumed or looked up.
    pub request_id: Option<String>,
    #[source]
    pub failure: PipelineFailure,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineReport {
    pub output: PathBuf,
    pub request_id: String,
    /// Absent when resuming an earlier job.
    pub cost: Option<CostEstimate>,
    pub bytes_written: u64,
    pub rendered_duration: Option<f64>,
    pub speech_path: Option<PathBuf>,
}

pub type PipelineResult = Result<PipelineReport, PipelineError>;

/// Tracks how far a run got, so every failure can be reported with its exposure.
#[derive(Debug, Default)]
struct Progress {
    exposure: BillableExposure,
    request_id: Option<String>,
}

impl Progress {
    fn fail(&self, stage: Stage, failure: impl Into<PipelineFailure>) -> PipelineError {
        let error = PipelineError {
            stage,
            exposure: self.exposure,
            request_id: self.request_id.clone(),
            failure: failure.into(),
        };
        talkhead_warn!("pipeline stopped: {}", error);
        error
    }
}

/// synthesis? → probe → estimate → gate → submit → wait → retrieve → write.
pub struct Pipeline {
    controller: JobController,
    prober: Arc<dyn DurationProber>,
    confirmer: Arc<dyn ConfirmationProvider>,
    synthesizer: Option<Arc<dyn SpeechSynthesizer>>,
    sink: Arc<dyn ProgressSink>,
}

impl Pipeline {
    pub fn new(
        controller: JobController,
        prober: Arc<dyn DurationProber>,
        confirmer: Arc<dyn ConfirmationProvider>,
        sink: Arc<dyn ProgressSink>,
    ) -> Self {
        Self {
            controller,
            prober,
            confirmer,
            synthesizer: None,
            sink,
        }
    }

    pub fn with_synthesizer(mut self, synthesizer: Arc<dyn SpeechSynthesizer>) -> Self {
        self.synthesizer = Some(synthesizer);
        self
    }

    pub async fn run(&self, plan: PipelinePlan, token: &CancellationToken) -> PipelineResult {
        let mut progress = Progress::default();

        validate_inputs(&plan)
            .map_err(|reason| progress.fail(Stage::Input, PipelineFailure::Input(reason)))?;

        let (audio_path, speech_path) = match &plan.audio {
            AudioSource::File(path) => (path.clone(), None),
            AudioSource::Speech(request) => {
                let synthesizer = self.synthesizer.as_ref().ok_or_else(|| {
                    progress.fail(
                        Stage::Input,
                        PipelineFailure::Input("text input needs a speech synthesizer".into()),
                    )
                })?;
                if token.is_cancelled() {
                    return Err(progress.fail(
                        Stage::Synthesis,
                        PipelineFailure::UserCancelled { ack: None },
                    ));
                }
                let audio = synthesizer
                    .synthesize(request)
                    .await
                    .map_err(|err| progress.fail(Stage::Synthesis, err))?;
                progress.exposure.speech_synthesized = true;

                let path = write_artifact(&speech_path_for(&plan.output), &audio)
                    .map_err(|err| progress.fail(Stage::Synthesis, err))?;
                self.sink.emit(RenderEvent::SpeechSaved {
                    path: path.clone(),
                    bytes: audio.len() as u64,
                });
                (path.clone(), Some(path))
            }
        };

        let seconds = self
            .prober
            .probe(&audio_path)
            .await
            .map_err(|err| progress.fail(Stage::Probe, err))?;
        self.sink.emit(RenderEvent::DurationProbed { seconds });

        let cost = estimate(seconds, plan.rate_per_sec)
            .map_err(|err| progress.fail(Stage::Estimate, err))?;
        talkhead_info!("estimated render cost: {}", cost);

        if !self.gate(cost, plan.auto_approve, token).await {
            let failure = if token.is_cancelled() {
                PipelineFailure::UserCancelled { ack: None }
            } else {
                PipelineFailure::ConfirmationDeclined
            };
            return Err(progress.fail(Stage::Confirmation, failure));
        }
        if token.is_cancelled() {
            return Err(progress.fail(
                Stage::Submission,
                PipelineFailure::UserCancelled { ack: None },
            ));
        }

        let request = RenderRequest::new(
            plan.image,
            MediaRef::File(audio_path),
            plan.prompt,
            plan.output,
        );
        let handle = self
            .controller
            .submit(&request)
            .await
            .map_err(|err| progress.fail(Stage::Submission, err))?;
        progress.exposure.render_submitted = true;
        progress.request_id = Some(handle.request_id().to_string());
        self.sink.emit(RenderEvent::Submitted {
            request_id: handle.request_id().to_string(),
        });

        self.complete(&handle, request.output(), progress, token)
            .await
            .map(|report| PipelineReport {
                cost: Some(cost),
                speech_path,
                ..report
            })
    }

    /// Picks up a job submitted by an earlier run: wait, retrieve and write only.
    pub async fn resume(
        &self,
        request_id: &str,
        output: &Path,
        token: &CancellationToken,
    ) -> PipelineResult {
        let mut progress = Progress::default();
        let request_id = request_id.trim();
        if request_id.is_empty() {
            return Err(progress.fail(
                Stage::Input,
                PipelineFailure::Input("request id is empty".into()),
            ));
        }
        if output.file_name().is_none() {
            return Err(progress.fail(
                Stage::Input,
                PipelineFailure::Input(format!(
                    "output path {} has no file name",
                    output.display()
                )),
            ));
        }
        progress.exposure.render_submitted = true;
        progress.request_id = Some(request_id.to_string());

        let handle = self.controller.resume(request_id);
        talkhead_info!("resuming render job {}", request_id);
        self.complete(&handle, output, progress, token).await
    }

    async fn complete(
        &self,
        handle: &JobHandle,
        output: &Path,
        progress: Progress,
        token: &CancellationToken,
    ) -> PipelineResult {
        let report = self.controller.wait(handle, token, self.sink.as_ref()).await;

        let artifact_url = match report.outcome {
            WaitOutcome::Succeeded { artifact_url } => artifact_url,
            WaitOutcome::Failed { reason } => {
                return Err(progress.fail(Stage::Polling, PipelineFailure::JobFailed { reason }));
            }
            WaitOutcome::Cancelled { ack: None } => {
                return Err(progress.fail(Stage::Polling, PipelineFailure::RemoteCancelled));
            }
            WaitOutcome::Cancelled { ack: Some(ack) } => {
                return Err(progress.fail(
                    Stage::Cancellation,
                    PipelineFailure::UserCancelled { ack: Some(ack) },
                ));
            }
            WaitOutcome::PollingFailed {
                attempts,
                last_error,
            } => {
                return Err(progress.fail(
                    Stage::Polling,
                    RenderError::PollingFailed {
                        request_id: handle.request_id().to_string(),
                        attempts,
                        last_error,
                    },
                ));
            }
        };

        let bytes = match self
            .controller
            .retrieve(&artifact_url, token, self.sink.as_ref())
            .await
        {
            Ok(bytes) => bytes,
            // The job already finished, so there is nothing left to cancel.
            Err(RenderError::DownloadInterrupted) => {
                return Err(progress.fail(
                    Stage::Retrieval,
                    PipelineFailure::UserCancelled {
                        ack: Some(CancelAck::AlreadyTerminal),
                    },
                ));
            }
            Err(err) => return Err(progress.fail(Stage::Retrieval, err)),
        };

        let path =
            write_artifact(output, &bytes).map_err(|err| progress.fail(Stage::Write, err))?;
        self.sink.emit(RenderEvent::Saved {
            path: path.clone(),
            bytes: bytes.len() as u64,
        });

        Ok(PipelineReport {
            output: path,
            request_id: handle.request_id().to_string(),
            cost: None,
            bytes_written: bytes.len() as u64,
            rendered_duration: report.rendered_duration,
            speech_path: None,
        })
    }

    /// Runs the blocking confirmation off the async threads; an interrupt declines.
    async fn gate(
        &self,
        cost: CostEstimate,
        auto_approve: bool,
        token: &CancellationToken,
    ) -> bool {
        if auto_approve {
            return confirm(&cost, true, self.confirmer.as_ref());
        }
        let confirmer = Arc::clone(&self.confirmer);
        let answer = tokio::task::spawn_blocking(move || confirm(&cost, false, confirmer.as_ref()));
        tokio::select! {
            _ = token.cancelled() => false,
            answer = answer => answer.unwrap_or(false),
        }
    }
}

fn cancel_note(ack: &Option<CancelAck>) -> String {
    match ack {
        Some(ack) => format!(" (cancel request: {ack})"),
        None => String::new(),
    }
}

fn validate_inputs(plan: &PipelinePlan) -> Result<(), String> {
    // Reject a bad rate before anything billable runs.
    estimate(0.0, plan.rate_per_sec).map_err(|err| err.to_string())?;
    if let MediaRef::File(path) = &plan.image {
        if !path.is_file() {
            return Err(format!("image {} does not exist", path.display()));
        }
    }
    match &plan.audio {
        AudioSource::File(path) if !path.is_file() => {
            return Err(format!("audio {} does not exist", path.display()));
        }
        AudioSource::Speech(request) if request.text.trim().is_empty() => {
            return Err("speech text is empty".to_string());
        }
        AudioSource::Speech(request) if request.voice_id.trim().is_empty() => {
            return Err("a voice id is required for speech synthesis".to_string());
        }
        _ => {}
    }
    if plan.output.file_name().is_none() {
        return Err(format!("output path {} has no file name", plan.output.display()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exposure_is_disclosed_in_plain_words() {
        let none = BillableExposure::default();
        assert!(!none.any());
        assert_eq!(none.to_string(), "no billable operation was started");

        let submitted = BillableExposure {
            speech_synthesized: false,
            render_submitted: true,
        };
        assert!(submitted.any());
        assert!(submitted.to_string().contains("submitted"));
    }

    #[test]
    fn error_names_stage_and_exposure() {
        let error = PipelineError {
            stage: Stage::Confirmation,
            exposure: BillableExposure::default(),
            request_id: None,
            failure: PipelineFailure::ConfirmationDeclined,
        };
        assert_eq!(
            error.to_string(),
            "confirmation failed: cost declined; nothing was submitted (no billable operation was started)"
        );
    }

    #[test]
    fn missing_files_are_input_errors() {
        let plan = PipelinePlan {
            image: MediaRef::File(PathBuf::from("/no/such/face.png")),
            audio: AudioSource::File(PathBuf::from("/no/such/voice.wav")),
            prompt: None,
            output: PathBuf::from("out.mp4"),
            rate_per_sec: 0.056,
            auto_approve: false,
        };
        let reason = validate_inputs(&plan).unwrap_err();
        assert!(reason.contains("face.png"));
    }
}
