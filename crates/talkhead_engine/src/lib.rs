//! Talkhead engine: remote calls, the job controller and the pipeline that strings them together.
mod controller;
mod fetch;
mod media;
mod mp3;
mod persist;
mod pipeline;
mod probe;
mod progress;
mod service;
mod settings;
mod speech;
mod types;

pub use controller::{JobController, WaitReport};
pub use fetch::{ArtifactFetcher, ReqwestFetcher};
pub use media::resolve_media;
pub use persist::{
    ensure_output_dir, speech_path_for, write_artifact, AtomicFileWriter, PersistError,
};
pub use pipeline::{
    AudioSource, BillableExposure, Pipeline, PipelineError, PipelineFailure, PipelinePlan,
    PipelineReport, PipelineResult, Stage,
};
pub use probe::{DurationProber, MetadataProber, ProbeError};
pub use progress::{LogProgressSink, ProgressSink};
pub use service::{
    FalQueueConfig, FalQueueService, JobHandle, RenderPayload, RenderService, StatusReport,
    DEFAULT_ENDPOINT, DEFAULT_QUEUE_URL,
};
pub use settings::RenderSettings;
pub use speech::{
    ElevenLabsClient, SpeechRequest, SpeechSynthesizer, SynthesisError, VoiceSettings,
    DEFAULT_SPEECH_MODEL, DEFAULT_SPEECH_URL,
};
pub use types::{RemoteError, RemoteFailureKind, RenderError, RenderEvent};
