//! Command-line surface for `talkhead`.

use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, ArgGroup, Parser};
use talkhead_core::{MediaRef, DEFAULT_PROMPT};
use talkhead_engine::{
    AudioSource, FalQueueConfig, PipelinePlan, RenderSettings, SpeechRequest, VoiceSettings,
    DEFAULT_ENDPOINT, DEFAULT_QUEUE_URL, DEFAULT_SPEECH_MODEL, DEFAULT_SPEECH_URL,
};
use thiserror::Error;

#[derive(Parser, Debug)]
#[command(
    name = "talkhead",
    version,
    about = "Render a talking-head video from a portrait and narration",
    long_about = None
)]
#[command(group(
    ArgGroup::new("narration")
        .args(["text", "text_file", "audio", "resume_job"])
        .required(true)
))]
pub struct Cli {
    /// Portrait image: a local file or an http(s) URL
    #[arg(long, value_name = "PATH|URL", required_unless_present = "resume_job")]
    pub image: Option<String>,

    /// Narration text, synthesized to speech before rendering
    #[arg(long)]
    pub text: Option<String>,

    /// File holding the narration text
    #[arg(long, value_name = "PATH")]
    pub text_file: Option<PathBuf>,

    /// Narration audio file (WAV or MP3)
    #[arg(long, value_name = "PATH")]
    pub audio: Option<String>,

    /// Style guidance for the render
    #[arg(long, default_value = DEFAULT_PROMPT)]
    pub prompt: String,

    /// Where the finished video is written
    #[arg(short, long, default_value = "output.mp4")]
    pub output: PathBuf,

    /// Approve the estimated cost without asking
    #[arg(short = 'y', long)]
    pub yes: bool,

    /// Approve without asking only while the estimate stays at or below this amount
    #[arg(long, value_name = "USD", conflicts_with = "yes")]
    pub max_cost: Option<f64>,

    #[arg(long, env = "ELEVENLABS_VOICE_ID")]
    pub voice_id: Option<String>,

    #[arg(long, default_value = DEFAULT_SPEECH_MODEL)]
    pub model_id: String,

    #[arg(long, default_value_t = 0.5)]
    pub stability: f64,

    #[arg(long, default_value_t = 0.75)]
    pub similarity_boost: f64,

    #[arg(long)]
    pub style: Option<f64>,

    /// fal.ai API key
    #[arg(long, env = "FAL_KEY", hide_env_values = true)]
    pub fal_key: String,

    /// ElevenLabs API key; only needed with --text or --text-file
    #[arg(long, env = "ELEVENLABS_KEY", hide_env_values = true)]
    pub elevenlabs_key: Option<String>,

    /// Render price in USD per second of audio
    #[arg(long, env = "TALKHEAD_RATE_PER_SECOND", default_value_t = 0.056)]
    pub rate: f64,

    #[arg(long, default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,

    #[arg(long, default_value = DEFAULT_QUEUE_URL)]
    pub queue_url: String,

    #[arg(long, default_value = DEFAULT_SPEECH_URL)]
    pub elevenlabs_url: String,

    #[arg(long, default_value_t = 5, value_parser = clap::value_parser!(u64).range(1..))]
    pub poll_interval_secs: u64,

    /// Wait for and download a job submitted by an earlier run
    #[arg(long, value_name = "REQUEST_ID")]
    pub resume_job: Option<String>,

    /// Also write the log to this file
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Only warnings and errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

#[derive(Debug, Error, PartialEq)]
pub enum UsageError {
    #[error("--audio must be a local file; its duration is measured before anything is paid for")]
    RemoteAudio,
    #[error("could not read {path}: {reason}")]
    TextFile { path: PathBuf, reason: String },
    #[error("speech synthesis needs {0}")]
    MissingSpeechSetting(&'static str),
}

/// What this run is asked to do.
#[derive(Debug, PartialEq)]
pub enum Invocation {
    Render(PipelinePlan),
    Resume { request_id: String, output: PathBuf },
}

impl Cli {
    pub fn invocation(&self) -> Result<Invocation, UsageError> {
        if let Some(request_id) = &self.resume_job {
            return Ok(Invocation::Resume {
                request_id: request_id.clone(),
                output: self.output.clone(),
            });
        }

        let audio = if let Some(audio) = &self.audio {
            match MediaRef::parse(audio) {
                MediaRef::File(path) => AudioSource::File(path),
                MediaRef::Url(_) => return Err(UsageError::RemoteAudio),
            }
        } else {
            AudioSource::Speech(self.speech_request(self.narration_text()?)?)
        };

        Ok(Invocation::Render(PipelinePlan {
            image: MediaRef::parse(self.image.as_deref().unwrap_or_default()),
            audio,
            prompt: Some(self.prompt.clone()),
            output: self.output.clone(),
            rate_per_sec: self.rate,
            auto_approve: self.yes,
        }))
    }

    pub fn needs_synthesizer(&self) -> bool {
        self.resume_job.is_none() && (self.text.is_some() || self.text_file.is_some())
    }

    pub fn render_settings(&self) -> RenderSettings {
        RenderSettings {
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            ..RenderSettings::default()
        }
    }

    pub fn queue_config(&self) -> FalQueueConfig {
        FalQueueConfig {
            queue_url: self.queue_url.clone(),
            endpoint: self.endpoint.clone(),
            api_key: self.fal_key.clone(),
        }
    }

    fn narration_text(&self) -> Result<String, UsageError> {
        match (&self.text, &self.text_file) {
            (Some(text), _) => Ok(text.clone()),
            (None, Some(path)) => {
                std::fs::read_to_string(path).map_err(|err| UsageError::TextFile {
                    path: path.clone(),
                    reason: err.to_string(),
                })
            }
            (None, None) => Err(UsageError::MissingSpeechSetting("--text or --text-file")),
        }
    }

    fn speech_request(&self, text: String) -> Result<SpeechRequest, UsageError> {
        let voice_id = self
            .voice_id
            .clone()
            .filter(|voice| !voice.trim().is_empty())
            .ok_or(UsageError::MissingSpeechSetting("--voice-id or ELEVENLABS_VOICE_ID"))?;
        if self.elevenlabs_key.as_deref().map_or(true, |key| key.trim().is_empty()) {
            return Err(UsageError::MissingSpeechSetting(
                "--elevenlabs-key or ELEVENLABS_KEY",
            ));
        }
        Ok(SpeechRequest {
            text,
            voice_id,
            model_id: self.model_id.clone(),
            settings: VoiceSettings {
                stability: self.stability,
                similarity_boost: self.similarity_boost,
                style: self.style,
            },
        })
    }
}
