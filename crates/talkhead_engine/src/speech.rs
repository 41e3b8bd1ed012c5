use serde::Serialize;
use talkhead_logging::talkhead_info;
use thiserror::Error;

use crate::types::{excerpt, map_reqwest_error};
use crate::{RemoteError, RemoteFailureKind, RenderSettings};

pub const DEFAULT_SPEECH_URL: &str = "https://api.elevenlabs.io";
pub const DEFAULT_SPEECH_MODEL: &str = "eleven_multilingual_v2";
const OUTPUT_FORMAT: &str = "mp3_44100_128";

#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("speech synthesis failed: {0}")]
    SynthesisFailed(#[from] RemoteError),
    #[error("nothing to synthesize: text is empty")]
    EmptyText,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VoiceSettings {
    pub stability: f64,
    pub similarity_boost: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<f64>,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            stability: 0.5,
            similarity_boost: 0.75,
            style: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpeechRequest {
    pub text: String,
    pub voice_id: String,
    pub model_id: String,
    pub settings: VoiceSettings,
}

/// One text-to-speech call. Never retried: every call is billed.
#[async_trait::async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Returns MP3 bytes.
    async fn synthesize(&self, request: &SpeechRequest) -> Result<Vec<u8>, SynthesisError>;
}

#[derive(Debug, Clone)]
pub struct ElevenLabsClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Serialize)]
struct SynthesisBody<'a> {
    text: &'a str,
    model_id: &'a str,
    voice_settings: &'a VoiceSettings,
}

impl ElevenLabsClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        settings: &RenderSettings,
    ) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.download_timeout)
            .build()
            .map_err(|err| RemoteError::new(RemoteFailureKind::Network, err.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    fn endpoint(&self, voice_id: &str) -> Result<reqwest::Url, RemoteError> {
        let mut url = reqwest::Url::parse(&format!(
            "{}/v1/text-to-speech/{}",
            self.base_url, voice_id
        ))
        .map_err(|err| RemoteError::new(RemoteFailureKind::InvalidUrl, err.to_string()))?;
        url.query_pairs_mut()
            .append_pair("output_format", OUTPUT_FORMAT);
        Ok(url)
    }
}

#[async_trait::async_trait]
impl SpeechSynthesizer for ElevenLabsClient {
    async fn synthesize(&self, request: &SpeechRequest) -> Result<Vec<u8>, SynthesisError> {
        let text = request.text.trim();
        if text.is_empty() {
            return Err(SynthesisError::EmptyText);
        }
        talkhead_info!(
            "synthesizing {} characters with voice {}",
            text.chars().count(),
            request.voice_id
        );

        let response = self
            .client
            .post(self.endpoint(&request.voice_id)?)
            .header("xi-api-key", &self.api_key)
            .json(&SynthesisBody {
                text,
                model_id: &request.model_id,
                voice_settings: &request.settings,
            })
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::new(
                RemoteFailureKind::HttpStatus(status.as_u16()),
                excerpt(&body),
            )
            .into());
        }

        let audio = response.bytes().await.map_err(map_reqwest_error)?;
        if audio.is_empty() {
            return Err(RemoteError::new(RemoteFailureKind::Decode, "empty audio payload").into());
        }
        Ok(audio.to_vec())
    }
}
