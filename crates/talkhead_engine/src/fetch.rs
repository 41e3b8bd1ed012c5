use futures_util::StreamExt;

use crate::types::map_reqwest_error;
use crate::{ProgressSink, RemoteError, RemoteFailureKind, RenderEvent, RenderSettings};

/// Downloads a finished artifact in full.
#[async_trait::async_trait]
pub trait ArtifactFetcher: Send + Sync {
    async fn fetch(&self, url: &str, sink: &dyn ProgressSink) -> Result<Vec<u8>, RemoteError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    client: reqwest::Client,
    max_bytes: u64,
}

impl ReqwestFetcher {
    pub fn new(settings: &RenderSettings) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.download_timeout)
            .redirect(reqwest::redirect::Policy::limited(settings.redirect_limit))
            .build()
            .map_err(|err| RemoteError::new(RemoteFailureKind::Network, err.to_string()))?;
        Ok(Self {
            client,
            max_bytes: settings.max_artifact_bytes,
        })
    }

    fn too_large(&self, actual: u64) -> RemoteError {
        RemoteError::new(
            RemoteFailureKind::TooLarge {
                max_bytes: self.max_bytes,
                actual: Some(actual),
            },
            "artifact too large",
        )
    }
}

#[async_trait::async_trait]
impl ArtifactFetcher for ReqwestFetcher {
    async fn fetch(&self, url: &str, sink: &dyn ProgressSink) -> Result<Vec<u8>, RemoteError> {
        let parsed = reqwest::Url::parse(url)
            .map_err(|err| RemoteError::new(RemoteFailureKind::InvalidUrl, err.to_string()))?;

        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(RemoteError::new(
                RemoteFailureKind::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }

        if let Some(content_len) = response.content_length() {
            if content_len > self.max_bytes {
                return Err(self.too_large(content_len));
            }
        }

        sink.emit(RenderEvent::Downloading { bytes: 0 });

        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            let next_len = bytes.len() as u64 + chunk.len() as u64;
            if next_len > self.max_bytes {
                return Err(self.too_large(next_len));
            }
            bytes.extend_from_slice(&chunk);
            sink.emit(RenderEvent::Downloading {
                bytes: bytes.len() as u64,
            });
        }

        Ok(bytes)
    }
}
