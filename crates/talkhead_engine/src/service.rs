use serde::{Deserialize, Serialize};
use talkhead_core::{CancelAck, JobStatus};
use talkhead_logging::{talkhead_debug, talkhead_info, talkhead_warn};

use crate::types::{excerpt, map_reqwest_error};
use crate::{RemoteError, RemoteFailureKind, RenderError, RenderSettings};

pub const DEFAULT_QUEUE_URL: &str = "https://queue.fal.run";
pub const DEFAULT_ENDPOINT: &str = "fal-ai/kling-video/ai-avatar/v2/standard";

/// What the service needs to start a render, with media already resolved to fetchable URLs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderPayload {
    pub image_url: String,
    pub audio_url: String,
    pub prompt: String,
}

/// Identifies one submitted job and where to reach it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle {
    request_id: String,
    status_url: String,
    response_url: String,
    cancel_url: String,
}

impl JobHandle {
    pub fn new(
        request_id: impl Into<String>,
        status_url: impl Into<String>,
        response_url: impl Into<String>,
        cancel_url: impl Into<String>,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            status_url: status_url.into(),
            response_url: response_url.into(),
            cancel_url: cancel_url.into(),
        }
    }

    /// Rebuilds the handle of an earlier submission from its request id.
    ///
    /// Request URLs live under the application (`owner/app`), not the full endpoint path.
    pub fn for_request(queue_url: &str, endpoint: &str, request_id: &str) -> Self {
        let app: Vec<&str> = endpoint
            .trim_matches('/')
            .split('/')
            .filter(|segment| !segment.is_empty())
            .take(2)
            .collect();
        let base = format!(
            "{}/{}/requests/{}",
            queue_url.trim_end_matches('/'),
            app.join("/"),
            request_id
        );
        Self::new(
            request_id,
            format!("{base}/status"),
            base.clone(),
            format!("{base}/cancel"),
        )
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }
}

/// One decoded status query.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusReport {
    pub status: JobStatus,
    pub queue_position: Option<u32>,
    /// Every log line the service has for the job so far, oldest first.
    pub logs: Vec<String>,
    /// Length of the rendered video, when the service reports it.
    pub rendered_duration: Option<f64>,
}

impl StatusReport {
    pub fn new(status: JobStatus) -> Self {
        Self {
            status,
            queue_position: None,
            logs: Vec::new(),
            rendered_duration: None,
        }
    }
}

#[async_trait::async_trait]
pub trait RenderService: Send + Sync {
    async fn submit(&self, payload: &RenderPayload) -> Result<JobHandle, RenderError>;
    /// A single idempotent status query.
    async fn status(&self, handle: &JobHandle) -> Result<StatusReport, RemoteError>;
    /// Best effort; transport failures come back as `NotAcknowledged`.
    async fn cancel(&self, handle: &JobHandle) -> CancelAck;
    /// Handle for a job submitted by an earlier run.
    fn handle_for(&self, request_id: &str) -> JobHandle;
}

#[derive(Debug, Clone)]
pub struct FalQueueConfig {
    pub queue_url: String,
    pub endpoint: String,
    pub api_key: String,
}

impl FalQueueConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            queue_url: DEFAULT_QUEUE_URL.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: api_key.into(),
        }
    }
}

/// Client for the fal.ai queue API.
#[derive(Debug, Clone)]
pub struct FalQueueService {
    client: reqwest::Client,
    config: FalQueueConfig,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    request_id: String,
    status_url: Option<String>,
    response_url: Option<String>,
    cancel_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: String,
    queue_position: Option<u32>,
    #[serde(default)]
    logs: Option<Vec<LogLine>>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LogLine {
    message: String,
}

#[derive(Debug, Deserialize)]
struct ResultResponse {
    video: Option<VideoFile>,
    duration: Option<f64>,
    error: Option<String>,
    detail: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct VideoFile {
    url: String,
}

impl FalQueueService {
    pub fn new(config: FalQueueConfig, settings: &RenderSettings) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| RemoteError::new(RemoteFailureKind::Network, err.to_string()))?;
        Ok(Self { client, config })
    }

    fn auth(&self) -> String {
        format!("Key {}", self.config.api_key)
    }

    fn status_url(&self, handle: &JobHandle) -> Result<reqwest::Url, RemoteError> {
        let mut url = parse_url(&handle.status_url)?;
        if !url.query_pairs().any(|(key, _)| key == "logs") {
            url.query_pairs_mut().append_pair("logs", "1");
        }
        Ok(url)
    }

    /// Fetches the result of a COMPLETED job, which is where fal reports failures.
    async fn completed_report(
        &self,
        handle: &JobHandle,
        mut report: StatusReport,
    ) -> Result<StatusReport, RemoteError> {
        let response = self
            .client
            .get(parse_url(&handle.response_url)?)
            .header("Authorization", self.auth())
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        let body = response.text().await.map_err(map_reqwest_error)?;
        let kind = RemoteFailureKind::HttpStatus(status.as_u16());
        if kind.is_transient() {
            return Err(RemoteError::new(kind, excerpt(&body)));
        }

        let parsed: Option<ResultResponse> = serde_json::from_str(&body).ok();
        report.status = match parsed {
            Some(ResultResponse {
                video: Some(video),
                duration,
                ..
            }) if status.is_success() => {
                report.rendered_duration = duration;
                JobStatus::Succeeded(video.url)
            }
            Some(result) => JobStatus::Failed(failure_reason(&result, status.as_u16(), &body)),
            None if status.is_success() => {
                return Err(RemoteError::new(
                    RemoteFailureKind::Decode,
                    format!("unreadable result: {}", excerpt(&body)),
                ));
            }
            None => JobStatus::Failed(format!("http status {}: {}", status, excerpt(&body))),
        };
        Ok(report)
    }
}

#[async_trait::async_trait]
impl RenderService for FalQueueService {
    async fn submit(&self, payload: &RenderPayload) -> Result<JobHandle, RenderError> {
        let url = format!(
            "{}/{}",
            self.config.queue_url.trim_end_matches('/'),
            self.config.endpoint.trim_matches('/')
        );
        talkhead_info!("submitting render to {}", self.config.endpoint);

        let response = self
            .client
            .post(parse_url(&url).map_err(|err| RenderError::SubmissionRejected(err.to_string()))?)
            .header("Authorization", self.auth())
            .json(payload)
            .send()
            .await
            .map_err(|err| RenderError::SubmissionRejected(map_reqwest_error(err).to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| RenderError::SubmissionRejected(map_reqwest_error(err).to_string()))?;
        if !status.is_success() {
            return Err(RenderError::SubmissionRejected(format!(
                "http status {}: {}",
                status,
                excerpt(&body)
            )));
        }

        let submitted: SubmitResponse = serde_json::from_str(&body).map_err(|err| {
            RenderError::SubmissionRejected(format!("unreadable submit response: {err}"))
        })?;
        let fallback = JobHandle::for_request(
            &self.config.queue_url,
            &self.config.endpoint,
            &submitted.request_id,
        );
        Ok(JobHandle {
            status_url: submitted.status_url.unwrap_or(fallback.status_url),
            response_url: submitted.response_url.unwrap_or(fallback.response_url),
            cancel_url: submitted.cancel_url.unwrap_or(fallback.cancel_url),
            request_id: submitted.request_id,
        })
    }

    async fn status(&self, handle: &JobHandle) -> Result<StatusReport, RemoteError> {
        let response = self
            .client
            .get(self.status_url(handle)?)
            .header("Authorization", self.auth())
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::new(
                RemoteFailureKind::HttpStatus(status.as_u16()),
                excerpt(&body),
            ));
        }
        let parsed: StatusResponse = response.json().await.map_err(map_reqwest_error)?;
        talkhead_debug!(
            "job {} status {} (queue position {:?})",
            handle.request_id,
            parsed.status,
            parsed.queue_position
        );

        let report = StatusReport {
            status: JobStatus::Queued,
            queue_position: parsed.queue_position,
            logs: parsed
                .logs
                .unwrap_or_default()
                .into_iter()
                .map(|line| line.message)
                .collect(),
            rendered_duration: None,
        };
        match map_status(&parsed.status, parsed.error.as_deref()) {
            Some(StatusKind::Completed) => self.completed_report(handle, report).await,
            Some(StatusKind::Known(status)) => Ok(StatusReport { status, ..report }),
            None => Err(RemoteError::new(
                RemoteFailureKind::Decode,
                format!("unknown job status {:?}", parsed.status),
            )),
        }
    }

    async fn cancel(&self, handle: &JobHandle) -> CancelAck {
        let url = match parse_url(&handle.cancel_url) {
            Ok(url) => url,
            Err(err) => return CancelAck::NotAcknowledged(err.to_string()),
        };
        let response = match self
            .client
            .put(url)
            .header("Authorization", self.auth())
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                let err = map_reqwest_error(err);
                talkhead_warn!("cancel request for {} failed: {}", handle.request_id, err);
                return CancelAck::NotAcknowledged(err.to_string());
            }
        };

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let ack = map_cancel(status.as_u16(), &body);
        talkhead_info!("cancel {} -> {}", handle.request_id, ack);
        ack
    }

    fn handle_for(&self, request_id: &str) -> JobHandle {
        JobHandle::for_request(&self.config.queue_url, &self.config.endpoint, request_id)
    }
}

#[derive(Debug, PartialEq)]
enum StatusKind {
    Known(JobStatus),
    /// Finished, but success or failure is only known from the result.
    Completed,
}

fn map_status(status: &str, error: Option<&str>) -> Option<StatusKind> {
    let kind = match status.to_ascii_uppercase().as_str() {
        "IN_QUEUE" => StatusKind::Known(JobStatus::Queued),
        "IN_PROGRESS" => StatusKind::Known(JobStatus::Running),
        "CANCELLED" | "CANCELED" => StatusKind::Known(JobStatus::Cancelled),
        "FAILED" | "ERROR" => StatusKind::Known(JobStatus::Failed(
            error.unwrap_or("the service reported a failure").to_string(),
        )),
        "COMPLETED" => match error {
            Some(reason) if !reason.trim().is_empty() => {
                StatusKind::Known(JobStatus::Failed(reason.to_string()))
            }
            _ => StatusKind::Completed,
        },
        _ => return None,
    };
    Some(kind)
}

fn map_cancel(status: u16, body: &str) -> CancelAck {
    if (200..300).contains(&status) {
        return CancelAck::Acknowledged;
    }
    if status == 400 && body.contains("ALREADY_COMPLETED") {
        return CancelAck::AlreadyTerminal;
    }
    CancelAck::NotAcknowledged(format!("http status {status}: {}", excerpt(body)))
}

fn failure_reason(result: &ResultResponse, status: u16, body: &str) -> String {
    if let Some(error) = result.error.as_deref() {
        return error.to_string();
    }
    match &result.detail {
        Some(serde_json::Value::String(detail)) => detail.clone(),
        Some(detail) => detail.to_string(),
        None if (200..300).contains(&status) => "result contained no video".to_string(),
        None => format!("http status {status}: {}", excerpt(body)),
    }
}

fn parse_url(raw: &str) -> Result<reqwest::Url, RemoteError> {
    reqwest::Url::parse(raw)
        .map_err(|err| RemoteError::new(RemoteFailureKind::InvalidUrl, format!("{raw}: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_urls_use_application_path() {
        let handle = JobHandle::for_request(
            "https://queue.fal.run/",
            "fal-ai/kling-video/ai-avatar/v2/standard",
            "req-1",
        );
        assert_eq!(handle.request_id(), "req-1");
        assert_eq!(
            handle.status_url,
            "https://queue.fal.run/fal-ai/kling-video/requests/req-1/status"
        );
        assert_eq!(
            handle.response_url,
            "https://queue.fal.run/fal-ai/kling-video/requests/req-1"
        );
        assert_eq!(
            handle.cancel_url,
            "https://queue.fal.run/fal-ai/kling-video/requests/req-1/cancel"
        );
    }

    #[test]
    fn status_strings_map_to_job_status() {
        assert_eq!(
            map_status("IN_QUEUE", None),
            Some(StatusKind::Known(JobStatus::Queued))
        );
        assert_eq!(
            map_status("IN_PROGRESS", None),
            Some(StatusKind::Known(JobStatus::Running))
        );
        assert_eq!(map_status("COMPLETED", None), Some(StatusKind::Completed));
        assert_eq!(
            map_status("COMPLETED", Some("no face found")),
            Some(StatusKind::Known(JobStatus::Failed("no face found".into())))
        );
        assert_eq!(
            map_status("CANCELLED", None),
            Some(StatusKind::Known(JobStatus::Cancelled))
        );
        assert_eq!(map_status("SOMETHING_NEW", None), None);
    }

    #[test]
    fn cancel_responses_map_to_acks() {
        assert_eq!(
            map_cancel(202, r#"{"status":"CANCELLATION_REQUESTED"}"#),
            CancelAck::Acknowledged
        );
        assert_eq!(
            map_cancel(400, r#"{"status":"ALREADY_COMPLETED"}"#),
            CancelAck::AlreadyTerminal
        );
        assert!(matches!(
            map_cancel(404, "not found"),
            CancelAck::NotAcknowledged(_)
        ));
    }
}
