use std::fmt;
use std::path::PathBuf;

use talkhead_core::JobStatus;
use thiserror::Error;

/// Operator-facing progress, rendered by whichever `ProgressSink` the caller installs.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderEvent {
    SpeechSaved { path: PathBuf, bytes: u64 },
    DurationProbed { seconds: f64 },
    Submitted { request_id: String },
    Status {
        status: JobStatus,
        queue_position: Option<u32>,
    },
    RemoteLog { message: String },
    PollRetry { attempt: u32, error: String },
    CancelRequested { request_id: String },
    Downloading { bytes: u64 },
    Saved { path: PathBuf, bytes: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct RemoteError {
    pub kind: RemoteFailureKind,
    pub message: String,
}

impl RemoteError {
    pub(crate) fn new(kind: RemoteFailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind.is_transient()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteFailureKind {
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    Network,
    Decode,
    TooLarge { max_bytes: u64, actual: Option<u64> },
}

impl RemoteFailureKind {
    /// Worth another attempt: the same request may succeed later.
    pub fn is_transient(&self) -> bool {
        match self {
            RemoteFailureKind::Timeout | RemoteFailureKind::Network => true,
            RemoteFailureKind::HttpStatus(code) => *code >= 500 || *code == 429,
            _ => false,
        }
    }
}

impl fmt::Display for RemoteFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteFailureKind::InvalidUrl => write!(f, "invalid url"),
            RemoteFailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            RemoteFailureKind::Timeout => write!(f, "timeout"),
            RemoteFailureKind::Network => write!(f, "network error"),
            RemoteFailureKind::Decode => write!(f, "unexpected response"),
            RemoteFailureKind::TooLarge { max_bytes, actual } => {
                write!(f, "response too large (max {max_bytes}, actual {actual:?})")
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("submission rejected: {0}")]
    SubmissionRejected(String),
    #[error("could not prepare {what} for upload: {reason}")]
    InvalidMedia { what: &'static str, reason: String },
    #[error(
        "polling failed for job {request_id} after {attempts} attempts: {last_error} \
         (the job was not cancelled)"
    )]
    PollingFailed {
        request_id: String,
        attempts: u32,
        last_error: String,
    },
    #[error("download failed after {attempts} attempts: {source}")]
    DownloadFailed {
        attempts: u32,
        #[source]
        source: RemoteError,
    },
    #[error("download interrupted by operator")]
    DownloadInterrupted,
}

pub(crate) fn map_reqwest_error(err: reqwest::Error) -> RemoteError {
    if err.is_timeout() {
        return RemoteError::new(RemoteFailureKind::Timeout, err.to_string());
    }
    if err.is_decode() {
        return RemoteError::new(RemoteFailureKind::Decode, err.to_string());
    }
    if let Some(status) = err.status() {
        return RemoteError::new(RemoteFailureKind::HttpStatus(status.as_u16()), err.to_string());
    }
    RemoteError::new(RemoteFailureKind::Network, err.to_string())
}

/// Trims an error body for messages; services sometimes return whole HTML pages.
pub(crate) fn excerpt(body: &str) -> String {
    const LIMIT: usize = 300;
    let body = body.trim();
    if body.len() <= LIMIT {
        return body.to_string();
    }
    let mut end = LIMIT;
    while end > 0 && !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}
