use std::fmt;
use std::path::{Path, PathBuf};

/// Guidance text sent when the operator gives none; the service rejects an empty prompt.
pub const DEFAULT_PROMPT: &str = ".";

/// Reference to an input asset: either already hosted or a local file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaRef {
    Url(String),
    File(PathBuf),
}

impl MediaRef {
    /// `http(s)` URLs are kept as remote references, anything else is a local path.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        match url::Url::parse(trimmed) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {
                MediaRef::Url(parsed.to_string())
            }
            _ => MediaRef::File(PathBuf::from(trimmed)),
        }
    }

    pub fn as_path(&self) -> Option<&Path> {
        match self {
            MediaRef::File(path) => Some(path),
            MediaRef::Url(_) => None,
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, MediaRef::Url(_))
    }
}

impl fmt::Display for MediaRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaRef::Url(url) => write!(f, "{url}"),
            MediaRef::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Everything needed to render one talking-head video. Built once per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderRequest {
    image: MediaRef,
    audio: MediaRef,
    prompt: Option<String>,
    output: PathBuf,
}

impl RenderRequest {
    pub fn new(
        image: MediaRef,
        audio: MediaRef,
        prompt: Option<String>,
        output: impl Into<PathBuf>,
    ) -> Self {
        let prompt = prompt
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty());
        Self {
            image,
            audio,
            prompt,
            output: output.into(),
        }
    }

    pub fn image(&self) -> &MediaRef {
        &self.image
    }

    pub fn audio(&self) -> &MediaRef {
        &self.audio
    }

    pub fn prompt(&self) -> Option<&str> {
        self.prompt.as_deref()
    }

    pub fn prompt_or_default(&self) -> &str {
        self.prompt().unwrap_or(DEFAULT_PROMPT)
    }

    pub fn output(&self) -> &Path {
        &self.output
    }
}
