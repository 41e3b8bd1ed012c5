use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::Stdio;

use serde::Deserialize;
use talkhead_logging::{talkhead_debug, talkhead_trace};
use thiserror::Error;
use tokio::process::Command;

use crate::mp3;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("audio file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("unsupported audio format for {}: {reason}", .path.display())]
    UnsupportedFormat { path: PathBuf, reason: String },
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Reads an audio file's play duration from its metadata.
#[async_trait::async_trait]
pub trait DurationProber: Send + Sync {
    async fn probe(&self, path: &Path) -> Result<f64, ProbeError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Container {
    Wav,
    Mpeg,
    Other,
}

/// Header-only prober: WAV via `hound`, MPEG audio via frame headers and,
/// for anything else, `ffprobe -show_format` when it is installed.
///
/// Files that look like MPEG audio but hold no MPEG frame (ADTS AAC, tagged
/// non-MP3 payloads) also go to `ffprobe`.
#[derive(Debug, Clone)]
pub struct MetadataProber {
    ffprobe: Option<String>,
}

impl Default for MetadataProber {
    fn default() -> Self {
        Self::with_ffprobe("ffprobe")
    }
}

impl MetadataProber {
    pub fn without_ffprobe() -> Self {
        Self { ffprobe: None }
    }

    /// Falls back to the given `ffprobe` executable, looked up on `PATH`.
    pub fn with_ffprobe(program: impl Into<String>) -> Self {
        Self {
            ffprobe: Some(program.into()),
        }
    }
}

#[async_trait::async_trait]
impl DurationProber for MetadataProber {
    async fn probe(&self, path: &Path) -> Result<f64, ProbeError> {
        if !path.is_file() {
            return Err(ProbeError::NotFound(path.to_path_buf()));
        }
        let container = sniff(path)?;
        talkhead_trace!("probing {:?} as {:?}", path, container);

        let seconds = match (container, self.ffprobe.as_deref()) {
            (Container::Wav, _) => wav_duration(path)?,
            (Container::Mpeg, ffprobe) => match (mp3::duration_secs(path)?, ffprobe) {
                (Some(seconds), _) => seconds,
                (None, Some(program)) => {
                    talkhead_debug!("{:?} has no MPEG frame; asking {}", path, program);
                    ffprobe_duration(program, path).await?
                }
                (None, None) => return Err(unsupported(path, "no MPEG audio frame header found")),
            },
            (Container::Other, Some(program)) => ffprobe_duration(program, path).await?,
            (Container::Other, None) => return Err(unsupported(path, "unrecognized container")),
        };

        if !seconds.is_finite() || seconds < 0.0 {
            return Err(unsupported(path, "metadata reports an invalid duration"));
        }
        talkhead_debug!("{:?} lasts {:.3}s", path, seconds);
        Ok(seconds)
    }
}

fn unsupported(path: &Path, reason: impl Into<String>) -> ProbeError {
    ProbeError::UnsupportedFormat {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

fn sniff(path: &Path) -> Result<Container, ProbeError> {
    let mut head = [0u8; 12];
    let mut file = File::open(path)?;
    let mut filled = 0;
    while filled < head.len() {
        match file.read(&mut head[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    let head = &head[..filled];

    if head.len() >= 12 && &head[..4] == b"RIFF" && &head[8..12] == b"WAVE" {
        return Ok(Container::Wav);
    }
    let frame_sync = head.len() >= 2 && head[0] == 0xFF && head[1] & 0xE0 == 0xE0;
    if head.starts_with(b"ID3") || frame_sync {
        return Ok(Container::Mpeg);
    }
    Ok(Container::Other)
}

fn wav_duration(path: &Path) -> Result<f64, ProbeError> {
    let reader =
        hound::WavReader::open(path).map_err(|err| unsupported(path, err.to_string()))?;
    let spec = reader.spec();
    if spec.sample_rate == 0 {
        return Err(unsupported(path, "sample rate is zero"));
    }
    Ok(f64::from(reader.duration()) / f64::from(spec.sample_rate))
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

async fn ffprobe_duration(program: &str, path: &Path) -> Result<f64, ProbeError> {
    let Ok(executable) = which::which(program) else {
        return Err(unsupported(
            path,
            format!("no built-in reader for this container and {program} is not installed"),
        ));
    };

    let output = Command::new(executable)
        .args(["-v", "quiet", "-print_format", "json", "-show_format"])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        return Err(unsupported(
            path,
            format!(
                "ffprobe failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        ));
    }

    let probe: FfprobeOutput = serde_json::from_slice(&output.stdout)
        .map_err(|err| unsupported(path, format!("unreadable ffprobe output: {err}")))?;
    probe
        .format
        .duration
        .as_deref()
        .and_then(|d| d.parse::<f64>().ok())
        .ok_or_else(|| unsupported(path, "container has no duration metadata"))
}
