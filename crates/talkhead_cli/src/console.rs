use std::io::{self, Stdout, Write};
use std::sync::Mutex;

use talkhead_engine::{ProgressSink, RenderEvent};

const MIB: u64 = 1024 * 1024;

/// Prints progress for a person watching the terminal.
///
/// Repeated identical status lines are folded, and download progress is
/// reported once per MiB.
pub struct ConsoleProgress<W> {
    out: Mutex<W>,
    state: Mutex<Shown>,
}

#[derive(Default)]
struct Shown {
    status: Option<(String, Option<u32>)>,
    downloaded_mib: u64,
}

impl ConsoleProgress<Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> ConsoleProgress<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
            state: Mutex::new(Shown::default()),
        }
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        match self.out.into_inner() {
            Ok(out) => out,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn line(&self, event: RenderEvent) -> Option<String> {
        let mut shown = match self.state.lock() {
            Ok(shown) => shown,
            Err(poisoned) => poisoned.into_inner(),
        };
        let line = match event {
            RenderEvent::SpeechSaved { path, bytes } => {
                format!("Speech saved to {} ({} bytes)", path.display(), bytes)
            }
            RenderEvent::DurationProbed { seconds } => format!("Audio duration: {seconds:.1}s"),
            RenderEvent::Submitted { request_id } => format!("Submitted render job {request_id}"),
            RenderEvent::Status {
                status,
                queue_position,
            } => {
                let key = (status.label().to_string(), queue_position);
                if shown.status.as_ref() == Some(&key) {
                    return None;
                }
                shown.status = Some(key);
                match queue_position {
                    Some(position) => {
                        format!("Status: {} (queue position {position})", status.label())
                    }
                    None => format!("Status: {}", status.label()),
                }
            }
            RenderEvent::RemoteLog { message } => format!("  | {message}"),
            RenderEvent::PollRetry { attempt, error } => {
                format!("Status check failed (attempt {attempt}): {error}")
            }
            RenderEvent::CancelRequested { request_id } => {
                format!("Interrupted; cancelling job {request_id}")
            }
            RenderEvent::Downloading { bytes } => {
                let mib = bytes / MIB;
                if bytes > 0 && mib <= shown.downloaded_mib {
                    return None;
                }
                shown.downloaded_mib = mib;
                format!("Downloading... {:.1} MiB", bytes as f64 / MIB as f64)
            }
            RenderEvent::Saved { path, bytes } => {
                format!("Saved {} ({} bytes)", path.display(), bytes)
            }
        };
        Some(line)
    }
}

impl<W: Write + Send> ProgressSink for ConsoleProgress<W> {
    fn emit(&self, event: RenderEvent) {
        let Some(line) = self.line(event) else {
            return;
        };
        if let Ok(mut out) = self.out.lock() {
            let _ = writeln!(out, "{line}");
            let _ = out.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use talkhead_core::JobStatus;

    fn printed(events: Vec<RenderEvent>) -> String {
        let console = ConsoleProgress::new(Vec::new());
        for event in events {
            console.emit(event);
        }
        String::from_utf8(console.into_inner()).unwrap()
    }

    #[test]
    fn repeated_status_is_folded() {
        let running = RenderEvent::Status {
            status: JobStatus::Running,
            queue_position: None,
        };
        let out = printed(vec![
            RenderEvent::Status {
                status: JobStatus::Queued,
                queue_position: Some(3),
            },
            RenderEvent::Status {
                status: JobStatus::Queued,
                queue_position: Some(3),
            },
            running.clone(),
            running,
        ]);
        assert_eq!(out, "Status: queued (queue position 3)\nStatus: running\n");
    }

    #[test]
    fn download_progress_is_coarse() {
        let out = printed(vec![
            RenderEvent::Downloading { bytes: 0 },
            RenderEvent::Downloading { bytes: 10 },
            RenderEvent::Downloading { bytes: MIB + 1 },
            RenderEvent::Downloading { bytes: MIB + 2 },
        ]);
        assert_eq!(out, "Downloading... 0.0 MiB\nDownloading... 1.0 MiB\n");
    }
}
