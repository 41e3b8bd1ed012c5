use talkhead_logging::{talkhead_debug, talkhead_info, talkhead_warn};

use crate::RenderEvent;

pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: RenderEvent);
}

/// Routes progress into the log; used when nothing renders it for a human.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgressSink;

impl ProgressSink for LogProgressSink {
    fn emit(&self, event: RenderEvent) {
        match event {
            RenderEvent::PollRetry { attempt, error } => {
                talkhead_warn!("status query failed (attempt {}): {}", attempt, error);
            }
            RenderEvent::RemoteLog { message } => talkhead_debug!("remote: {}", message),
            RenderEvent::Downloading { bytes } => talkhead_debug!("downloaded {} bytes", bytes),
            other => talkhead_info!("{:?}", other),
        }
    }
}
