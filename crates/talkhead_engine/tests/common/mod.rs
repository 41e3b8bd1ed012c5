#![allow(dead_code)]

use std::path::Path;
use std::sync::{Arc, Mutex, Once};

use talkhead_engine::{ProgressSink, RenderEvent};

pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(talkhead_logging::initialize_for_tests);
}

#[derive(Default, Clone)]
pub struct TestSink {
    events: Arc<Mutex<Vec<RenderEvent>>>,
}

impl TestSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RenderEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl ProgressSink for TestSink {
    fn emit(&self, event: RenderEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Mono 16-bit PCM, silent.
pub fn write_wav(path: &Path, seconds: u32, sample_rate: u32) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for _ in 0..seconds * sample_rate {
        writer.write_sample(0i16).unwrap();
    }
    writer.finalize().unwrap();
}

// MPEG-1 Layer III, 128 kbps, 44.1 kHz, joint stereo; 417 bytes per frame.
pub const MP3_HEADER: [u8; 4] = [0xFF, 0xFB, 0x90, 0x64];
pub const MP3_FRAME_LEN: usize = 417;

pub fn mp3_frames(count: usize) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(count * MP3_FRAME_LEN);
    for _ in 0..count {
        let mut frame = vec![0u8; MP3_FRAME_LEN];
        frame[..4].copy_from_slice(&MP3_HEADER);
        bytes.extend_from_slice(&frame);
    }
    bytes
}
