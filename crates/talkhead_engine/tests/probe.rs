mod common;

use std::path::PathBuf;

use common::{init_logging, mp3_frames, write_wav, MP3_HEADER};
use talkhead_engine::{DurationProber, MetadataProber, ProbeError};
use tempfile::TempDir;

fn close(actual: f64, expected: f64) -> bool {
    (actual - expected).abs() < 1e-3
}

#[tokio::test]
async fn wav_duration_comes_from_header() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("voice.wav");
    write_wav(&path, 3, 8_000);

    let seconds = MetadataProber::default().probe(&path).await.unwrap();
    assert!(close(seconds, 3.0), "got {seconds}");
}

#[tokio::test]
async fn cbr_mp3_is_timed_from_bitrate() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("voice.mp3");
    std::fs::write(&path, mp3_frames(100)).unwrap();

    // 100 * 417 bytes at 128 kbps.
    let seconds = MetadataProber::without_ffprobe().probe(&path).await.unwrap();
    assert!(close(seconds, 2.606_25), "got {seconds}");
}

#[tokio::test]
async fn vbr_mp3_uses_xing_frame_count() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("voice.mp3");

    let mut bytes = mp3_frames(3);
    // Side info for MPEG-1 stereo is 32 bytes, so the tag sits at 36.
    bytes[36..40].copy_from_slice(b"Xing");
    bytes[40..44].copy_from_slice(&1u32.to_be_bytes());
    bytes[44..48].copy_from_slice(&1_000u32.to_be_bytes());
    std::fs::write(&path, bytes).unwrap();

    // The byte length says ~0.08s; the header wins.
    let seconds = MetadataProber::without_ffprobe().probe(&path).await.unwrap();
    assert!(close(seconds, 1_000.0 * 1_152.0 / 44_100.0), "got {seconds}");
}

#[tokio::test]
async fn id3_tags_are_not_counted_as_audio() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tagged.mp3");

    let mut bytes = b"ID3\x04\x00\x00\x00\x00\x00\x14".to_vec();
    bytes.extend_from_slice(&[0u8; 20]);
    bytes.extend_from_slice(&mp3_frames(100));
    let mut trailer = b"TAG".to_vec();
    trailer.resize(128, b' ');
    bytes.extend_from_slice(&trailer);
    std::fs::write(&path, bytes).unwrap();

    let seconds = MetadataProber::without_ffprobe().probe(&path).await.unwrap();
    assert!(close(seconds, 2.606_25), "got {seconds}");
}

#[tokio::test]
async fn missing_file_is_not_found() {
    init_logging();
    let path = PathBuf::from("/definitely/not/here.wav");
    let err = MetadataProber::default().probe(&path).await.unwrap_err();
    assert!(matches!(err, ProbeError::NotFound(p) if p == path));
}

#[tokio::test]
async fn unknown_container_is_unsupported_without_ffprobe() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("voice.ogg");
    std::fs::write(&path, b"OggS\x00\x02not really an ogg stream").unwrap();

    let err = MetadataProber::without_ffprobe()
        .probe(&path)
        .await
        .unwrap_err();
    assert!(matches!(err, ProbeError::UnsupportedFormat { .. }));
}

#[tokio::test]
async fn sync_bytes_without_frames_are_unsupported() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.mp3");
    let mut bytes = MP3_HEADER.to_vec();
    bytes[2] = 0xF0; // bitrate index 15 is invalid
    bytes.extend_from_slice(&[0u8; 64]);
    std::fs::write(&path, bytes).unwrap();

    let err = MetadataProber::without_ffprobe()
        .probe(&path)
        .await
        .unwrap_err();
    assert!(matches!(err, ProbeError::UnsupportedFormat { .. }));
}

#[tokio::test]
async fn adts_audio_falls_through_to_ffprobe() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("voice.aac");
    // ADTS sync word 0xFFF1 looks like MPEG audio but carries no MPEG frame.
    let mut bytes = vec![0xFF, 0xF1, 0x50, 0x80, 0x02, 0x1F, 0xFC];
    bytes.resize(4096, 0);
    std::fs::write(&path, bytes).unwrap();

    let err = MetadataProber::with_ffprobe("talkhead-no-such-ffprobe")
        .probe(&path)
        .await
        .unwrap_err();
    match err {
        ProbeError::UnsupportedFormat { reason, .. } => {
            assert!(reason.contains("talkhead-no-such-ffprobe"), "{reason}");
        }
        other => panic!("unexpected error: {other}"),
    }

    let err = MetadataProber::without_ffprobe()
        .probe(&path)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("no MPEG audio frame header"));
}
