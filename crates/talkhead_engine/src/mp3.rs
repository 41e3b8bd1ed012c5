//! Duration of MPEG audio files from frame headers.
//!
//! VBR files carry the total frame count in a Xing/Info or VBRI header inside
//! the first frame; that count is authoritative. Files without one are treated
//! as constant bitrate and timed from the audio byte length.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

const SCAN_LIMIT: usize = 64 * 1024;
const ID3V1_LEN: u64 = 128;

const BITRATES_V1_L1: [u32; 15] = [
    0, 32, 64, 96, 128, 160, 192, 224, 256, 288, 320, 352, 384, 416, 448,
];
const BITRATES_V1_L2: [u32; 15] = [
    0, 32, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 384,
];
const BITRATES_V1_L3: [u32; 15] = [
    0, 32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320,
];
const BITRATES_V2_L1: [u32; 15] = [
    0, 32, 48, 56, 64, 80, 96, 112, 128, 144, 160, 176, 192, 224, 256,
];
const BITRATES_V2_L23: [u32; 15] = [0, 8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Version {
    V1,
    V2,
    V25,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layer {
    I,
    II,
    III,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FrameHeader {
    version: Version,
    layer: Layer,
    bitrate_kbps: u32,
    sample_rate: u32,
    padding: u32,
    mono: bool,
}

impl FrameHeader {
    fn parse(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < 4 || bytes[0] != 0xFF || bytes[1] & 0xE0 != 0xE0 {
            return None;
        }
        let version = match (bytes[1] >> 3) & 0b11 {
            0 => Version::V25,
            2 => Version::V2,
            3 => Version::V1,
            _ => return None,
        };
        let layer = match (bytes[1] >> 1) & 0b11 {
            1 => Layer::III,
            2 => Layer::II,
            3 => Layer::I,
            _ => return None,
        };
        let bitrate_index = (bytes[2] >> 4) as usize;
        // 0 is "free format" (no fixed bitrate), 15 is invalid.
        if bitrate_index == 0 || bitrate_index == 15 {
            return None;
        }
        let table = match (version, layer) {
            (Version::V1, Layer::I) => &BITRATES_V1_L1,
            (Version::V1, Layer::II) => &BITRATES_V1_L2,
            (Version::V1, Layer::III) => &BITRATES_V1_L3,
            (_, Layer::I) => &BITRATES_V2_L1,
            (_, _) => &BITRATES_V2_L23,
        };
        let base_rate = match (bytes[2] >> 2) & 0b11 {
            0 => 44_100,
            1 => 48_000,
            2 => 32_000,
            _ => return None,
        };
        let sample_rate = match version {
            Version::V1 => base_rate,
            Version::V2 => base_rate / 2,
            Version::V25 => base_rate / 4,
        };
        Some(Self {
            version,
            layer,
            bitrate_kbps: table[bitrate_index],
            sample_rate,
            padding: u32::from((bytes[2] >> 1) & 1),
            mono: bytes[3] >> 6 == 0b11,
        })
    }

    fn samples_per_frame(&self) -> u32 {
        match (self.layer, self.version) {
            (Layer::I, _) => 384,
            (Layer::II, _) => 1152,
            (Layer::III, Version::V1) => 1152,
            (Layer::III, _) => 576,
        }
    }

    fn frame_len(&self) -> usize {
        let bitrate = self.bitrate_kbps * 1000;
        let len = match self.layer {
            Layer::I => (12 * bitrate / self.sample_rate + self.padding) * 4,
            _ => self.samples_per_frame() / 8 * bitrate / self.sample_rate + self.padding,
        };
        len as usize
    }

    /// Offset of a Xing/Info tag from the frame start (Layer III only).
    fn xing_offset(&self) -> usize {
        let side_info = match (self.version, self.mono) {
            (Version::V1, false) => 32,
            (Version::V1, true) => 17,
            (_, false) => 17,
            (_, true) => 9,
        };
        4 + side_info
    }

    fn same_stream(&self, other: &FrameHeader) -> bool {
        self.version == other.version
            && self.layer == other.layer
            && self.sample_rate == other.sample_rate
    }
}

/// Returns `Ok(None)` when the file does not look like MPEG audio at all.
pub(crate) fn duration_secs(path: &Path) -> io::Result<Option<f64>> {
    let mut file = File::open(path)?;
    let file_len = file.metadata()?.len();

    let audio_start = id3v2_len(&mut file)?;
    file.seek(SeekFrom::Start(audio_start))?;
    let mut buf = Vec::with_capacity(SCAN_LIMIT);
    file.by_ref()
        .take(SCAN_LIMIT as u64)
        .read_to_end(&mut buf)?;

    let Some((offset, header)) = find_first_frame(&buf) else {
        return Ok(None);
    };
    let frame = &buf[offset..];

    if let Some(frames) = xing_frames(frame, &header).or_else(|| vbri_frames(frame)) {
        let samples = f64::from(frames) * f64::from(header.samples_per_frame());
        return Ok(Some(samples / f64::from(header.sample_rate)));
    }

    let audio_end = if file_len >= audio_start + ID3V1_LEN && has_id3v1(&mut file, file_len)? {
        file_len - ID3V1_LEN
    } else {
        file_len
    };
    let first_frame_at = audio_start + offset as u64;
    let audio_bytes = audio_end.saturating_sub(first_frame_at);
    let bits_per_sec = f64::from(header.bitrate_kbps) * 1000.0;
    Ok(Some(audio_bytes as f64 * 8.0 / bits_per_sec))
}

fn id3v2_len(file: &mut File) -> io::Result<u64> {
    let mut head = [0u8; 10];
    let read = read_up_to(file, &mut head)?;
    if read < 10 || &head[..3] != b"ID3" {
        return Ok(0);
    }
    // Syncsafe integer: 7 significant bits per byte.
    let size = head[6..10]
        .iter()
        .fold(0u64, |acc, b| (acc << 7) | u64::from(b & 0x7F));
    let footer = if head[5] & 0x10 != 0 { 10 } else { 0 };
    Ok(10 + size + footer)
}

fn has_id3v1(file: &mut File, file_len: u64) -> io::Result<bool> {
    file.seek(SeekFrom::Start(file_len - ID3V1_LEN))?;
    let mut tag = [0u8; 3];
    let read = read_up_to(file, &mut tag)?;
    Ok(read == 3 && &tag == b"TAG")
}

fn read_up_to(file: &mut File, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match file.read(&mut buf[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}

/// First frame header confirmed by a second header right after it, when the
/// buffer reaches that far.
fn find_first_frame(buf: &[u8]) -> Option<(usize, FrameHeader)> {
    (0..buf.len().saturating_sub(3)).find_map(|i| {
        let header = FrameHeader::parse(&buf[i..])?;
        let next = i + header.frame_len();
        if next + 4 <= buf.len() {
            let follower = FrameHeader::parse(&buf[next..])?;
            if !header.same_stream(&follower) {
                return None;
            }
        }
        Some((i, header))
    })
}

fn xing_frames(frame: &[u8], header: &FrameHeader) -> Option<u32> {
    if header.layer != Layer::III {
        return None;
    }
    let at = header.xing_offset();
    let tag = frame.get(at..at + 4)?;
    if tag != b"Xing" && tag != b"Info" {
        return None;
    }
    let flags = read_u32(frame, at + 4)?;
    if flags & 0x1 == 0 {
        return None;
    }
    read_u32(frame, at + 8).filter(|frames| *frames > 0)
}

fn vbri_frames(frame: &[u8]) -> Option<u32> {
    const AT: usize = 4 + 32;
    if frame.get(AT..AT + 4)? != b"VBRI" {
        return None;
    }
    read_u32(frame, AT + 14).filter(|frames| *frames > 0)
}

fn read_u32(bytes: &[u8], at: usize) -> Option<u32> {
    let raw: [u8; 4] = bytes.get(at..at + 4)?.try_into().ok()?;
    Some(u32::from_be_bytes(raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    // MPEG-1 Layer III, 128 kbps, 44.1 kHz, joint stereo.
    const HEADER: [u8; 4] = [0xFF, 0xFB, 0x90, 0x64];

    #[test]
    fn parses_common_header() {
        let header = FrameHeader::parse(&HEADER).unwrap();
        assert_eq!(header.version, Version::V1);
        assert_eq!(header.layer, Layer::III);
        assert_eq!(header.bitrate_kbps, 128);
        assert_eq!(header.sample_rate, 44_100);
        assert_eq!(header.samples_per_frame(), 1152);
        assert_eq!(header.frame_len(), 417);
        assert!(!header.mono);
    }

    #[test]
    fn mpeg2_layer3_uses_half_frames() {
        // MPEG-2 Layer III, 64 kbps, 22.05 kHz, mono.
        let header = FrameHeader::parse(&[0xFF, 0xF3, 0x80, 0xC0]).unwrap();
        assert_eq!(header.version, Version::V2);
        assert_eq!(header.sample_rate, 22_050);
        assert_eq!(header.bitrate_kbps, 64);
        assert_eq!(header.samples_per_frame(), 576);
        assert!(header.mono);
        assert_eq!(header.xing_offset(), 13);
    }

    #[test]
    fn rejects_reserved_fields() {
        assert!(FrameHeader::parse(&[0xFF, 0xFB, 0xF0, 0x00]).is_none());
        assert!(FrameHeader::parse(&[0xFF, 0xFB, 0x0C, 0x00]).is_none());
        assert!(FrameHeader::parse(&[0xFF, 0xEB, 0x90, 0x00]).is_none());
        assert!(FrameHeader::parse(&[0x00, 0xFB, 0x90, 0x00]).is_none());
    }

    #[test]
    fn false_sync_is_skipped() {
        let mut buf = vec![0xFF, 0xFB, 0x90, 0x00, 0x01, 0x02];
        let start = buf.len();
        for _ in 0..3 {
            let mut frame = vec![0u8; 417];
            frame[..4].copy_from_slice(&HEADER);
            buf.extend_from_slice(&frame);
        }
        let (offset, _header) = find_first_frame(&buf).unwrap();
        assert_eq!(offset, start);
    }
}
