// ABOUTME: Decoder for the engine's multiplexed stdout/stderr byte stream.
// ABOUTME: Used for both exec output and retrieved logs; also parses timestamped log lines.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// Size of the frame header: `[stream:1][reserved:3][length:4 BE]`.
pub const HEADER_LEN: usize = 8;

/// Which output stream a frame belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    Stdout,
    Stderr,
}

impl StreamKind {
    /// Stream for a header tag byte. Tags other than 1 and 2 are not output streams.
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(StreamKind::Stdout),
            2 => Some(StreamKind::Stderr),
            _ => None,
        }
    }

    pub fn tag(self) -> u8 {
        match self {
            StreamKind::Stdout => 1,
            StreamKind::Stderr => 2,
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamKind::Stdout => write!(f, "stdout"),
            StreamKind::Stderr => write!(f, "stderr"),
        }
    }
}

/// One decoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub stream: StreamKind,
    pub payload: Vec<u8>,
}

/// Split a multiplexed buffer into frames.
///
/// Decoding stops without error at a truncated trailing header or payload.
/// Frames with a tag other than stdout/stderr are skipped.
pub fn decode(buf: &[u8]) -> Vec<Frame> {
    let mut frames = Vec::new();
    let mut offset = 0;

    while buf.len() - offset >= HEADER_LEN {
        let header = &buf[offset..offset + HEADER_LEN];
        let len = u32::from_be_bytes([header[4], header[5], header[6], header[7]]) as usize;

        let start = offset + HEADER_LEN;
        let Some(end) = start.checked_add(len).filter(|end| *end <= buf.len()) else {
            tracing::debug!(
                declared = len,
                available = buf.len() - start,
                "dropping truncated frame"
            );
            break;
        };

        match StreamKind::from_tag(header[0]) {
            Some(stream) => frames.push(Frame {
                stream,
                payload: buf[start..end].to_vec(),
            }),
            None => tracing::debug!(tag = header[0], "skipping frame with unexpected stream tag"),
        }

        offset = end;
    }

    frames
}

/// Append one frame in the multiplexed format to `out`.
///
/// # Panics
///
/// Panics if `payload` is longer than `u32::MAX` bytes.
pub fn encode_frame(stream: StreamKind, payload: &[u8], out: &mut Vec<u8>) {
    let len = u32::try_from(payload.len()).expect("frame payload exceeds u32::MAX bytes");
    out.push(stream.tag());
    out.extend_from_slice(&[0, 0, 0]);
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(payload);
}

/// Encode a sequence of frames into a multiplexed buffer.
pub fn encode<'a>(frames: impl IntoIterator<Item = (StreamKind, &'a [u8])>) -> Vec<u8> {
    let mut out = Vec::new();
    for (stream, payload) in frames {
        encode_frame(stream, payload, &mut out);
    }
    out
}

/// Split a log line of the form `<RFC 3339 timestamp> <message>`.
///
/// Returns None when the line does not start with a parseable timestamp
/// followed by a single space.
pub fn parse_timestamped(line: &str) -> Option<(DateTime<Utc>, &str)> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    let (stamp, message) = line.split_once(' ')?;
    let timestamp = DateTime::parse_from_rfc3339(stamp).ok()?;
    Some((timestamp.with_timezone(&Utc), message))
}
