//! Framing of the captured channels for hand-off to the caller.
//!
//! Layout: `[count]` then `[kind][length]` per non-empty channel, then the
//! channel bytes in the same order. Header words are little-endian.

use crate::error::{DumpError, Result};
use crate::sink::{SinkKind, SinkSet};

fn occupied(sinks: &SinkSet) -> impl Iterator<Item = (SinkKind, &[u8])> {
    sinks
        .iter()
        .map(|sink| (sink.kind(), sink.contents()))
        .filter(|(_, bytes)| !bytes.is_empty())
}

/// Bytes needed to hold the frame. Zero when nothing was captured.
pub fn frame_size(sinks: &SinkSet) -> usize {
    let (count, payload) = occupied(sinks).fold((0, 0), |(n, len), (_, bytes)| (n + 1, len + bytes.len()));
    if count == 0 {
        return 0;
    }
    4 + 8 * count + payload
}

/// With `None`, reports the frame size. With a buffer, writes the frame into it
/// and returns the bytes written.
pub fn retrieve(sinks: &SinkSet, buffer: Option<&mut [u8]>) -> Result<usize> {
    let required = frame_size(sinks);
    let Some(buffer) = buffer else {
        return Ok(required);
    };
    if required == 0 {
        return Ok(0);
    }
    if buffer.len() < required {
        return Err(DumpError::SizeTooSmall {
            required,
            supplied: buffer.len(),
        });
    }

    let sections: Vec<_> = occupied(sinks).collect();
    let mut at = 0;
    let mut put = |bytes: &[u8]| {
        buffer[at..at + bytes.len()].copy_from_slice(bytes);
        at += bytes.len();
    };

    put(&(sections.len() as u32).to_le_bytes());
    for (kind, bytes) in &sections {
        put(&kind.wire_id().to_le_bytes());
        put(&(bytes.len() as u32).to_le_bytes());
    }
    for (_, bytes) in &sections {
        put(bytes);
    }

    Ok(required)
}

fn word(bytes: &[u8], at: usize) -> Result<u32> {
    bytes
        .get(at..at + 4)
        .and_then(|w| w.try_into().ok())
        .map(u32::from_le_bytes)
        .ok_or_else(|| DumpError::ProtocolViolation(format!("frame truncated at byte {}", at)))
}

/// Splits a frame produced by [`retrieve`] back into its channels.
pub fn parse_frame(bytes: &[u8]) -> Result<Vec<(SinkKind, &[u8])>> {
    if bytes.is_empty() {
        return Ok(Vec::new());
    }

    let count = word(bytes, 0)? as usize;
    let mut headers = Vec::with_capacity(count);
    for i in 0..count {
        let kind = match word(bytes, 4 + 8 * i)? {
            1 => SinkKind::Text,
            2 => SinkKind::Binary,
            3 => SinkKind::VendorLog,
            other => {
                return Err(DumpError::ProtocolViolation(format!("unknown channel kind {}", other)))
            }
        };
        let length = word(bytes, 8 + 8 * i)? as usize;
        headers.push((kind, length));
    }

    let mut at = 4 + 8 * count;
    let mut sections = Vec::with_capacity(count);
    for (kind, length) in headers {
        let body = bytes
            .get(at..at + length)
            .ok_or_else(|| DumpError::ProtocolViolation(format!("{:?} section overruns frame", kind)))?;
        sections.push((kind, body));
        at += length;
    }
    Ok(sections)
}
