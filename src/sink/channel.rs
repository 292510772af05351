use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{DumpError, Result};

/// The three output channels a session can write to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SinkKind {
    Text,
    Binary,
    VendorLog,
}

impl SinkKind {
    /// Identifier used in the retrieval frame.
    pub fn wire_id(self) -> u32 {
        match self {
            SinkKind::Text => 1,
            SinkKind::Binary => 2,
            SinkKind::VendorLog => 3,
        }
    }
}

/// Bounded, write-only byte channel.
///
/// The buffer is allocated on first `open` and kept until `dispose`. Writes past
/// the end are dropped; the buffer never grows.
#[derive(Debug)]
pub struct Sink {
    kind: SinkKind,
    buffer: Vec<u8>,
    cursor: usize,
}

impl Sink {
    pub fn new(kind: SinkKind) -> Self {
        Self {
            kind,
            buffer: Vec::new(),
            cursor: 0,
        }
    }

    pub fn kind(&self) -> SinkKind {
        self.kind
    }

    /// Prepares the channel for a new session. Reuses an existing buffer,
    /// zeroing it; otherwise allocates `capacity & !3` bytes.
    pub fn open(&mut self, capacity: usize) -> Result<()> {
        let size = capacity & !3;

        if self.buffer.is_empty() {
            let mut buffer = Vec::new();
            buffer
                .try_reserve_exact(size)
                .map_err(|_| DumpError::AllocationFailure { requested: size })?;
            buffer.resize(size, 0);
            self.buffer = buffer;
        } else {
            self.buffer.fill(0);
        }

        self.cursor = 0;
        Ok(())
    }

    pub fn is_allocated(&self) -> bool {
        !self.buffer.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    pub fn remaining(&self) -> usize {
        self.capacity().saturating_sub(self.cursor)
    }

    /// Stores as much of `bytes` as fits and returns the count stored.
    pub fn write(&mut self, bytes: &[u8]) -> usize {
        let length = bytes.len().min(self.remaining());
        if length > 0 {
            self.buffer[self.cursor..self.cursor + length].copy_from_slice(&bytes[..length]);
            self.cursor += length;
        }
        length
    }

    pub fn put(&mut self, value: u8) {
        self.write(&[value]);
    }

    pub fn tell(&self) -> usize {
        self.cursor
    }

    pub fn flush(&mut self) {
        if self.cursor > self.capacity() {
            self.cursor = self.capacity();
        }
    }

    /// Pads with zeros until the cursor sits on a word boundary.
    pub fn close(&mut self) {
        while self.cursor % 4 != 0 && self.cursor < self.capacity() {
            self.buffer[self.cursor] = 0;
            self.cursor += 1;
        }
    }

    /// Empties the channel without releasing its buffer.
    pub fn clear(&mut self) {
        self.buffer.fill(0);
        self.cursor = 0;
    }

    pub fn dispose(&mut self) {
        self.buffer = Vec::new();
        self.cursor = 0;
    }

    /// Bytes written so far.
    pub fn contents(&self) -> &[u8] {
        &self.buffer[..self.cursor]
    }
}

// Formatted writes truncate like `write`; they never report an error.
impl fmt::Write for Sink {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.write(s.as_bytes());
        Ok(())
    }
}

/// The controller's channels, in retrieval order.
#[derive(Debug)]
pub struct SinkSet {
    pub text: Sink,
    pub binary: Sink,
    pub vendor: Sink,
}

impl SinkSet {
    pub fn new() -> Self {
        Self {
            text: Sink::new(SinkKind::Text),
            binary: Sink::new(SinkKind::Binary),
            vendor: Sink::new(SinkKind::VendorLog),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sink> {
        [&self.text, &self.binary, &self.vendor].into_iter()
    }

    pub fn dispose(&mut self) {
        self.text.dispose();
        self.binary.dispose();
        self.vendor.dispose();
    }
}

impl Default for SinkSet {
    fn default() -> Self {
        Self::new()
    }
}
