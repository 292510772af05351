//! Per-subsystem capture routines.
//!
//! A collector interrogates one part of the adapter and writes what it finds
//! through whichever encoders the session opened. Collectors never abort the
//! session; they return an error for the session to log and move on.

pub mod config_region;
pub mod coproc;
pub mod event_log;
pub mod identity;
pub mod sli;

use crate::encode::{BinaryEncoder, ByteOrder, TextEncoder};
use crate::sink::{Sink, SinkKind, SinkSet};

/// Encoders over the channels open for the current session.
pub struct Channels<'a> {
    pub text: Option<TextEncoder<'a>>,
    pub binary: Option<BinaryEncoder<'a>>,
    pub vendor: Option<TextEncoder<'a>>,
}

impl<'a> Channels<'a> {
    /// Encoders over the sinks named in `kinds`. Sinks without a buffer get none.
    pub fn over(sinks: &'a mut SinkSet, order: ByteOrder, kinds: &[SinkKind]) -> Self {
        let SinkSet { text, binary, vendor } = sinks;
        let wanted = |sink: &Sink| sink.is_allocated() && kinds.contains(&sink.kind());
        Self {
            text: if wanted(&*text) {
                Some(TextEncoder::new(text))
            } else {
                None
            },
            binary: if wanted(&*binary) {
                Some(BinaryEncoder::new(binary, order))
            } else {
                None
            },
            vendor: if wanted(&*vendor) {
                Some(TextEncoder::new(vendor))
            } else {
                None
            },
        }
    }

    /// Same string to the text channel and as a string record to the binary one.
    pub fn string(&mut self, sid: u8, category: &str, label: &str, text: &str) {
        if let Some(t) = self.text.as_mut() {
            t.labelled(category, label, text);
        }
        if let Some(b) = self.binary.as_mut() {
            b.string(sid, category, label, text);
        }
    }

    pub fn note(&mut self, category: &str, label: &str, text: &str) {
        if let Some(t) = self.text.as_mut() {
            t.labelled(category, label, text);
        }
    }
}
