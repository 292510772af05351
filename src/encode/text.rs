use std::fmt::Write;

use crate::sink::Sink;

/// Writes human-readable records into a text channel.
pub struct TextEncoder<'a> {
    sink: &'a mut Sink,
}

impl<'a> TextEncoder<'a> {
    pub fn new(sink: &'a mut Sink) -> Self {
        Self { sink }
    }

    pub fn sink(&self) -> &Sink {
        self.sink
    }

    /// Legend line, then the body. `pure` drops the leading space and the
    /// trailing blank line so consecutive calls build one running log.
    pub fn string(&mut self, legend: Option<(&str, &str)>, text: &str, pure: bool) {
        if let Some((category, label)) = legend {
            let _ = writeln!(self.sink, "{}: {}", category, label);
            if !pure {
                self.sink.put(b' ');
            }
            self.sink.write(text.as_bytes());
            if !pure {
                self.sink.write(b"\n\n");
            }
        } else {
            if !pure {
                self.sink.put(b' ');
            }
            self.sink.write(text.as_bytes());
        }
        self.sink.flush();
    }

    pub fn labelled(&mut self, category: &str, label: &str, text: &str) {
        self.string(Some((category, label)), text, false);
    }

    /// Unlabelled text appended to the running log.
    pub fn append(&mut self, text: &str) {
        self.string(None, text, true);
    }

    /// Four words per line, each line prefixed with its byte offset.
    pub fn words(&mut self, category: &str, label: &str, words: &[u32]) {
        let _ = writeln!(self.sink, "{}: {}", category, label);

        for (j, word) in words.iter().enumerate() {
            if j % 4 == 0 {
                let _ = write!(self.sink, "\n{:04x}:", j * 4);
            }
            let _ = write!(self.sink, " {:08x}", word);
        }

        self.sink.write(b"\n\n");
        self.sink.flush();
    }

    /// Classic hex dump: 16 bytes per row plus an ASCII column.
    pub fn bytes(&mut self, category: &str, label: &str, bytes: &[u8]) {
        let _ = writeln!(self.sink, "{}: {}", category, label);

        for (row, chunk) in bytes.chunks(16).enumerate() {
            let _ = write!(self.sink, "\n{:04x}:", row * 16);
            for byte in chunk {
                let _ = write!(self.sink, " {:02x}", byte);
            }
            self.sink.put(b' ');
            for _ in chunk.len()..16 {
                self.sink.write(b"   ");
            }
            for &byte in chunk {
                self.sink.put(if is_graph(byte) { byte } else { b'.' });
            }
        }

        self.sink.write(b"\n\n");
        self.sink.flush();
    }

    pub fn terminate(&mut self) {
        self.sink.write(b"Dump File End\n");
        self.sink.flush();
    }
}

/// Printable, non-space ASCII.
pub fn is_graph(byte: u8) -> bool {
    (33..=126).contains(&byte)
}
