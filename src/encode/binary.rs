use super::sid::{SID_DUMP_TERM, SID_LEGEND, SID_NULL};
use super::ByteOrder;
use crate::sink::Sink;

/// Writes typed records into the binary channel.
///
/// Integer fields are emitted byte by byte in the configured order, so the
/// header marker alone tells a parser how to read the rest of the artifact.
pub struct BinaryEncoder<'a> {
    sink: &'a mut Sink,
    order: ByteOrder,
}

impl<'a> BinaryEncoder<'a> {
    pub fn new(sink: &'a mut Sink, order: ByteOrder) -> Self {
        Self { sink, order }
    }

    pub fn order(&self) -> ByteOrder {
        self.order
    }

    pub fn sink(&self) -> &Sink {
        self.sink
    }

    /// Marker byte followed by three reserved zero bytes.
    pub fn header(&mut self) {
        self.sink.put(self.order.marker());
        self.sink.put(SID_NULL);
        self.sink.put(SID_NULL);
        self.sink.put(SID_NULL);
        self.sink.flush();
    }

    pub fn terminate(&mut self) {
        self.sink.put(SID_DUMP_TERM);
        self.sink.flush();
    }

    /// `[LEGEND][sid]"<category>: <label>"[NUL][sid][len:3][text][NUL]`
    pub fn string(&mut self, sid: u8, category: &str, label: &str, text: &str) {
        self.legend(sid, category, label);
        self.sink.put(sid);
        self.put_u24(text.len() as u32 + 1);
        self.sink.write(text.as_bytes());
        self.sink.put(0);
        self.sink.flush();
    }

    pub fn host_block(&mut self, sid: u8, category: &str, label: &str, payload: &[u8], swap: bool) {
        self.legend(sid, category, label);
        self.sink.put(sid);
        self.put_u24(payload.len() as u32);
        self.words(payload, swap);
        self.sink.flush();
    }

    #[allow(clippy::too_many_arguments)]
    pub fn host_struct(
        &mut self,
        sid: u8,
        category: &str,
        label: &str,
        element_length: u8,
        element_count: u16,
        payload: &[u8],
        swap: bool,
    ) {
        self.legend(sid, category, label);
        self.sink.put(sid);
        self.sink.put(element_length);
        self.put_u16(element_count);
        self.words(payload, swap);
        self.sink.flush();
    }

    /// `[sid][len:3][address:4][payload]` for a region read out of adapter memory.
    pub fn port_block(&mut self, sid: u8, byte_count: u32, address: u32, payload: &[u8], swap: bool) {
        self.sink.put(sid);
        self.put_u24(byte_count);
        self.put_u32(address);
        self.words(payload, swap);
        self.sink.flush();
    }

    pub fn port_struct(
        &mut self,
        sid: u8,
        element_length: u8,
        element_count: u16,
        address: u32,
        payload: &[u8],
        swap: bool,
    ) {
        self.sink.put(sid);
        self.sink.put(element_length);
        self.put_u16(element_count);
        self.put_u32(address);
        self.words(payload, swap);
        self.sink.flush();
    }

    fn legend(&mut self, sid: u8, category: &str, label: &str) {
        self.sink.put(SID_LEGEND);
        self.sink.put(sid);
        self.sink.write(category.as_bytes());
        self.sink.write(b": ");
        self.sink.write(label.as_bytes());
        self.sink.put(0);
    }

    /// Payload is device-native (little-endian words). Flagged payloads are
    /// turned around for big-endian artifacts; a trailing partial word is dropped.
    fn words(&mut self, payload: &[u8], swap: bool) {
        let reverse = swap && self.order == ByteOrder::Big;
        for chunk in payload.chunks_exact(4) {
            if reverse {
                self.sink.write(&[chunk[3], chunk[2], chunk[1], chunk[0]]);
            } else {
                self.sink.write(chunk);
            }
        }
    }

    fn put_u16(&mut self, value: u16) {
        match self.order {
            ByteOrder::Little => self.sink.write(&value.to_le_bytes()),
            ByteOrder::Big => self.sink.write(&value.to_be_bytes()),
        };
    }

    fn put_u24(&mut self, value: u32) {
        let bytes = match self.order {
            ByteOrder::Little => {
                let b = value.to_le_bytes();
                [b[0], b[1], b[2]]
            }
            ByteOrder::Big => {
                let b = value.to_be_bytes();
                [b[1], b[2], b[3]]
            }
        };
        self.sink.write(&bytes);
    }

    fn put_u32(&mut self, value: u32) {
        match self.order {
            ByteOrder::Little => self.sink.write(&value.to_le_bytes()),
            ByteOrder::Big => self.sink.write(&value.to_be_bytes()),
        };
    }
}
