pub mod binary;
pub mod sid;
pub mod text;

use serde::{Deserialize, Serialize};

pub use binary::BinaryEncoder;
pub use text::TextEncoder;

/// Byte order of every multi-byte field in a binary artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ByteOrder {
    #[default]
    Little,
    Big,
}

impl ByteOrder {
    /// Header marker announcing this order to the parser.
    pub fn marker(self) -> u8 {
        match self {
            ByteOrder::Little => sid::SID_DUMP_ID_LE,
            ByteOrder::Big => sid::SID_DUMP_ID_BE,
        }
    }

    pub fn from_marker(marker: u8) -> Option<Self> {
        match marker {
            sid::SID_DUMP_ID_LE => Some(ByteOrder::Little),
            sid::SID_DUMP_ID_BE => Some(ByteOrder::Big),
            _ => None,
        }
    }
}
