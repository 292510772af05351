use crate::encode::sid::{SID_MULT_ELEM, SID_TABLE_ID01, SID_TABLE_ID02, SID_TABLE_ID03, SID_TABLE_TERM};
use crate::error::{DumpError, Result};
use crate::sink::{Scratch, ScratchLedger};

use super::ChainPolicy;

/// Set in an entry address when the real address has to be read from adapter memory.
pub const INDIRECT_FLAG: u32 = 0x8000_0000;
pub const INDIRECT_MASK: u32 = 0x01FF_FFFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableVariant {
    Primary,
    Secondary,
    Tertiary,
}

/// One decoded dump table entry.
///
/// Control entries occupy one word, data entries two. The tag lives in the top
/// byte of the first word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableEntry {
    NewTable(TableVariant),
    Terminator,
    Block {
        sid: u8,
        byte_count: u32,
        address: u32,
    },
    Struct {
        sid: u8,
        element_length: u8,
        element_count: u16,
        address: u32,
    },
}

impl TableEntry {
    pub fn tag(w0: u32) -> u8 {
        (w0 >> 24) as u8
    }

    /// Number of words an entry starting with `w0` occupies.
    pub fn width(w0: u32) -> usize {
        match Self::tag(w0) {
            SID_TABLE_ID01 | SID_TABLE_ID02 | SID_TABLE_ID03 | SID_TABLE_TERM => 1,
            _ => 2,
        }
    }

    pub fn parse(words: &[u32]) -> Result<Self> {
        let w0 = *words
            .first()
            .ok_or_else(|| DumpError::ProtocolViolation("empty dump table entry".into()))?;
        let sid = Self::tag(w0);

        let entry = match sid {
            SID_TABLE_ID01 => TableEntry::NewTable(TableVariant::Primary),
            SID_TABLE_ID02 => TableEntry::NewTable(TableVariant::Secondary),
            SID_TABLE_ID03 => TableEntry::NewTable(TableVariant::Tertiary),
            SID_TABLE_TERM => TableEntry::Terminator,
            _ => {
                let address = *words.get(1).ok_or_else(|| {
                    DumpError::ProtocolViolation(format!("dump table entry {:08x} missing address word", w0))
                })?;
                if sid & SID_MULT_ELEM != 0 {
                    TableEntry::Struct {
                        sid,
                        element_length: (w0 >> 16) as u8,
                        element_count: w0 as u16,
                        address,
                    }
                } else {
                    TableEntry::Block {
                        sid,
                        byte_count: w0 & 0x00FF_FFFF,
                        address,
                    }
                }
            }
        };
        Ok(entry)
    }

    pub fn encode(&self) -> Vec<u32> {
        match *self {
            TableEntry::NewTable(TableVariant::Primary) => vec![(SID_TABLE_ID01 as u32) << 24],
            TableEntry::NewTable(TableVariant::Secondary) => vec![(SID_TABLE_ID02 as u32) << 24],
            TableEntry::NewTable(TableVariant::Tertiary) => vec![(SID_TABLE_ID03 as u32) << 24],
            TableEntry::Terminator => vec![(SID_TABLE_TERM as u32) << 24],
            TableEntry::Block { sid, byte_count, address } => {
                vec![((sid as u32) << 24) | (byte_count & 0x00FF_FFFF), address]
            }
            TableEntry::Struct {
                sid,
                element_length,
                element_count,
                address,
            } => vec![
                ((sid as u32) << 24) | ((element_length as u32) << 16) | element_count as u32,
                address,
            ],
        }
    }

    /// Bytes a data entry describes. A struct count of zero means 256 elements.
    pub fn byte_count(&self) -> u32 {
        match *self {
            TableEntry::Block { byte_count, .. } => byte_count,
            TableEntry::Struct {
                element_length,
                element_count,
                ..
            } => {
                let count = if element_count == 0 { 256 } else { element_count as u32 };
                count * element_length as u32
            }
            _ => 0,
        }
    }

    pub fn address(&self) -> Option<u32> {
        match *self {
            TableEntry::Block { address, .. } | TableEntry::Struct { address, .. } => Some(address),
            _ => None,
        }
    }

    pub fn sid(&self) -> Option<u8> {
        match *self {
            TableEntry::Block { sid, .. } | TableEntry::Struct { sid, .. } => Some(sid),
            _ => None,
        }
    }

    pub fn is_indirect(&self) -> bool {
        self.address().is_some_and(|a| a & INDIRECT_FLAG != 0)
    }

    pub fn with_address(self, address: u32) -> Self {
        match self {
            TableEntry::Block { sid, byte_count, .. } => TableEntry::Block { sid, byte_count, address },
            TableEntry::Struct {
                sid,
                element_length,
                element_count,
                ..
            } => TableEntry::Struct {
                sid,
                element_length,
                element_count,
                address,
            },
            other => other,
        }
    }
}

/// What the walker does after an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Move the cursor this many words and keep going.
    Advance(usize),
    /// The entry just read was the last one.
    Stop,
}

pub fn step(entry: &TableEntry, policy: ChainPolicy) -> Step {
    match entry {
        TableEntry::NewTable(TableVariant::Primary) => Step::Advance(1),
        TableEntry::NewTable(_) => match policy {
            ChainPolicy::Follow => Step::Advance(1),
            ChainPolicy::Stop => Step::Stop,
        },
        TableEntry::Terminator => Step::Stop,
        _ => Step::Advance(2),
    }
}

/// Dump table as read from the adapter, one word per consumed table word.
pub struct DumpTable {
    words: Scratch<u32>,
    len: usize,
    policy: ChainPolicy,
}

impl DumpTable {
    pub fn allocate(ledger: &ScratchLedger, byte_count: usize, policy: ChainPolicy) -> Result<Self> {
        Ok(Self {
            words: ledger.alloc::<u32>(byte_count / 4)?,
            len: 0,
            policy,
        })
    }

    pub fn push(&mut self, word: u32) -> Result<()> {
        let slot = self.words.get_mut(self.len).ok_or_else(|| {
            DumpError::ProtocolViolation("dump table grew between size and store passes".into())
        })?;
        *slot = word;
        self.len += 1;
        Ok(())
    }

    pub fn words(&self) -> &[u32] {
        &self.words[..self.len]
    }

    pub fn size_in_bytes(&self) -> usize {
        self.len * 4
    }

    pub fn policy(&self) -> ChainPolicy {
        self.policy
    }

    /// Decodes the stored words with the same policy used to read them.
    pub fn entries(&self) -> Result<Vec<TableEntry>> {
        let words = self.words();
        let mut entries = Vec::new();
        let mut at = 0;

        while at < words.len() {
            let entry = TableEntry::parse(&words[at..])?;
            entries.push(entry);
            match step(&entry, self.policy) {
                Step::Advance(n) => at += n,
                Step::Stop => break,
            }
        }

        Ok(entries)
    }
}

impl std::fmt::Debug for DumpTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DumpTable")
            .field("words", &self.words())
            .field("policy", &self.policy)
            .finish()
    }
}
