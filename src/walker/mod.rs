//! Self-describing adapter memory dump.
//!
//! The adapter publishes a table of memory regions at a fixed bootstrap
//! pointer. We read it in two passes (size, then store) and then replay the
//! stored copy to pull every region through the mailbox.

pub mod table;

use serde::{Deserialize, Serialize};
use std::fmt::Write;
use tracing::{debug, info, warn};

use crate::device::mailbox::{self, MailboxTransport, DUMP_WORDS_MAX};
use crate::encode::sid::{LEGEND_HBA_MEM_DUMP, LEGEND_HBA_MEM_DUMP_TABLE};
use crate::encode::{BinaryEncoder, TextEncoder};
use crate::error::{DumpError, Result};
use crate::sink::ScratchLedger;

pub use table::{DumpTable, Step, TableEntry, TableVariant, INDIRECT_FLAG, INDIRECT_MASK};

/// Adapter word holding the address of the first dump table.
pub const BOOTSTRAP_ADDRESS: u32 = 0x654;

/// Second word of a firmware entry known to describe garbage.
pub const FW_BUG_SENTINEL: u32 = 0x003E_0000;

/// Walks longer than this are treated as a runaway table.
pub const MAX_TABLE_WORDS: usize = 0x4000;

/// Behaviour on a secondary or tertiary new-table tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ChainPolicy {
    /// The tag ends the walk.
    #[default]
    Stop,
    /// The tag is skipped and the walk continues into the chained table.
    Follow,
}

/// Result of replaying one data entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestedRegion {
    pub sid: u8,
    pub address: u32,
    pub byte_count: u32,
    pub bytes_read: u32,
}

impl HarvestedRegion {
    pub fn is_partial(&self) -> bool {
        self.bytes_read < self.byte_count
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HarvestSummary {
    pub regions: Vec<HarvestedRegion>,
    /// Entries carrying the firmware bug sentinel.
    pub skipped: usize,
    /// Entries whose address or buffer could not be obtained.
    pub failed: usize,
}

impl HarvestSummary {
    pub fn bytes(&self) -> u64 {
        self.regions.iter().map(|r| r.bytes_read as u64).sum()
    }
}

pub struct TableWalker<'a> {
    mailbox: &'a dyn MailboxTransport,
    ledger: &'a ScratchLedger,
    policy: ChainPolicy,
}

impl<'a> TableWalker<'a> {
    pub fn new(mailbox: &'a dyn MailboxTransport, ledger: &'a ScratchLedger, policy: ChainPolicy) -> Self {
        Self { mailbox, ledger, policy }
    }

    pub fn table_address(&self) -> Result<u32> {
        let address = mailbox::read_word(self.mailbox, BOOTSTRAP_ADDRESS)?;
        if address == 0 {
            return Err(DumpError::ProtocolViolation("dump table address is zero".into()));
        }
        Ok(address)
    }

    /// Walks the live table, handing each entry's address and raw words to `visit`.
    /// Returns the number of words consumed, terminator included.
    fn walk<F>(&self, mut visit: F) -> Result<usize>
    where
        F: FnMut(u32, &[u32]) -> Result<()>,
    {
        let mut cursor = self.table_address()?;
        let mut consumed = 0;

        loop {
            let words = mailbox::read_words(self.mailbox, cursor, 2)?;
            let w0 = *words.first().ok_or_else(|| {
                DumpError::ProtocolViolation(format!("empty dump table read at {:#010x}", cursor))
            })?;
            let width = TableEntry::width(w0);
            if words.len() < width {
                return Err(DumpError::ProtocolViolation(format!(
                    "short dump table read at {:#010x}",
                    cursor
                )));
            }

            let entry = TableEntry::parse(&words[..width])?;
            visit(cursor, &words[..width])?;
            consumed += width;

            if consumed > MAX_TABLE_WORDS {
                return Err(DumpError::ProtocolViolation(format!(
                    "dump table exceeds {} words",
                    MAX_TABLE_WORDS
                )));
            }

            match table::step(&entry, self.policy) {
                Step::Advance(n) => cursor = cursor.wrapping_add(4 * n as u32),
                Step::Stop => break,
            }
        }

        Ok(consumed)
    }

    /// Size pass. Bytes needed to hold the table.
    pub fn size(&self) -> Result<usize> {
        let words = self.walk(|_, _| Ok(()))?;
        Ok(words * 4)
    }

    /// Store pass into a buffer of `byte_count` bytes, with one trace line per entry.
    pub fn store(&self, byte_count: usize, trace: &mut String) -> Result<DumpTable> {
        let mut table = DumpTable::allocate(self.ledger, byte_count, self.policy)?;

        self.walk(|address, words| {
            let _ = write!(trace, "\n Addr={:08x}: w0={:08x}", address, words[0]);
            if let Some(w1) = words.get(1) {
                let _ = write!(trace, ", w1={:08x}", w1);
            }
            for word in words {
                table.push(*word)?;
            }
            Ok(())
        })?;

        if table.size_in_bytes() != byte_count {
            warn!(
                "Dump table shrank between passes: {} of {} bytes",
                table.size_in_bytes(),
                byte_count
            );
        }

        Ok(table)
    }

    /// Size and store passes, writing the trace as one text record.
    pub fn read_table(&self, text: Option<&mut TextEncoder<'_>>) -> Result<DumpTable> {
        let byte_count = self.size()?;
        debug!("Dump table size: {} bytes", byte_count);

        let mut trace = String::new();
        let table = self.store(byte_count, &mut trace)?;

        if let Some(text) = text {
            text.labelled(LEGEND_HBA_MEM_DUMP, LEGEND_HBA_MEM_DUMP_TABLE, &trace);
        }
        Ok(table)
    }

    /// Replays the stored table, emitting one port record per data entry.
    ///
    /// Failures here are local to the entry: a failed chunk ends that region's
    /// read and whatever was read (zero-filled beyond) is still written.
    pub fn harvest(&self, table: &DumpTable, binary: &mut BinaryEncoder<'_>) -> Result<HarvestSummary> {
        let mut summary = HarvestSummary::default();
        let words = table.words();
        let mut at = 0;

        while at < words.len() {
            let entry = TableEntry::parse(&words[at..])?;
            let step = table::step(&entry, table.policy());

            if let Some(address) = entry.address() {
                let w1 = words[at + 1];
                if w1 == FW_BUG_SENTINEL {
                    debug!("Skipping firmware bug entry w0={:08x}", words[at]);
                    summary.skipped += 1;
                } else {
                    match self.harvest_entry(entry, address, binary) {
                        Ok(region) => summary.regions.push(region),
                        Err(e) => {
                            warn!("Dump table entry at word {} not harvested: {}", at, e);
                            summary.failed += 1;
                        }
                    }
                }
            }

            match step {
                Step::Advance(n) => at += n,
                Step::Stop => break,
            }
        }

        info!(
            "Memory harvest: {} regions, {} bytes, {} skipped, {} failed",
            summary.regions.len(),
            summary.bytes(),
            summary.skipped,
            summary.failed
        );
        Ok(summary)
    }

    fn resolve(&self, address: u32) -> Result<u32> {
        if address & INDIRECT_FLAG == 0 {
            return Ok(address);
        }
        mailbox::read_word(self.mailbox, address & INDIRECT_MASK)
    }

    fn harvest_entry(&self, entry: TableEntry, address: u32, binary: &mut BinaryEncoder<'_>) -> Result<HarvestedRegion> {
        let address = self.resolve(address)?;
        let entry = entry.with_address(address);
        let byte_count = entry.byte_count();

        let mut buffer = self.ledger.alloc::<u8>(byte_count as usize)?;
        let bytes_read = self.read_region(address, &mut buffer);

        debug!(
            "Dump: addr={:08x} count={} read={}",
            address, byte_count, bytes_read
        );

        match entry {
            TableEntry::Struct {
                sid,
                element_length,
                element_count,
                ..
            } => binary.port_struct(sid, element_length, element_count, address, &buffer, true),
            TableEntry::Block { sid, byte_count, .. } => {
                binary.port_block(sid, byte_count, address, &buffer, true)
            }
            _ => {}
        }

        Ok(HarvestedRegion {
            sid: entry.sid().unwrap_or_default(),
            address,
            byte_count,
            bytes_read,
        })
    }

    /// Fills `buffer` in mailbox-sized chunks; returns the bytes actually read.
    fn read_region(&self, address: u32, buffer: &mut [u8]) -> u32 {
        let mut offset = 0usize;

        while offset < buffer.len() {
            let remaining = buffer.len() - offset;
            let word_count = (remaining.div_ceil(4) as u32).min(DUMP_WORDS_MAX);
            let at = address.wrapping_add(offset as u32);

            let words = match mailbox::read_words(self.mailbox, at, word_count) {
                Ok(words) => words,
                Err(e) => {
                    warn!("Region read failed at {:08x} ({} words): {}", at, word_count, e);
                    break;
                }
            };
            if words.is_empty() {
                break;
            }

            for word in words {
                let take = (buffer.len() - offset).min(4);
                buffer[offset..offset + take].copy_from_slice(&word.to_le_bytes()[..take]);
                offset += take;
                if offset == buffer.len() {
                    break;
                }
            }
        }

        offset as u32
    }
}
