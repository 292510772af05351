use crate::error::{DumpError, Result};

/// Largest number of words one memory dump command returns.
pub const DUMP_WORDS_MAX: u32 = 0x18;

/// Largest byte count one config region command returns.
pub const CONFIG_BYTES_MAX: u32 = 208;

/// Mailbox status codes the engine reacts to.
pub const MBX_BUSY: u32 = 0x0001;
pub const MBX_NOT_SUPPORTED: u32 = 0x00FC;
pub const MBX_DRVR_ERROR: u32 = 0x00FF;

/// Command record submitted to the adapter mailbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailboxCommand {
    /// Read `word_count` words of adapter memory starting at `address`.
    DumpMemory { address: u32, word_count: u32 },
    /// Read part of a non-volatile config region.
    DumpConfig { region: u8, offset: u32, byte_count: u32 },
    /// Query the size of the non-volatile event log.
    ReadEventLogStatus,
    /// Read `length` bytes of the event log starting at `offset`.
    ReadEventLog { offset: u32, length: u32 },
}

impl MailboxCommand {
    pub fn name(&self) -> &'static str {
        match self {
            MailboxCommand::DumpMemory { .. } => "DUMP_MEMORY",
            MailboxCommand::DumpConfig { .. } => "DUMP_CONFIG",
            MailboxCommand::ReadEventLogStatus => "READ_EVENT_LOG_STATUS",
            MailboxCommand::ReadEventLog { .. } => "READ_EVENT_LOG",
        }
    }
}

/// Completed mailbox command.
///
/// `count` is what the adapter reports as transferred: words for memory dumps,
/// bytes for config and event log reads, the log size for a status query.
/// `data` holds the response bytes in device order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MailboxReply {
    pub count: u32,
    pub data: Vec<u8>,
}

impl MailboxReply {
    /// Response interpreted as little-endian device words.
    pub fn words(&self) -> Vec<u32> {
        self.data
            .chunks_exact(4)
            .map(|w| u32::from_le_bytes([w[0], w[1], w[2], w[3]]))
            .collect()
    }
}

/// Blocking command channel to the adapter. A call returns once the command
/// completed or failed; the error carries the mailbox status.
pub trait MailboxTransport: Send + Sync {
    fn issue(&self, command: &MailboxCommand) -> std::result::Result<MailboxReply, u32>;
}

/// Reads `word_count` words at `address`, returning however many the adapter
/// transferred.
pub fn read_words(mailbox: &dyn MailboxTransport, address: u32, word_count: u32) -> Result<Vec<u32>> {
    let command = MailboxCommand::DumpMemory { address, word_count };
    let reply = mailbox
        .issue(&command)
        .map_err(|status| DumpError::transport(command.name(), status))?;

    let mut words = reply.words();
    words.truncate(reply.count.min(word_count) as usize);
    Ok(words)
}

pub fn read_word(mailbox: &dyn MailboxTransport, address: u32) -> Result<u32> {
    read_words(mailbox, address, 1)?
        .first()
        .copied()
        .ok_or_else(|| DumpError::ProtocolViolation(format!("empty read at {:#010x}", address)))
}
