//! Co-processor command set and response layouts.
//!
//! Responses are little-endian. The status code travels separately from the
//! body, so every layout below starts at the first byte after the status word.

use crate::error::{DumpError, Result};

pub const MAINTENANCE_MODE_ENABLE: u32 = 1;
pub const MAINTENANCE_MODE_DISABLE: u32 = 0;
pub const FW_OPERATIONAL: u32 = 1;

pub const LOG_NAME_LEN: usize = 16;
pub const LOG_DESCRIPTOR_LEN: usize = 12 + LOG_NAME_LEN;
pub const PANIC_GP_REGS: usize = 32;
/// type, epc, cause, status, gp regs, present, entries, entry size, head
pub const PANIC_HEADER_LEN: usize = 4 * (4 + PANIC_GP_REGS + 4);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoprocOpcode {
    SetMode,
    Reset,
    GetConfig,
    GetLogConfig,
    GetLogData,
    GetPanicLog,
}

impl CoprocOpcode {
    pub fn name(self) -> &'static str {
        match self {
            CoprocOpcode::SetMode => "SET_MODE",
            CoprocOpcode::Reset => "RESET",
            CoprocOpcode::GetConfig => "GET_CONFIG",
            CoprocOpcode::GetLogConfig => "GET_LOG_CONFIG",
            CoprocOpcode::GetLogData => "GET_LOG_DATA",
            CoprocOpcode::GetPanicLog => "GET_PANIC_LOG",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoprocCommand {
    pub opcode: CoprocOpcode,
    /// Mode value, firmware selector or log id depending on the opcode.
    pub context: u32,
    /// Response body length the caller is prepared to receive.
    pub length: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoprocReply {
    pub status: u32,
    pub body: Vec<u8>,
}

/// Auxiliary processor command channel. `Err` means the command never
/// completed; a completed command with a non-zero `status` is a refusal.
pub trait CoprocessorTransport: Send + Sync {
    fn execute(&self, command: &CoprocCommand) -> std::result::Result<CoprocReply, u32>;
}

/// Issues `command` and insists on a zero status.
pub fn execute(coproc: &dyn CoprocessorTransport, command: CoprocCommand) -> Result<Vec<u8>> {
    let name = command.opcode.name();
    let reply = coproc
        .execute(&command)
        .map_err(|status| DumpError::transport(name, status))?;
    if reply.status != 0 {
        return Err(DumpError::transport(name, reply.status));
    }
    Ok(reply.body)
}

fn word(body: &[u8], index: usize) -> Result<u32> {
    let start = index * 4;
    body.get(start..start + 4)
        .map(|w| u32::from_le_bytes([w[0], w[1], w[2], w[3]]))
        .ok_or_else(|| DumpError::ProtocolViolation(format!("response truncated at word {}", index)))
}

/// Reads a NUL-terminated string out of a fixed-size slot.
pub fn c_string(slot: &[u8]) -> String {
    let end = slot.iter().position(|&b| b == 0).unwrap_or(slot.len());
    String::from_utf8_lossy(&slot[..end]).into_owned()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoprocConfig {
    pub log_config_size: u32,
    pub panic_log_size: u32,
}

impl CoprocConfig {
    pub const LEN: u32 = 8;

    pub fn parse(body: &[u8]) -> Result<Self> {
        Ok(Self {
            log_config_size: word(body, 0)?,
            panic_log_size: word(body, 1)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogDescriptor {
    pub id: u32,
    pub num_entries: u32,
    pub entry_size: u32,
    pub name: String,
}

impl LogDescriptor {
    /// Body length of a GET_LOG_DATA reply, head word included.
    pub fn reply_len(&self) -> Result<u32> {
        self.num_entries
            .checked_mul(self.entry_size)
            .and_then(|len| len.checked_add(4))
            .ok_or_else(|| {
                DumpError::ProtocolViolation(format!(
                    "log {} size overflows: {} entries of {} bytes",
                    self.id, self.num_entries, self.entry_size
                ))
            })
    }

    /// `[num_logs:4]` then one 28-byte descriptor per log.
    pub fn parse_table(body: &[u8]) -> Result<Vec<Self>> {
        let count = word(body, 0)? as usize;
        let mut logs = Vec::with_capacity(count.min(64));

        for i in 0..count {
            let start = 4 + i * LOG_DESCRIPTOR_LEN;
            let slot = body.get(start..start + LOG_DESCRIPTOR_LEN).ok_or_else(|| {
                DumpError::ProtocolViolation(format!("log config truncated at entry {}", i))
            })?;
            logs.push(Self {
                id: word(slot, 0)?,
                num_entries: word(slot, 1)?,
                entry_size: word(slot, 2)?,
                name: c_string(&slot[12..]),
            });
        }

        Ok(logs)
    }
}

/// A circular log of fixed-size string entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RingLog<'a> {
    pub head: u32,
    pub entry_size: usize,
    pub num_entries: usize,
    pub data: &'a [u8],
}

impl<'a> RingLog<'a> {
    /// Checks the reported geometry against the bytes actually received.
    pub fn new(head: u32, entry_size: u32, num_entries: u32, data: &'a [u8]) -> Result<Self> {
        let entry_size = entry_size as usize;
        let num_entries = num_entries as usize;
        if num_entries > 0 && entry_size == 0 {
            return Err(DumpError::ProtocolViolation(format!(
                "{} log entries of zero size",
                num_entries
            )));
        }
        match num_entries.checked_mul(entry_size) {
            Some(len) if len <= data.len() => Ok(Self {
                head,
                entry_size,
                num_entries,
                data: &data[..len],
            }),
            _ => Err(DumpError::ProtocolViolation(format!(
                "{} log entries of {} bytes exceed the {} bytes returned",
                num_entries,
                entry_size,
                data.len()
            ))),
        }
    }

    /// `[head:4][entries]`
    pub fn parse(body: &'a [u8], descriptor: &LogDescriptor) -> Result<Self> {
        let head = word(body, 0)?;
        Self::new(head, descriptor.entry_size, descriptor.num_entries, &body[4..])
    }

    pub fn entry(&self, index: usize) -> String {
        let start = index * self.entry_size;
        let end = (start + self.entry_size).min(self.data.len());
        self.data.get(start..end).map(c_string).unwrap_or_default()
    }

    /// Entries in chronological order, tagged with their slot index.
    ///
    /// A non-empty head slot means the writer has lapped the buffer, so the
    /// oldest entries run from the head to the end before wrapping to the top.
    pub fn ordered(&self) -> Vec<(usize, String)> {
        let head = (self.head as usize).min(self.num_entries);
        let mut entries = Vec::new();

        if !self.entry(head).is_empty() {
            for j in head..self.num_entries {
                entries.push((j, self.entry(j)));
            }
        }
        for j in 0..head {
            entries.push((j, self.entry(j)));
        }

        entries
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanicLog<'a> {
    pub kind: u32,
    pub epc: u32,
    pub cp0_cause: u32,
    pub cp0_status: u32,
    pub gp: [u32; PANIC_GP_REGS],
    pub log_present: u32,
    pub ring: RingLog<'a>,
}

impl<'a> PanicLog<'a> {
    pub fn parse(body: &'a [u8]) -> Result<Self> {
        let mut gp = [0u32; PANIC_GP_REGS];
        for (i, reg) in gp.iter_mut().enumerate() {
            *reg = word(body, 4 + i)?;
        }

        let base = 4 + PANIC_GP_REGS;
        let num_entries = word(body, base + 1)?;
        let entry_size = word(body, base + 2)?;
        let head = word(body, base + 3)?;

        Ok(Self {
            kind: word(body, 0)?,
            epc: word(body, 1)?,
            cp0_cause: word(body, 2)?,
            cp0_status: word(body, 3)?,
            gp,
            log_present: word(body, base)?,
            ring: RingLog::new(head, entry_size, num_entries, &body[PANIC_HEADER_LEN..])?,
        })
    }
}
