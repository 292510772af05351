//! Non-volatile event log, for adapters that keep one behind the mailbox.

use tracing::{info, warn};

use super::Channels;
use crate::device::mailbox::{MailboxCommand, MailboxTransport, MBX_BUSY, MBX_DRVR_ERROR, MBX_NOT_SUPPORTED};
use crate::encode::sid::*;
use crate::error::{DumpError, Result};
use crate::sink::ScratchLedger;

pub const EVENT_LOG_CHUNK: u32 = 1024;

/// Size queries answered with busy before the log is given up on.
pub const STATUS_ATTEMPTS: u32 = 10;

pub const NV_LOG_NOT_INCLUDED: &str = "Non-Volatile Log Dump is not included in the DMP file";
pub const NV_LOG_INCLUDED: &str = "Non-Volatile Log Dump is included in the DMP file";

fn log_size(ch: &mut Channels<'_>, mailbox: &dyn MailboxTransport) -> Result<u32> {
    let command = MailboxCommand::ReadEventLogStatus;

    for attempt in 1..=STATUS_ATTEMPTS {
        let status = match mailbox.issue(&command) {
            Ok(reply) => return Ok(reply.count),
            Err(status) => status,
        };
        warn!("Unable to read event log status (attempt {}): status={:#x}", attempt, status);

        match status & 0xFFFF {
            MBX_NOT_SUPPORTED | MBX_DRVR_ERROR => {
                ch.note(LEGEND_NON_VOLATILE_LOG, LEGEND_NV_LOG_DRIVER_NOT_SUPPORTED, NV_LOG_NOT_INCLUDED);
                return Err(DumpError::Unsupported("non-volatile event log"));
            }
            MBX_BUSY => continue,
            _ => {
                ch.note(LEGEND_NON_VOLATILE_LOG, LEGEND_NV_LOG_STATUS_ERROR, NV_LOG_NOT_INCLUDED);
                return Err(DumpError::transport(command.name(), status));
            }
        }
    }

    ch.note(LEGEND_NON_VOLATILE_LOG, LEGEND_NV_LOG_STATUS_ERROR, NV_LOG_NOT_INCLUDED);
    Err(DumpError::transport(command.name(), MBX_BUSY))
}

/// Fetches the whole log and writes it to the binary channel as one block.
pub fn collect(ch: &mut Channels<'_>, mailbox: &dyn MailboxTransport, ledger: &ScratchLedger) -> Result<usize> {
    let size = log_size(ch, mailbox)?;
    let mut buffer = ledger.alloc::<u8>(size as usize)?;

    let mut offset = 0u32;
    while offset < size {
        let length = (size - offset).min(EVENT_LOG_CHUNK);
        let command = MailboxCommand::ReadEventLog { offset, length };
        let reply = mailbox
            .issue(&command)
            .map_err(|status| DumpError::transport(command.name(), status))?;

        let start = offset as usize;
        let take = reply.data.len().min(length as usize);
        buffer[start..start + take].copy_from_slice(&reply.data[..take]);
        offset += length;
    }

    ch.note(LEGEND_NON_VOLATILE_LOG, LEGEND_NULL, NV_LOG_INCLUDED);
    if let Some(binary) = ch.binary.as_mut() {
        binary.host_block(SID_NON_VOLATILE_LOG, LEGEND_NON_VOLATILE_LOG, LEGEND_NULL, &buffer, true);
    }

    info!("Event log captured: {} bytes", size);
    Ok(size as usize)
}
