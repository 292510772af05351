//! Non-volatile configuration regions.

use std::fmt::Write;
use tracing::{debug, warn};

use super::Channels;
use crate::device::coproc::c_string;
use crate::device::mailbox::{MailboxCommand, MailboxTransport, CONFIG_BYTES_MAX};
use crate::encode::sid::*;
use crate::error::{DumpError, Result};
use crate::sink::{Scratch, ScratchLedger};

pub const REGION_COUNT: u8 = 33;
pub const MAX_REGION_BYTES: usize = 4096;

pub const WAKE_UP_REGION: u8 = 4;
pub const VPD_REGION: u8 = 14;

pub const VPD_TAG_NAME: u8 = 0x82;
pub const VPD_TAG_READ_ONLY: u8 = 0x90;

/// Regions holding little-endian device words rather than byte strings.
pub fn region_swaps(region: u8) -> bool {
    matches!(region, 8..=10)
}

/// Reads up to `MAX_REGION_BYTES` of `region` in mailbox-sized pieces.
/// Returns the buffer and the number of valid bytes in it.
pub fn read_region(
    mailbox: &dyn MailboxTransport,
    ledger: &ScratchLedger,
    region: u8,
) -> Result<(Scratch<u8>, usize)> {
    let mut buffer = ledger.alloc::<u8>(MAX_REGION_BYTES)?;
    let mut offset = 0usize;

    while offset < buffer.len() {
        let requested = (buffer.len() - offset).min(CONFIG_BYTES_MAX as usize);
        let command = MailboxCommand::DumpConfig {
            region,
            offset: offset as u32,
            byte_count: requested as u32,
        };
        let reply = mailbox
            .issue(&command)
            .map_err(|status| DumpError::transport(command.name(), status))?;

        let mut count = reply.count as usize;
        if count == 0 {
            break;
        }
        if count > requested {
            warn!("Config region {} returned {} > {} bytes", region, count, requested);
            count = requested;
        }
        let count = count.min(reply.data.len());
        if count == 0 {
            break;
        }

        buffer[offset..offset + count].copy_from_slice(&reply.data[..count]);
        offset += count;
    }

    Ok((buffer, offset))
}

/// Eight words per line, each followed by a comma.
pub fn format_words(bytes: &[u8]) -> String {
    let mut out = String::new();
    for (i, w) in bytes.chunks_exact(4).enumerate() {
        if i % 8 == 0 && i != 0 {
            out.push_str("\n ");
        }
        let word = u32::from_le_bytes([w[0], w[1], w[2], w[3]]);
        let _ = write!(out, "{:08x}, ", word);
    }
    out
}

/// Firmware and boot loader identifiers held in the wake-up region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WakeUpParams {
    pub initial_load: [u32; 2],
    pub flags: u32,
    pub boot_bios: [u32; 2],
    pub sli1: [u32; 2],
    pub sli2: [u32; 2],
    pub sli3: [u32; 2],
    pub sli4: [u32; 2],
    pub erom: [u32; 2],
}

impl WakeUpParams {
    pub const LEN: usize = 15 * 4;

    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < Self::LEN {
            return Err(DumpError::ProtocolViolation(format!(
                "wake-up parameters need {} bytes, region has {}",
                Self::LEN,
                bytes.len()
            )));
        }
        let w = |i: usize| u32::from_le_bytes([bytes[i * 4], bytes[i * 4 + 1], bytes[i * 4 + 2], bytes[i * 4 + 3]]);
        Ok(Self {
            initial_load: [w(0), w(1)],
            flags: w(2),
            boot_bios: [w(3), w(4)],
            sli1: [w(5), w(6)],
            sli2: [w(7), w(8)],
            sli3: [w(9), w(10)],
            sli4: [w(11), w(12)],
            erom: [w(13), w(14)],
        })
    }

    pub fn describe(&self) -> String {
        let mut out = format!(
            "{}: {:08x} {:08x}\n {}: {:08x}",
            LEGEND_CR4_INITIAL_LOAD, self.initial_load[0], self.initial_load[1], LEGEND_CR4_FLAGS, self.flags
        );
        for (legend, id) in [
            (LEGEND_CR4_BOOT_BIOS_ID, self.boot_bios),
            (LEGEND_CR4_SLI1_ID, self.sli1),
            (LEGEND_CR4_SLI2_ID, self.sli2),
            (LEGEND_CR4_SLI3_ID, self.sli3),
            (LEGEND_CR4_SLI4_ID, self.sli4),
            (LEGEND_CR4_EROM_ID, self.erom),
        ] {
            let _ = write!(out, "\n {}: {:08x} {:08x}", legend, id[0], id[1]);
        }
        out
    }
}

fn vpd_slice(data: &[u8], start: usize, len: usize) -> Result<&[u8]> {
    data.get(start..start + len)
        .ok_or_else(|| DumpError::ProtocolViolation(format!("VPD field at {} overruns region", start)))
}

/// Decodes the VPD block: a name record followed by read-only keyword records.
pub fn decode_vpd(data: &[u8]) -> Result<String> {
    if data.first().copied() != Some(VPD_TAG_NAME) {
        let w0 = data
            .get(..4)
            .map(|w| u32::from_le_bytes([w[0], w[1], w[2], w[3]]))
            .unwrap_or(0);
        return Ok(format!("Bad VPD Data: (w0=0x{:08x})", w0));
    }

    let mut out = String::new();
    let mut i = 0usize;

    while i < data.len() {
        // Word padding after the last record is too short for a header.
        if data.len() - i < 3 {
            debug!("Ignoring {} trailing VPD bytes", data.len() - i);
            break;
        }
        let header = vpd_slice(data, i, 3)?;
        let tag = header[0];
        let length = u16::from_le_bytes([header[1], header[2]]) as usize;
        i += 3;

        match tag {
            VPD_TAG_NAME => {
                out.push_str("Name: ");
                out.push_str(&c_string(vpd_slice(data, i, length)?));
                i += length;
            }
            VPD_TAG_READ_ONLY => {
                loop {
                    let mnemonic = vpd_slice(data, i, 2)?;
                    if mnemonic == b"RV" || mnemonic[0] == 0 {
                        return Ok(out);
                    }
                    let name = String::from_utf8_lossy(mnemonic).into_owned();
                    i += 2;
                    let len = vpd_slice(data, i, 1)?[0] as usize;
                    i += 1;
                    let _ = write!(out, "\n {}: {}", name, c_string(vpd_slice(data, i, len)?));
                    i += len;
                }
            }
            other => {
                debug!("Skipping VPD tag {:#04x} ({} bytes)", other, length);
                i += length;
            }
        }
    }

    Ok(out)
}

/// Captures one region: a word listing and a host block, plus a decoded view
/// for the regions that have one.
pub fn collect_region(
    ch: &mut Channels<'_>,
    mailbox: &dyn MailboxTransport,
    ledger: &ScratchLedger,
    region: u8,
) -> Result<usize> {
    let (buffer, len) = read_region(mailbox, ledger, region)?;
    let data = &buffer[..len];
    let label = config_region_label(region);

    ch.note(LEGEND_CONFIG_REGION, &label, &format_words(data));
    if let Some(binary) = ch.binary.as_mut() {
        binary.host_block(SID_CONFIG_REGION, LEGEND_CONFIG_REGION, &label, data, region_swaps(region));
    }

    if data.is_empty() {
        return Ok(0);
    }

    match region {
        WAKE_UP_REGION => {
            let params = WakeUpParams::parse(data)?;
            ch.note(LEGEND_CONFIG_REGION, &label, &params.describe());
        }
        VPD_REGION => {
            let vpd = decode_vpd(data)?;
            ch.note(LEGEND_CONFIG_REGION, &label, &vpd);
        }
        _ => {}
    }

    Ok(len)
}
