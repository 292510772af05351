//! Host-side SLI structures snapshotted by the driver.

use tracing::debug;

use super::Channels;
use crate::device::{DriverRegion, RegionAccessor};
use crate::encode::sid::*;
use crate::error::Result;
use crate::sink::ScratchLedger;

/// I/O control block size; the ring region is an array of these.
pub const IOCB_SIZE: usize = 32;

/// Words of SLIM echoed to the text channel on fault dumps.
pub const SLIM_TEXT_WORDS: usize = 0x40;

pub fn descriptor(region: DriverRegion) -> RegionDescriptor {
    let (id, sid, label) = match region {
        DriverRegion::SliRegs => (0, SID_SLI_REGS, LEGEND_SLI_REGS),
        DriverRegion::Slim => (1, SID_SLIM, LEGEND_SLIM),
        DriverRegion::Pcb => (2, SID_PCB, LEGEND_PCB),
        DriverRegion::Mailbox => (3, SID_MBX, LEGEND_MBX),
        DriverRegion::HostPointers => (4, SID_HOST_PTRS, LEGEND_HOST_PTRS),
        DriverRegion::PortPointers => (5, SID_PORT_PTRS, LEGEND_PORT_PTRS),
        DriverRegion::Rings => (6, SID_RINGS, LEGEND_RINGS),
        DriverRegion::Internal => (7, SID_INTERNAL, LEGEND_DRIVER_INTERNAL),
    };
    RegionDescriptor {
        id,
        sid,
        category: LEGEND_SLI_STRUCTURES,
        label,
        swap: true,
    }
}

pub fn collect_region(
    ch: &mut Channels<'_>,
    accessor: &dyn RegionAccessor,
    ledger: &ScratchLedger,
    region: DriverRegion,
    slim_text: bool,
) -> Result<usize> {
    let size = accessor.region(region, None)?;
    let mut buffer = ledger.alloc::<u8>(size)?;
    let len = accessor.region(region, Some(&mut buffer[..]))?.min(size);
    let data = &buffer[..len];
    let desc = descriptor(region);

    debug!("SLI region {:?}: {} bytes", region, len);

    if slim_text && region == DriverRegion::Slim {
        if let Some(text) = ch.text.as_mut() {
            let words: Vec<u32> = data
                .chunks_exact(4)
                .take(SLIM_TEXT_WORDS)
                .map(|w| u32::from_le_bytes([w[0], w[1], w[2], w[3]]))
                .collect();
            text.words(desc.category, desc.label, &words);
        }
    }

    if let Some(binary) = ch.binary.as_mut() {
        if region == DriverRegion::Rings {
            let count = (len / IOCB_SIZE).min(u16::MAX as usize) as u16;
            binary.host_struct(desc.sid, desc.category, desc.label, IOCB_SIZE as u8, count, data, desc.swap);
        } else {
            binary.host_block(desc.sid, desc.category, desc.label, data, desc.swap);
        }
    }

    Ok(len)
}
