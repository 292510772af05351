//! Co-processor ring logs and panic log, written to the vendor channel.

use std::fmt::Write;
use tracing::{info, warn};

use crate::device::coproc::{
    self, CoprocCommand, CoprocConfig, CoprocOpcode, CoprocessorTransport, LogDescriptor, PanicLog, RingLog,
    FW_OPERATIONAL, MAINTENANCE_MODE_DISABLE, MAINTENANCE_MODE_ENABLE,
};
use crate::encode::sid::{LEGEND_COPROC_LOG_CONFIG, LEGEND_COPROC_LOG_PANIC_LOGS, LEGEND_COPROC_LOG_PANIC_REGS, LEGEND_NULL};
use crate::encode::TextEncoder;
use crate::error::{DumpError, Result};

const RULE_WIDTH: usize = 75;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoprocSummary {
    pub logs: usize,
    pub entries: usize,
    pub panic_entries: usize,
}

pub fn set_maintenance(device: &dyn CoprocessorTransport, enable: bool) -> Result<()> {
    let context = if enable {
        MAINTENANCE_MODE_ENABLE
    } else {
        MAINTENANCE_MODE_DISABLE
    };
    coproc::execute(
        device,
        CoprocCommand {
            opcode: CoprocOpcode::SetMode,
            context,
            length: 0,
        },
    )?;
    Ok(())
}

/// Returns the co-processor firmware to operational mode.
pub fn reset(device: &dyn CoprocessorTransport) -> Result<()> {
    coproc::execute(
        device,
        CoprocCommand {
            opcode: CoprocOpcode::Reset,
            context: FW_OPERATIONAL,
            length: 0,
        },
    )?;
    Ok(())
}

fn rule() -> String {
    "-".repeat(RULE_WIDTH)
}

fn write_entries(vendor: &mut TextEncoder<'_>, ring: &RingLog<'_>) -> usize {
    let entries = ring.ordered();
    for (slot, text) in &entries {
        vendor.append(&format!("\n{:3}: {}", slot, text));
    }
    entries.len()
}

fn panic_registers(panic: &PanicLog<'_>) -> [String; 3] {
    let mut head = String::new();
    let _ = write!(head, "\nType         = {:x}", panic.kind);
    let _ = write!(head, "\nRegsEpc      = {:08x}", panic.epc);
    let _ = write!(head, "\nRegsCp0Cause = {:08x}", panic.cp0_cause);
    let _ = write!(head, "\nRegsCp0Stat  = {:08x}", panic.cp0_status);

    let mut gp = String::new();
    for (i, reg) in panic.gp.iter().enumerate() {
        let _ = write!(gp, "\nRegsGp[{:02x}]   = {:08x}", i, reg);
    }

    let mut tail = String::new();
    let _ = write!(tail, "\nLogPresent   = {:08x}", panic.log_present);
    let _ = write!(tail, "\nNumEntries   = {:08x}", panic.ring.num_entries);
    let _ = write!(tail, "\nEntrySize    = {}.", panic.ring.entry_size);
    let _ = write!(tail, "\nHead Entry   = {}.", panic.ring.head);

    [head, gp, tail]
}

fn collect_panic(
    vendor: &mut TextEncoder<'_>,
    device: &dyn CoprocessorTransport,
    config: &CoprocConfig,
    summary: &mut CoprocSummary,
) -> Result<()> {
    vendor.append(&format!("{}{}", LEGEND_COPROC_LOG_PANIC_REGS, rule()));
    if config.panic_log_size == 0 {
        return Ok(());
    }

    let body = coproc::execute(
        device,
        CoprocCommand {
            opcode: CoprocOpcode::GetPanicLog,
            context: 0,
            length: config.panic_log_size,
        },
    )?;
    let panic = PanicLog::parse(&body)?;

    for block in panic_registers(&panic) {
        vendor.append(&block);
    }

    vendor.append(&format!("{}{}", LEGEND_COPROC_LOG_PANIC_LOGS, rule()));
    summary.panic_entries = write_entries(vendor, &panic.ring);
    Ok(())
}

/// Log configuration, every ring log and then the panic log.
pub fn collect(vendor: &mut TextEncoder<'_>, device: &dyn CoprocessorTransport) -> Result<CoprocSummary> {
    let mut summary = CoprocSummary::default();

    let body = coproc::execute(
        device,
        CoprocCommand {
            opcode: CoprocOpcode::GetConfig,
            context: 0,
            length: CoprocConfig::LEN,
        },
    )?;
    let config = CoprocConfig::parse(&body)?;
    let log_config_len = config.log_config_size.checked_add(4).ok_or_else(|| {
        DumpError::ProtocolViolation(format!("log config size {:#x} overflows", config.log_config_size))
    })?;

    let body = coproc::execute(
        device,
        CoprocCommand {
            opcode: CoprocOpcode::GetLogConfig,
            context: 0,
            length: log_config_len,
        },
    )?;
    let logs = LogDescriptor::parse_table(&body)?;

    vendor.labelled(LEGEND_COPROC_LOG_CONFIG, LEGEND_NULL, "");
    vendor.append("LogId   Entries   Size   Name\n-----   -------   ----   ----");
    for log in &logs {
        vendor.append(&format!(
            "\n {:2}      {:4}    {:4}    {}",
            log.id, log.num_entries, log.entry_size, log.name
        ));
    }

    for (index, log) in logs.iter().enumerate() {
        let body = coproc::execute(
            device,
            CoprocCommand {
                opcode: CoprocOpcode::GetLogData,
                context: index as u32,
                length: log.reply_len()?,
            },
        )?;
        let ring = RingLog::parse(&body, log)?;

        vendor.append(&format!("\n\nLog {}: {}\n{}", index, log.name, rule()));
        summary.entries += write_entries(vendor, &ring);
        summary.logs += 1;
    }

    let panic = collect_panic(vendor, device, &config, &mut summary);
    vendor.append("\n\n");

    if let Err(e) = panic {
        warn!("Co-processor panic log unavailable: {}", e);
        return Err(e);
    }

    info!(
        "Co-processor logs captured: {} logs, {} entries, {} panic entries",
        summary.logs, summary.entries, summary.panic_entries
    );
    Ok(summary)
}
