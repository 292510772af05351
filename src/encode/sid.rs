//! Record identifiers and legend strings shared with the offline parser.
//!
//! Values here are part of the artifact format; changing one breaks existing
//! tooling.

pub const SID_NULL: u8 = 0x00;
pub const SID_LEGEND: u8 = 0x01;
pub const SID_DUMP_ID_LE: u8 = 0x02;
pub const SID_DUMP_ID_BE: u8 = 0x03;
pub const SID_DUMP_TERM: u8 = 0x04;

pub const SID_REV_INFO: u8 = 0x10;
pub const SID_HBA_INFO: u8 = 0x11;
pub const SID_DP_TABLE: u8 = 0x12;
pub const SID_CONFIG_REGION: u8 = 0x13;
pub const SID_NON_VOLATILE_LOG: u8 = 0x14;

pub const SID_SLI_REGS: u8 = 0x15;
pub const SID_SLIM: u8 = 0x16;
pub const SID_PCB: u8 = 0x17;
pub const SID_MBX: u8 = 0x18;
pub const SID_HOST_PTRS: u8 = 0x19;
pub const SID_PORT_PTRS: u8 = 0x1A;
pub const SID_RINGS: u8 = 0x1B;
pub const SID_INTERNAL: u8 = 0x1C;

// Dump table tags, as found in the top byte of an entry's first word.
pub const SID_TABLE_ID01: u8 = 0xC1;
pub const SID_TABLE_ID02: u8 = 0xC2;
pub const SID_TABLE_ID03: u8 = 0xC3;
pub const SID_TABLE_TERM: u8 = 0xFF;

/// Set in a table entry's SID when the entry describes an array of elements.
pub const SID_MULT_ELEM: u8 = 0x20;

pub const LEGEND_NULL: &str = "";

pub const LEGEND_REV_INFO: &str = "Revision Info";
pub const LEGEND_REV_OS_VERSION: &str = "OS Version";
pub const LEGEND_REV_DRV_VERSION: &str = "Driver Version";

pub const LEGEND_HBA_INFO: &str = "HBA Info";
pub const LEGEND_HBA_MODEL: &str = "Model";
pub const LEGEND_HBA_WWN: &str = "WWN";
pub const LEGEND_HBA_SN: &str = "Serial Number";
pub const LEGEND_HBA_FW_VERSION: &str = "FW Version";
pub const LEGEND_HBA_FW_OPVERSION: &str = "Op FW Version";
pub const LEGEND_HBA_FW_SLI1VERSION: &str = "SLI-1 FW Version";
pub const LEGEND_HBA_FW_SLI2VERSION: &str = "SLI-2 FW Version";
pub const LEGEND_HBA_FW_SLI3VERSION: &str = "SLI-3 FW Version";
pub const LEGEND_HBA_FW_KERNELVERSION: &str = "Kernel FW Version";
pub const LEGEND_HBA_BB_STATE: &str = "Boot Bios State";
pub const LEGEND_HBA_BB_VERSION: &str = "Boot Bios Version";

pub const LEGEND_DP_TABLE: &str = "Driver Parameters";

pub const LEGEND_CONFIG_REGION: &str = "Config Region";
pub const LEGEND_CR4_INITIAL_LOAD: &str = "Initial Load";
pub const LEGEND_CR4_FLAGS: &str = "Flags";
pub const LEGEND_CR4_BOOT_BIOS_ID: &str = "Boot Bios ID";
pub const LEGEND_CR4_SLI1_ID: &str = "SLI1 ID";
pub const LEGEND_CR4_SLI2_ID: &str = "SLI2 ID";
pub const LEGEND_CR4_SLI3_ID: &str = "SLI3 ID";
pub const LEGEND_CR4_SLI4_ID: &str = "SLI4 ID";
pub const LEGEND_CR4_EROM_ID: &str = "Erom ID";

pub const LEGEND_SLI_STRUCTURES: &str = "SLI Structures";
pub const LEGEND_SLI_REGS: &str = "SLI Registers";
pub const LEGEND_SLIM: &str = "SLIM";
pub const LEGEND_PCB: &str = "PCB";
pub const LEGEND_MBX: &str = "Mailbox";
pub const LEGEND_HOST_PTRS: &str = "Host Pointers";
pub const LEGEND_PORT_PTRS: &str = "Port Pointers";
pub const LEGEND_RINGS: &str = "Rings";
pub const LEGEND_DRIVER_INTERNAL: &str = "Driver Internals";

pub const LEGEND_HBA_MEM_DUMP: &str = "HBA Memory Dump";
pub const LEGEND_HBA_MEM_DUMP_TABLE: &str = "Dump Table";

pub const LEGEND_NON_VOLATILE_LOG: &str = "Non-Volatile Log";
pub const LEGEND_NV_LOG_DRIVER_NOT_SUPPORTED: &str = "Not Supported";
pub const LEGEND_NV_LOG_STATUS_ERROR: &str = "Status Error";

pub const LEGEND_COPROC_LOG_CONFIG: &str = "Log Config";
pub const LEGEND_COPROC_LOG_PANIC_REGS: &str = "\n\nPanic Log Registers\n";
pub const LEGEND_COPROC_LOG_PANIC_LOGS: &str = "\n\nPanic Log Entries\n";

/// Config region legends are "Region 0" .. "Region 32".
pub fn config_region_label(region: u8) -> String {
    format!("Region {}", region)
}

/// Identifies one collector's output in both channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionDescriptor {
    pub id: u32,
    pub sid: u8,
    pub category: &'static str,
    pub label: &'static str,
    /// Payload is device-native (little-endian words) and follows the
    /// artifact's byte order when written.
    pub swap: bool,
}
