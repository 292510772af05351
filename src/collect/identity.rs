use serde::{Deserialize, Serialize};
use std::fmt::Write;

use super::Channels;
use crate::device::HbaIdentity;
use crate::encode::sid::*;

/// Boot code state reported when no boot image is installed.
pub const BOOT_BIOS_NOT_PRESENT: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThermalKind {
    Critical,
    Threshold,
    Normal,
    Unknown(u32),
}

impl ThermalKind {
    pub fn code(self) -> u32 {
        match self {
            ThermalKind::Critical => 1,
            ThermalKind::Threshold => 2,
            ThermalKind::Normal => 3,
            ThermalKind::Unknown(code) => code,
        }
    }

    pub fn from_code(code: u32) -> Self {
        match code {
            1 => ThermalKind::Critical,
            2 => ThermalKind::Threshold,
            3 => ThermalKind::Normal,
            other => ThermalKind::Unknown(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThermalEvent {
    pub kind: ThermalKind,
    pub temperature: u32,
}

pub fn thermal_banner(event: &ThermalEvent) -> String {
    let code = event.kind.code();
    let kind = match event.kind {
        ThermalKind::Critical => format!(" Event Type  = {} (Critical)\n", code),
        ThermalKind::Threshold => format!(" Event Type  = {} (Threshold)\n", code),
        ThermalKind::Normal => format!(" Event Type  = {} (Normal)\n", code),
        ThermalKind::Unknown(_) => format!(" Unknown Event Type  = {}\n", code),
    };
    format!(
        "WARNING: HBA Temperature Event:\n{} Temperature = {}\n\n",
        kind, event.temperature
    )
}

pub fn rev_info(ch: &mut Channels<'_>, identity: &HbaIdentity) {
    let os = format!("{}, {}", identity.os_name, identity.os_release);
    ch.string(SID_REV_INFO, LEGEND_REV_INFO, LEGEND_REV_OS_VERSION, &os);

    let driver = format!(
        "Driver Type: {}\n Driver Name: {}\n Driver Version: {}",
        identity.driver_type, identity.driver_name, identity.driver_version
    );
    ch.string(SID_REV_INFO, LEGEND_REV_INFO, LEGEND_REV_DRV_VERSION, &driver);
}

pub fn format_wwn(wwn: &[u8; 8]) -> String {
    wwn.iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(":")
}

/// Boot state and version text, honouring the "none" convention.
pub fn boot_info(identity: &HbaIdentity) -> (u32, String) {
    if identity.boot_version == "none" {
        (BOOT_BIOS_NOT_PRESENT, "unknown".to_string())
    } else {
        (identity.boot_state, identity.boot_version.clone())
    }
}

pub fn hba_info(ch: &mut Channels<'_>, identity: &HbaIdentity) {
    let model = format!(
        "Model: {}\n Description: {}",
        identity.model, identity.description
    );
    ch.string(SID_HBA_INFO, LEGEND_HBA_INFO, LEGEND_HBA_MODEL, &model);

    let wwn = format!(
        "Port WWN: {}\n Node WWN: {}",
        format_wwn(&identity.wwpn),
        format_wwn(&identity.wwnn)
    );
    ch.string(SID_HBA_INFO, LEGEND_HBA_INFO, LEGEND_HBA_WWN, &wwn);

    let serial = format!("{}: {}", LEGEND_HBA_SN, identity.serial);
    ch.string(SID_HBA_INFO, LEGEND_HBA_INFO, LEGEND_HBA_SN, &serial);

    let mut fw = format!("{}: {}", LEGEND_HBA_FW_VERSION, identity.fw_version);
    for (legend, value) in [
        (LEGEND_HBA_FW_OPVERSION, &identity.op_fw),
        (LEGEND_HBA_FW_SLI1VERSION, &identity.sli1_fw),
        (LEGEND_HBA_FW_SLI2VERSION, &identity.sli2_fw),
        (LEGEND_HBA_FW_SLI3VERSION, &identity.sli3_fw),
        (LEGEND_HBA_FW_KERNELVERSION, &identity.kernel_fw),
    ] {
        let _ = write!(fw, "\n {}: {}", legend, value);
    }
    ch.string(SID_HBA_INFO, LEGEND_HBA_INFO, LEGEND_HBA_FW_VERSION, &fw);

    let (state, version) = boot_info(identity);
    let boot = format!(
        "{}:  {}\n {}: {}",
        LEGEND_HBA_BB_STATE, state, LEGEND_HBA_BB_VERSION, version
    );
    ch.string(SID_HBA_INFO, LEGEND_HBA_INFO, LEGEND_HBA_BB_VERSION, &boot);
}

pub fn param_table(ch: &mut Channels<'_>, identity: &HbaIdentity) {
    let mut table =
        String::from("IDX                     string      Low     High      Def      Cur  Exp  Dyn");

    for (i, p) in identity.params.iter().enumerate() {
        let _ = write!(
            table,
            "\n  {:02x}: {:>25} {:8x} {:8x} {:8x} {:8x} {:4x} {:4x}",
            i,
            p.name,
            p.low,
            p.high,
            p.default,
            p.current,
            u32::from(!p.hidden),
            u32::from(p.dynamic)
        );
    }

    ch.string(SID_DP_TABLE, LEGEND_DP_TABLE, LEGEND_NULL, &table);
}
