//! Adapter-facing collaborators.
//!
//! Everything the engine needs from the hardware goes through the traits in
//! this module, so the same session code runs against a real driver or against
//! [`sim::SimulatedHba`].

pub mod coproc;
pub mod mailbox;
pub mod sim;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::error::Result;

pub use coproc::{CoprocCommand, CoprocOpcode, CoprocReply, CoprocessorTransport};
pub use mailbox::{MailboxCommand, MailboxReply, MailboxTransport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceMode {
    Online,
    Offline,
    WarmStart,
}

impl fmt::Display for DeviceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeviceMode::Online => "online",
            DeviceMode::Offline => "offline",
            DeviceMode::WarmStart => "warm-start",
        };
        f.write_str(name)
    }
}

/// Port state primitive. `show` never changes the mode.
pub trait ModeControl: Send + Sync {
    fn show(&self) -> Result<DeviceMode>;
    fn set(&self, mode: DeviceMode) -> Result<()>;
}

/// Host-side structures the driver can snapshot on request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DriverRegion {
    SliRegs,
    Slim,
    Pcb,
    Mailbox,
    HostPointers,
    PortPointers,
    Rings,
    Internal,
}

impl DriverRegion {
    pub const ALL: [DriverRegion; 8] = [
        DriverRegion::SliRegs,
        DriverRegion::Slim,
        DriverRegion::Pcb,
        DriverRegion::Mailbox,
        DriverRegion::HostPointers,
        DriverRegion::PortPointers,
        DriverRegion::Rings,
        DriverRegion::Internal,
    ];
}

/// Two-call region accessor: `None` asks for the size, `Some(buf)` fills the
/// buffer. Both return the region length in bytes.
pub trait RegionAccessor: Send + Sync {
    fn region(&self, region: DriverRegion, buffer: Option<&mut [u8]>) -> Result<usize>;
}

/// Which vendor log family the adapter carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ChipFamily {
    #[default]
    Standard,
    /// Single non-volatile event log read through the mailbox.
    EventLog,
    /// Auxiliary processor with named ring logs and a panic log.
    Coprocessor,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverParam {
    pub name: String,
    pub low: u32,
    pub high: u32,
    pub default: u32,
    pub current: u32,
    pub hidden: bool,
    pub dynamic: bool,
}

/// Static facts about the adapter and its host, captured at attach time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HbaIdentity {
    pub model: String,
    pub description: String,
    pub wwpn: [u8; 8],
    pub wwnn: [u8; 8],
    pub serial: String,
    pub fw_version: String,
    pub op_fw: String,
    pub sli1_fw: String,
    pub sli2_fw: String,
    pub sli3_fw: String,
    pub kernel_fw: String,
    pub boot_version: String,
    /// Reported boot code state when a boot image is present.
    pub boot_state: u32,
    pub os_name: String,
    pub os_release: String,
    pub driver_type: String,
    pub driver_name: String,
    pub driver_version: String,
    pub params: Vec<DriverParam>,
}

/// One attached adapter: its collaborators plus what we know about it.
#[derive(Clone)]
pub struct Hba {
    pub mailbox: Arc<dyn MailboxTransport>,
    pub regions: Arc<dyn RegionAccessor>,
    pub coproc: Arc<dyn CoprocessorTransport>,
    pub mode: Arc<dyn ModeControl>,
    pub identity: HbaIdentity,
    pub chip: ChipFamily,
}

impl Hba {
    /// Wires every collaborator to the same object.
    pub fn from_device<D>(device: Arc<D>, identity: HbaIdentity, chip: ChipFamily) -> Self
    where
        D: MailboxTransport + RegionAccessor + CoprocessorTransport + ModeControl + 'static,
    {
        Self {
            mailbox: device.clone(),
            regions: device.clone(),
            coproc: device.clone(),
            mode: device,
            identity,
            chip,
        }
    }
}

impl fmt::Debug for Hba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hba")
            .field("model", &self.identity.model)
            .field("chip", &self.chip)
            .finish_non_exhaustive()
    }
}
