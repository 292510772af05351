use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::device::{DeviceMode, DriverRegion};
use crate::error::ErrorKind;
use crate::kernel::session::TriggerKind;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SessionEvent {
    SessionStarted {
        session: Uuid,
        trigger: TriggerKind,
    },

    SessionFinished {
        session: Uuid,
        trigger: TriggerKind,
        elapsed_ms: u64,
        steps_failed: u32,
    },

    StepCompleted {
        session: Uuid,
        step: StepKind,
        elapsed_ms: u64,
    },

    StepFailed {
        session: Uuid,
        step: StepKind,
        error: ErrorKind,
    },

    ModeTransition {
        session: Uuid,
        from: DeviceMode,
        to: DeviceMode,
    },

    RegionHarvested {
        session: Uuid,
        sid: u8,
        address: u32,
        byte_count: u32,
        bytes_read: u32,
    },

    TriggerRejected {
        trigger: TriggerKind,
        reason: RejectReason,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectReason {
    AlreadyActive,
    Disabled,
}

/// One unit of work in a session script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepKind {
    OpenSinks,
    ThermalBanner,
    RevInfo,
    HbaInfo,
    ParamTable,
    ConfigRegion(u8),
    EventLog,
    Mode(DeviceMode),
    SliRegion(DriverRegion),
    DumpTable,
    MemoryHarvest,
    MaintenanceOn,
    CoprocLogs,
    MaintenanceOff,
    CoprocReset,
}
