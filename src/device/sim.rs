//! In-process adapter used by the demo binary and the test suite.
//!
//! Adapter memory is a sparse word map; unmapped words read as zero. Every
//! collaborator call is appended to a call log so tests can assert on the
//! exact command sequence a session produced.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use super::coproc::{
    CoprocCommand, CoprocOpcode, CoprocReply, CoprocessorTransport, LOG_DESCRIPTOR_LEN,
    LOG_NAME_LEN, MAINTENANCE_MODE_ENABLE, PANIC_GP_REGS,
};
use super::mailbox::{MailboxCommand, MailboxReply, MailboxTransport, MBX_BUSY, MBX_NOT_SUPPORTED};
use super::{DeviceMode, DriverParam, DriverRegion, HbaIdentity, ModeControl, RegionAccessor};
use crate::error::{DumpError, Result};

/// Status the simulator reports for an injected command failure.
pub const SIM_FAULT_STATUS: u32 = 0x00F0;

/// One recorded collaborator call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimCall {
    Mailbox(MailboxCommand),
    Region { region: DriverRegion, probe: bool },
    Coproc(CoprocCommand),
    ShowMode,
    SetMode(DeviceMode),
}

#[derive(Debug, Clone, Default)]
pub struct SimRingLog {
    pub name: String,
    pub entry_size: u32,
    pub num_entries: u32,
    pub head: u32,
    pub entries: Vec<String>,
}

impl SimRingLog {
    fn data(&self) -> Vec<u8> {
        let size = self.entry_size as usize;
        let mut data = vec![0u8; size * self.num_entries as usize];
        for (i, text) in self.entries.iter().enumerate().take(self.num_entries as usize) {
            let bytes = text.as_bytes();
            // keep one byte for the terminator
            let len = bytes.len().min(size.saturating_sub(1));
            data[i * size..i * size + len].copy_from_slice(&bytes[..len]);
        }
        data
    }
}

#[derive(Debug, Clone, Default)]
pub struct SimPanicLog {
    pub kind: u32,
    pub epc: u32,
    pub cause: u32,
    pub status: u32,
    pub gp: [u32; PANIC_GP_REGS],
    pub log: SimRingLog,
}

#[derive(Debug, Default)]
struct SimState {
    memory: BTreeMap<u32, u32>,
    failing: HashSet<u32>,
    config_regions: HashMap<u8, Vec<u8>>,
    failing_config: HashSet<u8>,
    driver_regions: HashMap<DriverRegion, Vec<u8>>,
    mode: Option<DeviceMode>,
    mode_history: Vec<DeviceMode>,
    event_log: Option<Vec<u8>>,
    event_log_busy: u32,
    event_log_status: Option<u32>,
    ring_logs: Vec<SimRingLog>,
    panic_log: Option<SimPanicLog>,
    coproc_present: bool,
    coproc_failing: HashSet<u32>,
    maintenance: bool,
    read_delay: Option<Duration>,
    calls: Vec<SimCall>,
}

#[derive(Debug, Default)]
pub struct SimulatedHba {
    state: Mutex<SimState>,
}

fn push_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn opcode_key(opcode: CoprocOpcode) -> u32 {
    match opcode {
        CoprocOpcode::SetMode => 0,
        CoprocOpcode::Reset => 1,
        CoprocOpcode::GetConfig => 2,
        CoprocOpcode::GetLogConfig => 3,
        CoprocOpcode::GetLogData => 4,
        CoprocOpcode::GetPanicLog => 5,
    }
}

impl SimulatedHba {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn state_mut(&mut self) -> &mut SimState {
        self.state.get_mut().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // ---- builders ----

    pub fn with_word(mut self, address: u32, value: u32) -> Self {
        self.state_mut().memory.insert(address, value);
        self
    }

    pub fn with_words(mut self, address: u32, words: &[u32]) -> Self {
        let memory = &mut self.state_mut().memory;
        for (i, word) in words.iter().enumerate() {
            memory.insert(address + 4 * i as u32, *word);
        }
        self
    }

    /// Places `words` at `table_address` and points the bootstrap word at it.
    pub fn with_dump_table(self, table_address: u32, words: &[u32]) -> Self {
        self.with_word(crate::walker::BOOTSTRAP_ADDRESS, table_address)
            .with_words(table_address, words)
    }

    /// Device memory filled from little-endian bytes.
    pub fn with_bytes(self, address: u32, bytes: &[u8]) -> Self {
        let words: Vec<u32> = bytes
            .chunks(4)
            .map(|c| {
                let mut w = [0u8; 4];
                w[..c.len()].copy_from_slice(c);
                u32::from_le_bytes(w)
            })
            .collect();
        self.with_words(address, &words)
    }

    /// Any memory read touching `address` fails.
    pub fn with_failing_address(mut self, address: u32) -> Self {
        self.state_mut().failing.insert(address);
        self
    }

    pub fn with_config_region(mut self, region: u8, data: Vec<u8>) -> Self {
        self.state_mut().config_regions.insert(region, data);
        self
    }

    pub fn with_failing_config_region(mut self, region: u8) -> Self {
        self.state_mut().failing_config.insert(region);
        self
    }

    pub fn with_driver_region(mut self, region: DriverRegion, data: Vec<u8>) -> Self {
        self.state_mut().driver_regions.insert(region, data);
        self
    }

    pub fn with_mode(mut self, mode: DeviceMode) -> Self {
        self.state_mut().mode = Some(mode);
        self
    }

    pub fn with_event_log(mut self, data: Vec<u8>) -> Self {
        self.state_mut().event_log = Some(data);
        self
    }

    /// The size query reports busy this many times before succeeding.
    pub fn with_event_log_busy(mut self, count: u32) -> Self {
        self.state_mut().event_log_busy = count;
        self
    }

    /// The size query always fails with `status`.
    pub fn with_event_log_status(mut self, status: u32) -> Self {
        self.state_mut().event_log_status = Some(status);
        self
    }

    pub fn with_ring_log(mut self, log: SimRingLog) -> Self {
        let state = self.state_mut();
        state.coproc_present = true;
        state.ring_logs.push(log);
        self
    }

    pub fn with_panic_log(mut self, panic: SimPanicLog) -> Self {
        let state = self.state_mut();
        state.coproc_present = true;
        state.panic_log = Some(panic);
        self
    }

    pub fn with_failing_coproc(mut self, opcode: CoprocOpcode) -> Self {
        self.state_mut().coproc_failing.insert(opcode_key(opcode));
        self
    }

    /// Every mailbox command sleeps this long before completing.
    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.state_mut().read_delay = Some(delay);
        self
    }

    // ---- inspection ----

    pub fn calls(&self) -> Vec<SimCall> {
        self.state().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    /// `(address, word_count)` of every memory dump command, in order.
    pub fn memory_reads(&self) -> Vec<(u32, u32)> {
        self.state()
            .calls
            .iter()
            .filter_map(|call| match call {
                SimCall::Mailbox(MailboxCommand::DumpMemory { address, word_count }) => {
                    Some((*address, *word_count))
                }
                _ => None,
            })
            .collect()
    }

    pub fn mode_history(&self) -> Vec<DeviceMode> {
        self.state().mode_history.clone()
    }

    pub fn current_mode(&self) -> DeviceMode {
        self.state().mode.unwrap_or(DeviceMode::Online)
    }

    pub fn maintenance_mode(&self) -> bool {
        self.state().maintenance
    }

    // ---- command handlers ----

    fn dump_memory(state: &SimState, address: u32, word_count: u32) -> std::result::Result<MailboxReply, u32> {
        let mut data = Vec::with_capacity(word_count as usize * 4);
        for i in 0..word_count {
            let at = address.wrapping_add(4 * i);
            if state.failing.contains(&at) {
                return Err(SIM_FAULT_STATUS);
            }
            push_u32(&mut data, state.memory.get(&at).copied().unwrap_or(0));
        }
        Ok(MailboxReply { count: word_count, data })
    }

    fn dump_config(state: &SimState, region: u8, offset: u32, byte_count: u32) -> std::result::Result<MailboxReply, u32> {
        if state.failing_config.contains(&region) {
            return Err(SIM_FAULT_STATUS);
        }
        let Some(content) = state.config_regions.get(&region) else {
            return Ok(MailboxReply::default());
        };
        let start = (offset as usize).min(content.len());
        let end = (start + byte_count as usize).min(content.len());
        let data = content[start..end].to_vec();
        Ok(MailboxReply {
            count: data.len() as u32,
            data,
        })
    }

    fn event_log_status(state: &mut SimState) -> std::result::Result<MailboxReply, u32> {
        let Some(log) = state.event_log.as_ref() else {
            return Err(MBX_NOT_SUPPORTED);
        };
        let size = log.len() as u32;
        if state.event_log_busy > 0 {
            state.event_log_busy -= 1;
            return Err(MBX_BUSY);
        }
        if let Some(status) = state.event_log_status {
            return Err(status);
        }
        Ok(MailboxReply {
            count: size,
            data: Vec::new(),
        })
    }

    fn read_event_log(state: &SimState, offset: u32, length: u32) -> std::result::Result<MailboxReply, u32> {
        let log = state.event_log.as_ref().ok_or(MBX_NOT_SUPPORTED)?;
        let start = (offset as usize).min(log.len());
        let end = (start + length as usize).min(log.len());
        let data = log[start..end].to_vec();
        Ok(MailboxReply {
            count: data.len() as u32,
            data,
        })
    }

    fn coproc_body(state: &mut SimState, command: &CoprocCommand) -> std::result::Result<Vec<u8>, u32> {
        let mut body = Vec::new();
        match command.opcode {
            CoprocOpcode::SetMode => {
                state.maintenance = command.context == MAINTENANCE_MODE_ENABLE;
            }
            CoprocOpcode::Reset => {
                state.maintenance = false;
            }
            CoprocOpcode::GetConfig => {
                let panic_size = state
                    .panic_log
                    .as_ref()
                    .map(|p| super::coproc::PANIC_HEADER_LEN as u32 + p.log.entry_size * p.log.num_entries)
                    .unwrap_or(0);
                push_u32(&mut body, (state.ring_logs.len() * LOG_DESCRIPTOR_LEN) as u32);
                push_u32(&mut body, panic_size);
            }
            CoprocOpcode::GetLogConfig => {
                push_u32(&mut body, state.ring_logs.len() as u32);
                for (id, log) in state.ring_logs.iter().enumerate() {
                    push_u32(&mut body, id as u32);
                    push_u32(&mut body, log.num_entries);
                    push_u32(&mut body, log.entry_size);
                    let mut name = [0u8; LOG_NAME_LEN];
                    let len = log.name.len().min(LOG_NAME_LEN - 1);
                    name[..len].copy_from_slice(&log.name.as_bytes()[..len]);
                    body.extend_from_slice(&name);
                }
            }
            CoprocOpcode::GetLogData => {
                let log = state
                    .ring_logs
                    .get(command.context as usize)
                    .ok_or(MBX_NOT_SUPPORTED)?;
                push_u32(&mut body, log.head);
                body.extend_from_slice(&log.data());
            }
            CoprocOpcode::GetPanicLog => {
                let panic = state.panic_log.as_ref().ok_or(MBX_NOT_SUPPORTED)?;
                for word in [panic.kind, panic.epc, panic.cause, panic.status] {
                    push_u32(&mut body, word);
                }
                for reg in panic.gp {
                    push_u32(&mut body, reg);
                }
                push_u32(&mut body, u32::from(!panic.log.entries.is_empty()));
                push_u32(&mut body, panic.log.num_entries);
                push_u32(&mut body, panic.log.entry_size);
                push_u32(&mut body, panic.log.head);
                body.extend_from_slice(&panic.log.data());
            }
        }
        body.truncate(command.length as usize);
        Ok(body)
    }
}

impl MailboxTransport for SimulatedHba {
    fn issue(&self, command: &MailboxCommand) -> std::result::Result<MailboxReply, u32> {
        let delay = {
            let mut state = self.state();
            state.calls.push(SimCall::Mailbox(*command));
            state.read_delay
        };
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }

        let mut state = self.state();
        match *command {
            MailboxCommand::DumpMemory { address, word_count } => {
                Self::dump_memory(&state, address, word_count)
            }
            MailboxCommand::DumpConfig { region, offset, byte_count } => {
                Self::dump_config(&state, region, offset, byte_count)
            }
            MailboxCommand::ReadEventLogStatus => Self::event_log_status(&mut state),
            MailboxCommand::ReadEventLog { offset, length } => {
                Self::read_event_log(&state, offset, length)
            }
        }
    }
}

impl RegionAccessor for SimulatedHba {
    fn region(&self, region: DriverRegion, buffer: Option<&mut [u8]>) -> Result<usize> {
        let mut state = self.state();
        state.calls.push(SimCall::Region {
            region,
            probe: buffer.is_none(),
        });

        let data = state
            .driver_regions
            .get(&region)
            .ok_or(DumpError::Unsupported("driver region"))?;

        if let Some(buffer) = buffer {
            let len = data.len().min(buffer.len());
            buffer[..len].copy_from_slice(&data[..len]);
        }
        Ok(data.len())
    }
}

impl CoprocessorTransport for SimulatedHba {
    fn execute(&self, command: &CoprocCommand) -> std::result::Result<CoprocReply, u32> {
        let mut state = self.state();
        state.calls.push(SimCall::Coproc(*command));

        if !state.coproc_present {
            return Err(MBX_NOT_SUPPORTED);
        }
        if state.coproc_failing.contains(&opcode_key(command.opcode)) {
            return Ok(CoprocReply {
                status: SIM_FAULT_STATUS,
                body: Vec::new(),
            });
        }

        let body = Self::coproc_body(&mut state, command)?;
        Ok(CoprocReply { status: 0, body })
    }
}

impl ModeControl for SimulatedHba {
    fn show(&self) -> Result<DeviceMode> {
        let mut state = self.state();
        state.calls.push(SimCall::ShowMode);
        Ok(state.mode.unwrap_or(DeviceMode::Online))
    }

    fn set(&self, mode: DeviceMode) -> Result<()> {
        let mut state = self.state();
        state.calls.push(SimCall::SetMode(mode));
        state.mode = Some(mode);
        state.mode_history.push(mode);
        Ok(())
    }
}

/// Identity of the demo adapter.
pub fn sample_identity() -> HbaIdentity {
    HbaIdentity {
        model: "LP11002".into(),
        description: "Dual Channel 4Gb PCI-X 2.0 Fibre Channel Adapter".into(),
        wwpn: [0x10, 0x00, 0x00, 0x00, 0xc9, 0x5a, 0x1b, 0x2c],
        wwnn: [0x20, 0x00, 0x00, 0x00, 0xc9, 0x5a, 0x1b, 0x2c],
        serial: "VM72318530".into(),
        fw_version: "2.72A2".into(),
        op_fw: "2.72A2".into(),
        sli1_fw: "2.72A2".into(),
        sli2_fw: "2.72A2".into(),
        sli3_fw: "2.72A2".into(),
        kernel_fw: "1.11A6".into(),
        boot_version: "1.70A3".into(),
        boot_state: 1,
        os_name: std::env::consts::OS.into(),
        os_release: "5.11".into(),
        driver_type: "Leadville".into(),
        driver_name: env!("CARGO_PKG_NAME").into(),
        driver_version: env!("CARGO_PKG_VERSION").into(),
        params: vec![
            DriverParam {
                name: "console-notices".into(),
                low: 0,
                high: 0xffff_ffff,
                default: 0,
                current: 0,
                hidden: false,
                dynamic: true,
            },
            DriverParam {
                name: "link-speed".into(),
                low: 0,
                high: 8,
                default: 0,
                current: 4,
                hidden: false,
                dynamic: false,
            },
            DriverParam {
                name: "num-iocbs".into(),
                low: 128,
                high: 10240,
                default: 1024,
                current: 1024,
                hidden: true,
                dynamic: false,
            },
        ],
    }
}
