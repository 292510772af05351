//! One dump, start to finish.
//!
//! A session opens the channels its trigger needs, runs a fixed script of
//! collector steps and closes the channels again. Steps are best effort: a
//! failed step is logged and recorded, and the script moves on.

use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};
use uuid::Uuid;

use super::telemetry::{SessionEvent, StepKind, TelemetryRecorder};
use crate::collect::identity::{self, ThermalEvent};
use crate::collect::{config_region, coproc, event_log, sli, Channels};
use crate::config::DumpConfig;
use crate::device::{ChipFamily, DeviceMode, DriverRegion, Hba, ModeControl};
use crate::error::{DumpError, Result};
use crate::sink::{ScratchLedger, SinkKind, SinkSet};
use crate::walker::{HarvestSummary, TableWalker};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerKind {
    /// Driver detected an adapter error.
    Fault,
    /// Operator asked for a dump.
    User,
    /// Adapter reported a temperature event.
    Thermal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DumpRequest {
    Fault,
    User,
    Thermal(ThermalEvent),
}

impl DumpRequest {
    pub fn kind(&self) -> TriggerKind {
        match self {
            DumpRequest::Fault => TriggerKind::Fault,
            DumpRequest::User => TriggerKind::User,
            DumpRequest::Thermal(_) => TriggerKind::Thermal,
        }
    }
}

/// Channels a trigger writes to.
pub fn channels_for(kind: TriggerKind, chip: ChipFamily) -> Vec<SinkKind> {
    match kind {
        TriggerKind::Thermal => vec![SinkKind::Text],
        TriggerKind::Fault | TriggerKind::User => {
            let mut kinds = vec![SinkKind::Text, SinkKind::Binary];
            if chip == ChipFamily::Coprocessor {
                kinds.push(SinkKind::VendorLog);
            }
            kinds
        }
    }
}

/// What a finished session did.
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub id: Uuid,
    pub trigger: TriggerKind,
    pub steps_completed: u32,
    pub failures: Vec<(StepKind, String)>,
    pub harvest: Option<HarvestSummary>,
    pub elapsed: Duration,
}

/// Brings the port to `target` unless it is already there. Returns the mode it
/// left, if it had to move.
pub fn ensure_mode(mode: &dyn ModeControl, target: DeviceMode) -> Result<Option<DeviceMode>> {
    let current = mode.show()?;
    if current == target {
        return Ok(None);
    }
    mode.set(target)?;
    Ok(Some(current))
}

pub struct Session<'a> {
    id: Uuid,
    request: DumpRequest,
    hba: &'a Hba,
    config: &'a DumpConfig,
    ledger: &'a ScratchLedger,
    telemetry: &'a Mutex<TelemetryRecorder>,
    steps_completed: u32,
    failures: Vec<(StepKind, String)>,
}

impl<'a> Session<'a> {
    pub fn new(
        request: DumpRequest,
        hba: &'a Hba,
        config: &'a DumpConfig,
        ledger: &'a ScratchLedger,
        telemetry: &'a Mutex<TelemetryRecorder>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            request,
            hba,
            config,
            ledger,
            telemetry,
            steps_completed: 0,
            failures: Vec::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    fn record(&self, event: SessionEvent) {
        self.telemetry
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .record(event);
    }

    fn step<T>(&mut self, kind: StepKind, f: impl FnOnce() -> Result<T>) -> Option<T> {
        let started = Instant::now();
        match f() {
            Ok(value) => {
                self.steps_completed += 1;
                self.record(SessionEvent::StepCompleted {
                    session: self.id,
                    step: kind,
                    elapsed_ms: started.elapsed().as_millis() as u64,
                });
                Some(value)
            }
            Err(e) => {
                warn!("Dump step {:?} failed: {}", kind, e);
                self.record(SessionEvent::StepFailed {
                    session: self.id,
                    step: kind,
                    error: e.kind(),
                });
                self.failures.push((kind, e.to_string()));
                None
            }
        }
    }

    fn transition(&mut self, target: DeviceMode) {
        let hba = self.hba;
        let mode = hba.mode.as_ref();
        if let Some(Some(from)) = self.step(StepKind::Mode(target), || ensure_mode(mode, target)) {
            info!("Adapter mode {} -> {}", from, target);
            self.record(SessionEvent::ModeTransition {
                session: self.id,
                from,
                to: target,
            });
        }
    }

    fn open_sinks(&mut self, sinks: &mut SinkSet, kinds: &[SinkKind]) {
        let config = self.config;
        for sink in [&mut sinks.text, &mut sinks.binary, &mut sinks.vendor] {
            if !kinds.contains(&sink.kind()) {
                sink.clear();
                continue;
            }
            let capacity = match sink.kind() {
                SinkKind::Text => config.text_capacity,
                SinkKind::Binary => config.binary_capacity,
                SinkKind::VendorLog => config.vendor_capacity,
            };
            if self.step(StepKind::OpenSinks, || sink.open(capacity)).is_none() {
                error!("Unable to open {:?} dump channel ({} bytes)", sink.kind(), capacity);
                sink.clear();
            }
        }
    }

    /// Runs the script for this session's trigger against `sinks`.
    pub fn run(mut self, sinks: &mut SinkSet) -> SessionReport {
        let started = Instant::now();
        let trigger = self.request.kind();

        info!("{:?} event: firmware core dump initiated (session {})", trigger, self.id);
        self.record(SessionEvent::SessionStarted {
            session: self.id,
            trigger,
        });

        let kinds = channels_for(trigger, self.hba.chip);
        self.open_sinks(sinks, &kinds);

        let harvest = {
            let mut ch = Channels::over(sinks, self.config.byte_order, &kinds);
            if let Some(binary) = ch.binary.as_mut() {
                binary.header();
            }

            let harvest = match self.request {
                DumpRequest::Thermal(event) => {
                    self.thermal(&mut ch, &event);
                    None
                }
                DumpRequest::Fault | DumpRequest::User => self.full(&mut ch),
            };

            if let Some(text) = ch.text.as_mut() {
                text.terminate();
            }
            if let Some(vendor) = ch.vendor.as_mut() {
                vendor.terminate();
            }
            if let Some(binary) = ch.binary.as_mut() {
                binary.terminate();
            }
            harvest
        };

        for sink in [&mut sinks.text, &mut sinks.binary, &mut sinks.vendor] {
            if kinds.contains(&sink.kind()) {
                sink.close();
            }
        }

        let elapsed = started.elapsed();
        self.record(SessionEvent::SessionFinished {
            session: self.id,
            trigger,
            elapsed_ms: elapsed.as_millis() as u64,
            steps_failed: self.failures.len() as u32,
        });
        info!(
            "Dump session {} finished in {:?}: {} steps ok, {} failed",
            self.id,
            elapsed,
            self.steps_completed,
            self.failures.len()
        );

        SessionReport {
            id: self.id,
            trigger,
            steps_completed: self.steps_completed,
            failures: self.failures,
            harvest,
            elapsed,
        }
    }

    /// Text only, no mode changes and no adapter commands.
    fn thermal(&mut self, ch: &mut Channels<'_>, event: &ThermalEvent) {
        let hba = self.hba;
        let identity = &hba.identity;
        warn!(
            "Temperature event: type={} temp={}",
            event.kind.code(),
            event.temperature
        );

        self.step(StepKind::ThermalBanner, || {
            if let Some(text) = ch.text.as_mut() {
                text.string(None, &identity::thermal_banner(event), false);
            }
            Ok(())
        });
        self.step(StepKind::RevInfo, || {
            identity::rev_info(ch, identity);
            Ok(())
        });
        self.step(StepKind::HbaInfo, || {
            identity::hba_info(ch, identity);
            Ok(())
        });
    }

    fn full(&mut self, ch: &mut Channels<'_>) -> Option<HarvestSummary> {
        let hba = self.hba;
        let ledger = self.ledger;
        let fault = self.request.kind() == TriggerKind::Fault;

        self.step(StepKind::RevInfo, || {
            identity::rev_info(ch, &hba.identity);
            Ok(())
        });
        self.step(StepKind::HbaInfo, || {
            identity::hba_info(ch, &hba.identity);
            Ok(())
        });
        self.step(StepKind::ParamTable, || {
            identity::param_table(ch, &hba.identity);
            Ok(())
        });

        for region in 0..config_region::REGION_COUNT {
            self.step(StepKind::ConfigRegion(region), || {
                config_region::collect_region(ch, hba.mailbox.as_ref(), ledger, region)
            });
        }

        if hba.chip == ChipFamily::EventLog {
            if fault {
                self.transition(DeviceMode::Online);
            }
            self.step(StepKind::EventLog, || {
                event_log::collect(ch, hba.mailbox.as_ref(), ledger)
            });
        }

        self.transition(DeviceMode::Offline);
        for region in DriverRegion::ALL {
            self.step(StepKind::SliRegion(region), || {
                sli::collect_region(ch, hba.regions.as_ref(), ledger, region, fault)
            });
        }

        self.transition(DeviceMode::WarmStart);
        let harvest = self.memory_dump(ch);

        self.transition(DeviceMode::Online);

        if hba.chip == ChipFamily::Coprocessor {
            let device = hba.coproc.as_ref();
            if self
                .step(StepKind::MaintenanceOn, || coproc::set_maintenance(device, true))
                .is_some()
            {
                self.step(StepKind::CoprocLogs, || match ch.vendor.as_mut() {
                    Some(vendor) => coproc::collect(vendor, device),
                    None => Err(DumpError::Unsupported("vendor log channel")),
                });
                self.step(StepKind::MaintenanceOff, || coproc::set_maintenance(device, false));
            }
            if fault {
                self.step(StepKind::CoprocReset, || coproc::reset(device));
            }
        }

        harvest
    }

    fn memory_dump(&mut self, ch: &mut Channels<'_>) -> Option<HarvestSummary> {
        let (hba, ledger) = (self.hba, self.ledger);
        let walker = TableWalker::new(hba.mailbox.as_ref(), ledger, self.config.chain_policy);

        let table = self.step(StepKind::DumpTable, || walker.read_table(ch.text.as_mut()))?;

        let summary = self.step(StepKind::MemoryHarvest, || match ch.binary.as_mut() {
            Some(binary) => walker.harvest(&table, binary),
            None => Err(DumpError::Unsupported("binary dump channel")),
        })?;

        for region in &summary.regions {
            self.record(SessionEvent::RegionHarvested {
                session: self.id,
                sid: region.sid,
                address: region.address,
                byte_count: region.byte_count,
                bytes_read: region.bytes_read,
            });
        }
        Some(summary)
    }
}
