use std::sync::Arc;
use std::time::Duration;

use hbadump::collect::identity::{ThermalEvent, ThermalKind};
use hbadump::device::coproc::{CoprocOpcode, MAINTENANCE_MODE_DISABLE, MAINTENANCE_MODE_ENABLE};
use hbadump::device::sim::{sample_identity, SimCall, SimRingLog, SimulatedHba};
use hbadump::device::{ChipFamily, DeviceMode, DriverRegion, Hba};
use hbadump::kernel::parse_frame;
use hbadump::kernel::telemetry::{SessionEvent, StepKind};
use hbadump::sink::SinkKind;
use hbadump::walker::{TableEntry, TableVariant};
use hbadump::{DumpConfig, DumpController, DumpRequest, TriggerOutcome};

fn table() -> Vec<u32> {
    [
        TableEntry::NewTable(TableVariant::Primary),
        TableEntry::Block {
            sid: 5,
            byte_count: 16,
            address: 0x1000,
        },
        TableEntry::Terminator,
    ]
    .iter()
    .flat_map(TableEntry::encode)
    .collect()
}

fn adapter() -> SimulatedHba {
    SimulatedHba::new()
        .with_dump_table(0x2000, &table())
        .with_bytes(0x1000, &[0xAB; 16])
        .with_config_region(0, vec![0x11; 32])
        .with_driver_region(DriverRegion::Slim, vec![0x22; 64])
}

fn attach(sim: Arc<SimulatedHba>, chip: ChipFamily, config: DumpConfig) -> DumpController {
    let hba = Hba::from_device(sim, sample_identity(), chip);
    DumpController::attach(hba, config).unwrap()
}

fn sections(controller: &DumpController) -> Vec<(SinkKind, Vec<u8>)> {
    let frame = controller.retrieve_vec().unwrap();
    parse_frame(&frame)
        .unwrap()
        .into_iter()
        .map(|(kind, bytes)| (kind, bytes.to_vec()))
        .collect()
}

#[tokio::test]
async fn test_user_dump_produces_text_and_binary() {
    let sim = Arc::new(adapter());
    let controller = attach(sim.clone(), ChipFamily::Standard, DumpConfig::default());

    assert_eq!(controller.trigger(DumpRequest::User), TriggerOutcome::Scheduled);
    controller.wait().await;
    assert!(!controller.is_active());

    let sections = sections(&controller);
    let kinds: Vec<SinkKind> = sections.iter().map(|(k, _)| *k).collect();
    assert_eq!(kinds, vec![SinkKind::Text, SinkKind::Binary]);

    let text = String::from_utf8_lossy(&sections[0].1);
    assert!(text.starts_with("Revision Info: OS Version\n"));
    assert!(text.contains("HBA Memory Dump: Dump Table"));
    assert!(text.contains("Dump File End\n"));
    // SLIM text listing only on fault dumps
    assert!(!text.contains("SLI Structures: SLIM\n\n0000:"));

    let binary = &sections[1].1;
    assert_eq!(&binary[..4], &[0x02, 0, 0, 0]);
    assert_eq!(binary.len() % 4, 0);
    assert!(binary.windows(8).any(|w| w == [5, 16, 0, 0, 0x00, 0x10, 0x00, 0x00]));

    let report = controller.last_report().unwrap();
    let harvest = report.harvest.unwrap();
    assert_eq!(harvest.regions.len(), 1);
    assert_eq!(harvest.bytes(), 16);

    assert_eq!(controller.ledger().outstanding(), 0);
    assert!(controller.ledger().allocations() > 0);
    assert_eq!(controller.ledger().allocations(), controller.ledger().releases());
}

#[tokio::test]
async fn test_single_flight() {
    let sim = Arc::new(adapter().with_read_delay(Duration::from_millis(2)));
    let controller = attach(sim, ChipFamily::Standard, DumpConfig::default());

    assert_eq!(controller.trigger(DumpRequest::User), TriggerOutcome::Scheduled);
    assert!(controller.is_active());
    assert_eq!(controller.trigger(DumpRequest::Fault), TriggerOutcome::AlreadyActive);

    controller.wait().await;
    assert!(!controller.is_active());
    assert_eq!(controller.trigger(DumpRequest::Fault), TriggerOutcome::Scheduled);
    controller.wait().await;

    let stats = controller.telemetry();
    assert_eq!(stats.session_stats.started, 2);
    assert_eq!(stats.session_stats.finished, 2);
    assert_eq!(stats.session_stats.rejected_active, 1);
    assert_eq!(stats.session_stats.user, 1);
    assert_eq!(stats.session_stats.fault, 1);
}

#[tokio::test]
async fn test_concurrent_triggers_start_one_session() {
    const CALLERS: usize = 8;
    let sim = Arc::new(adapter().with_read_delay(Duration::from_millis(2)));
    let controller = attach(sim, ChipFamily::Standard, DumpConfig::default());
    let barrier = Arc::new(std::sync::Barrier::new(CALLERS));

    let handles: Vec<_> = (0..CALLERS)
        .map(|_| {
            let controller = controller.clone();
            let barrier = barrier.clone();
            tokio::task::spawn_blocking(move || {
                barrier.wait();
                controller.trigger(DumpRequest::User)
            })
        })
        .collect();

    let mut outcomes = Vec::new();
    for handle in handles {
        outcomes.push(handle.await.unwrap());
    }
    controller.wait().await;

    let scheduled = outcomes.iter().filter(|o| **o == TriggerOutcome::Scheduled).count();
    let rejected = outcomes.iter().filter(|o| **o == TriggerOutcome::AlreadyActive).count();
    assert_eq!(scheduled, 1);
    assert_eq!(rejected, CALLERS - 1);

    let stats = controller.telemetry();
    assert_eq!(stats.session_stats.started, 1);
    assert_eq!(stats.session_stats.rejected_active, (CALLERS - 1) as u64);
}

#[tokio::test]
async fn test_wait_settles_after_racing_triggers() {
    let sim = Arc::new(adapter());
    let controller = attach(sim, ChipFamily::Standard, DumpConfig::default());

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let controller = controller.clone();
            tokio::task::spawn_blocking(move || {
                for _ in 0..25 {
                    controller.trigger(DumpRequest::User);
                    std::thread::sleep(Duration::from_micros(200));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }

    // No more triggers: once wait resolves the last session must be over.
    controller.wait().await;
    assert!(!controller.is_active());
    let stats = controller.telemetry();
    assert!(stats.session_stats.started >= 1);
    assert_eq!(stats.session_stats.started, stats.session_stats.finished);
}

#[test]
fn test_blocking_wait() {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let sim = Arc::new(adapter().with_read_delay(Duration::from_millis(1)));
    let hba = Hba::from_device(sim, sample_identity(), ChipFamily::Standard);
    let config = DumpConfig {
        wait_poll_ms: 5,
        ..DumpConfig::default()
    };
    let controller = DumpController::attach_with_handle(hba, config, runtime.handle().clone());

    assert_eq!(controller.trigger(DumpRequest::User), TriggerOutcome::Scheduled);
    controller.wait_blocking();
    assert!(!controller.is_active());
    assert!(controller.last_report().is_some());
}

#[tokio::test]
async fn test_dump_safe_gate() {
    let config = DumpConfig {
        dump_safe: false,
        ..DumpConfig::default()
    };
    let controller = attach(Arc::new(adapter()), ChipFamily::Standard, config);

    assert_eq!(controller.trigger(DumpRequest::User), TriggerOutcome::Disabled);
    assert_eq!(controller.retrieve(None).unwrap(), 0);

    controller.set_dump_safe(true);
    assert_eq!(controller.trigger(DumpRequest::User), TriggerOutcome::Scheduled);
    controller.wait().await;
    assert_eq!(controller.telemetry().session_stats.rejected_disabled, 1);
}

#[tokio::test]
async fn test_fault_mode_sequence_and_slim_listing() {
    let sim = Arc::new(adapter());
    let controller = attach(sim.clone(), ChipFamily::Standard, DumpConfig::default());

    controller.trigger(DumpRequest::Fault);
    controller.wait().await;

    assert_eq!(
        sim.mode_history(),
        vec![DeviceMode::Offline, DeviceMode::WarmStart, DeviceMode::Online]
    );

    // Mode changes bracket the SLI regions and the memory dump.
    let calls = sim.calls();
    let set = |mode| calls.iter().position(|c| *c == SimCall::SetMode(mode)).unwrap();
    let offline = set(DeviceMode::Offline);
    let warm = set(DeviceMode::WarmStart);
    let online = set(DeviceMode::Online);
    let first_region = calls
        .iter()
        .position(|c| matches!(c, SimCall::Region { .. }))
        .unwrap();
    assert!(offline < first_region && first_region < warm && warm < online);

    let text = String::from_utf8_lossy(&sections(&controller)[0].1).into_owned();
    assert!(text.contains("SLI Structures: SLIM\n\n0000: 22222222"));

    let transitions = controller
        .events()
        .into_iter()
        .filter(|e| matches!(e, SessionEvent::ModeTransition { .. }))
        .count();
    assert_eq!(transitions, 3);
}

#[tokio::test]
async fn test_failed_steps_do_not_stop_the_session() {
    // Only SLIM is backed, so the other seven SLI regions fail.
    let sim = Arc::new(adapter().with_failing_config_region(2));
    let controller = attach(sim, ChipFamily::Standard, DumpConfig::default());

    controller.trigger(DumpRequest::User);
    controller.wait().await;

    let report = controller.last_report().unwrap();
    let failed: Vec<StepKind> = report.failures.iter().map(|(step, _)| *step).collect();
    assert!(failed.contains(&StepKind::ConfigRegion(2)));
    assert!(failed.contains(&StepKind::SliRegion(DriverRegion::Pcb)));
    assert!(!failed.contains(&StepKind::MemoryHarvest));
    assert_eq!(failed.len(), 8);
    assert!(report.harvest.is_some());
    assert_eq!(controller.telemetry().step_stats.failed, 8);
}

#[tokio::test]
async fn test_coprocessor_fault_sequence() {
    let sim = Arc::new(adapter().with_ring_log(SimRingLog {
        name: "trace".into(),
        entry_size: 16,
        num_entries: 2,
        head: 0,
        entries: vec!["hello".into(), "world".into()],
    }));
    let controller = attach(sim.clone(), ChipFamily::Coprocessor, DumpConfig::default());

    controller.trigger(DumpRequest::Fault);
    controller.wait().await;

    let coproc: Vec<(CoprocOpcode, u32)> = sim
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            SimCall::Coproc(cmd) => Some((cmd.opcode, cmd.context)),
            _ => None,
        })
        .collect();
    assert_eq!(
        coproc,
        vec![
            (CoprocOpcode::SetMode, MAINTENANCE_MODE_ENABLE),
            (CoprocOpcode::GetConfig, 0),
            (CoprocOpcode::GetLogConfig, 0),
            (CoprocOpcode::GetLogData, 0),
            (CoprocOpcode::SetMode, MAINTENANCE_MODE_DISABLE),
            (CoprocOpcode::Reset, 1),
        ]
    );
    assert!(!sim.maintenance_mode());

    // Co-processor work happens after the port is back online.
    let calls = sim.calls();
    let online = calls
        .iter()
        .position(|c| *c == SimCall::SetMode(DeviceMode::Online))
        .unwrap();
    let first_coproc = calls.iter().position(|c| matches!(c, SimCall::Coproc(_))).unwrap();
    assert!(online < first_coproc);

    let sections = sections(&controller);
    let vendor = sections
        .iter()
        .find(|(k, _)| *k == SinkKind::VendorLog)
        .map(|(_, b)| String::from_utf8_lossy(b).into_owned())
        .unwrap();
    assert!(vendor.contains("Log 0: trace"));
    assert!(vendor.contains("\n  0: hello\n  1: world"));
    assert!(vendor.contains("Dump File End\n"));
}

#[tokio::test]
async fn test_user_dump_skips_coprocessor_reset() {
    let sim = Arc::new(adapter().with_ring_log(SimRingLog {
        name: "trace".into(),
        entry_size: 16,
        num_entries: 1,
        head: 0,
        entries: vec!["x".into()],
    }));
    let controller = attach(sim.clone(), ChipFamily::Coprocessor, DumpConfig::default());

    controller.trigger(DumpRequest::User);
    controller.wait().await;

    assert!(!sim
        .calls()
        .iter()
        .any(|c| matches!(c, SimCall::Coproc(cmd) if cmd.opcode == CoprocOpcode::Reset)));
}

#[tokio::test]
async fn test_event_log_chip_brings_port_online_on_fault() {
    let sim = Arc::new(
        adapter()
            .with_mode(DeviceMode::Offline)
            .with_event_log(vec![0x5A; 64]),
    );
    let controller = attach(sim.clone(), ChipFamily::EventLog, DumpConfig::default());

    controller.trigger(DumpRequest::Fault);
    controller.wait().await;

    let calls = sim.calls();
    let online = calls
        .iter()
        .position(|c| *c == SimCall::SetMode(DeviceMode::Online))
        .unwrap();
    let status = calls
        .iter()
        .position(|c| {
            matches!(
                c,
                SimCall::Mailbox(hbadump::device::MailboxCommand::ReadEventLogStatus)
            )
        })
        .unwrap();
    assert!(online < status);

    let text = String::from_utf8_lossy(&sections(&controller)[0].1).into_owned();
    assert!(text.contains("Non-Volatile Log Dump is included"));
}

#[tokio::test]
async fn test_thermal_dump_is_text_only() {
    let sim = Arc::new(adapter());
    let controller = attach(sim.clone(), ChipFamily::Coprocessor, DumpConfig::default());

    // Leave stale binary output behind first.
    controller.trigger(DumpRequest::User);
    controller.wait().await;
    sim.clear_calls();

    let event = ThermalEvent {
        kind: ThermalKind::Threshold,
        temperature: 75,
    };
    assert_eq!(controller.trigger(DumpRequest::Thermal(event)), TriggerOutcome::Scheduled);
    controller.wait().await;

    // No adapter interrogation at all.
    assert!(sim.calls().is_empty());

    let sections = sections(&controller);
    assert_eq!(sections.len(), 1);
    assert_eq!(sections[0].0, SinkKind::Text);

    let text = String::from_utf8_lossy(&sections[0].1).into_owned();
    assert!(text.starts_with(" WARNING: HBA Temperature Event:\n Event Type  = 2 (Threshold)\n Temperature = 75\n\n"));
    assert!(text.contains("Revision Info: Driver Version"));
    assert!(text.contains("HBA Info: Boot Bios Version"));
    assert!(!text.contains("Driver Parameters"));
    assert!(text.contains("Dump File End\n"));
    assert_eq!(controller.telemetry().session_stats.thermal, 1);
}

#[tokio::test]
async fn test_retrieval_two_call_convention() {
    let controller = attach(Arc::new(adapter()), ChipFamily::Standard, DumpConfig::default());
    assert_eq!(controller.retrieve(None).unwrap(), 0);

    controller.trigger(DumpRequest::User);
    controller.wait().await;

    let size = controller.retrieve(None).unwrap();
    assert!(size > 20);

    let mut small = vec![0u8; size - 1];
    let err = controller.retrieve(Some(&mut small[..])).unwrap_err();
    assert_eq!(err.kind(), hbadump::error::ErrorKind::SizeTooSmall);
    assert!(small.iter().all(|b| *b == 0));

    let mut buffer = vec![0u8; size + 8];
    assert_eq!(controller.retrieve(Some(&mut buffer[..])).unwrap(), size);
    assert_eq!(&buffer[..4], &2u32.to_le_bytes());
    assert_eq!(&buffer[4..8], &1u32.to_le_bytes());
    assert_eq!(&buffer[12..16], &2u32.to_le_bytes());

    // Retrieval leaves the channels untouched.
    assert_eq!(controller.retrieve(None).unwrap(), size);
}

#[tokio::test]
async fn test_detach_refuses_new_dumps() {
    let controller = attach(Arc::new(adapter()), ChipFamily::Standard, DumpConfig::default());
    let handle = controller.clone();

    controller.trigger(DumpRequest::User);
    controller.wait().await;
    controller.detach();

    assert_eq!(handle.trigger(DumpRequest::User), TriggerOutcome::Disabled);
    assert_eq!(handle.retrieve(None).unwrap(), 0);
}

#[tokio::test]
async fn test_big_endian_artifact() {
    let config = DumpConfig {
        byte_order: hbadump::encode::ByteOrder::Big,
        ..DumpConfig::default()
    };
    let controller = attach(Arc::new(adapter()), ChipFamily::Standard, config);
    controller.trigger(DumpRequest::User);
    controller.wait().await;

    let sections = sections(&controller);
    let binary = &sections[1].1;
    assert_eq!(&binary[..4], &[0x03, 0, 0, 0]);
    assert!(binary.windows(8).any(|w| w == [5, 0, 0, 16, 0x00, 0x00, 0x10, 0x00]));
}

#[test]
fn test_attach_needs_runtime() {
    let hba = Hba::from_device(Arc::new(SimulatedHba::new()), sample_identity(), ChipFamily::Standard);
    let err = DumpController::attach(hba, DumpConfig::default()).err().unwrap();
    assert_eq!(err.kind(), hbadump::error::ErrorKind::UnsupportedOperation);
}
