use hbadump::device::DeviceMode;
use hbadump::error::ErrorKind;
use hbadump::kernel::telemetry::{RejectReason, SessionEvent, StepKind, TelemetryRecorder};
use hbadump::kernel::TriggerKind;
use uuid::Uuid;

#[test]
fn test_session_stats() {
    let mut recorder = TelemetryRecorder::new();
    let a = Uuid::new_v4();
    let b = Uuid::new_v4();

    recorder.record(SessionEvent::SessionStarted { session: a, trigger: TriggerKind::Fault });
    recorder.record(SessionEvent::SessionFinished {
        session: a,
        trigger: TriggerKind::Fault,
        elapsed_ms: 30,
        steps_failed: 0,
    });
    recorder.record(SessionEvent::TriggerRejected {
        trigger: TriggerKind::User,
        reason: RejectReason::AlreadyActive,
    });
    recorder.record(SessionEvent::SessionStarted { session: b, trigger: TriggerKind::Thermal });
    recorder.record(SessionEvent::SessionFinished {
        session: b,
        trigger: TriggerKind::Thermal,
        elapsed_ms: 10,
        steps_failed: 1,
    });

    let snapshot = recorder.snapshot();
    assert_eq!(snapshot.session_stats.started, 2);
    assert_eq!(snapshot.session_stats.fault, 1);
    assert_eq!(snapshot.session_stats.thermal, 1);
    assert_eq!(snapshot.session_stats.rejected_active, 1);
    assert_eq!(snapshot.session_stats.max_session_ms, 30);
    assert_eq!(snapshot.session_stats.avg_session_ms, 20.0);
}

#[test]
fn test_step_and_harvest_stats() {
    let mut recorder = TelemetryRecorder::new();
    let s = Uuid::new_v4();

    recorder.record(SessionEvent::StepCompleted { session: s, step: StepKind::RevInfo, elapsed_ms: 0 });
    recorder.record(SessionEvent::StepFailed {
        session: s,
        step: StepKind::ConfigRegion(3),
        error: ErrorKind::TransportFailure,
    });
    recorder.record(SessionEvent::StepFailed {
        session: s,
        step: StepKind::EventLog,
        error: ErrorKind::UnsupportedOperation,
    });
    recorder.record(SessionEvent::ModeTransition {
        session: s,
        from: DeviceMode::Online,
        to: DeviceMode::Offline,
    });
    recorder.record(SessionEvent::RegionHarvested {
        session: s,
        sid: 5,
        address: 0x1000,
        byte_count: 256,
        bytes_read: 96,
    });
    recorder.record(SessionEvent::RegionHarvested {
        session: s,
        sid: 6,
        address: 0x2000,
        byte_count: 16,
        bytes_read: 16,
    });

    let snapshot = recorder.snapshot();
    assert_eq!(snapshot.step_stats.completed, 1);
    assert_eq!(snapshot.step_stats.failed, 2);
    assert_eq!(snapshot.step_stats.transport_failures, 1);
    assert_eq!(snapshot.step_stats.unsupported, 1);
    assert_eq!(snapshot.mode_stats.to_offline, 1);
    assert_eq!(snapshot.harvest_stats.regions, 2);
    assert_eq!(snapshot.harvest_stats.partial, 1);
    assert_eq!(snapshot.harvest_stats.bytes_requested, 272);
    assert_eq!(snapshot.harvest_stats.bytes_read, 112);
}

#[test]
fn test_recorder_is_bounded() {
    let mut recorder = TelemetryRecorder::new();
    for _ in 0..10_050 {
        recorder.record(SessionEvent::TriggerRejected {
            trigger: TriggerKind::User,
            reason: RejectReason::Disabled,
        });
    }
    assert_eq!(recorder.len(), 10_000);

    recorder.clear();
    assert!(recorder.is_empty());
}

#[test]
fn test_events_serialize() {
    let event = SessionEvent::StepFailed {
        session: Uuid::nil(),
        step: StepKind::Mode(DeviceMode::WarmStart),
        error: ErrorKind::ProtocolViolation,
    };
    let json = serde_json::to_string(&event).unwrap();
    assert!(json.contains("WarmStart"));
    assert!(json.contains("ProtocolViolation"));
}
