use std::collections::VecDeque;

use super::event::{RejectReason, SessionEvent};
use crate::error::ErrorKind;
use crate::kernel::session::TriggerKind;

#[derive(Debug, Clone, Default)]
pub struct TelemetrySnapshot {
    pub session_stats: SessionStats,
    pub step_stats: StepStats,
    pub harvest_stats: HarvestStats,
    pub mode_stats: ModeStats,
}

#[derive(Debug, Clone, Default)]
pub struct SessionStats {
    pub started: u64,
    pub finished: u64,
    pub fault: u64,
    pub user: u64,
    pub thermal: u64,
    pub rejected_active: u64,
    pub rejected_disabled: u64,
    pub total_ms: u64,
    pub avg_session_ms: f64,
    pub max_session_ms: u64,
}

#[derive(Debug, Clone, Default)]
pub struct StepStats {
    pub completed: u64,
    pub failed: u64,
    pub allocation_failures: u64,
    pub transport_failures: u64,
    pub protocol_violations: u64,
    pub unsupported: u64,
}

#[derive(Debug, Clone, Default)]
pub struct HarvestStats {
    pub regions: u64,
    pub partial: u64,
    pub bytes_requested: u64,
    pub bytes_read: u64,
}

#[derive(Debug, Clone, Default)]
pub struct ModeStats {
    pub transitions: u64,
    pub to_offline: u64,
    pub to_warm_start: u64,
    pub to_online: u64,
}

pub fn compute_snapshot(events: &VecDeque<SessionEvent>) -> TelemetrySnapshot {
    let mut snap = TelemetrySnapshot::default();

    for event in events {
        match event {
            SessionEvent::SessionStarted { trigger, .. } => {
                snap.session_stats.started += 1;
                match trigger {
                    TriggerKind::Fault => snap.session_stats.fault += 1,
                    TriggerKind::User => snap.session_stats.user += 1,
                    TriggerKind::Thermal => snap.session_stats.thermal += 1,
                }
            }
            SessionEvent::SessionFinished { elapsed_ms, .. } => {
                snap.session_stats.finished += 1;
                snap.session_stats.total_ms += elapsed_ms;
                if *elapsed_ms > snap.session_stats.max_session_ms {
                    snap.session_stats.max_session_ms = *elapsed_ms;
                }
            }
            SessionEvent::StepCompleted { .. } => snap.step_stats.completed += 1,
            SessionEvent::StepFailed { error, .. } => {
                snap.step_stats.failed += 1;
                match error {
                    ErrorKind::AllocationFailure => snap.step_stats.allocation_failures += 1,
                    ErrorKind::TransportFailure => snap.step_stats.transport_failures += 1,
                    ErrorKind::ProtocolViolation => snap.step_stats.protocol_violations += 1,
                    ErrorKind::UnsupportedOperation => snap.step_stats.unsupported += 1,
                    ErrorKind::SizeTooSmall | ErrorKind::Config => {}
                }
            }
            SessionEvent::ModeTransition { to, .. } => {
                snap.mode_stats.transitions += 1;
                match to {
                    crate::device::DeviceMode::Offline => snap.mode_stats.to_offline += 1,
                    crate::device::DeviceMode::WarmStart => snap.mode_stats.to_warm_start += 1,
                    crate::device::DeviceMode::Online => snap.mode_stats.to_online += 1,
                }
            }
            SessionEvent::RegionHarvested {
                byte_count,
                bytes_read,
                ..
            } => {
                snap.harvest_stats.regions += 1;
                snap.harvest_stats.bytes_requested += *byte_count as u64;
                snap.harvest_stats.bytes_read += *bytes_read as u64;
                if bytes_read < byte_count {
                    snap.harvest_stats.partial += 1;
                }
            }
            SessionEvent::TriggerRejected { reason, .. } => match reason {
                RejectReason::AlreadyActive => snap.session_stats.rejected_active += 1,
                RejectReason::Disabled => snap.session_stats.rejected_disabled += 1,
            },
        }
    }

    if snap.session_stats.finished > 0 {
        snap.session_stats.avg_session_ms =
            snap.session_stats.total_ms as f64 / snap.session_stats.finished as f64;
    }

    snap
}
