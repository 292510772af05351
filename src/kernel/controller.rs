use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::retrieve;
use super::session::{DumpRequest, Session, SessionReport, TriggerKind};
use super::telemetry::{RejectReason, SessionEvent, TelemetryRecorder, TelemetrySnapshot};
use crate::config::DumpConfig;
use crate::device::Hba;
use crate::error::{DumpError, Result};
use crate::sink::{ScratchLedger, SinkSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    Scheduled,
    AlreadyActive,
    Disabled,
}

#[derive(Debug, Default)]
struct GateFlags {
    active: bool,
    safe: bool,
}

struct Shared {
    hba: Hba,
    config: DumpConfig,
    // Never held across a transport call.
    status: Mutex<GateFlags>,
    // Held for the whole session body and for retrieval.
    sinks: Mutex<SinkSet>,
    ledger: ScratchLedger,
    telemetry: Mutex<TelemetryRecorder>,
    idle: watch::Sender<bool>,
    last_report: Mutex<Option<SessionReport>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Clears the active flag when the session body ends, however it ends.
struct ActiveGuard(Arc<Shared>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        // Flag and watch change together so `wait` never sees a stale idle.
        let mut status = lock(&self.0.status);
        status.active = false;
        self.0.idle.send_replace(true);
    }
}

/// Owns the dump channels for one adapter, from attach to detach.
#[derive(Clone)]
pub struct DumpController {
    shared: Arc<Shared>,
    runtime: Handle,
}

impl DumpController {
    /// Attaches to `hba` using the ambient tokio runtime.
    pub fn attach(hba: Hba, config: DumpConfig) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|_| DumpError::Unsupported("attach outside a tokio runtime"))?;
        Ok(Self::attach_with_handle(hba, config, runtime))
    }

    pub fn attach_with_handle(hba: Hba, config: DumpConfig, runtime: Handle) -> Self {
        let (idle, _) = watch::channel(true);
        info!("Dump controller attached to {} ({:?})", hba.identity.model, hba.chip);

        let shared = Shared {
            status: Mutex::new(GateFlags {
                active: false,
                safe: config.dump_safe,
            }),
            sinks: Mutex::new(SinkSet::new()),
            ledger: ScratchLedger::new(config.scratch_limit),
            telemetry: Mutex::new(TelemetryRecorder::new()),
            idle,
            last_report: Mutex::new(None),
            hba,
            config,
        };

        Self {
            shared: Arc::new(shared),
            runtime,
        }
    }

    /// Refuses further triggers, waits out any running session and releases
    /// the channel buffers.
    pub fn detach(self) {
        lock(&self.shared.status).safe = false;
        let mut sinks = lock(&self.shared.sinks);
        sinks.dispose();
        info!("Dump controller detached from {}", self.shared.hba.identity.model);
    }

    pub fn set_dump_safe(&self, safe: bool) {
        lock(&self.shared.status).safe = safe;
        debug!("Dump safe: {}", safe);
    }

    pub fn is_active(&self) -> bool {
        lock(&self.shared.status).active
    }

    /// Starts a session unless one is running or dumps are disabled. Never blocks
    /// on the adapter.
    pub fn trigger(&self, request: DumpRequest) -> TriggerOutcome {
        let kind = request.kind();
        {
            let mut status = lock(&self.shared.status);
            if !status.safe {
                drop(status);
                self.reject(kind, RejectReason::Disabled);
                return TriggerOutcome::Disabled;
            }
            if status.active {
                drop(status);
                self.reject(kind, RejectReason::AlreadyActive);
                return TriggerOutcome::AlreadyActive;
            }
            status.active = true;
            self.shared.idle.send_replace(false);
        }

        let guard = ActiveGuard(self.shared.clone());
        self.runtime.spawn_blocking(move || {
            let shared = &guard.0;
            let report = {
                let mut sinks = lock(&shared.sinks);
                Session::new(request, &shared.hba, &shared.config, &shared.ledger, &shared.telemetry).run(&mut sinks)
            };
            if shared.ledger.outstanding() != 0 {
                warn!("{} scratch bytes still outstanding after session", shared.ledger.outstanding());
            }
            *lock(&shared.last_report) = Some(report);
            drop(guard);
        });

        TriggerOutcome::Scheduled
    }

    fn reject(&self, trigger: TriggerKind, reason: RejectReason) {
        info!("{:?} dump not started: {:?}", trigger, reason);
        lock(&self.shared.telemetry).record(SessionEvent::TriggerRejected { trigger, reason });
    }

    /// Resolves once no session is running.
    pub async fn wait(&self) {
        let mut idle = self.shared.idle.subscribe();
        let _ = idle.wait_for(|idle| *idle).await;
    }

    /// Blocking form of [`wait`](Self::wait) for non-async callers.
    pub fn wait_blocking(&self) {
        let period = Duration::from_millis(self.shared.config.wait_poll_ms.max(1));
        while self.is_active() {
            std::thread::sleep(period);
        }
    }

    /// Two-call retrieval: `None` for the size, then a buffer at least that big.
    pub fn retrieve(&self, buffer: Option<&mut [u8]>) -> Result<usize> {
        let sinks = lock(&self.shared.sinks);
        retrieve::retrieve(&sinks, buffer)
    }

    pub fn retrieve_vec(&self) -> Result<Vec<u8>> {
        let sinks = lock(&self.shared.sinks);
        let mut buffer = vec![0; retrieve::frame_size(&sinks)];
        let written = retrieve::retrieve(&sinks, Some(&mut buffer[..]))?;
        buffer.truncate(written);
        Ok(buffer)
    }

    pub fn telemetry(&self) -> TelemetrySnapshot {
        lock(&self.shared.telemetry).snapshot()
    }

    pub fn events(&self) -> Vec<SessionEvent> {
        lock(&self.shared.telemetry).events()
    }

    pub fn ledger(&self) -> &ScratchLedger {
        &self.shared.ledger
    }

    pub fn last_report(&self) -> Option<SessionReport> {
        lock(&self.shared.last_report).clone()
    }

    pub fn hba(&self) -> &Hba {
        &self.shared.hba
    }

    pub fn config(&self) -> &DumpConfig {
        &self.shared.config
    }
}
