//! Session telemetry.
//!
//! # READ-ONLY INVARIANT
//! Telemetry is a side-effect layer. Session sequencing must never branch on
//! anything recorded here.
//!
//! # CONTENT INVARIANT
//! Events carry identifiers, addresses, sizes and error kinds only. Captured
//! adapter data never enters the recorder.

pub mod event;
pub mod metrics;
pub mod recorder;

pub use event::{RejectReason, SessionEvent, StepKind};
pub use metrics::{compute_snapshot, TelemetrySnapshot};
pub use recorder::TelemetryRecorder;
