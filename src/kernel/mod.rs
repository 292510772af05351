//! Dump sessions and the controller that schedules them.

pub mod controller;
pub mod retrieve;
pub mod session;
pub mod telemetry;

pub use controller::{DumpController, TriggerOutcome};
pub use retrieve::{frame_size, parse_frame};
pub use session::{DumpRequest, SessionReport, TriggerKind};
