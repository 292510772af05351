pub mod channel;
pub mod scratch;

pub use channel::{Sink, SinkKind, SinkSet};
pub use scratch::{Scratch, ScratchLedger};
