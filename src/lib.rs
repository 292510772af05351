pub mod collect;
pub mod config;
pub mod device;
pub mod encode;
pub mod error;
pub mod kernel;
pub mod sink;
pub mod walker;

pub use config::DumpConfig;
pub use device::{ChipFamily, Hba};
pub use error::{DumpError, Result};
pub use kernel::{DumpController, DumpRequest, TriggerOutcome};
