use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::encode::ByteOrder;
use crate::error::Result;
use crate::walker::ChainPolicy;

/// Controller configuration. Every field has a default, so an empty JSON object
/// is a valid config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DumpConfig {
    /// Capacity of the text channel in bytes (rounded down to a word multiple).
    pub text_capacity: usize,
    pub binary_capacity: usize,
    pub vendor_capacity: usize,

    /// Byte order of the binary artifact.
    pub byte_order: ByteOrder,

    /// What the table walker does on a secondary/tertiary new-table tag.
    pub chain_policy: ChainPolicy,

    /// Poll period used by `wait_blocking`.
    pub wait_poll_ms: u64,

    /// Upper bound on outstanding scratch memory. `None` means unbounded.
    pub scratch_limit: Option<usize>,

    /// Whether the adapter starts out safe to dump.
    pub dump_safe: bool,
}

impl Default for DumpConfig {
    fn default() -> Self {
        Self {
            text_capacity: 256 * 1024,
            binary_capacity: 8 * 1024 * 1024,
            vendor_capacity: 256 * 1024,
            byte_order: ByteOrder::Little,
            chain_policy: ChainPolicy::Stop,
            wait_poll_ms: 1000,
            scratch_limit: None,
            dump_safe: true,
        }
    }
}

impl DumpConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }
}
