//! Runtime configuration.

use crate::channel::{ReadCapability, MAX_LINE_LENGTH};
use crate::memory::INPUT_ADDRESS;

/// Configuration for the module host and worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Address of the host-to-engine input cell.
    pub input_address: usize,

    /// Size of the buffer handed out with each blocking read.
    pub max_line_length: usize,

    /// Initial size of the shared linear memory, in 64 KiB pages.
    pub initial_pages: u32,

    /// Initial number of slots in the shared function table.
    pub table_size: u32,

    /// Whether blocking reads can park the worker.
    pub read_capability: ReadCapability,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            input_address: INPUT_ADDRESS,
            max_line_length: MAX_LINE_LENGTH,
            initial_pages: 8,
            table_size: 1024,
            read_capability: ReadCapability::Blocking,
        }
    }
}

impl RuntimeConfig {
    /// Set the read capability.
    pub fn with_read_capability(mut self, capability: ReadCapability) -> Self {
        self.read_capability = capability;
        self
    }
}
