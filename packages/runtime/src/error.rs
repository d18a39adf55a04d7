//! Error types for the ichigo runtime.

use thiserror::Error;

/// An access outside the bounds of the module's linear memory.
///
/// Raised from inside an import this becomes a trap that aborts the
/// running entry point; it is never reported to the engine as text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("memory fault: {len} byte(s) at {address:#x} exceed memory of {size} bytes")]
pub struct MemoryFault {
    pub address: usize,
    pub len: usize,
    pub size: usize,
}

/// Errors that can occur in the ichigo runtime.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The engine rejected a module image or a call into it.
    #[error("wasm error during {stage}: {message}")]
    Wasm {
        stage: &'static str,
        message: String,
    },

    /// A required export is missing from the primary module.
    #[error("missing export: {0}")]
    MissingExport(&'static str),

    /// Linear memory was accessed out of bounds.
    #[error(transparent)]
    Memory(#[from] MemoryFault),

    /// A method was called before the primary module was loaded.
    #[error("primary module not loaded")]
    NotLoaded,

    /// The worker thread is gone.
    #[error("worker disconnected")]
    Disconnected,

    /// The worker thread panicked.
    #[error("worker panicked")]
    WorkerPanicked,

    /// A test suite could not be parsed.
    #[error("invalid test suite: {0}")]
    Suite(String),

    /// An I/O error occurred.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl RuntimeError {
    pub(crate) fn wasm(stage: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Wasm {
            stage,
            message: err.to_string(),
        }
    }
}

/// Result type alias for runtime operations.
pub type Result<T> = std::result::Result<T, RuntimeError>;
