//! I/O abstraction for the REPL.
//!
//! The REPL core talks to its environment only through [`IoHost`], which
//! extends the runtime's [`Terminal`] with prompting. The terminal host
//! uses Reedline; tests use an in-memory host.

pub mod types;

#[cfg(test)]
pub mod test_host;

use ichigo_runtime::Terminal;

pub use types::*;

#[cfg(test)]
pub use test_host::TestHost;

/// Error type for I/O operations.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    #[error("I/O error: {0}")]
    Io(String),
}

/// Host interface for REPL I/O operations.
pub trait IoHost: Terminal {
    /// Prompt for and read the next command.
    fn read_input(&mut self) -> Result<Input, IoError>;

    /// Write a REPL message (banner, info, error).
    fn write_output(&mut self, output: Output) -> Result<(), IoError>;

    /// The last line read was handed to the engine as input, so it will
    /// not come back as an echo.
    fn discard_echo(&mut self) {}

    /// Flush any buffered output.
    fn flush(&mut self) -> Result<(), IoError> {
        Ok(())
    }
}
