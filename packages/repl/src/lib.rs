//! # ichigo-repl
//!
//! An interactive terminal for the ichigo engine.
//!
//! The engine runs on a worker thread behind [`ichigo_runtime`]; this
//! crate supplies the terminal side: line editing, rendering of engine
//! output and a command layer for the test harness.
//!
//! ## Features
//!
//! - Evaluate forms one at a time, quoted, or all at once
//! - Blocking reads: the engine can ask for more input mid-evaluation
//! - Run a JSON test suite with `:test`
//! - Tab completion for commands
//! - Paren and comment highlighting
//! - Vi mode support (detected from EDITOR, .inputrc, or ICHIGO_EDIT_MODE)
//! - Command history
//!
//! ## Usage
//!
//! ```bash
//! ichigo ichigo.wasm --suite tests.json
//!
//! # Inside the REPL:
//! > (car '(a b c))
//! > :quote '(1 2)
//! > :test
//! ```

pub mod commands;
pub mod completer;
pub mod highlighter;
pub mod host;
pub mod io;
pub mod repl;

use std::path::PathBuf;

use ichigo_runtime::{
    HostController, ReadCapability, RuntimeConfig, RuntimeError, Suite, WorkerBridge,
};
use tracing::warn;

use crate::host::TerminalHost;
use crate::io::{ExitReason, IoError};

pub use repl::{ReplCore, ReplError};

/// What to run and how.
#[derive(Debug, Clone)]
pub struct Options {
    /// Compiled engine module.
    pub module: PathBuf,
    /// Debug level to set once the engine is up.
    pub debug_level: Option<i32>,
    /// Test suite for `:test`.
    pub suite: Option<PathBuf>,
    /// Let the engine block for input mid-evaluation.
    pub blocking_read: bool,
}

/// Start the engine and run an interactive session on the terminal.
pub fn run(options: &Options) -> Result<ExitReason, ReplError> {
    let image = std::fs::read(&options.module).map_err(RuntimeError::from)?;
    let suite = match &options.suite {
        Some(path) => Suite::from_file(path)?,
        None => Suite::new(),
    };

    let mut config = RuntimeConfig::default();
    if !options.blocking_read {
        config = config.with_read_capability(ReadCapability::Unavailable);
    }

    let host = TerminalHost::new().map_err(|e| IoError::Io(e.to_string()))?;
    let (bridge, events) = WorkerBridge::spawn(config, image)?;
    let mut core = ReplCore::new(HostController::new(bridge.sender(), host), events, suite);

    let outcome = start(&mut core, options.debug_level);
    let parked = core.controller().parked_reads() > 0;
    drop(core);

    if parked {
        warn!("engine is blocked on a read, leaving the worker behind");
        return outcome;
    }

    let stopped = bridge.shutdown();
    match outcome {
        // The worker's own error says why it went away.
        Err(ReplError::Disconnected) => {
            stopped?;
            Err(ReplError::Disconnected)
        }
        outcome => {
            if let Err(e) = stopped {
                warn!("worker stopped with an error: {}", e);
            }
            outcome
        }
    }
}

fn start(
    core: &mut ReplCore<TerminalHost>,
    debug_level: Option<i32>,
) -> Result<ExitReason, ReplError> {
    core.wait_ready()?;
    if let Some(level) = debug_level {
        core.set_debug_level(level)?;
    }
    core.run()
}
