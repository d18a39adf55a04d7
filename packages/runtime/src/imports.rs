//! Capabilities the engine can call back into.
//!
//! The module host wires every wasm import to a method of [`HostImports`]
//! after doing the memory marshalling itself, so implementations deal only
//! in decoded values.

use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::mpsc::UnboundedSender;
use tracing::info;

use crate::channel::ReadChannel;
use crate::envelope::WorkerEvent;

/// Host services exposed to loaded modules.
pub trait HostImports: Send {
    /// `console.log`: an opaque value from the engine.
    fn log_value(&mut self, value: i32) {
        info!(target: "ichigo::engine", "{}", value);
    }

    /// `console.logstr`: human-readable diagnostic text.
    fn log_text(&mut self, text: &str) {
        info!(target: "ichigo::engine", "{}", text);
    }

    /// `io.outputString`: one chunk of evaluation output.
    fn emit_output(&mut self, text: &str);

    /// `io.getTimeInMs`: wall-clock milliseconds since the Unix epoch.
    fn now_millis(&mut self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_millis() as i64)
    }

    /// `io.read`: another line of input, NUL-terminated, or `None` to let
    /// the engine continue with what is already buffered.
    fn blocking_read(&mut self) -> Option<Vec<u8>>;
}

/// Imports used inside the worker thread: output is streamed to the
/// controller as `print` events and reads go through a [`ReadChannel`].
pub struct WorkerImports {
    events: UnboundedSender<WorkerEvent>,
    reads: ReadChannel,
}

impl WorkerImports {
    pub fn new(events: UnboundedSender<WorkerEvent>, reads: ReadChannel) -> Self {
        Self { events, reads }
    }
}

impl HostImports for WorkerImports {
    fn emit_output(&mut self, text: &str) {
        // A closed controller only means nobody is watching the stream.
        let _ = self.events.send(WorkerEvent::Print(text.to_string()));
    }

    fn blocking_read(&mut self) -> Option<Vec<u8>> {
        self.reads.request()
    }
}
