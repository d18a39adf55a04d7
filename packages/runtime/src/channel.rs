//! Blocking reads from inside a synchronous engine call.
//!
//! While the engine runs an entry point on the worker thread it may need
//! another line of input, for example halfway through a multi-line form.
//! Only the controller thread can supply one, and the engine cannot return
//! to wait for it. The [`ReadChannel`] therefore parks the worker thread:
//!
//! 1. allocate a fresh [`LockCell`] and a fresh [`LineBuffer`],
//! 2. post both to the controller as a [`ReadRequest`],
//! 3. sleep until the controller fills the buffer and releases the cell.
//!
//! There is no timeout. A request that is never answered keeps the worker
//! parked forever; recovery means restarting the worker.

use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

use crate::envelope::WorkerEvent;

/// Longest line, terminator included, a single read can deliver.
pub const MAX_LINE_LENGTH: usize = 10240;

/// Whether the environment can park the worker for a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadCapability {
    /// Reads block the worker until the controller answers.
    #[default]
    Blocking,
    /// Reads return at once and the engine continues with whatever input
    /// is already buffered.
    Unavailable,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One-shot wake-up flag shared by the waiting worker and the responder.
///
/// The slot holds 0 while pending and becomes nonzero once released.
#[derive(Clone, Default)]
pub struct LockCell {
    inner: Arc<(Mutex<i32>, Condvar)>,
}

impl LockCell {
    fn new() -> Self {
        Self::default()
    }

    /// Whether the cell has been released.
    pub fn is_released(&self) -> bool {
        *lock(&self.inner.0) != 0
    }

    fn release(&self) {
        let (slot, waiter) = &*self.inner;
        *lock(slot) = 1;
        waiter.notify_one();
    }

    fn wait(&self) {
        let (slot, waiter) = &*self.inner;
        let mut state = lock(slot);
        while *state == 0 {
            state = waiter.wait(state).unwrap_or_else(PoisonError::into_inner);
        }
    }
}

impl fmt::Debug for LockCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockCell")
            .field("released", &self.is_released())
            .finish()
    }
}

/// Fixed-size byte buffer shared between the worker and the responder.
#[derive(Clone)]
pub struct LineBuffer {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl LineBuffer {
    fn new(capacity: usize) -> Self {
        Self {
            bytes: Arc::new(Mutex::new(vec![0; capacity])),
        }
    }

    /// Total size in bytes, terminator included.
    pub fn capacity(&self) -> usize {
        lock(&self.bytes).len()
    }

    /// Store `line` NUL-terminated, truncating at a character boundary if
    /// it does not fit.
    fn fill(&self, line: &str) {
        let mut bytes = lock(&self.bytes);
        let Some(room) = bytes.len().checked_sub(1) else {
            return;
        };
        let mut len = line.len().min(room);
        while !line.is_char_boundary(len) {
            len -= 1;
        }
        bytes[..len].copy_from_slice(&line.as_bytes()[..len]);
        bytes[len] = 0;
    }

    /// Copy of the contents up to and including the first NUL.
    fn contents(&self) -> Vec<u8> {
        let bytes = lock(&self.bytes);
        let end = bytes
            .iter()
            .position(|&b| b == 0)
            .map_or(bytes.len(), |nul| nul + 1);
        bytes[..end].to_vec()
    }
}

impl fmt::Debug for LineBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LineBuffer")
            .field("capacity", &self.capacity())
            .finish()
    }
}

/// A pending read posted by the worker.
///
/// Answering consumes the request so its cell is released exactly once.
/// Dropping it unanswered leaves the worker parked.
#[derive(Debug)]
pub struct ReadRequest {
    cell: LockCell,
    buffer: LineBuffer,
}

impl ReadRequest {
    /// Deliver `line` and wake the worker.
    pub fn respond(self, line: &str) {
        self.buffer.fill(line);
        self.cell.release();
    }

    /// Largest line, in bytes, that will be delivered intact.
    pub fn max_line(&self) -> usize {
        self.buffer.capacity().saturating_sub(1)
    }
}

/// Worker-side end of the blocking read protocol.
#[derive(Debug, Clone)]
pub struct ReadChannel {
    capability: ReadCapability,
    max_line_length: usize,
    events: UnboundedSender<WorkerEvent>,
}

impl ReadChannel {
    pub fn new(
        capability: ReadCapability,
        max_line_length: usize,
        events: UnboundedSender<WorkerEvent>,
    ) -> Self {
        Self {
            capability,
            max_line_length,
            events,
        }
    }

    pub fn capability(&self) -> ReadCapability {
        self.capability
    }

    /// Ask the controller for a line and block until it arrives.
    ///
    /// Returns the delivered bytes, NUL-terminated, or `None` when reads
    /// are unavailable or nobody is left to answer.
    pub fn request(&self) -> Option<Vec<u8>> {
        if self.capability == ReadCapability::Unavailable {
            debug!("blocking read unavailable, continuing with buffered input");
            return None;
        }

        let cell = LockCell::new();
        let buffer = LineBuffer::new(self.max_line_length);
        let request = ReadRequest {
            cell: cell.clone(),
            buffer: buffer.clone(),
        };
        if self.events.send(WorkerEvent::Read(request)).is_err() {
            warn!("read request undeliverable, controller is gone");
            return None;
        }

        debug!("worker parked on read request");
        cell.wait();
        Some(buffer.contents())
    }
}
