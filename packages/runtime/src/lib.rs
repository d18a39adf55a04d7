//! # ichigo runtime
//!
//! Hosts the ichigo engine, a Lisp interpreter shipped as a pre-built
//! WebAssembly module, on a dedicated worker thread and lets a UI thread
//! talk to it through asynchronous messages.
//!
//! ## Architecture
//!
//! ```text
//!   UI thread                              worker thread
//! ┌──────────────────┐  [sender, type, …]  ┌──────────────────────────┐
//! │  HostController  │ ──────────────────▶ │  WorkerBridge            │
//! │  admission lock  │                     │   └ ModuleHost           │
//! │  test harness    │ ◀────────────────── │      ├ linear memory     │
//! └──────────────────┘  eval/print/read    │      ├ loaded modules    │
//!          │                               │      └ imports           │
//!          │  fill buffer, release cell    │         └ ReadChannel ──┐│
//!          └───────────────────────────────┼──────────▶ LockCell ◀───┘│
//!                                          └──────────────────────────┘
//! ```
//!
//! - The [`HostController`] keeps at most one user request in flight and
//!   routes replies by the sender token it put on the request.
//! - The [`WorkerBridge`] decodes requests, runs the matching engine entry
//!   point to completion and echoes the sender back on the reply.
//! - The [`ModuleHost`] owns the engine's linear memory. Text crosses the
//!   boundary as NUL-terminated UTF-8 at a fixed input cell, see
//!   [`Marshaller`].
//! - When the engine needs another line mid-evaluation, the
//!   [`ReadChannel`] parks the worker on a [`LockCell`] until the
//!   controller answers the [`ReadRequest`].
//!
//! ## Example
//!
//! ```ignore
//! use ichigo_runtime::{HostController, RuntimeConfig, WorkerBridge};
//!
//! let image = std::fs::read("ichigo.wasm")?;
//! let (bridge, mut events) = WorkerBridge::spawn(RuntimeConfig::default(), image)?;
//! let mut controller = HostController::new(bridge.sender(), terminal);
//!
//! controller.submit("(car '(a b c))")?;
//! while controller.is_locked() {
//!     let event = events.blocking_recv().ok_or(RuntimeError::Disconnected)?;
//!     controller.handle_event(event)?;
//! }
//! ```

pub mod channel;
pub mod config;
pub mod controller;
pub mod envelope;
pub mod error;
pub mod host;
pub mod imports;
pub mod isolation;
pub mod memory;
pub mod suite;
pub mod worker;

pub use channel::{LockCell, ReadCapability, ReadChannel, ReadRequest, MAX_LINE_LENGTH};
pub use config::RuntimeConfig;
pub use controller::{Admission, EvalMode, HostController, SenderTag, SuiteReport, Terminal};
pub use envelope::{ProtocolError, Request, Sender, WorkerEvent};
pub use error::{MemoryFault, Result, RuntimeError};
pub use host::ModuleHost;
pub use imports::{HostImports, WorkerImports};
pub use memory::{Marshaller, INPUT_ADDRESS};
pub use suite::{Expectation, Suite, TestCase};
pub use worker::{BridgeSender, WorkerBridge};
