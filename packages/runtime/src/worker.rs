//! Worker bridge: the command loop living on the engine's thread.
//!
//! The worker owns the [`ModuleHost`]. It takes positional frames off its
//! inbox, decodes them into [`Request`]s, runs the matching entry point to
//! completion and posts exactly one reply echoing the request's sender.
//! Malformed frames are logged and dropped without a reply. A request
//! whose entry point traps is logged and gets no reply either; the worker
//! carries on with the next frame.

use std::thread::{self, JoinHandle};

use serde_json::Value;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::{debug, error, info, warn};

use crate::channel::ReadChannel;
use crate::config::RuntimeConfig;
use crate::envelope::{Request, WorkerEvent};
use crate::error::{Result, RuntimeError};
use crate::host::ModuleHost;
use crate::imports::WorkerImports;

/// Cloneable handle for posting frames to the worker.
#[derive(Debug, Clone)]
pub struct BridgeSender {
    inbox: UnboundedSender<Value>,
}

impl BridgeSender {
    /// Post a raw positional frame.
    pub fn post(&self, frame: Value) -> Result<()> {
        self.inbox
            .send(frame)
            .map_err(|_| RuntimeError::Disconnected)
    }

    /// Post a typed request.
    pub fn send(&self, request: &Request) -> Result<()> {
        self.post(request.to_frame())
    }
}

impl From<UnboundedSender<Value>> for BridgeSender {
    fn from(inbox: UnboundedSender<Value>) -> Self {
        Self { inbox }
    }
}

/// A running worker thread hosting the engine.
pub struct WorkerBridge {
    sender: BridgeSender,
    thread: Option<JoinHandle<Result<()>>>,
}

impl WorkerBridge {
    /// Start a worker that instantiates `image` as the primary module.
    ///
    /// Returns the bridge and the receiver for everything the worker
    /// posts back: replies, `init`, `print` and `read` notifications.
    pub fn spawn(
        config: RuntimeConfig,
        image: Vec<u8>,
    ) -> Result<(Self, UnboundedReceiver<WorkerEvent>)> {
        let (inbox_tx, inbox_rx) = unbounded_channel();
        let (events_tx, events_rx) = unbounded_channel();

        let thread = thread::Builder::new()
            .name("ichigo-worker".into())
            .spawn(move || {
                let result = run(config, image, inbox_rx, events_tx);
                if let Err(e) = &result {
                    error!("worker stopped: {}", e);
                }
                result
            })?;

        Ok((
            Self {
                sender: inbox_tx.into(),
                thread: Some(thread),
            },
            events_rx,
        ))
    }

    /// A handle for posting requests.
    pub fn sender(&self) -> BridgeSender {
        self.sender.clone()
    }

    /// Post a raw positional frame.
    pub fn post(&self, frame: Value) -> Result<()> {
        self.sender.post(frame)
    }

    /// Close the inbox and wait for the worker to finish.
    ///
    /// The worker only sees the inbox close once every [`BridgeSender`] is
    /// dropped. A worker parked on an unanswered read never finishes.
    pub fn shutdown(mut self) -> Result<()> {
        let Some(thread) = self.thread.take() else {
            return Ok(());
        };
        drop(self.sender);
        thread.join().map_err(|_| RuntimeError::WorkerPanicked)?
    }
}

fn run(
    config: RuntimeConfig,
    image: Vec<u8>,
    mut inbox: UnboundedReceiver<Value>,
    events: UnboundedSender<WorkerEvent>,
) -> Result<()> {
    let reads = ReadChannel::new(
        config.read_capability,
        config.max_line_length,
        events.clone(),
    );
    let imports = WorkerImports::new(events.clone(), reads);
    let mut host = ModuleHost::new(&config, Box::new(imports))?;
    host.load_primary(&image)?;
    let _ = events.send(WorkerEvent::Init);
    info!("worker ready");

    while let Some(frame) = inbox.blocking_recv() {
        let request = match Request::from_frame(frame) {
            Ok(request) => request,
            Err(e) => {
                warn!("dropping malformed frame: {}", e);
                continue;
            }
        };
        let kind = request.kind();
        // A trapped call gets no reply and the controller stays locked.
        let reply = match dispatch(&mut host, request) {
            Ok(reply) => reply,
            Err(e) => {
                error!(kind, "request failed: {}", e);
                continue;
            }
        };
        if events.send(reply).is_err() {
            debug!("controller gone, stopping worker");
            break;
        }
    }

    info!("worker inbox closed");
    Ok(())
}

fn dispatch(host: &mut ModuleHost, request: Request) -> Result<WorkerEvent> {
    debug!(kind = request.kind(), "dispatching request");
    Ok(match request {
        Request::Eval { sender, source } => WorkerEvent::Eval {
            sender,
            text: host.evaluate_one(&source)?,
        },
        Request::EvalQuote { sender, source } => WorkerEvent::Eval {
            sender,
            text: host.evaluate_quoted(&source)?,
        },
        Request::EvalAll { sender, source } => WorkerEvent::Eval {
            sender,
            text: host.evaluate_all(&source)?,
        },
        Request::DebugLevel { sender, level } => {
            info!(level, "debug_level");
            host.set_debug_level(level)?;
            WorkerEvent::DebugLevel { sender }
        }
    })
}
