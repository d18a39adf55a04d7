//! Host controller: the UI side of the bridge.
//!
//! The controller turns user actions into requests, keeps at most one
//! user request in flight, routes replies by their sender token, and
//! drives test suites one step at a time.

use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::channel::ReadRequest;
use crate::envelope::{Request, WorkerEvent};
use crate::error::Result;
use crate::suite::Suite;
use crate::worker::BridgeSender;

/// Where the controller renders output and finds continuation lines.
pub trait Terminal {
    /// Write raw text: echoed input, streamed engine output, test notes.
    fn write(&mut self, text: &str);

    /// A request has finished and the terminal may prompt again.
    fn end_request(&mut self) {}

    /// A suite run has finished.
    fn report(&mut self, _report: &SuiteReport) {}

    /// A line for an engine blocked on input, or `None` when no
    /// interactive source is attached.
    fn read_line(&mut self) -> Option<String> {
        None
    }
}

/// Routing context carried in a request's sender token.
///
/// On the wire these are `["eval", source]`, `["test", index]` and
/// `["debug_level", level]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SenderTag {
    Eval(String),
    Test(usize),
    DebugLevel(i32),
}

impl SenderTag {
    pub fn to_value(&self) -> Value {
        match self {
            SenderTag::Eval(source) => json!(["eval", source]),
            SenderTag::Test(index) => json!(["test", index]),
            SenderTag::DebugLevel(level) => json!(["debug_level", level]),
        }
    }

    pub fn from_value(value: &Value) -> Option<Self> {
        let [kind, context] = value.as_array()?.as_slice() else {
            return None;
        };
        match kind.as_str()? {
            "eval" => Some(SenderTag::Eval(context.as_str()?.to_string())),
            "test" => Some(SenderTag::Test(usize::try_from(context.as_u64()?).ok()?)),
            "debug_level" => Some(SenderTag::DebugLevel(i32::try_from(context.as_i64()?).ok()?)),
            _ => None,
        }
    }
}

/// Outcome of a user action that needs the admission lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Dispatched,
    /// Another request is still in flight; nothing was sent.
    Rejected,
}

/// Pass/fail tally of a finished suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SuiteReport {
    pub passed: usize,
    pub failed: usize,
}

struct SuiteRun {
    suite: Suite,
    report: SuiteReport,
}

/// How a user submission is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalMode {
    One,
    Quoted,
    All,
}

/// The UI-side controller.
pub struct HostController<T> {
    bridge: BridgeSender,
    terminal: T,
    locked: bool,
    ready: bool,
    run: Option<SuiteRun>,
    parked: Vec<ReadRequest>,
}

impl<T: Terminal> HostController<T> {
    pub fn new(bridge: BridgeSender, terminal: T) -> Self {
        Self {
            bridge,
            terminal,
            locked: false,
            ready: false,
            run: None,
            parked: Vec::new(),
        }
    }

    /// Whether a user request is in flight.
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Whether the worker has reported `init`.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn terminal(&self) -> &T {
        &self.terminal
    }

    pub fn terminal_mut(&mut self) -> &mut T {
        &mut self.terminal
    }

    /// Number of read requests waiting for a line.
    pub fn parked_reads(&self) -> usize {
        self.parked.len()
    }

    /// Evaluate one form typed by the user.
    pub fn submit(&mut self, source: &str) -> Result<Admission> {
        self.submit_as(EvalMode::One, source)
    }

    /// Evaluate user input with the given entry point.
    pub fn submit_as(&mut self, mode: EvalMode, source: &str) -> Result<Admission> {
        if !self.admit("submit") {
            return Ok(Admission::Rejected);
        }
        self.terminal.write(&format!("{}\n", source));

        let sender = SenderTag::Eval(source.to_string()).to_value();
        let source = source.to_string();
        let request = match mode {
            EvalMode::One => Request::Eval { sender, source },
            EvalMode::Quoted => Request::EvalQuote { sender, source },
            EvalMode::All => Request::EvalAll { sender, source },
        };
        self.post(&request)?;
        Ok(Admission::Dispatched)
    }

    /// Run `suite` step by step.
    pub fn run_suite(&mut self, suite: Suite) -> Result<Admission> {
        if !self.admit("run_suite") {
            return Ok(Admission::Rejected);
        }
        info!(cases = suite.len(), "starting test run");
        self.run = Some(SuiteRun {
            suite,
            report: SuiteReport::default(),
        });
        self.next_step(0)?;
        Ok(Admission::Dispatched)
    }

    /// Change the engine's debug level. Not subject to admission.
    pub fn set_debug_level(&mut self, level: i32) -> Result<()> {
        self.bridge.send(&Request::DebugLevel {
            sender: SenderTag::DebugLevel(level).to_value(),
            level,
        })
    }

    /// Deliver `line` to the oldest parked read, if any.
    pub fn answer_parked(&mut self, line: &str) -> bool {
        if self.parked.is_empty() {
            return false;
        }
        self.parked.remove(0).respond(line);
        true
    }

    /// Route one event from the worker.
    ///
    /// Returns the tally when the event completed a suite run.
    pub fn handle_event(&mut self, event: WorkerEvent) -> Result<Option<SuiteReport>> {
        match event {
            WorkerEvent::Init => {
                info!("engine ready");
                self.ready = true;
            }
            WorkerEvent::Print(text) => self.terminal.write(&text),
            WorkerEvent::Read(request) => self.serve_read(request),
            WorkerEvent::DebugLevel { sender } => {
                debug!(sender = %sender, "debug level acknowledged");
            }
            WorkerEvent::Eval { sender, text } => match SenderTag::from_value(&sender) {
                Some(SenderTag::Eval(_)) => {
                    self.terminal.end_request();
                    self.locked = false;
                }
                Some(SenderTag::Test(index)) => return self.finish_step(index, &text),
                _ => warn!(sender = %sender, "reply with unrecognised sender"),
            },
        }
        Ok(None)
    }

    fn admit(&mut self, action: &str) -> bool {
        if self.locked {
            warn!("{} was called while a request is in flight", action);
            return false;
        }
        self.locked = true;
        true
    }

    fn post(&mut self, request: &Request) -> Result<()> {
        self.bridge.send(request).inspect_err(|_| {
            self.locked = false;
            self.run = None;
        })
    }

    fn serve_read(&mut self, request: ReadRequest) {
        match self.terminal.read_line() {
            Some(line) => request.respond(&line),
            None => {
                warn!("no input source for read request, engine stays blocked");
                self.parked.push(request);
            }
        }
    }

    fn next_step(&mut self, index: usize) -> Result<Option<SuiteReport>> {
        let input = match self.run.as_ref().and_then(|run| run.suite.get(index)) {
            Some(case) => case.input.clone(),
            None => return Ok(self.finish_run()),
        };
        self.terminal.write(&format!("{}\n", input));
        self.post(&Request::Eval {
            sender: SenderTag::Test(index).to_value(),
            source: input,
        })?;
        Ok(None)
    }

    fn finish_step(&mut self, index: usize, output: &str) -> Result<Option<SuiteReport>> {
        let Some(run) = self.run.as_mut() else {
            warn!(index, "test reply with no run in progress");
            return Ok(None);
        };
        let Some(case) = run.suite.get(index) else {
            warn!(index, "test reply for unknown step");
            return Ok(None);
        };

        if case.expected.matches(output) {
            run.report.passed += 1;
            self.terminal.write("  ;; OK");
        } else {
            run.report.failed += 1;
            let note = format!(
                "  ;; Failed\n;; Expected: {}\n;; Actual: {}",
                case.expected, output
            );
            self.terminal.write(&note);
        }
        self.terminal.end_request();
        self.next_step(index + 1)
    }

    fn finish_run(&mut self) -> Option<SuiteReport> {
        let run = self.run.take()?;
        info!(
            passed = run.report.passed,
            failed = run.report.failed,
            "test run finished"
        );
        self.terminal.report(&run.report);
        self.locked = false;
        Some(run.report)
    }
}
