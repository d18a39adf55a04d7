//! Platform-independent REPL core.
//!
//! The core reads commands through an [`IoHost`], turns them into
//! controller actions and pumps worker events until the request it started
//! has finished.

use ichigo_runtime::{
    Admission, EvalMode, HostController, RuntimeError, Suite, WorkerEvent,
};
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::debug;

use crate::commands::{self, Command};
use crate::io::{ExitReason, Input, IoError, IoHost, Output};

/// Errors that end a REPL session.
#[derive(Debug, thiserror::Error)]
pub enum ReplError {
    #[error(transparent)]
    Io(#[from] IoError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error("the engine worker stopped")]
    Disconnected,
}

/// The platform-independent REPL core.
pub struct ReplCore<H> {
    controller: HostController<H>,
    events: UnboundedReceiver<WorkerEvent>,
    suite: Suite,
}

impl<H: IoHost> ReplCore<H> {
    pub fn new(
        controller: HostController<H>,
        events: UnboundedReceiver<WorkerEvent>,
        suite: Suite,
    ) -> Self {
        Self {
            controller,
            events,
            suite,
        }
    }

    pub fn controller(&self) -> &HostController<H> {
        &self.controller
    }

    pub fn host(&self) -> &H {
        self.controller.terminal()
    }

    fn io(&mut self) -> &mut H {
        self.controller.terminal_mut()
    }

    /// Wait for the engine to come up.
    pub fn wait_ready(&mut self) -> Result<(), ReplError> {
        while !self.controller.is_ready() {
            let event = self.events.blocking_recv().ok_or(ReplError::Disconnected)?;
            self.controller.handle_event(event)?;
        }
        Ok(())
    }

    /// Change the engine's debug level.
    pub fn set_debug_level(&mut self, level: i32) -> Result<(), ReplError> {
        self.controller.set_debug_level(level)?;
        Ok(())
    }

    /// Run the REPL loop until the user quits.
    pub fn run(&mut self) -> Result<ExitReason, ReplError> {
        self.wait_ready()?;
        self.io().write_output(Output::banner(BANNER))?;

        loop {
            self.drain()?;
            self.io().flush()?;

            let line = match self.io().read_input()? {
                Input::Line(line) => line,
                Input::Interrupt => {
                    self.io()
                        .write_output(Output::info("^C (use :exit to quit)"))?;
                    continue;
                }
                Input::Eof => {
                    self.io().write_output(Output::info("Goodbye!"))?;
                    self.io().flush()?;
                    return Ok(ExitReason::Eof);
                }
            };

            // The engine is blocked on a read; anything but a command is
            // its answer.
            if self.controller.parked_reads() > 0 && !commands::is_command(&line) {
                self.controller.answer_parked(&line);
                self.io().discard_echo();
                self.settle()?;
                continue;
            }

            match commands::parse(&line) {
                Ok(Command::Exit) => {
                    self.io().write_output(Output::info("Goodbye!"))?;
                    self.io().flush()?;
                    return Ok(ExitReason::UserExit);
                }
                Ok(command) => self.execute(command)?,
                Err(msg) => self.io().write_output(Output::error(msg))?,
            }
        }
    }

    fn execute(&mut self, command: Command) -> Result<(), ReplError> {
        match command {
            Command::Empty | Command::Exit => {}
            Command::Eval(source) => self.submit(EvalMode::One, &source)?,
            Command::Quote(source) => self.submit(EvalMode::Quoted, &source)?,
            Command::All(source) => self.submit(EvalMode::All, &source)?,
            Command::Load(path) => match std::fs::read_to_string(&path) {
                Ok(source) => self.submit(EvalMode::All, &source)?,
                Err(e) => {
                    let msg = format!("cannot read {}: {}", path.display(), e);
                    self.io().write_output(Output::error(msg))?;
                }
            },
            Command::Test => {
                if self.suite.is_empty() {
                    self.io()
                        .write_output(Output::info("no test suite loaded (see --suite)"))?;
                } else {
                    let suite = self.suite.clone();
                    let admission = self.controller.run_suite(suite)?;
                    self.after_admission(admission)?;
                }
            }
            Command::Debug(level) => {
                self.set_debug_level(level)?;
                self.io()
                    .write_output(Output::info(format!("debug level set to {}", level)))?;
            }
            Command::Help => {
                let help = commands::format_help();
                self.io().write_output(Output::info(help))?;
            }
        }
        Ok(())
    }

    fn submit(&mut self, mode: EvalMode, source: &str) -> Result<(), ReplError> {
        let admission = self.controller.submit_as(mode, source)?;
        self.after_admission(admission)
    }

    fn after_admission(&mut self, admission: Admission) -> Result<(), ReplError> {
        match admission {
            Admission::Dispatched => self.settle(),
            Admission::Rejected => {
                self.io()
                    .write_output(Output::error("the engine is still busy"))?;
                Ok(())
            }
        }
    }

    /// Pump events until the request in flight finishes or the engine
    /// blocks on a read nobody answered.
    fn settle(&mut self) -> Result<(), ReplError> {
        while self.controller.is_locked() {
            if self.controller.parked_reads() > 0 {
                self.io().write_output(Output::info(
                    "the engine is waiting for input; the next non-command line goes to it",
                ))?;
                break;
            }
            let event = self.events.blocking_recv().ok_or(ReplError::Disconnected)?;
            self.controller.handle_event(event)?;
        }
        Ok(())
    }

    /// Handle events that arrived outside a request, such as debug level
    /// acknowledgements.
    fn drain(&mut self) -> Result<(), ReplError> {
        loop {
            match self.events.try_recv() {
                Ok(event) => {
                    self.controller.handle_event(event)?;
                }
                Err(TryRecvError::Empty) => return Ok(()),
                Err(TryRecvError::Disconnected) => {
                    debug!("event channel closed");
                    return Err(ReplError::Disconnected);
                }
            }
        }
    }
}

const BANNER: &str = r#"
  _      _     _
 (_) ___| |__ (_) __ _  ___
 | |/ __| '_ \| |/ _` |/ _ \
 | | (__| | | | | (_| | (_) |
 |_|\___|_| |_|_|\__, |\___/
                 |___/

Type :help for available commands, :exit to quit.
"#;
