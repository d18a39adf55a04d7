//! REPL command parsing.
//!
//! Anything not starting with `:` is source text for the engine.
//!
//! - `:quote <form>` - evaluate and print as a datum
//! - `:all <forms>` - evaluate every form
//! - `:load <file>` - evaluate every form in a file
//! - `:test` - run the loaded test suite
//! - `:debug <level>` - set the engine's debug level
//! - `:help` - show help
//! - `:exit` / `:quit` / `:q` - exit the REPL

use std::path::PathBuf;

use nu_ansi_term::Color;

/// A parsed line of input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Nothing to do.
    Empty,
    Eval(String),
    Quote(String),
    All(String),
    Load(PathBuf),
    Test,
    Debug(i32),
    Help,
    Exit,
}

/// Names of the colon commands, used for completion and highlighting.
pub const COMMANDS: &[&str] = &[
    ":quote", ":all", ":load", ":test", ":debug", ":help", ":exit", ":quit",
];

/// Whether `line` is a colon command rather than engine source.
pub fn is_command(line: &str) -> bool {
    line.trim_start().starts_with(':')
}

/// Parse one line of input.
pub fn parse(line: &str) -> Result<Command, String> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(Command::Empty);
    }
    if !is_command(trimmed) {
        return Ok(Command::Eval(line.to_string()));
    }

    let (name, rest) = match trimmed.find(char::is_whitespace) {
        Some(pos) => (&trimmed[..pos], trimmed[pos..].trim()),
        None => (trimmed, ""),
    };

    match name {
        ":quote" => require_arg(name, rest).map(|arg| Command::Quote(arg.to_string())),
        ":all" => require_arg(name, rest).map(|arg| Command::All(arg.to_string())),
        ":load" => require_arg(name, rest).map(|arg| Command::Load(PathBuf::from(arg))),
        ":test" => Ok(Command::Test),
        ":debug" => {
            let level = require_arg(name, rest)?;
            level
                .parse()
                .map(Command::Debug)
                .map_err(|_| format!("{}: expected an integer level, got '{}'", name, level))
        }
        ":help" | ":h" => Ok(Command::Help),
        ":exit" | ":quit" | ":q" => Ok(Command::Exit),
        _ => Err(format!("unknown command: {} (try :help)", name)),
    }
}

fn require_arg<'a>(name: &str, rest: &'a str) -> Result<&'a str, String> {
    if rest.is_empty() {
        Err(format!("{} needs an argument", name))
    } else {
        Ok(rest)
    }
}

/// Help text.
pub fn format_help() -> String {
    let cmd = |s: &str| Color::Cyan.bold().paint(s.to_string()).to_string();
    [
        format!("{}", Color::Green.bold().paint("ichigo REPL")),
        String::new(),
        "Type a form to evaluate it, e.g. (car '(a b c))".to_string(),
        String::new(),
        format!("  {}  evaluate and print as a datum", cmd(":quote <form>")),
        format!("  {}   evaluate every form", cmd(":all <forms>")),
        format!("  {}   evaluate every form in a file", cmd(":load <file>")),
        format!("  {}          run the test suite", cmd(":test")),
        format!("  {}  set the engine debug level", cmd(":debug <level>")),
        format!("  {}          show this help", cmd(":help")),
        format!("  {}          exit", cmd(":exit")),
    ]
    .join("\n")
}
