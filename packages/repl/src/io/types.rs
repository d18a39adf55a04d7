//! I/O types for the REPL.

/// What the user did at the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// A line was entered.
    Line(String),
    /// User pressed Ctrl+C.
    Interrupt,
    /// User pressed Ctrl+D.
    Eof,
}

/// Output produced by the REPL itself, as opposed to the engine.
#[derive(Debug, Clone)]
pub struct Output {
    pub text: String,
    pub style: OutputStyle,
}

impl Output {
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            style: OutputStyle::Error,
        }
    }

    pub fn info(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            style: OutputStyle::Info,
        }
    }

    pub fn banner(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            style: OutputStyle::Banner,
        }
    }
}

/// Style hint for output rendering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputStyle {
    #[default]
    Info,
    /// Error message (host may add red prefix).
    Error,
    /// Banner/startup message.
    Banner,
}

/// Reason the REPL exited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitReason {
    /// User typed `:exit` or `:quit`.
    UserExit,
    /// User pressed Ctrl+D.
    Eof,
}
