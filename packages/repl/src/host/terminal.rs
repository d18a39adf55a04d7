//! Terminal host implementation using Reedline.
//!
//! This host provides interactive terminal I/O with:
//! - Readline-style line editing (Vi and Emacs modes)
//! - Tab completion for colon commands
//! - Paren and comment highlighting
//! - Command history

use std::borrow::Cow;
use std::io::{self, Write};
use std::path::PathBuf;

use ichigo_runtime::{SuiteReport, Terminal};
use nu_ansi_term::{Color, Style};
use reedline::{
    default_emacs_keybindings, default_vi_insert_keybindings, default_vi_normal_keybindings,
    ColumnarMenu, DefaultHinter, EditMode, Emacs, FileBackedHistory, KeyCode, KeyModifiers,
    MenuBuilder, Prompt, PromptEditMode, PromptHistorySearch, PromptHistorySearchStatus,
    Reedline, ReedlineEvent, ReedlineMenu, Signal, Vi,
};
use tracing::warn;

use crate::completer::ReplCompleter;
use crate::highlighter::{render_output, ReplHighlighter};
use crate::io::{Input, IoError, IoHost, Output, OutputStyle};

/// Terminal host using Reedline for interactive I/O.
pub struct TerminalHost {
    line_editor: Reedline,
    echo: EchoFilter,
}

/// Drops the controller's echo of a line reedline already left on screen.
#[derive(Debug, Default)]
struct EchoFilter {
    typed: Option<String>,
}

impl EchoFilter {
    fn typed(&mut self, line: &str) {
        self.typed = Some(line.to_string());
    }

    fn discard(&mut self) {
        self.typed = None;
    }

    /// Whether `text` should reach the screen. Only the first write after
    /// a typed line is checked.
    fn passes(&mut self, text: &str) -> bool {
        match self.typed.take() {
            Some(typed) => text.strip_suffix('\n') != Some(typed.as_str()),
            None => true,
        }
    }
}

impl TerminalHost {
    /// Create a new terminal host.
    pub fn new() -> io::Result<Self> {
        let completer = Box::new(ReplCompleter::new());
        let highlighter = Box::new(ReplHighlighter::new());
        let hinter = Box::new(
            DefaultHinter::default().with_style(Style::new().fg(Color::LightGray).dimmed()),
        );

        let completion_menu = Box::new(
            ColumnarMenu::default()
                .with_name("completion_menu")
                .with_text_style(Style::new().fg(Color::Cyan))
                .with_selected_text_style(Style::new().fg(Color::Black).on(Color::Cyan).bold()),
        );

        let complete = ReedlineEvent::UntilFound(vec![
            ReedlineEvent::Menu("completion_menu".to_string()),
            ReedlineEvent::MenuNext,
        ]);
        let edit_mode: Box<dyn EditMode> = if should_use_vi_mode() {
            let mut insert_keybindings = default_vi_insert_keybindings();
            insert_keybindings.add_binding(KeyModifiers::NONE, KeyCode::Tab, complete);
            Box::new(Vi::new(insert_keybindings, default_vi_normal_keybindings()))
        } else {
            let mut keybindings = default_emacs_keybindings();
            keybindings.add_binding(KeyModifiers::NONE, KeyCode::Tab, complete);
            Box::new(Emacs::new(keybindings))
        };

        let mut line_editor = Reedline::create()
            .with_completer(completer)
            .with_highlighter(highlighter)
            .with_hinter(hinter)
            .with_menu(ReedlineMenu::EngineCompleter(completion_menu))
            .with_edit_mode(edit_mode);

        if let Some(history_path) = get_history_path() {
            if let Some(parent) = history_path.parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            match FileBackedHistory::with_file(1000, history_path) {
                Ok(history) => line_editor = line_editor.with_history(Box::new(history)),
                Err(e) => warn!("history disabled: {}", e),
            }
        }

        Ok(Self {
            line_editor,
            echo: EchoFilter::default(),
        })
    }

    fn print(&self, text: &str) {
        print!("{}", text);
        let _ = io::stdout().flush();
    }
}

impl Terminal for TerminalHost {
    fn write(&mut self, text: &str) {
        if self.echo.passes(text) {
            self.print(&render_output(text));
        }
    }

    fn end_request(&mut self) {
        self.print("\n");
    }

    fn report(&mut self, report: &SuiteReport) {
        let passed = Color::Green.bold().paint(format!("pass: {}", report.passed));
        let failed = if report.failed == 0 {
            Style::new().paint(format!("fail: {}", report.failed))
        } else {
            Color::Red.bold().paint(format!("fail: {}", report.failed))
        };
        println!("{}  {}", passed, failed);
    }

    fn read_line(&mut self) -> Option<String> {
        match self.line_editor.read_line(&EnginePrompt::Continuation) {
            Ok(Signal::Success(line)) => Some(line),
            Ok(_) => None,
            Err(e) => {
                warn!("reading a continuation line failed: {}", e);
                None
            }
        }
    }
}

impl IoHost for TerminalHost {
    fn read_input(&mut self) -> Result<Input, IoError> {
        match self.line_editor.read_line(&EnginePrompt::Command) {
            Ok(Signal::Success(line)) => {
                self.echo.typed(&line);
                Ok(Input::Line(line))
            }
            Ok(Signal::CtrlC) => Ok(Input::Interrupt),
            Ok(Signal::CtrlD) => Ok(Input::Eof),
            Err(e) => Err(IoError::Io(format!("Reedline error: {}", e))),
        }
    }

    fn write_output(&mut self, output: Output) -> Result<(), IoError> {
        let styled = match output.style {
            OutputStyle::Error => {
                format!("{} {}", Color::Red.bold().paint("Error:"), output.text)
            }
            OutputStyle::Info => Color::Cyan.paint(&output.text).to_string(),
            OutputStyle::Banner => Color::Red.bold().paint(&output.text).to_string(),
        };
        println!("{}", styled);
        Ok(())
    }

    fn discard_echo(&mut self) {
        self.echo.discard();
    }

    fn flush(&mut self) -> Result<(), IoError> {
        io::stdout().flush().map_err(|e| IoError::Io(e.to_string()))
    }
}

/// Prompts for a new command and for a line the engine asked for.
enum EnginePrompt {
    Command,
    Continuation,
}

impl Prompt for EnginePrompt {
    fn render_prompt_left(&self) -> Cow<'_, str> {
        Cow::Borrowed("")
    }

    fn render_prompt_right(&self) -> Cow<'_, str> {
        Cow::Borrowed("")
    }

    fn render_prompt_indicator(&self, edit_mode: PromptEditMode) -> Cow<'_, str> {
        if let EnginePrompt::Continuation = self {
            return Cow::Owned(format!("{} ", Color::DarkGray.paint("..")));
        }
        match edit_mode {
            PromptEditMode::Vi(reedline::PromptViMode::Normal) => {
                Cow::Owned(format!("{} ", Color::Blue.bold().paint("[N]>")))
            }
            PromptEditMode::Custom(s) => Cow::Owned(format!("({})> ", s)),
            _ => Cow::Owned(format!("{} ", Color::Green.bold().paint(">"))),
        }
    }

    fn render_prompt_multiline_indicator(&self) -> Cow<'_, str> {
        Cow::Borrowed(": ")
    }

    fn render_prompt_history_search_indicator(
        &self,
        history_search: PromptHistorySearch,
    ) -> Cow<'_, str> {
        let prefix = match history_search.status {
            PromptHistorySearchStatus::Passing => "",
            PromptHistorySearchStatus::Failing => "failing ",
        };
        Cow::Owned(format!(
            "({}reverse-search: {}) ",
            prefix, history_search.term
        ))
    }
}

fn get_history_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|p| p.join("ichigo").join("history.txt"))
}

/// Whether to edit in vi mode.
///
/// `ICHIGO_EDIT_MODE` wins; otherwise `EDITOR`, `VISUAL` and inputrc are
/// consulted.
fn should_use_vi_mode() -> bool {
    if let Ok(mode) = std::env::var("ICHIGO_EDIT_MODE") {
        return is_vi(&mode);
    }
    for var in ["EDITOR", "VISUAL"] {
        if std::env::var(var).is_ok_and(|editor| is_vi(&editor)) {
            return true;
        }
    }
    check_inputrc_vi_mode()
}

fn is_vi(name: &str) -> bool {
    let name = name.to_lowercase();
    name.contains("vim") || name == "vi"
}

/// Check .inputrc for vi mode setting.
fn check_inputrc_vi_mode() -> bool {
    let inputrc_paths = [
        std::env::var("INPUTRC").ok().map(PathBuf::from),
        dirs::home_dir().map(|p| p.join(".inputrc")),
        Some(PathBuf::from("/etc/inputrc")),
    ];

    inputrc_paths
        .into_iter()
        .flatten()
        .filter_map(|path| std::fs::read_to_string(path).ok())
        .any(|content| {
            content.lines().map(str::trim).any(|line| {
                line.starts_with("set") && line.contains("editing-mode") && line.contains("vi")
            })
        })
}
