use reedline::{Completer, Span, Suggestion};

use crate::commands::COMMANDS;

/// Completes colon commands at the start of a line.
#[derive(Default)]
pub struct ReplCompleter;

impl ReplCompleter {
    pub fn new() -> Self {
        Self
    }
}

impl Completer for ReplCompleter {
    fn complete(&mut self, line: &str, pos: usize) -> Vec<Suggestion> {
        let line_to_pos = &line[..pos];
        let prefix = line_to_pos.trim_start();

        // Engine source is not completed.
        if !prefix.starts_with(':') || prefix.contains(char::is_whitespace) {
            return Vec::new();
        }
        let start = pos - prefix.len();

        COMMANDS
            .iter()
            .filter(|cmd| cmd.starts_with(prefix))
            .map(|cmd| Suggestion {
                value: cmd.to_string(),
                description: Some(command_description(cmd).to_string()),
                style: None,
                extra: None,
                span: Span::new(start, pos),
                append_whitespace: true,
                match_indices: None,
            })
            .collect()
    }
}

fn command_description(cmd: &str) -> &'static str {
    match cmd {
        ":quote" => "Evaluate and print as a datum",
        ":all" => "Evaluate every form",
        ":load" => "Evaluate a file",
        ":test" => "Run the test suite",
        ":debug" => "Set the engine debug level",
        ":help" => "Show help",
        ":exit" | ":quit" => "Exit the REPL",
        _ => "",
    }
}
