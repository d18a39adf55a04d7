//! Styling for input and engine output.
//!
//! Comments start at `;` and run to the end of the line. They are dimmed
//! both while typing and in the transcript, so test annotations such as
//! `;; OK` stand apart from results.

use nu_ansi_term::{Color, Style};
use reedline::{Highlighter, StyledText};

use crate::commands::COMMANDS;

fn comment_style() -> Style {
    Style::new().fg(Color::DarkGray)
}

/// Split a line into its code and comment parts.
pub fn split_comment(line: &str) -> (&str, &str) {
    match line.find(';') {
        Some(pos) => line.split_at(pos),
        None => (line, ""),
    }
}

/// Render engine output for the terminal, dimming comments line by line.
pub fn render_output(text: &str) -> String {
    text.split('\n')
        .map(|line| {
            let (code, comment) = split_comment(line);
            if comment.is_empty() {
                code.to_string()
            } else {
                format!("{}{}", code, comment_style().paint(comment))
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Syntax highlighter for the REPL.
#[derive(Default)]
pub struct ReplHighlighter;

impl ReplHighlighter {
    pub fn new() -> Self {
        Self
    }
}

impl Highlighter for ReplHighlighter {
    fn highlight(&self, line: &str, _cursor: usize) -> StyledText {
        let mut styled = StyledText::new();

        if line.is_empty() {
            return styled;
        }

        if line.trim_start().starts_with(':') {
            let (command, rest) = match line.find(char::is_whitespace) {
                Some(pos) => line.split_at(pos),
                None => (line, ""),
            };
            let style = if COMMANDS.contains(&command.trim()) {
                Style::new().bold().fg(Color::Cyan)
            } else {
                Style::new().fg(Color::Red)
            };
            styled.push((style, command.to_string()));
            if !rest.is_empty() {
                styled.push((Style::new(), rest.to_string()));
            }
            return styled;
        }

        let (code, comment) = split_comment(line);
        let mut depth: usize = 0;
        for c in code.chars() {
            let style = match c {
                '(' => {
                    depth += 1;
                    Style::new().fg(Color::Yellow)
                }
                ')' if depth == 0 => Style::new().fg(Color::Red).bold(),
                ')' => {
                    depth -= 1;
                    Style::new().fg(Color::Yellow)
                }
                '\'' => Style::new().fg(Color::Magenta),
                _ => Style::new(),
            };
            styled.push((style, c.to_string()));
        }
        if !comment.is_empty() {
            styled.push((comment_style(), comment.to_string()));
        }

        styled
    }
}
