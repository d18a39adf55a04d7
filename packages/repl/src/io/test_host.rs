//! Test host implementation for in-memory I/O testing.
//!
//! Inputs and continuation lines are queued and consumed in order;
//! everything written is buffered for later inspection.

use std::collections::VecDeque;

use ichigo_runtime::{SuiteReport, Terminal};

use super::{Input, IoError, IoHost, Output, OutputStyle};

/// Test host with in-memory I/O buffers.
#[derive(Debug, Default)]
pub struct TestHost {
    /// Queue of inputs returned by `read_input()`.
    input_queue: VecDeque<Input>,
    /// Lines handed to an engine blocked on a read.
    line_queue: VecDeque<String>,
    /// Engine output and echoed input, as written.
    transcript: String,
    /// REPL messages.
    output_buffer: Vec<Output>,
    /// Finished suite tallies.
    reports: Vec<SuiteReport>,
    /// Number of finished requests.
    requests: usize,
    /// Lines handed straight to the engine.
    discarded_echoes: usize,
}

impl TestHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a line to be returned by `read_input()`.
    pub fn queue_input(&mut self, line: impl Into<String>) {
        self.input_queue.push_back(Input::Line(line.into()));
    }

    /// Queue multiple input lines.
    pub fn queue_inputs(&mut self, lines: impl IntoIterator<Item = impl Into<String>>) {
        for line in lines {
            self.queue_input(line);
        }
    }

    /// Queue a non-line input such as `Input::Eof`.
    pub fn queue_signal(&mut self, input: Input) {
        self.input_queue.push_back(input);
    }

    /// Queue a continuation line for a blocking read.
    pub fn queue_line(&mut self, line: impl Into<String>) {
        self.line_queue.push_back(line.into());
    }

    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    pub fn reports(&self) -> &[SuiteReport] {
        &self.reports
    }

    pub fn requests(&self) -> usize {
        self.requests
    }

    pub fn discarded_echoes(&self) -> usize {
        self.discarded_echoes
    }

    /// Get REPL messages of a specific style.
    pub fn output_with_style(&self, style: OutputStyle) -> Vec<&str> {
        self.output_buffer
            .iter()
            .filter(|o| o.style == style)
            .map(|o| o.text.as_str())
            .collect()
    }

    pub fn errors(&self) -> Vec<&str> {
        self.output_with_style(OutputStyle::Error)
    }
}

impl Terminal for TestHost {
    fn write(&mut self, text: &str) {
        self.transcript.push_str(text);
    }

    fn end_request(&mut self) {
        self.requests += 1;
        self.transcript.push('\n');
    }

    fn report(&mut self, report: &SuiteReport) {
        self.reports.push(*report);
    }

    fn read_line(&mut self) -> Option<String> {
        self.line_queue.pop_front()
    }
}

impl IoHost for TestHost {
    fn read_input(&mut self) -> Result<Input, IoError> {
        // An exhausted queue behaves like Ctrl+D.
        Ok(self.input_queue.pop_front().unwrap_or(Input::Eof))
    }

    fn write_output(&mut self, output: Output) -> Result<(), IoError> {
        self.output_buffer.push(output);
        Ok(())
    }

    fn discard_echo(&mut self) {
        self.discarded_echoes += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inputs_are_returned_in_order() {
        let mut host = TestHost::new();
        host.queue_inputs(["one", "two"]);
        assert_eq!(host.read_input().unwrap(), Input::Line("one".into()));
        assert_eq!(host.read_input().unwrap(), Input::Line("two".into()));
        assert_eq!(host.read_input().unwrap(), Input::Eof);
    }

    #[test]
    fn lines_feed_blocking_reads() {
        let mut host = TestHost::new();
        host.queue_line(" 2)");
        assert_eq!(host.read_line().as_deref(), Some(" 2)"));
        assert_eq!(host.read_line(), None);
    }

    #[test]
    fn transcript_collects_terminal_writes() {
        let mut host = TestHost::new();
        host.write("'a\n");
        host.write("A");
        host.end_request();
        assert_eq!(host.transcript(), "'a\nA\n");
        assert_eq!(host.requests(), 1);
    }

    #[test]
    fn errors_are_filtered_by_style() {
        let mut host = TestHost::new();
        host.write_output(Output::info("hello")).unwrap();
        host.write_output(Output::error("bad")).unwrap();
        assert_eq!(host.errors(), vec!["bad"]);
    }
}
