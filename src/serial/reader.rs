//! Console command reader
//!
//! Reads bytes from the console, accumulates lines and parses them into
//! shell commands.

use embedded_io_async::Read;

use crate::commands::parser::CommandParser;
use crate::commands::types::{CommandError, ShellCommand};
use crate::protocol::framing::{LineAccumulator, LineEvent};

const READ_CHUNK: usize = 64;

/// Result of attempting to read a command
#[derive(Debug)]
pub enum ReadResult<E> {
    /// Successfully parsed a command
    Command(ShellCommand),
    /// Line could not be parsed (should print an error)
    ParseError(CommandError),
    /// Console read failed
    ConsoleError(E),
    /// Console reported end of input
    Closed,
}

/// Console command reader
///
/// Bytes read past the end of a line are kept for the next call.
pub struct ConsoleReader {
    accumulator: LineAccumulator,
    parser: CommandParser,
    buf: [u8; READ_CHUNK],
    pos: usize,
    len: usize,
}

impl ConsoleReader {
    /// Create a new console reader
    pub fn new() -> Self {
        Self {
            accumulator: LineAccumulator::new(),
            parser: CommandParser::new(),
            buf: [0; READ_CHUNK],
            pos: 0,
            len: 0,
        }
    }

    /// Read until a complete line has been received and parse it
    pub async fn read_command<R: Read>(&mut self, console: &mut R) -> ReadResult<R::Error> {
        loop {
            while self.pos < self.len {
                let byte = self.buf[self.pos];
                self.pos += 1;

                if let Some(event) = self.accumulator.push(byte) {
                    return self.process_line(event);
                }
            }

            self.pos = 0;
            self.len = 0;
            match console.read(&mut self.buf).await {
                Ok(0) => return ReadResult::Closed,
                Ok(n) => self.len = n,
                Err(e) => return ReadResult::ConsoleError(e),
            }
        }
    }

    fn process_line<E>(&self, event: LineEvent) -> ReadResult<E> {
        let line = match event {
            LineEvent::Line(line) => line,
            LineEvent::Overflow => return ReadResult::ParseError(CommandError::LineTooLong),
        };

        // Non-UTF-8 input cannot name a command
        let Ok(text) = core::str::from_utf8(&line) else {
            return ReadResult::ParseError(CommandError::UnknownCommand);
        };

        match self.parser.parse(text) {
            Ok(cmd) => ReadResult::Command(cmd),
            Err(e) => ReadResult::ParseError(e),
        }
    }

    /// Reset the reader state, discarding buffered input
    pub fn reset(&mut self) {
        self.accumulator.reset();
        self.pos = 0;
        self.len = 0;
    }
}

impl Default for ConsoleReader {
    fn default() -> Self {
        Self::new()
    }
}
