//! Line accumulator for the text console
//!
//! Accumulates bytes until a complete line (terminated by `\r` or `\n`) is
//! received.

use crate::config::console::MAX_LINE_LEN;
use heapless::Vec;

/// Completed input from the accumulator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineEvent {
    /// A non-empty line, without its terminator
    Line(Vec<u8, MAX_LINE_LEN>),
    /// A line was longer than the buffer and has been discarded
    Overflow,
}

/// Accumulates incoming bytes and extracts complete lines.
///
/// `\r\n` pairs and blank lines produce nothing. Bytes of an overlong line
/// are dropped up to its terminator, which then reports
/// [`LineEvent::Overflow`].
pub struct LineAccumulator {
    buffer: Vec<u8, MAX_LINE_LEN>,
    overflowed: bool,
}

impl LineAccumulator {
    /// Create a new empty line accumulator.
    pub fn new() -> Self {
        Self {
            buffer: Vec::new(),
            overflowed: false,
        }
    }

    /// Push a byte into the accumulator.
    ///
    /// Returns `Some` when a terminator completes a line or an overflow.
    pub fn push(&mut self, byte: u8) -> Option<LineEvent> {
        if byte == b'\r' || byte == b'\n' {
            if self.overflowed {
                self.overflowed = false;
                return Some(LineEvent::Overflow);
            }
            if self.buffer.is_empty() {
                return None;
            }
            return Some(LineEvent::Line(core::mem::take(&mut self.buffer)));
        }

        if self.overflowed {
            return None;
        }

        if self.buffer.push(byte).is_err() {
            self.buffer.clear();
            self.overflowed = true;
        }

        None
    }

    /// Reset the accumulator, discarding any partial line.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.overflowed = false;
    }

    /// Returns true if no partial line is in progress.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty() && !self.overflowed
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }
}

impl Default for LineAccumulator {
    fn default() -> Self {
        Self::new()
    }
}
