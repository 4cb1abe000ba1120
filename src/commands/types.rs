//! Shell command types
//!
//! Commands arrive as text lines on the console:
//!
//! | Command                     | Action                                        |
//! |-----------------------------|-----------------------------------------------|
//! | `bleuarttx <text>`          | Send text to the peer as one notification      |
//! | `bleuarttx AA-BB-CC`        | Send the given bytes as one notification       |
//! | `bleuartrx`                 | Print everything waiting in the RX FIFO        |
//! | `nustest [count] [size]`    | Throughput test: `count` packets of `size`     |
//! | `help`                      | List commands                                  |

use crate::config::console::MAX_LINE_LEN;
use heapless::{String, Vec};

/// Data for `bleuarttx`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxPayload {
    /// Rest of the command line, sent verbatim
    Text(String<MAX_LINE_LEN>),
    /// Bytes parsed from `AA-BB-CC` notation
    Bytes(Vec<u8, MAX_LINE_LEN>),
}

impl TxPayload {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            TxPayload::Text(s) => s.as_bytes(),
            TxPayload::Bytes(b) => b,
        }
    }
}

/// Parsed shell command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    BleUartTx(TxPayload),
    BleUartRx,
    NusTest { count: u32, size: u32 },
    Help,
}

/// Reasons a command line was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandError {
    /// First word is not a known command
    UnknownCommand,
    /// Command needs an argument that was not given
    MissingArgument,
    /// Argument is not a decimal number
    InvalidNumber,
    /// `nustest` count above the limit
    CountTooLarge,
    /// `nustest` packet size above the limit
    SizeTooLarge,
    /// Console line exceeded the line buffer
    LineTooLong,
}

impl CommandError {
    /// One-line message printed on the console
    pub fn message(self) -> &'static str {
        match self {
            CommandError::UnknownCommand => "unknown command, try 'help'",
            CommandError::MissingArgument => "missing argument",
            CommandError::InvalidNumber => "invalid number",
            CommandError::CountTooLarge => "count must not exceed 100",
            CommandError::SizeTooLarge => "size must not exceed 240",
            CommandError::LineTooLong => "line too long",
        }
    }
}

/// Outcome of one `nustest` run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NusTestReport {
    pub packets: u32,
    pub size: u32,
    /// Bytes handed to the bridge
    pub attempted: u32,
    /// Bytes the bridge accepted for sending
    pub accepted: u32,
    pub elapsed_ms: u32,
}

impl NusTestReport {
    /// Accepted bytes per millisecond, which is also KB/s.
    ///
    /// A run shorter than a millisecond counts as one millisecond.
    pub fn throughput_kbps(&self) -> u32 {
        self.accepted / self.elapsed_ms.max(1)
    }
}
