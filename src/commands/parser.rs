//! Command parser for console lines
//!
//! Parses one line of shell input into a [`ShellCommand`].

use crate::commands::types::{CommandError, ShellCommand, TxPayload};
use crate::config::nustest;
use heapless::{String, Vec};

/// Parser for shell commands
pub struct CommandParser;

impl CommandParser {
    /// Create a new command parser
    pub fn new() -> Self {
        Self
    }

    /// Parse a line (without its terminator) into a command
    pub fn parse(&self, line: &str) -> Result<ShellCommand, CommandError> {
        let line = line.trim();
        let (name, rest) = match line.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (line, ""),
        };

        match name {
            "bleuarttx" => Self::parse_tx(rest),
            "bleuartrx" => Ok(ShellCommand::BleUartRx),
            "nustest" => Self::parse_nustest(rest),
            "help" | "?" => Ok(ShellCommand::Help),
            _ => Err(CommandError::UnknownCommand),
        }
    }

    fn parse_tx(arg: &str) -> Result<ShellCommand, CommandError> {
        if arg.is_empty() {
            return Err(CommandError::MissingArgument);
        }

        let size = bytearray_size(arg);
        if size > 0 {
            let mut bytes = Vec::new();
            bytes
                .resize_default(size)
                .map_err(|_| CommandError::LineTooLong)?;
            let parsed = parse_bytearray(arg, &mut bytes);
            bytes.truncate(parsed);
            return Ok(ShellCommand::BleUartTx(TxPayload::Bytes(bytes)));
        }

        let mut text = String::new();
        text.push_str(arg).map_err(|_| CommandError::LineTooLong)?;
        Ok(ShellCommand::BleUartTx(TxPayload::Text(text)))
    }

    fn parse_nustest(args: &str) -> Result<ShellCommand, CommandError> {
        let mut words = args.split_whitespace();
        let count = parse_u32(words.next(), nustest::DEFAULT_COUNT)?;
        let size = parse_u32(words.next(), nustest::DEFAULT_SIZE)?;

        if count > nustest::MAX_COUNT {
            return Err(CommandError::CountTooLarge);
        }
        if size > nustest::MAX_SIZE {
            return Err(CommandError::SizeTooLarge);
        }

        Ok(ShellCommand::NusTest { count, size })
    }
}

impl Default for CommandParser {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_u32(word: Option<&str>, default: u32) -> Result<u32, CommandError> {
    match word {
        Some(w) => w.parse().map_err(|_| CommandError::InvalidNumber),
        None => Ok(default),
    }
}

/// Count the bytes in an `AA-BB-CC` byte array.
///
/// Every byte must be exactly two hex digits and bytes must be separated by
/// single dashes. A single trailing dash is tolerated. Any other input
/// returns 0.
pub fn bytearray_size(s: &str) -> usize {
    let bytes = s.as_bytes();
    let mut count = 0;
    let mut pos = 0;

    while pos < bytes.len() {
        let pair = match bytes.get(pos..pos + 2) {
            Some(pair) => pair,
            None => return 0,
        };
        if !pair.iter().all(u8::is_ascii_hexdigit) {
            return 0;
        }
        count += 1;

        match bytes.get(pos + 2) {
            None => return count,
            Some(b'-') => pos += 3,
            Some(_) => return 0,
        }
    }

    count
}

/// Convert a dash-separated hex string into `out`.
///
/// Stops at the first element that is not one or two hex digits, or when
/// `out` is full. Returns the number of bytes written.
pub fn parse_bytearray(s: &str, out: &mut [u8]) -> usize {
    let mut count = 0;

    for part in s.split('-') {
        if count == out.len() || part.is_empty() || part.len() > 2 {
            break;
        }
        match u8::from_str_radix(part, 16) {
            Ok(value) => {
                out[count] = value;
                count += 1;
            }
            Err(_) => break,
        }
    }

    count
}
