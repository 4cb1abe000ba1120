pub mod parser;
pub mod types;

pub use parser::CommandParser;
pub use types::{CommandError, NusTestReport, ShellCommand, TxPayload};
