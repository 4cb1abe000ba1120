//! Shell command execution

pub mod handler;

pub use handler::{forward_pending, report_error, Clock, CommandHandler};
