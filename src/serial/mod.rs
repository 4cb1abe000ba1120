pub mod reader;
pub mod traits;

pub use reader::{ConsoleReader, ReadResult};
pub use traits::SerialError;
