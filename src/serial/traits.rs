//! Console error type and mock console
//!
//! The console is any `embedded_io_async` reader/writer, so the USB serial
//! driver and the test mock are interchangeable.

/// Errors that can occur during console operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerialError {
    /// Framing error in received data
    FramingError,
    /// Buffer overflow
    OverflowError,
    /// Write error
    WriteError,
}

impl embedded_io::Error for SerialError {
    fn kind(&self) -> embedded_io::ErrorKind {
        match self {
            SerialError::FramingError => embedded_io::ErrorKind::InvalidData,
            SerialError::OverflowError => embedded_io::ErrorKind::OutOfMemory,
            SerialError::WriteError => embedded_io::ErrorKind::Other,
        }
    }
}
