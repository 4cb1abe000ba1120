//! Log output via the console.
//!
//! Installs a `log` backend that formats records into a fixed buffer. A
//! writer task flushes the buffer to the console. Output is non-blocking and
//! lines are dropped when the buffer is full or the backend is not
//! initialised.

use core::cell::RefCell;
use core::fmt::Write as _;

use embassy_sync::blocking_mutex::raw::{CriticalSectionRawMutex, RawMutex};
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::mutex::Mutex as AsyncMutex;
use embassy_sync::signal::Signal;
use embedded_io_async::Write;
use heapless::String;
use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

/// Maximum length of a single log line
const MAX_DEBUG_MSG_LEN: usize = 128;

/// Pending output held between flushes
const DEBUG_BUFFER_LEN: usize = 1024;

/// Signal to indicate debug output is available
pub static DEBUG_SIGNAL: Signal<CriticalSectionRawMutex, ()> = Signal::new();

/// Buffer for pending debug output (protected by critical section mutex)
static DEBUG_BUFFER: Mutex<CriticalSectionRawMutex, RefCell<Option<String<DEBUG_BUFFER_LEN>>>> =
    Mutex::new(RefCell::new(None));

struct ConsoleLogger;

static LOGGER: ConsoleLogger = ConsoleLogger;

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let mut line: String<MAX_DEBUG_MSG_LEN> = String::new();
        let _ = write!(line, "[{}] {}", record.level(), record.args());
        write_debug(&line);
    }

    fn flush(&self) {}
}

/// Initialise the debug output system and install it as the `log` backend.
///
/// Must be called once during startup.
pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
    init_buffer();
    log::set_logger(&LOGGER)?;
    log::set_max_level(level);
    Ok(())
}

fn init_buffer() {
    DEBUG_BUFFER.lock(|cell| {
        cell.replace(Some(String::new()));
    });
}

/// Check if debug output is initialised.
pub fn is_init() -> bool {
    DEBUG_BUFFER.lock(|cell| cell.borrow().is_some())
}

/// Append a line to the buffer.
///
/// Returns false if the line was dropped, either because debug is not
/// initialised or because the buffer has no room for it.
pub fn write_debug(msg: &str) -> bool {
    DEBUG_BUFFER.lock(|cell| {
        let mut borrowed = cell.borrow_mut();
        let Some(buffer) = borrowed.as_mut() else {
            return false;
        };

        if buffer.capacity() - buffer.len() < msg.len() + 2 {
            return false;
        }
        let _ = buffer.push_str(msg);
        let _ = buffer.push_str("\r\n");
        DEBUG_SIGNAL.signal(());
        true
    })
}

/// Take all pending output from the buffer.
///
/// Returns None if nothing is waiting.
pub fn take_debug_output() -> Option<String<DEBUG_BUFFER_LEN>> {
    DEBUG_BUFFER.lock(|cell| {
        let mut borrowed = cell.borrow_mut();
        let buffer = borrowed.as_mut()?;
        if buffer.is_empty() {
            None
        } else {
            Some(core::mem::take(buffer))
        }
    })
}

/// Debug writer task that sends buffered log output to the console.
///
/// The console is shared with the shell and the bridge, so it is only held
/// while a batch is written.
pub async fn debug_writer_task<M: RawMutex, W: Write>(console: &AsyncMutex<M, W>) -> ! {
    loop {
        DEBUG_SIGNAL.wait().await;

        if let Some(output) = take_debug_output() {
            let mut console = console.lock().await;
            // Ignore errors, the host might not be listening
            let _ = console.write_all(output.as_bytes()).await;
        }
    }
}
