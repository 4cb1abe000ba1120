//! Shell task
//!
//! Reads command lines from the console and runs them against the bridge.

use embassy_time::{Delay, Duration, Instant, Timer};
use embedded_io_async::Read;

use crate::dispatcher::{report_error, Clock, CommandHandler};
use crate::serial::{ConsoleReader, ReadResult};
use crate::tasks::{Bridge, SharedConsole};

/// Embassy monotonic time
pub struct EmbassyClock;

impl Clock for EmbassyClock {
    fn now_ms(&self) -> u64 {
        Instant::now().as_millis()
    }
}

/// Back-off after a console read fails or reports no input
const READ_RETRY_MS: u64 = 10;

pub async fn shell_task<R: Read>(
    mut console_rx: R,
    console_tx: &'static SharedConsole,
    bridge: &'static Bridge,
) -> ! {
    let mut reader = ConsoleReader::new();
    let mut handler = CommandHandler::new(EmbassyClock, Delay);

    loop {
        match reader.read_command(&mut console_rx).await {
            ReadResult::Command(command) => {
                let mut tx = console_tx.lock().await;
                let _ = handler.execute(command, bridge, &mut *tx).await;
            }
            ReadResult::ParseError(error) => {
                let mut tx = console_tx.lock().await;
                let _ = report_error(&mut *tx, error).await;
            }
            ReadResult::ConsoleError(_) => {
                reader.reset();
                Timer::after(Duration::from_millis(READ_RETRY_MS)).await;
            }
            // Partial line is kept for the next read
            ReadResult::Closed => Timer::after(Duration::from_millis(READ_RETRY_MS)).await,
        }
    }
}
