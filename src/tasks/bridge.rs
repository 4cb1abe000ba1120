//! Bridge task: BLE UART to console
//!
//! Forwards everything the peer writes to RXD out of the console.

use embassy_time::{Duration, Timer};

use crate::config::console::BRIDGE_POLL_MS;
use crate::dispatcher::forward_pending;
use crate::tasks::{Bridge, SharedConsole};

/// Poll the RX FIFO and copy its contents to the console
pub async fn bridge_task(bridge: &'static Bridge, console: &'static SharedConsole) -> ! {
    loop {
        if bridge.available() > 0 {
            let mut tx = console.lock().await;
            // Host may not be listening; the bytes are gone either way
            let _ = forward_pending(bridge, &mut *tx).await;
        }

        Timer::after(Duration::from_millis(BRIDGE_POLL_MS as u64)).await;
    }
}
