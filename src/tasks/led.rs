//! LED task: heartbeat blink

use embassy_time::{Duration, Timer};
use embedded_hal::digital::StatefulOutputPin;

use crate::config::led::BLINK_PERIOD_MS;

/// Toggle the LED once per blink period, forever
pub async fn led_task<P: StatefulOutputPin>(mut led: P) -> ! {
    loop {
        Timer::after(Duration::from_millis(BLINK_PERIOD_MS as u64)).await;
        let _ = led.toggle();
    }
}
