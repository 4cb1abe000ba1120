//! Embassy tasks module
//!
//! Contains all async tasks for the firmware, organised by functionality.

pub mod ble;
pub mod bridge;
pub mod led;
pub mod shell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex;
use esp_hal::usb_serial_jtag::UsbSerialJtagTx;
use esp_hal::Async;

use crate::ble::bleuart::BleUart;
use crate::config;

pub use ble::{ble_task, TroubleGattHost};
pub use bridge::bridge_task;
pub use led::led_task;
pub use shell::shell_task;

/// The BLE UART bridge as wired on the device
pub type Bridge = BleUart<
    'static,
    CriticalSectionRawMutex,
    TroubleGattHost,
    { config::bleuart::RX_BUFFER_SIZE },
>;

/// Console output shared by the shell, the bridge and the log writer
pub type SharedConsole = Mutex<CriticalSectionRawMutex, UsbSerialJtagTx<'static, Async>>;
