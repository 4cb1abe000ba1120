#![cfg_attr(not(test), no_std)]

pub mod ble;
pub mod commands;
pub mod config;
pub mod debug;
pub mod dispatcher;
pub mod fifo;
pub mod protocol;
pub mod serial;

// Tasks depend on the ESP HAL and BLE stack, only available with embedded feature
#[cfg(feature = "embedded")]
pub mod tasks;
