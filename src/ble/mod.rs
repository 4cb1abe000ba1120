//! Bluetooth Low Energy module
//!
//! GATT services for the BLE UART bridge: the Nordic UART Service carrying
//! the byte stream, plus GAP and Device Information. Everything here talks
//! to the BLE host through [`gatt::GattHost`].

pub mod bleuart;
pub mod dis;
pub mod gap;
pub mod gatt;
pub mod service;
pub mod uuid;

pub use bleuart::{BleUart, BridgeStats, GapEvent};
pub use gatt::{AccessError, GattHost, HostError};
pub use service::{GattRegistrar, GattService};
