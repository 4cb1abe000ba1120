//! Firmware configuration constants for the Bluefruit BLE UART bridge

/// BLE UART (Nordic UART Service) bridge
pub mod bleuart {
    /// Depth of the RXD FIFO in bytes
    pub const RX_BUFFER_SIZE: usize = 128;

    /// Drop the oldest byte instead of the newest when the RXD FIFO is full
    pub const RX_OVERWRITE: bool = true;

    /// Largest value a single TXD notification may carry
    pub const MAX_NOTIFY_LEN: usize = 244;
}

/// `nustest` throughput benchmark limits
pub mod nustest {
    pub const DEFAULT_COUNT: u32 = 100;
    pub const DEFAULT_SIZE: u32 = 20;
    pub const MAX_COUNT: u32 = 100;
    pub const MAX_SIZE: u32 = 240;

    /// Payloads larger than the default ATT MTU allows trigger an MTU exchange
    pub const MTU_EXCHANGE_THRESHOLD: u32 = 20;

    /// Time allowed for the MTU exchange to settle before sending
    pub const MTU_SETTLE_MS: u32 = 500;
}

/// GAP identity
pub mod gap {
    pub const DEVICE_NAME: &str = "Adafruit Bluefruit";

    /// Generic appearance
    pub const APPEARANCE: u16 = 0x0000;
}

/// Device Information Service defaults
pub mod dis {
    pub const MODEL: &str = "Feather52";
    pub const FIRMWARE_REV: &str = "0.9.0";
    pub const HARDWARE_REV: &str = "ESP32-S3";
    pub const SOFTWARE_REV: &str = "0.9.0";
    pub const MANUFACTURER: &str = "Adafruit Industries";
}

/// BLE host sizing
pub mod ble {
    /// Maximum concurrent connections
    pub const CONNECTIONS_MAX: usize = 1;

    /// L2CAP channels (signal + att + spare)
    pub const L2CAP_CHANNELS_MAX: usize = 3;

    /// Attribute table slots available to registered services
    pub const ATTRIBUTE_TABLE_SIZE: usize = 32;

    /// Characteristics a single service definition may declare
    pub const MAX_CHARACTERISTICS: usize = 8;

    /// Services a registrar can compose
    pub const MAX_SERVICES: usize = 4;

    /// Largest attribute value served from a read callback
    pub const MAX_ATTRIBUTE_VALUE: usize = 64;

    /// Pending notifications queued for the connection loop.
    /// Writes beyond this depth are refused until the link drains.
    pub const NOTIFY_QUEUE_DEPTH: usize = 16;
}

/// Console (USB serial) configuration
pub mod console {
    /// Longest shell command line accepted
    pub const MAX_LINE_LEN: usize = 256;

    /// Chunk size used when forwarding BLE bytes to the console
    pub const FORWARD_CHUNK: usize = 64;

    /// Delay between empty polls of the RXD FIFO
    pub const BRIDGE_POLL_MS: u32 = 1;
}

/// Status LED
pub mod led {
    pub const BLINK_PERIOD_MS: u32 = 1000;
}
