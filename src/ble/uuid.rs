//! UUIDs and handle types for the GATT services

/// A GATT UUID.
///
/// 128-bit UUIDs are stored little-endian, in the byte order they travel on
/// the air.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Uuid {
    Uuid16(u16),
    Uuid128([u8; 16]),
}

impl Uuid {
    /// Build a 128-bit UUID from its canonical (big-endian) integer form
    pub const fn from_u128(value: u128) -> Self {
        Self::Uuid128(value.to_le_bytes())
    }

    /// The 16-bit alias of this UUID.
    ///
    /// For vendor 128-bit UUIDs this is the pair of bytes 12..14, which is
    /// where the Nordic UART Service encodes its characteristic number.
    pub const fn uuid16(&self) -> u16 {
        match self {
            Self::Uuid16(v) => *v,
            Self::Uuid128(bytes) => u16::from_le_bytes([bytes[12], bytes[13]]),
        }
    }
}

/// Nordic UART Service
pub const NUS_SERVICE: Uuid = Uuid::from_u128(0x6e400001_b5a3_f393_e0a9_e50e24dcca9e);
/// RXD characteristic: the peer writes bytes to the device here
pub const NUS_RXD: Uuid = Uuid::from_u128(0x6e400002_b5a3_f393_e0a9_e50e24dcca9e);
/// TXD characteristic: the device notifies bytes to the peer here
pub const NUS_TXD: Uuid = Uuid::from_u128(0x6e400003_b5a3_f393_e0a9_e50e24dcca9e);

pub const NUS_RXD_UUID16: u16 = 0x0002;
pub const NUS_TXD_UUID16: u16 = 0x0003;

/// Generic Access service and its characteristics
pub const GAP_SERVICE: Uuid = Uuid::Uuid16(0x1800);
pub const GAP_DEVICE_NAME: Uuid = Uuid::Uuid16(0x2A00);
pub const GAP_APPEARANCE: Uuid = Uuid::Uuid16(0x2A01);

/// Device Information service
pub const DIS_SERVICE: Uuid = Uuid::Uuid16(0x180A);
/// First DIS string characteristic; the rest follow consecutively
pub const DIS_MODEL_NUMBER: u16 = 0x2A24;
pub const DIS_SERIAL_NUMBER: u16 = 0x2A25;
pub const DIS_FIRMWARE_REV: u16 = 0x2A26;
pub const DIS_HARDWARE_REV: u16 = 0x2A27;
pub const DIS_SOFTWARE_REV: u16 = 0x2A28;
pub const DIS_MANUFACTURER_NAME: u16 = 0x2A29;

/// Handle of one BLE link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnHandle(pub u16);

impl ConnHandle {
    /// Raw value the host uses for "no connection"
    pub const NONE_RAW: u16 = 0xFFFF;

    /// Convert a raw host handle, mapping the "none" sentinel to `None`
    pub const fn from_raw(raw: u16) -> Option<Self> {
        if raw == Self::NONE_RAW {
            None
        } else {
            Some(Self(raw))
        }
    }

    pub const fn raw(self) -> u16 {
        self.0
    }
}

/// Handle of one attribute in the host's table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttrHandle(pub u16);

impl AttrHandle {
    pub const fn raw(self) -> u16 {
        self.0
    }
}
