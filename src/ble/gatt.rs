//! GATT host contract
//!
//! This trait defines the calls the services make into the BLE host's
//! attribute server, allowing the real stack to be swapped with a mock for
//! testing. Registration mirrors the host convention of a counting pass that
//! reserves attribute-table slots followed by an installing pass.

use core::ops::BitOr;

use heapless::Vec;

use crate::ble::uuid::{AttrHandle, ConnHandle, Uuid};
use crate::config::ble::{MAX_ATTRIBUTE_VALUE, MAX_CHARACTERISTICS};

/// Errors reported by the BLE host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostError {
    /// Attribute table has no room for the requested service
    NoResources,
    /// Service registered without a successful counting pass
    NotReserved,
    /// Service definition declares more characteristics than fit
    TableFull,
    /// No buffer available for an outgoing PDU
    NoBuffers,
    /// Operation needs a connection and there is none
    NotConnected,
    /// Handle does not refer to a registered attribute
    InvalidHandle,
    /// Other host status code
    Stack(u16),
}

/// Reasons to refuse an attribute access from the peer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessError {
    ReadNotPermitted,
    WriteNotPermitted,
    AttributeNotFound,
    InvalidLength,
    Unlikely,
}

impl AccessError {
    /// ATT protocol error code sent back to the peer
    pub const fn att_code(self) -> u8 {
        match self {
            Self::ReadNotPermitted => 0x02,
            Self::WriteNotPermitted => 0x03,
            Self::AttributeNotFound => 0x0A,
            Self::InvalidLength => 0x0D,
            Self::Unlikely => 0x0E,
        }
    }
}

/// Characteristic property flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharacteristicFlags(u8);

impl CharacteristicFlags {
    pub const READ: Self = Self(0x02);
    pub const WRITE_NO_RSP: Self = Self(0x04);
    pub const WRITE: Self = Self(0x08);
    pub const NOTIFY: Self = Self(0x10);
    pub const INDICATE: Self = Self(0x20);

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Notify and indicate both need a client configuration descriptor
    pub const fn needs_cccd(self) -> bool {
        self.0 & (Self::NOTIFY.0 | Self::INDICATE.0) != 0
    }
}

impl BitOr for CharacteristicFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// One characteristic in a service table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharacteristicDef {
    pub uuid: Uuid,
    pub flags: CharacteristicFlags,
}

/// Declarative primary service table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDef {
    pub uuid: Uuid,
    pub characteristics: Vec<CharacteristicDef, MAX_CHARACTERISTICS>,
}

impl ServiceDef {
    /// Start a primary service with no characteristics
    pub const fn primary(uuid: Uuid) -> Self {
        Self {
            uuid,
            characteristics: Vec::new(),
        }
    }

    /// Append a characteristic
    pub fn with_characteristic(
        mut self,
        uuid: Uuid,
        flags: CharacteristicFlags,
    ) -> Result<Self, HostError> {
        self.characteristics
            .push(CharacteristicDef { uuid, flags })
            .map_err(|_| HostError::TableFull)?;
        Ok(self)
    }

    /// Attribute-table slots this service occupies: the service declaration,
    /// a declaration and a value per characteristic, plus a CCCD for every
    /// notifying characteristic.
    pub fn attribute_count(&self) -> usize {
        1 + self
            .characteristics
            .iter()
            .map(|c| if c.flags.needs_cccd() { 3 } else { 2 })
            .sum::<usize>()
    }

    /// Position of a characteristic in the table
    pub fn position(&self, uuid: &Uuid) -> Option<usize> {
        self.characteristics.iter().position(|c| c.uuid == *uuid)
    }

    pub fn contains(&self, uuid: &Uuid) -> bool {
        self.position(uuid).is_some()
    }
}

/// Delivered once per attribute while a service is being installed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterEvent {
    Service {
        uuid: Uuid,
        handle: AttrHandle,
    },
    Characteristic {
        uuid: Uuid,
        def_handle: AttrHandle,
        val_handle: AttrHandle,
    },
}

/// Value handles returned by hosts that report them directly, in table order.
/// Hosts that only report through the registration callback leave every
/// entry `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceHandles {
    pub value_handles: Vec<Option<AttrHandle>, MAX_CHARACTERISTICS>,
}

impl ServiceHandles {
    /// Value handle of the characteristic at `position`, if reported
    pub fn value_handle(&self, position: usize) -> Option<AttrHandle> {
        self.value_handles.get(position).copied().flatten()
    }
}

/// Kind of attribute access requested by the peer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessOp {
    ReadCharacteristic,
    WriteCharacteristic,
}

/// Value returned by a read access
pub type AttValue = Vec<u8, MAX_ATTRIBUTE_VALUE>;

/// One attribute access forwarded from the host
pub struct AccessContext<'a> {
    pub conn: ConnHandle,
    pub attr: AttrHandle,
    /// UUID of the characteristic being accessed
    pub uuid: Uuid,
    pub op: AccessOp,
    /// Payload of a write
    pub data: &'a [u8],
    /// Filled by the service on a read
    pub response: &'a mut AttValue,
}

/// BLE host attribute server interface
pub trait GattHost {
    /// Reserve attribute-table slots for `service`.
    ///
    /// Returns the number of slots reserved.
    fn count_configuration(&self, service: &ServiceDef) -> Result<usize, HostError>;

    /// Install `service`, calling `on_register` for the service and for each
    /// characteristic with the handles assigned to it.
    fn register_services(
        &self,
        service: &ServiceDef,
        on_register: &mut dyn FnMut(&RegisterEvent),
    ) -> Result<ServiceHandles, HostError>;

    /// Send a notification without waiting for it to go out
    fn notify_custom(
        &self,
        conn: ConnHandle,
        attr: AttrHandle,
        payload: &[u8],
    ) -> Result<(), HostError>;

    /// Start an ATT MTU exchange on `conn`
    fn exchange_mtu(&self, conn: ConnHandle) -> Result<(), HostError>;
}
