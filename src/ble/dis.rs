//! Device Information Service
//!
//! Read-only strings describing the device. Only the fields that are
//! configured appear in the service table.

use crate::ble::gatt::{
    AccessContext, AccessError, AccessOp, CharacteristicFlags, HostError, ServiceDef,
};
use crate::ble::service::GattService;
use crate::ble::uuid::{
    Uuid, DIS_FIRMWARE_REV, DIS_HARDWARE_REV, DIS_MANUFACTURER_NAME, DIS_MODEL_NUMBER,
    DIS_SERVICE, DIS_SOFTWARE_REV,
};
use crate::config;

const FIELD_COUNT: usize = (DIS_MANUFACTURER_NAME - DIS_MODEL_NUMBER) as usize + 1;

/// Characteristics declared by the device's attribute table, in table
/// order. One for each field [`DeviceInfo::from_config`] sets.
pub const DEVICE_TABLE: [Uuid; 5] = [
    Uuid::Uuid16(DIS_MODEL_NUMBER),
    Uuid::Uuid16(DIS_FIRMWARE_REV),
    Uuid::Uuid16(DIS_HARDWARE_REV),
    Uuid::Uuid16(DIS_SOFTWARE_REV),
    Uuid::Uuid16(DIS_MANUFACTURER_NAME),
];

/// Strings served by the Device Information Service
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceInfo {
    pub model: Option<&'static str>,
    pub serial: Option<&'static str>,
    pub firmware_rev: Option<&'static str>,
    pub hardware_rev: Option<&'static str>,
    pub software_rev: Option<&'static str>,
    pub manufacturer: Option<&'static str>,
}

impl DeviceInfo {
    /// Identity from the firmware configuration
    pub const fn from_config() -> Self {
        Self {
            model: Some(config::dis::MODEL),
            serial: None,
            firmware_rev: Some(config::dis::FIRMWARE_REV),
            hardware_rev: Some(config::dis::HARDWARE_REV),
            software_rev: Some(config::dis::SOFTWARE_REV),
            manufacturer: Some(config::dis::MANUFACTURER),
        }
    }

    /// Fields in characteristic UUID order, starting at model number
    fn fields(&self) -> [Option<&'static str>; FIELD_COUNT] {
        [
            self.model,
            self.serial,
            self.firmware_rev,
            self.hardware_rev,
            self.software_rev,
            self.manufacturer,
        ]
    }

    /// Configured value for a DIS characteristic UUID
    pub fn lookup(&self, uuid: &Uuid) -> Option<&'static str> {
        let Uuid::Uuid16(value) = *uuid else {
            return None;
        };
        let index = value.checked_sub(DIS_MODEL_NUMBER)? as usize;
        self.fields().get(index).copied().flatten()
    }
}

pub struct DeviceInformationService {
    info: DeviceInfo,
}

impl DeviceInformationService {
    pub const fn new(info: DeviceInfo) -> Self {
        Self { info }
    }

    pub fn info(&self) -> &DeviceInfo {
        &self.info
    }
}

impl GattService for DeviceInformationService {
    fn definition(&self) -> Result<ServiceDef, HostError> {
        let mut def = ServiceDef::primary(DIS_SERVICE);
        for (offset, field) in self.info.fields().iter().enumerate() {
            if field.is_some() {
                let uuid = Uuid::Uuid16(DIS_MODEL_NUMBER + offset as u16);
                def = def.with_characteristic(uuid, CharacteristicFlags::READ)?;
            }
        }
        Ok(def)
    }

    fn on_access(&self, ctx: &mut AccessContext<'_>) -> Result<(), AccessError> {
        let value = self
            .info
            .lookup(&ctx.uuid)
            .ok_or(AccessError::AttributeNotFound)?;

        match ctx.op {
            AccessOp::ReadCharacteristic => ctx
                .response
                .extend_from_slice(value.as_bytes())
                .map_err(|_| AccessError::Unlikely),
            AccessOp::WriteCharacteristic => Err(AccessError::WriteNotPermitted),
        }
    }
}
