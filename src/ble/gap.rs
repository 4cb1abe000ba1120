//! Generic Access service: device name and appearance

use crate::ble::gatt::{
    AccessContext, AccessError, AccessOp, CharacteristicFlags, HostError, ServiceDef,
};
use crate::ble::service::GattService;
use crate::ble::uuid::{GAP_APPEARANCE, GAP_DEVICE_NAME, GAP_SERVICE};
use crate::config;

pub struct GapService {
    name: &'static str,
    appearance: u16,
}

impl GapService {
    pub const fn new(name: &'static str, appearance: u16) -> Self {
        Self { name, appearance }
    }

    pub const fn from_config() -> Self {
        Self::new(config::gap::DEVICE_NAME, config::gap::APPEARANCE)
    }

    /// Name advertised and served from the device name characteristic
    pub const fn name(&self) -> &'static str {
        self.name
    }

    pub const fn appearance(&self) -> u16 {
        self.appearance
    }
}

impl GattService for GapService {
    fn definition(&self) -> Result<ServiceDef, HostError> {
        ServiceDef::primary(GAP_SERVICE)
            .with_characteristic(GAP_DEVICE_NAME, CharacteristicFlags::READ)?
            .with_characteristic(GAP_APPEARANCE, CharacteristicFlags::READ)
    }

    fn on_access(&self, ctx: &mut AccessContext<'_>) -> Result<(), AccessError> {
        let appearance = self.appearance.to_le_bytes();
        let value: &[u8] = if ctx.uuid == GAP_DEVICE_NAME {
            self.name.as_bytes()
        } else if ctx.uuid == GAP_APPEARANCE {
            &appearance
        } else {
            return Err(AccessError::AttributeNotFound);
        };

        match ctx.op {
            AccessOp::ReadCharacteristic => ctx
                .response
                .extend_from_slice(value)
                .map_err(|_| AccessError::Unlikely),
            AccessOp::WriteCharacteristic => Err(AccessError::WriteNotPermitted),
        }
    }
}
