//! Service trait and registrar
//!
//! Each GATT service (GAP, DIS, the UART bridge) owns its declarative table
//! and its access handler. The registrar installs services with the host's
//! two-phase protocol and routes peer accesses back to the owning service.

use heapless::Vec;
use log::{debug, warn};

use crate::ble::gatt::{
    AccessContext, AccessError, GattHost, HostError, RegisterEvent, ServiceDef, ServiceHandles,
};
use crate::config::ble::MAX_SERVICES;

/// A service that can be installed on a [`GattHost`]
pub trait GattService {
    /// Table describing the service's characteristics
    fn definition(&self) -> Result<ServiceDef, HostError>;

    /// Drop any state left from a previous registration
    fn reset(&self) {}

    /// Called by the host for the service and each characteristic as it is installed
    fn on_register(&self, _event: &RegisterEvent) {}

    /// Called once the host has installed the whole table
    fn on_registered(&self, _handles: &ServiceHandles) {}

    /// Handle a read or write from the peer
    fn on_access(&self, ctx: &mut AccessContext<'_>) -> Result<(), AccessError>;
}

/// Register a single service: reset, count, then install
pub fn register_service<H: GattHost + ?Sized>(
    host: &H,
    service: &dyn GattService,
) -> Result<(), HostError> {
    service.reset();
    let def = service.definition()?;
    host.count_configuration(&def)?;
    install(host, service, &def)
}

fn install<H: GattHost + ?Sized>(
    host: &H,
    service: &dyn GattService,
    def: &ServiceDef,
) -> Result<(), HostError> {
    let handles = host.register_services(def, &mut |event| service.on_register(event))?;
    service.on_registered(&handles);
    Ok(())
}

/// Composes several services on one host
pub struct GattRegistrar<'a, H: GattHost> {
    host: &'a H,
    services: Vec<&'a dyn GattService, MAX_SERVICES>,
    defs: Vec<ServiceDef, MAX_SERVICES>,
}

impl<'a, H: GattHost> GattRegistrar<'a, H> {
    pub fn new(host: &'a H) -> Self {
        Self {
            host,
            services: Vec::new(),
            defs: Vec::new(),
        }
    }

    /// Add a service to be registered
    pub fn add(&mut self, service: &'a dyn GattService) -> Result<(), HostError> {
        self.services
            .push(service)
            .map_err(|_| HostError::TableFull)
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Count every service, then install every service.
    ///
    /// Stops at the first host error. Services already installed stay
    /// installed.
    pub fn register_all(&mut self) -> Result<(), HostError> {
        self.defs.clear();

        for service in &self.services {
            service.reset();
            let def = service.definition()?;
            if let Err(e) = self.host.count_configuration(&def) {
                warn!("GATT: counting {:?} failed: {:?}", def.uuid, e);
                return Err(e);
            }
            // Same capacity as `services`
            let _ = self.defs.push(def);
        }

        for (service, def) in self.services.iter().zip(self.defs.iter()) {
            if let Err(e) = install(self.host, *service, def) {
                warn!("GATT: registering {:?} failed: {:?}", def.uuid, e);
                return Err(e);
            }
            debug!("GATT: registered {:?}", def.uuid);
        }

        Ok(())
    }

    /// Route an access to the service owning the characteristic
    pub fn dispatch_access(&self, ctx: &mut AccessContext<'_>) -> Result<(), AccessError> {
        self.services
            .iter()
            .zip(self.defs.iter())
            .find(|(_, def)| def.contains(&ctx.uuid))
            .map_or(Err(AccessError::AttributeNotFound), |(service, _)| {
                service.on_access(ctx)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ble::gatt::mock::MockGattHost;
    use crate::ble::gatt::{AccessOp, AttValue, CharacteristicFlags};
    use crate::ble::uuid::{AttrHandle, ConnHandle, Uuid};
    use core::cell::Cell;

    /// Minimal service that counts its callbacks
    struct CountingService {
        uuid: Uuid,
        chr: Uuid,
        resets: Cell<usize>,
        registered: Cell<usize>,
        accesses: Cell<usize>,
    }

    impl CountingService {
        fn new(uuid: u16, chr: u16) -> Self {
            Self {
                uuid: Uuid::Uuid16(uuid),
                chr: Uuid::Uuid16(chr),
                resets: Cell::new(0),
                registered: Cell::new(0),
                accesses: Cell::new(0),
            }
        }
    }

    impl GattService for CountingService {
        fn definition(&self) -> Result<ServiceDef, HostError> {
            ServiceDef::primary(self.uuid).with_characteristic(self.chr, CharacteristicFlags::READ)
        }

        fn reset(&self) {
            self.resets.set(self.resets.get() + 1);
        }

        fn on_register(&self, event: &RegisterEvent) {
            if let RegisterEvent::Characteristic { .. } = event {
                self.registered.set(self.registered.get() + 1);
            }
        }

        fn on_access(&self, _ctx: &mut AccessContext<'_>) -> Result<(), AccessError> {
            self.accesses.set(self.accesses.get() + 1);
            Ok(())
        }
    }

    fn read(registrar: &GattRegistrar<'_, MockGattHost>, uuid: Uuid) -> Result<(), AccessError> {
        let mut response = AttValue::new();
        let mut ctx = AccessContext {
            conn: ConnHandle(1),
            attr: AttrHandle(0),
            uuid,
            op: AccessOp::ReadCharacteristic,
            data: &[],
            response: &mut response,
        };
        registrar.dispatch_access(&mut ctx)
    }

    #[test]
    fn test_register_single_service() {
        let host = MockGattHost::new();
        let service = CountingService::new(0x1234, 0x5678);

        register_service(&host, &service).unwrap();
        assert_eq!(service.resets.get(), 1);
        assert_eq!(service.registered.get(), 1);
        assert!(host.value_handle_of(&Uuid::Uuid16(0x5678)).is_some());
    }

    #[test]
    fn test_register_propagates_count_error() {
        let host = MockGattHost::new();
        host.set_next_count_error(HostError::Stack(6));
        let service = CountingService::new(0x1234, 0x5678);

        assert_eq!(register_service(&host, &service), Err(HostError::Stack(6)));
        assert_eq!(service.registered.get(), 0);
    }

    #[test]
    fn test_register_all_counts_before_installing() {
        // Room for both counts only if no installing happens in between
        let host = MockGattHost::new().with_capacity(6);
        let a = CountingService::new(0x1000, 0x1001);
        let b = CountingService::new(0x2000, 0x2001);

        let mut registrar = GattRegistrar::new(&host);
        registrar.add(&a).unwrap();
        registrar.add(&b).unwrap();
        registrar.register_all().unwrap();

        assert_eq!(host.reserved_slots(), 6);
        assert_eq!(a.registered.get(), 1);
        assert_eq!(b.registered.get(), 1);
    }

    #[test]
    fn test_register_all_stops_on_capacity() {
        let host = MockGattHost::new().with_capacity(4);
        let a = CountingService::new(0x1000, 0x1001);
        let b = CountingService::new(0x2000, 0x2001);

        let mut registrar = GattRegistrar::new(&host);
        registrar.add(&a).unwrap();
        registrar.add(&b).unwrap();

        assert_eq!(registrar.register_all(), Err(HostError::NoResources));
        assert_eq!(a.registered.get(), 0);
    }

    #[test]
    fn test_dispatch_routes_by_uuid() {
        let host = MockGattHost::new();
        let a = CountingService::new(0x1000, 0x1001);
        let b = CountingService::new(0x2000, 0x2001);

        let mut registrar = GattRegistrar::new(&host);
        registrar.add(&a).unwrap();
        registrar.add(&b).unwrap();
        registrar.register_all().unwrap();

        read(&registrar, Uuid::Uuid16(0x2001)).unwrap();
        assert_eq!(a.accesses.get(), 0);
        assert_eq!(b.accesses.get(), 1);

        assert_eq!(
            read(&registrar, Uuid::Uuid16(0x3001)),
            Err(AccessError::AttributeNotFound)
        );
    }

    #[test]
    fn test_registrar_full() {
        let host = MockGattHost::new();
        let services = [
            CountingService::new(0x1000, 0x1001),
            CountingService::new(0x2000, 0x2001),
            CountingService::new(0x3000, 0x3001),
            CountingService::new(0x4000, 0x4001),
            CountingService::new(0x5000, 0x5001),
        ];

        let mut registrar = GattRegistrar::new(&host);
        for service in &services[..MAX_SERVICES] {
            registrar.add(service).unwrap();
        }
        assert_eq!(registrar.add(&services[4]), Err(HostError::TableFull));
        assert_eq!(registrar.len(), MAX_SERVICES);
    }
}
