//! BLE task for the UART bridge
//!
//! Runs the TrouBLE host: advertises the Nordic UART Service, tracks the
//! connection for the bridge, forwards attribute accesses to the GATT
//! services and sends queued notifications.

use core::cell::RefCell;

use embassy_futures::select::{select, Either};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::channel::Channel;
use heapless::Vec;
use log::{debug, error, info, warn};
use trouble_host::prelude::*;

use crate::ble::bleuart::GapEvent;
use crate::ble::dis::{DeviceInfo, DeviceInformationService, DEVICE_TABLE};
use crate::ble::gap::GapService;
use crate::ble::gatt::{
    AccessContext, AccessError, AccessOp, AttValue, GattHost, HostError, RegisterEvent,
    ServiceDef, ServiceHandles,
};
use crate::ble::service::{GattRegistrar, GattService};
use crate::ble::uuid::{
    AttrHandle, ConnHandle, Uuid, GAP_APPEARANCE, GAP_DEVICE_NAME, NUS_RXD, NUS_SERVICE, NUS_TXD,
};
use crate::config::ble::{
    ATTRIBUTE_TABLE_SIZE, CONNECTIONS_MAX, L2CAP_CHANNELS_MAX, NOTIFY_QUEUE_DEPTH,
};
use crate::config::bleuart::MAX_NOTIFY_LEN;
use crate::config::gap::APPEARANCE;
use crate::tasks::Bridge;

/// Characteristic value carried by RXD and TXD
type UartValue = Vec<u8, MAX_NOTIFY_LEN>;

/// Device Information string value
type DisValue = Vec<u8, 32>;

/// HCI "unspecified error", reported when accepting a connection fails
const CONNECT_FAILED: u16 = 0x1F;

/// Value handles of the Generic Access characteristics. The attribute server
/// builds GAP from the `GapConfig` before any other service: service at 1,
/// device name at 2-3, appearance at 4-5.
const GAP_NAME_HANDLE: u16 = 3;
const GAP_APPEARANCE_HANDLE: u16 = 5;

/// Generic Access name and appearance
static GAP: GapService = GapService::from_config();
static GAP_APPEARANCE_VALUE: BluetoothUuid16 = BluetoothUuid16::new(APPEARANCE);

/// NUS service UUID as advertised
const NUS_ADV_UUID: [u8; 16] = match NUS_SERVICE {
    Uuid::Uuid128(bytes) => bytes,
    Uuid::Uuid16(_) => [0; 16],
};

/// Nordic UART Service
#[gatt_service(uuid = "6e400001-b5a3-f393-e0a9-e50e24dcca9e")]
struct NordicUartService {
    /// TXD: device to peer
    #[characteristic(uuid = "6e400003-b5a3-f393-e0a9-e50e24dcca9e", notify)]
    tx: UartValue,

    /// RXD: peer to device
    #[characteristic(uuid = "6e400002-b5a3-f393-e0a9-e50e24dcca9e", write, write_without_response)]
    rx: UartValue,
}

/// Device Information Service
#[gatt_service(uuid = service::DEVICE_INFORMATION)]
struct DeviceInformation {
    #[characteristic(uuid = characteristic::MODEL_NUMBER_STRING, read)]
    model: DisValue,
    #[characteristic(uuid = characteristic::FIRMWARE_REVISION_STRING, read)]
    firmware_rev: DisValue,
    #[characteristic(uuid = characteristic::HARDWARE_REVISION_STRING, read)]
    hardware_rev: DisValue,
    #[characteristic(uuid = characteristic::SOFTWARE_REVISION_STRING, read)]
    software_rev: DisValue,
    #[characteristic(uuid = characteristic::MANUFACTURER_NAME_STRING, read)]
    manufacturer: DisValue,
}

/// BLE GATT Server with the UART and Device Information services.
/// Generic Access comes from the `GapConfig`.
#[gatt_server(mutex_type = CriticalSectionRawMutex)]
struct Server {
    nus: NordicUartService,
    dis: DeviceInformation,
}

/// A notification waiting for the connection loop
pub struct Outbound {
    pub conn: ConnHandle,
    pub attr: AttrHandle,
    pub data: UartValue,
}

struct Bindings {
    handles: Vec<(Uuid, AttrHandle), 16>,
    reserved: usize,
    used: usize,
}

/// [`GattHost`] backed by the TrouBLE attribute server.
///
/// The attribute table is generated at compile time, so registration binds
/// service definitions to handles the server already assigned. Notifications
/// are queued and sent by the connection loop.
pub struct TroubleGattHost {
    bindings: Mutex<CriticalSectionRawMutex, RefCell<Bindings>>,
    outbound: Channel<CriticalSectionRawMutex, Outbound, NOTIFY_QUEUE_DEPTH>,
}

impl TroubleGattHost {
    pub const fn new() -> Self {
        Self {
            bindings: Mutex::new(RefCell::new(Bindings {
                handles: Vec::new(),
                reserved: 0,
                used: 0,
            })),
            outbound: Channel::new(),
        }
    }

    /// Record the value handle the server assigned to a characteristic
    pub fn bind(&self, uuid: Uuid, handle: u16) -> Result<(), HostError> {
        self.bindings.lock(|b| {
            b.borrow_mut()
                .handles
                .push((uuid, AttrHandle(handle)))
                .map_err(|_| HostError::NoResources)
        })
    }

    fn handle_of(&self, uuid: &Uuid) -> Option<AttrHandle> {
        self.bindings.lock(|b| {
            b.borrow()
                .handles
                .iter()
                .find(|(u, _)| u == uuid)
                .map(|(_, h)| *h)
        })
    }

    /// Characteristic UUID bound to a value handle
    pub fn uuid_of(&self, handle: u16) -> Option<Uuid> {
        self.bindings.lock(|b| {
            b.borrow()
                .handles
                .iter()
                .find(|(_, h)| h.raw() == handle)
                .map(|(u, _)| *u)
        })
    }

    /// Wait for the next queued notification
    pub async fn next_outbound(&self) -> Outbound {
        self.outbound.receive().await
    }

    /// Drop notifications queued for an earlier connection
    pub fn clear_outbound(&self) {
        while self.outbound.try_receive().is_ok() {}
    }
}

impl Default for TroubleGattHost {
    fn default() -> Self {
        Self::new()
    }
}

impl GattHost for TroubleGattHost {
    fn count_configuration(&self, service: &ServiceDef) -> Result<usize, HostError> {
        if service
            .characteristics
            .iter()
            .any(|c| self.handle_of(&c.uuid).is_none())
        {
            return Err(HostError::NoResources);
        }

        let needed = service.attribute_count();
        self.bindings.lock(|b| {
            let mut b = b.borrow_mut();
            if b.reserved + needed > ATTRIBUTE_TABLE_SIZE {
                return Err(HostError::NoResources);
            }
            b.reserved += needed;
            Ok(needed)
        })
    }

    fn register_services(
        &self,
        service: &ServiceDef,
        on_register: &mut dyn FnMut(&RegisterEvent),
    ) -> Result<ServiceHandles, HostError> {
        let needed = service.attribute_count();
        self.bindings.lock(|b| {
            let mut b = b.borrow_mut();
            if b.used + needed > b.reserved {
                return Err(HostError::NotReserved);
            }
            b.used += needed;
            Ok(())
        })?;

        let mut handles = ServiceHandles::default();
        for (i, chr) in service.characteristics.iter().enumerate() {
            let val_handle = self.handle_of(&chr.uuid).ok_or(HostError::InvalidHandle)?;
            let def_handle = AttrHandle(val_handle.raw().saturating_sub(1));

            if i == 0 {
                on_register(&RegisterEvent::Service {
                    uuid: service.uuid,
                    handle: AttrHandle(def_handle.raw().saturating_sub(1)),
                });
            }
            on_register(&RegisterEvent::Characteristic {
                uuid: chr.uuid,
                def_handle,
                val_handle,
            });
            handles
                .value_handles
                .push(Some(val_handle))
                .map_err(|_| HostError::TableFull)?;
        }

        Ok(handles)
    }

    fn notify_custom(
        &self,
        conn: ConnHandle,
        attr: AttrHandle,
        payload: &[u8],
    ) -> Result<(), HostError> {
        if self.uuid_of(attr.raw()).is_none() {
            return Err(HostError::InvalidHandle);
        }

        let mut data = UartValue::new();
        data.extend_from_slice(payload)
            .map_err(|_| HostError::NoBuffers)?;
        self.outbound
            .try_send(Outbound { conn, attr, data })
            .map_err(|_| HostError::NoBuffers)
    }

    fn exchange_mtu(&self, _conn: ConnHandle) -> Result<(), HostError> {
        // TrouBLE answers the peer's MTU request; the peripheral does not start one
        Ok(())
    }
}

fn att_error(error: AccessError) -> AttErrorCode {
    match error {
        AccessError::ReadNotPermitted => AttErrorCode::READ_NOT_PERMITTED,
        AccessError::WriteNotPermitted => AttErrorCode::WRITE_NOT_PERMITTED,
        AccessError::AttributeNotFound => AttErrorCode::ATTRIBUTE_NOT_FOUND,
        AccessError::InvalidLength => AttErrorCode::INVALID_ATTRIBUTE_VALUE_LENGTH,
        AccessError::Unlikely => AttErrorCode::UNLIKELY_ERROR,
    }
}

/// Forward an access to the registered services.
///
/// Returns `None` for handles no service registered, which the attribute
/// server handles itself.
fn dispatch(
    registrar: &GattRegistrar<'_, TroubleGattHost>,
    host: &TroubleGattHost,
    conn: ConnHandle,
    handle: u16,
    op: AccessOp,
    data: &[u8],
) -> Option<Result<(), AccessError>> {
    let uuid = host.uuid_of(handle)?;
    let mut response = AttValue::new();
    let mut ctx = AccessContext {
        conn,
        attr: AttrHandle(handle),
        uuid,
        op,
        data,
        response: &mut response,
    };
    Some(registrar.dispatch_access(&mut ctx))
}

/// Bind the generated table to the host and fill in the DIS strings
fn bind_server(
    server: &Server,
    host: &TroubleGattHost,
    info: &DeviceInfo,
) -> Result<(), HostError> {
    host.bind(GAP_DEVICE_NAME, GAP_NAME_HANDLE)?;
    host.bind(GAP_APPEARANCE, GAP_APPEARANCE_HANDLE)?;
    host.bind(NUS_TXD, server.nus.tx.handle)?;
    host.bind(NUS_RXD, server.nus.rx.handle)?;

    let dis = [
        &server.dis.model,
        &server.dis.firmware_rev,
        &server.dis.hardware_rev,
        &server.dis.software_rev,
        &server.dis.manufacturer,
    ];
    for (uuid, chr) in DEVICE_TABLE.into_iter().zip(dis) {
        // Declared characteristics must all have a value to serve
        let text = info.lookup(&uuid).ok_or(HostError::InvalidHandle)?;
        host.bind(uuid, chr.handle)?;

        let mut value = DisValue::new();
        let len = text.len().min(value.capacity());
        let _ = value.extend_from_slice(&text.as_bytes()[..len]);
        if server.set(chr, &value).is_err() {
            warn!("BLE: could not set {:?}", uuid);
        }
    }

    Ok(())
}

/// Main BLE task that manages the Bluetooth stack and connections
///
/// This task:
/// 1. Initialises the BLE controller and GATT server
/// 2. Registers the GAP, Device Information and UART services
/// 3. Advertises the UART service and device name
/// 4. Feeds connection events to the bridge
/// 5. Sends notifications queued by the bridge
pub async fn ble_task<C: Controller>(
    controller: C,
    bridge: &'static Bridge,
    host: &'static TroubleGattHost,
    address: [u8; 6],
) {
    info!("BLE: Starting as '{}'", GAP.name());

    let mut resources: HostResources<DefaultPacketPool, CONNECTIONS_MAX, L2CAP_CHANNELS_MAX> =
        HostResources::new();

    let stack = trouble_host::new(controller, &mut resources)
        .set_random_address(Address::random(address));

    let Host {
        mut peripheral,
        mut runner,
        ..
    } = stack.build();

    let server: Server = match Server::new_with_config(GapConfig::Peripheral(PeripheralConfig {
        name: GAP.name(),
        appearance: &GAP_APPEARANCE_VALUE,
    })) {
        Ok(s) => s,
        Err(e) => {
            error!("BLE: GATT server setup failed: {:?}", e);
            return;
        }
    };

    let info = DeviceInfo::from_config();
    if let Err(e) = bind_server(&server, host, &info) {
        error!("BLE: binding attribute table failed: {:?}", e);
        return;
    }

    let dis = DeviceInformationService::new(info);
    let mut registrar = GattRegistrar::new(host);
    for service in [&GAP as &dyn GattService, &dis, bridge] {
        if registrar.add(service).is_err() {
            error!("BLE: too many services");
            return;
        }
    }
    if let Err(e) = registrar.register_all() {
        error!("BLE: service registration failed: {:?}", e);
        return;
    }

    let runner_task = runner.run();

    let peripheral_task = async {
        let mut adv_data = [0u8; 31];
        let adv_len = match AdStructure::encode_slice(
            &[
                AdStructure::Flags(LE_GENERAL_DISCOVERABLE | BR_EDR_NOT_SUPPORTED),
                AdStructure::ServiceUuids128(&[NUS_ADV_UUID]),
            ],
            &mut adv_data,
        ) {
            Ok(l) => l,
            Err(_) => return,
        };

        let mut scan_data = [0u8; 31];
        let scan_len = match AdStructure::encode_slice(
            &[AdStructure::CompleteLocalName(GAP.name().as_bytes())],
            &mut scan_data,
        ) {
            Ok(l) => l,
            Err(_) => return,
        };

        loop {
            info!("BLE: Advertising...");
            let advertiser = match peripheral
                .advertise(
                    &Default::default(),
                    Advertisement::ConnectableScannableUndirected {
                        adv_data: &adv_data[..adv_len],
                        scan_data: &scan_data[..scan_len],
                    },
                )
                .await
            {
                Ok(a) => a,
                Err(e) => {
                    warn!("BLE: advertising failed: {:?}", e);
                    continue;
                }
            };

            let acceptor = match advertiser.accept().await {
                Ok(a) => a,
                Err(e) => {
                    warn!("BLE: accept failed: {:?}", e);
                    bridge.on_gap_event(GapEvent::Connect {
                        status: Err(CONNECT_FAILED),
                    });
                    continue;
                }
            };

            // Attach to attribute server (using Deref to get &AttributeServer)
            let conn = match acceptor.with_attribute_server(&*server) {
                Ok(c) => c,
                Err(_) => {
                    bridge.on_gap_event(GapEvent::Connect {
                        status: Err(CONNECT_FAILED),
                    });
                    continue;
                }
            };

            let Some(conn_handle) = ConnHandle::from_raw(conn.raw().handle().raw()) else {
                warn!("BLE: connection without a handle");
                bridge.on_gap_event(GapEvent::Connect {
                    status: Err(CONNECT_FAILED),
                });
                continue;
            };
            host.clear_outbound();
            bridge.on_gap_event(GapEvent::Connect {
                status: Ok(conn_handle),
            });

            loop {
                match select(conn.next(), host.next_outbound()).await {
                    Either::First(GattConnectionEvent::Disconnected { reason }) => {
                        info!("BLE: Disconnected: {:?}", reason);
                        bridge.on_gap_event(GapEvent::Disconnect { conn: conn_handle });
                        break;
                    }
                    Either::First(GattConnectionEvent::Gatt { event }) => match event {
                        GattEvent::Write(write_event) => {
                            let result = dispatch(
                                &registrar,
                                host,
                                conn_handle,
                                write_event.handle(),
                                AccessOp::WriteCharacteristic,
                                write_event.data(),
                            );
                            match result {
                                Some(Err(e)) => {
                                    let _ = write_event.reject(att_error(e));
                                }
                                _ => {
                                    let _ = write_event.accept();
                                }
                            }
                        }
                        GattEvent::Read(read_event) => {
                            let result = dispatch(
                                &registrar,
                                host,
                                conn_handle,
                                read_event.handle(),
                                AccessOp::ReadCharacteristic,
                                &[],
                            );
                            match result {
                                Some(Err(e)) => {
                                    let _ = read_event.reject(att_error(e));
                                }
                                _ => {
                                    let _ = read_event.accept();
                                }
                            }
                        }
                        GattEvent::Other(other_event) => {
                            let _ = other_event.accept();
                        }
                    },
                    Either::First(_) => {}
                    Either::Second(outbound) => {
                        if outbound.conn != conn_handle
                            || outbound.attr.raw() != server.nus.tx.handle
                        {
                            continue;
                        }
                        // Already counted as sent by the bridge
                        if let Err(e) = server.nus.tx.notify(&conn, &outbound.data).await {
                            debug!(
                                "BLE: notify of {} bytes failed: {:?}",
                                outbound.data.len(),
                                e
                            );
                        }
                    }
                }
            }
        }
    };

    select(runner_task, peripheral_task).await;
}
