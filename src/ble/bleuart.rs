//! BLE UART bridge over the Nordic UART Service
//!
//! Bytes written by the peer to RXD land in a FIFO that the application
//! drains with [`BleUart::read`]. Bytes passed to [`BleUart::write`] go out
//! immediately as TXD notifications, or are refused when there is nowhere to
//! send them. There is no outbound buffering.

use core::cell::Cell;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;
use log::{info, warn};

use crate::ble::gatt::{
    AccessContext, AccessError, AccessOp, CharacteristicFlags, GattHost, HostError,
    RegisterEvent, ServiceDef, ServiceHandles,
};
use crate::ble::service::{register_service, GattService};
use crate::ble::uuid::{AttrHandle, ConnHandle, NUS_RXD, NUS_SERVICE, NUS_TXD};
use crate::config::bleuart::MAX_NOTIFY_LEN;
use crate::fifo::{Fifo, OverflowPolicy};

/// Position of TXD in the service table
const TXD_INDEX: usize = 0;

/// Connection events delivered by the GAP layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GapEvent {
    /// Connection attempt finished; `Err` carries the host status code
    Connect { status: Result<ConnHandle, u16> },
    Disconnect { conn: ConnHandle },
}

/// Bytes moved through the bridge since `init`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BridgeStats {
    /// Bytes accepted by the host for notification
    pub txd_bytes: u32,
    /// Bytes written by the peer, including any the FIFO had to drop
    pub rxd_bytes: u32,
}

#[derive(Debug, Clone, Copy)]
struct BridgeState {
    conn: Option<ConnHandle>,
    txd: Option<AttrHandle>,
    stats: BridgeStats,
}

impl BridgeState {
    const fn new() -> Self {
        Self {
            conn: None,
            txd: None,
            stats: BridgeStats {
                txd_bytes: 0,
                rxd_bytes: 0,
            },
        }
    }
}

/// BLE UART bridge context
///
/// `N` is the depth of the inbound FIFO. One producer (the host's access
/// callback) and one consumer (the application) may use it concurrently when
/// `M` is a critical-section mutex.
pub struct BleUart<'h, M: RawMutex, H: GattHost, const N: usize> {
    host: &'h H,
    rx: Fifo<M, u8, N>,
    state: Mutex<M, Cell<BridgeState>>,
}

impl<'h, M: RawMutex, H: GattHost, const N: usize> BleUart<'h, M, H, N> {
    pub const fn new(host: &'h H, policy: OverflowPolicy) -> Self {
        Self {
            host,
            rx: Fifo::new(policy),
            state: Mutex::new(Cell::new(BridgeState::new())),
        }
    }

    /// Reset all bridge state and register the service with the host
    pub fn init(&self) -> Result<(), HostError> {
        register_service(self.host, self)?;
        info!("BLEUART: registered, rx depth {}", N);
        Ok(())
    }

    fn snapshot(&self) -> BridgeState {
        self.state.lock(|s| s.get())
    }

    fn update(&self, f: impl FnOnce(&mut BridgeState)) {
        self.state.lock(|s| {
            let mut state = s.get();
            f(&mut state);
            s.set(state);
        });
    }

    /// Overwrite the current connection handle
    pub fn set_conn_handle(&self, conn: Option<ConnHandle>) {
        self.update(|s| s.conn = conn);
    }

    /// Track connection state from a GAP event
    pub fn on_gap_event(&self, event: GapEvent) {
        match event {
            GapEvent::Connect { status: Ok(conn) } => {
                info!("BLEUART: connected, handle {}", conn.raw());
                self.set_conn_handle(Some(conn));
            }
            GapEvent::Connect { status: Err(status) } => {
                warn!("BLEUART: connection failed, status {}", status);
                self.set_conn_handle(None);
            }
            GapEvent::Disconnect { conn } => {
                info!("BLEUART: disconnected, handle {}", conn.raw());
                self.set_conn_handle(None);
            }
        }
    }

    pub fn connection(&self) -> Option<ConnHandle> {
        self.snapshot().conn
    }

    pub fn is_connected(&self) -> bool {
        self.connection().is_some()
    }

    /// Value handle of TXD, once registration has resolved it
    pub fn txd_handle(&self) -> Option<AttrHandle> {
        self.snapshot().txd
    }

    /// Send `data` to the peer as one TXD notification.
    ///
    /// Returns `data.len()` if the host accepted it and `0` otherwise.
    pub fn write(&self, data: &[u8]) -> usize {
        if data.is_empty() {
            return 0;
        }

        let state = self.snapshot();
        let (Some(conn), Some(txd)) = (state.conn, state.txd) else {
            return 0;
        };

        match self.host.notify_custom(conn, txd, data) {
            Ok(()) => {
                self.update(|s| {
                    s.stats.txd_bytes = s.stats.txd_bytes.wrapping_add(data.len() as u32)
                });
                data.len()
            }
            Err(_) => 0,
        }
    }

    pub fn putc(&self, byte: u8) -> usize {
        self.write(&[byte])
    }

    pub fn puts(&self, s: &str) -> usize {
        self.write(s.as_bytes())
    }

    /// Drain up to `out.len()` received bytes without waiting
    pub fn read(&self, out: &mut [u8]) -> usize {
        self.rx.read_n(out)
    }

    /// Next received byte, or `None` if nothing is waiting
    pub fn getc(&self) -> Option<u8> {
        self.rx.read()
    }

    /// Bytes waiting to be read
    pub fn available(&self) -> usize {
        self.rx.len()
    }

    /// Ask the host to negotiate a larger ATT MTU with the peer
    pub fn exchange_mtu(&self) -> Result<(), HostError> {
        let conn = self.connection().ok_or(HostError::NotConnected)?;
        self.host.exchange_mtu(conn)
    }

    pub fn stats(&self) -> BridgeStats {
        self.snapshot().stats
    }
}

impl<M: RawMutex, H: GattHost, const N: usize> GattService for BleUart<'_, M, H, N> {
    fn definition(&self) -> Result<ServiceDef, HostError> {
        ServiceDef::primary(NUS_SERVICE)
            .with_characteristic(NUS_TXD, CharacteristicFlags::NOTIFY)?
            .with_characteristic(
                NUS_RXD,
                CharacteristicFlags::WRITE | CharacteristicFlags::WRITE_NO_RSP,
            )
    }

    fn reset(&self) {
        self.rx.clear();
        self.state.lock(|s| s.set(BridgeState::new()));
    }

    fn on_register(&self, event: &RegisterEvent) {
        if let RegisterEvent::Characteristic {
            uuid, val_handle, ..
        } = event
        {
            if *uuid == NUS_TXD {
                self.update(|s| s.txd = Some(*val_handle));
            }
        }
    }

    fn on_registered(&self, handles: &ServiceHandles) {
        if let Some(txd) = handles.value_handle(TXD_INDEX) {
            self.update(|s| s.txd = Some(txd));
        }
    }

    fn on_access(&self, ctx: &mut AccessContext<'_>) -> Result<(), AccessError> {
        match (ctx.uuid, ctx.op) {
            (uuid, AccessOp::WriteCharacteristic) if uuid == NUS_RXD => {
                if ctx.data.len() > MAX_NOTIFY_LEN {
                    return Err(AccessError::InvalidLength);
                }
                // Whatever does not fit is dropped or evicts older bytes
                self.rx.write_n(ctx.data);
                let len = ctx.data.len() as u32;
                self.update(|s| s.stats.rxd_bytes = s.stats.rxd_bytes.wrapping_add(len));
                Ok(())
            }
            (uuid, AccessOp::ReadCharacteristic) if uuid == NUS_RXD => {
                Err(AccessError::ReadNotPermitted)
            }
            // TXD only carries notifications; a read returns an empty value
            (uuid, AccessOp::ReadCharacteristic) if uuid == NUS_TXD => Ok(()),
            (uuid, AccessOp::WriteCharacteristic) if uuid == NUS_TXD => {
                Err(AccessError::WriteNotPermitted)
            }
            _ => Err(AccessError::AttributeNotFound),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ble::gatt::mock::MockGattHost;
    use crate::ble::gatt::AttValue;
    use crate::ble::uuid::GAP_DEVICE_NAME;
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;

    type TestUart<'h, const N: usize> = BleUart<'h, NoopRawMutex, MockGattHost, N>;

    fn access(
        uart: &TestUart<'_, 32>,
        uuid: crate::ble::uuid::Uuid,
        op: AccessOp,
        data: &[u8],
    ) -> (Result<(), AccessError>, AttValue) {
        let mut response = AttValue::new();
        let mut ctx = AccessContext {
            conn: ConnHandle(1),
            attr: AttrHandle(0),
            uuid,
            op,
            data,
            response: &mut response,
        };
        let result = uart.on_access(&mut ctx);
        (result, response)
    }

    fn connected(host: &MockGattHost) -> TestUart<'_, 32> {
        let uart = TestUart::new(host, OverflowPolicy::Overwrite);
        uart.init().unwrap();
        uart.on_gap_event(GapEvent::Connect {
            status: Ok(ConnHandle(1)),
        });
        uart
    }

    #[test]
    fn test_init_resolves_txd_from_returned_handles() {
        let host = MockGattHost::new();
        let uart = TestUart::<32>::new(&host, OverflowPolicy::Overwrite);

        uart.init().unwrap();
        assert_eq!(uart.txd_handle(), host.value_handle_of(&NUS_TXD));
        assert!(uart.txd_handle().is_some());
        assert!(!uart.is_connected());
    }

    #[test]
    fn test_init_resolves_txd_from_callback() {
        let host = MockGattHost::callback_only();
        let uart = TestUart::<32>::new(&host, OverflowPolicy::Overwrite);

        uart.init().unwrap();
        assert_eq!(uart.txd_handle(), host.value_handle_of(&NUS_TXD));
        assert!(uart.txd_handle().is_some());
    }

    #[test]
    fn test_init_propagates_host_error() {
        let host = MockGattHost::new();
        host.set_next_register_error(HostError::Stack(3));
        let uart = TestUart::<32>::new(&host, OverflowPolicy::Overwrite);

        assert_eq!(uart.init(), Err(HostError::Stack(3)));
        assert_eq!(uart.txd_handle(), None);
    }

    #[test]
    fn test_init_resets_state() {
        let host = MockGattHost::new().with_capacity(64);
        let uart = connected(&host);
        access(&uart, NUS_RXD, AccessOp::WriteCharacteristic, b"abc");

        uart.init().unwrap();
        assert_eq!(uart.available(), 0);
        assert_eq!(uart.connection(), None);
        assert_eq!(uart.stats(), BridgeStats::default());
    }

    #[test]
    fn test_write_requires_connection() {
        let host = MockGattHost::new();
        let uart = TestUart::<32>::new(&host, OverflowPolicy::Overwrite);
        uart.init().unwrap();

        assert_eq!(uart.write(b"hello"), 0);
        assert_eq!(host.notify_calls(), 0);
    }

    #[test]
    fn test_write_requires_txd_handle() {
        let host = MockGattHost::new();
        let uart = TestUart::<32>::new(&host, OverflowPolicy::Overwrite);
        uart.set_conn_handle(Some(ConnHandle(1)));

        assert_eq!(uart.write(b"hello"), 0);
        assert_eq!(host.notify_calls(), 0);
    }

    #[test]
    fn test_write_notifies_txd() {
        let host = MockGattHost::new();
        let uart = connected(&host);

        assert_eq!(uart.write(b"hello"), 5);

        let notifications = host.get_notifications();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].conn, ConnHandle(1));
        assert_eq!(Some(notifications[0].attr), uart.txd_handle());
        assert_eq!(&notifications[0].data[..], b"hello");
        assert_eq!(uart.stats().txd_bytes, 5);
    }

    #[test]
    fn test_write_rejected_by_host() {
        let host = MockGattHost::new();
        let uart = connected(&host);
        host.set_next_notify_error(HostError::NoBuffers);

        assert_eq!(uart.write(b"hello"), 0);
        assert_eq!(uart.stats().txd_bytes, 0);
        assert_eq!(uart.puts("hi"), 2);
        assert_eq!(uart.putc(b'!'), 1);
        assert_eq!(uart.stats().txd_bytes, 3);
    }

    #[test]
    fn test_disconnect_clears_connection() {
        let host = MockGattHost::new();
        let uart = connected(&host);

        uart.on_gap_event(GapEvent::Disconnect {
            conn: ConnHandle(1),
        });
        assert_eq!(uart.connection(), None);
        assert_eq!(uart.write(b"x"), 0);
    }

    #[test]
    fn test_reconnect_overwrites_handle() {
        let host = MockGattHost::new();
        let uart = connected(&host);

        // Second connect with no disconnect in between
        uart.on_gap_event(GapEvent::Connect {
            status: Ok(ConnHandle(2)),
        });
        assert_eq!(uart.connection(), Some(ConnHandle(2)));

        assert_eq!(uart.write(b"new"), 3);
        let notifications = host.get_notifications();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].conn, ConnHandle(2));

        uart.set_conn_handle(Some(ConnHandle(3)));
        assert_eq!(uart.connection(), Some(ConnHandle(3)));
    }

    #[test]
    fn test_failed_connect_clears_connection() {
        let host = MockGattHost::new();
        let uart = connected(&host);

        uart.on_gap_event(GapEvent::Connect { status: Err(0x3E) });
        assert!(!uart.is_connected());
    }

    #[test]
    fn test_rxd_write_then_read() {
        let host = MockGattHost::new();
        let uart = connected(&host);

        let (result, _) = access(&uart, NUS_RXD, AccessOp::WriteCharacteristic, b"ping");
        assert_eq!(result, Ok(()));
        assert_eq!(uart.available(), 4);

        let mut buf = [0u8; 16];
        assert_eq!(uart.read(&mut buf), 4);
        assert_eq!(&buf[..4], b"ping");
        assert_eq!(uart.getc(), None);
        assert_eq!(uart.stats().rxd_bytes, 4);
    }

    #[test]
    fn test_rxd_received_while_disconnected() {
        let host = MockGattHost::new();
        let uart = TestUart::<32>::new(&host, OverflowPolicy::Overwrite);
        uart.init().unwrap();

        access(&uart, NUS_RXD, AccessOp::WriteCharacteristic, b"ok");
        assert_eq!(uart.getc(), Some(b'o'));
        assert_eq!(uart.getc(), Some(b'k'));
    }

    #[test]
    fn test_rxd_overflow_keeps_newest() {
        let host = MockGattHost::new();
        let uart = connected(&host);

        let payload: [u8; 64] = core::array::from_fn(|i| i as u8);
        access(&uart, NUS_RXD, AccessOp::WriteCharacteristic, &payload);

        let mut out = [0u8; 64];
        assert_eq!(uart.read(&mut out), 32);
        assert_eq!(&out[..32], &payload[32..]);
        assert_eq!(uart.stats().rxd_bytes, 64);
    }

    #[test]
    fn test_rxd_overflow_rejects_newest() {
        let host = MockGattHost::new();
        let uart = TestUart::<32>::new(&host, OverflowPolicy::Reject);
        uart.init().unwrap();

        let payload: [u8; 40] = core::array::from_fn(|i| i as u8);
        access(&uart, NUS_RXD, AccessOp::WriteCharacteristic, &payload);

        let mut out = [0u8; 40];
        assert_eq!(uart.read(&mut out), 32);
        assert_eq!(&out[..32], &payload[..32]);
    }

    #[test]
    fn test_access_rejections() {
        let host = MockGattHost::new();
        let uart = connected(&host);

        let (result, _) = access(&uart, NUS_RXD, AccessOp::ReadCharacteristic, &[]);
        assert_eq!(result, Err(AccessError::ReadNotPermitted));

        let (result, _) = access(&uart, NUS_TXD, AccessOp::WriteCharacteristic, b"x");
        assert_eq!(result, Err(AccessError::WriteNotPermitted));

        let (result, response) = access(&uart, NUS_TXD, AccessOp::ReadCharacteristic, &[]);
        assert_eq!(result, Ok(()));
        assert!(response.is_empty());

        let (result, _) = access(&uart, GAP_DEVICE_NAME, AccessOp::ReadCharacteristic, &[]);
        assert_eq!(result, Err(AccessError::AttributeNotFound));
        assert_eq!(uart.available(), 0);
    }

    #[test]
    fn test_rxd_write_too_long() {
        let host = MockGattHost::new();
        let uart = connected(&host);

        let payload = [b'x'; MAX_NOTIFY_LEN + 1];
        let (result, _) = access(&uart, NUS_RXD, AccessOp::WriteCharacteristic, &payload);
        assert_eq!(result, Err(AccessError::InvalidLength));
        assert_eq!(uart.available(), 0);
        assert_eq!(uart.stats().rxd_bytes, 0);
    }

    #[test]
    fn test_exchange_mtu() {
        let host = MockGattHost::new();
        let uart = TestUart::<32>::new(&host, OverflowPolicy::Overwrite);
        uart.init().unwrap();

        assert_eq!(uart.exchange_mtu(), Err(HostError::NotConnected));

        uart.set_conn_handle(Some(ConnHandle(7)));
        uart.exchange_mtu().unwrap();
        assert_eq!(&host.get_mtu_exchanges()[..], &[ConnHandle(7)]);
    }
}
