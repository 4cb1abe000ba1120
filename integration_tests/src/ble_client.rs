//! BLE client for the device's Nordic UART Service.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use btleplug::api::{
    Central, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::time::timeout;
use uuid::Uuid;

/// Nordic UART Service UUIDs
pub const NUS_SERVICE_UUID: Uuid = Uuid::from_u128(0x6e400001_b5a3_f393_e0a9_e50e24dcca9e);
/// RXD: the client writes here
const NUS_RX_UUID: Uuid = Uuid::from_u128(0x6e400002_b5a3_f393_e0a9_e50e24dcca9e);
/// TXD: the device notifies here
const NUS_TX_UUID: Uuid = Uuid::from_u128(0x6e400003_b5a3_f393_e0a9_e50e24dcca9e);

/// Bytes notified on TXD, in arrival order
#[derive(Default)]
struct Received {
    bytes: Vec<u8>,
    notifications: usize,
}

/// Connected NUS peer
pub struct BleClient {
    peripheral: Peripheral,
    rx_char: Characteristic,
    tx_char: Characteristic,
    received: Arc<Mutex<Received>>,
}

impl BleClient {
    /// Scan for a device advertising `name`, connect and subscribe to TXD.
    pub async fn connect_by_name(name: &str, scan_timeout: Duration) -> Result<Self> {
        let manager = Manager::new().await?;
        let adapter = manager
            .adapters()
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("No Bluetooth adapters found"))?;

        adapter.start_scan(ScanFilter::default()).await?;
        let found = Self::find_device_by_name(&adapter, name, scan_timeout).await;
        adapter.stop_scan().await?;
        let peripheral = found?;

        peripheral.connect().await.context("connect")?;
        peripheral.discover_services().await.context("service discovery")?;

        let rx_char = Self::characteristic(&peripheral, NUS_RX_UUID)?;
        let tx_char = Self::characteristic(&peripheral, NUS_TX_UUID)?;
        peripheral.subscribe(&tx_char).await.context("subscribe to TXD")?;

        let received = Arc::new(Mutex::new(Received::default()));
        Self::spawn_notification_pump(peripheral.clone(), received.clone());

        Ok(Self {
            peripheral,
            rx_char,
            tx_char,
            received,
        })
    }

    fn characteristic(peripheral: &Peripheral, uuid: Uuid) -> Result<Characteristic> {
        peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == uuid && c.service_uuid == NUS_SERVICE_UUID)
            .ok_or_else(|| anyhow!("NUS characteristic {} not found", uuid))
    }

    /// Copy TXD notifications into `received` until the stream ends
    fn spawn_notification_pump(peripheral: Peripheral, received: Arc<Mutex<Received>>) {
        tokio::spawn(async move {
            let Ok(mut stream) = peripheral.notifications().await else {
                return;
            };

            while let Some(notification) = stream.next().await {
                if notification.uuid != NUS_TX_UUID {
                    continue;
                }
                let mut received = received.lock().await;
                received.bytes.extend_from_slice(&notification.value);
                received.notifications += 1;
            }
        });
    }

    async fn find_device_by_name(
        adapter: &Adapter,
        name: &str,
        scan_timeout: Duration,
    ) -> Result<Peripheral> {
        let start = Instant::now();

        while start.elapsed() < scan_timeout {
            for peripheral in adapter.peripherals().await? {
                let local_name = peripheral
                    .properties()
                    .await?
                    .and_then(|props| props.local_name);
                if local_name.as_deref() == Some(name) {
                    return Ok(peripheral);
                }
            }

            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        Err(anyhow!("Device '{}' not found within timeout", name))
    }

    /// Write bytes to RXD.
    pub async fn write(&self, data: &[u8], write_type: WriteType) -> Result<()> {
        self.peripheral.write(&self.rx_char, data, write_type).await?;
        Ok(())
    }

    /// Wait until at least `len` notified bytes have arrived, then take them.
    pub async fn wait_for_bytes(&self, len: usize, wait: Duration) -> Result<Vec<u8>> {
        let result = timeout(wait, async {
            loop {
                {
                    let mut received = self.received.lock().await;
                    if received.bytes.len() >= len {
                        return received.bytes.drain(..len).collect::<Vec<u8>>();
                    }
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;

        match result {
            Ok(data) => Ok(data),
            Err(_) => {
                let got = self.received.lock().await.bytes.len();
                Err(anyhow!("Timeout waiting for {} notified bytes, got {}", len, got))
            }
        }
    }

    /// Take everything notified once nothing new has arrived for `quiet`.
    pub async fn collect_until_quiet(&self, quiet: Duration) -> Vec<u8> {
        let mut last_len = None;
        loop {
            tokio::time::sleep(quiet).await;
            let mut received = self.received.lock().await;
            if last_len == Some(received.bytes.len()) {
                return std::mem::take(&mut received.bytes);
            }
            last_len = Some(received.bytes.len());
        }
    }

    /// Notifications received since the last clear.
    pub async fn notification_count(&self) -> usize {
        self.received.lock().await.notifications
    }

    pub async fn disconnect(&self) -> Result<()> {
        self.peripheral.unsubscribe(&self.tx_char).await?;
        self.peripheral.disconnect().await?;
        Ok(())
    }

    /// Forget anything notified so far.
    pub async fn clear_buffer(&self) {
        *self.received.lock().await = Received::default();
    }
}
