#![no_std]
#![no_main]

extern crate alloc;

// Required for ESP-IDF bootloader compatibility
// Use explicit parameters to ensure correct efuse block revision values
esp_bootloader_esp_idf::esp_app_desc!(
    env!("CARGO_PKG_VERSION"),  // version
    env!("CARGO_PKG_NAME"),     // project_name
    "00:00:00",                 // build_time
    "2025-01-01",               // build_date
    "0.0.0",                    // idf_ver (not using IDF)
    0x10000,                    // mmu_page_size (64KB)
    0,                          // min_efuse_blk_rev_full (accept all)
    u16::MAX                    // max_efuse_blk_rev_full (accept all)
);

use embassy_executor::Spawner;
use embassy_sync::mutex::Mutex;
use esp_backtrace as _;
use esp_hal::gpio::{Level, Output, OutputConfig};
use esp_hal::timer::timg::TimerGroup;
use esp_hal::usb_serial_jtag::{UsbSerialJtag, UsbSerialJtagRx, UsbSerialJtagTx};
use esp_hal::Async;
use static_cell::StaticCell;

use bluefruit_bleuart_firmware::ble::BleUart;
use bluefruit_bleuart_firmware::config;
use bluefruit_bleuart_firmware::debug;
use bluefruit_bleuart_firmware::fifo::OverflowPolicy;
use bluefruit_bleuart_firmware::tasks::{self, Bridge, SharedConsole, TroubleGattHost};

/// Static executor for embassy
static EXECUTOR: StaticCell<esp_rtos::embassy::Executor> = StaticCell::new();

/// Static cell for esp-radio controller (needed for 'static lifetime)
static RADIO_CONTROLLER: StaticCell<esp_radio::Controller<'static>> = StaticCell::new();

/// Console output shared between tasks
static CONSOLE_TX: StaticCell<SharedConsole> = StaticCell::new();

/// Attribute server adapter shared by the BLE task and the bridge
static GATT_HOST: TroubleGattHost = TroubleGattHost::new();

/// The BLE UART bridge
static BRIDGE: Bridge = BleUart::new(
    &GATT_HOST,
    OverflowPolicy::from_overwritable(config::bleuart::RX_OVERWRITE),
);

/// Type alias for the BLE controller
type BleController = trouble_host::prelude::ExternalController<
    esp_radio::ble::controller::BleConnector<'static>,
    10,
>;

#[esp_hal::main]
fn main() -> ! {
    // Initialise heap allocator for BLE support (64KB - BLE requires significant heap)
    esp_alloc::heap_allocator!(size: 64 * 1024);

    let peripherals = esp_hal::init(esp_hal::Config::default());

    let led = Output::new(peripherals.GPIO48, Level::Low, OutputConfig::default());

    // Initialise the RTOS scheduler with timer - MUST be done before any async operations
    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    // USB Serial JTAG carries the shell, bridged bytes and log output
    let usb_serial = UsbSerialJtag::new(peripherals.USB_DEVICE).into_async();
    let (usb_rx, usb_tx) = usb_serial.split();

    // Random static address derived from the eFuse MAC address
    let mac = esp_hal::efuse::Efuse::read_base_mac_address();
    let address = [mac[3], mac[4], mac[5], 0x1E, 0x83, 0xE7];

    // Initialise esp-radio for BLE support (must be after esp_rtos::start)
    let radio_controller = RADIO_CONTROLLER.init(
        esp_radio::init().expect("Failed to initialize esp-radio")
    );

    // Create BLE connector (ownership is passed to ExternalController)
    let ble_connector = esp_radio::ble::controller::BleConnector::new(
        radio_controller,
        peripherals.BT,
        esp_radio::ble::Config::default(),
    ).expect("Failed to initialize BLE connector");

    // Wrap in ExternalController for trouble-host compatibility
    let controller: BleController = trouble_host::prelude::ExternalController::new(ble_connector);

    // Create and run the embassy executor
    let executor = EXECUTOR.init(esp_rtos::embassy::Executor::new());
    executor.run(|spawner| {
        spawner.must_spawn(async_main(spawner, usb_rx, usb_tx, led, controller, address));
    })
}

#[embassy_executor::task]
async fn async_main(
    spawner: Spawner,
    usb_rx: UsbSerialJtagRx<'static, Async>,
    usb_tx: UsbSerialJtagTx<'static, Async>,
    led: Output<'static>,
    ble_controller: BleController,
    address: [u8; 6],
) {
    let console_tx: &'static SharedConsole = CONSOLE_TX.init(Mutex::new(usb_tx));

    if debug::init(log::LevelFilter::Info).is_err() {
        esp_println::println!("logger already installed");
    }

    // Spawn tasks
    spawner.spawn(debug_writer_task(console_tx)).unwrap();
    spawner.spawn(shell_task(usb_rx, console_tx)).unwrap();
    spawner.spawn(bridge_task(console_tx)).unwrap();
    spawner.spawn(led_task(led)).unwrap();
    spawner.spawn(ble_host_task(ble_controller, address)).unwrap();
}

/// Task that flushes log output to the console
#[embassy_executor::task]
async fn debug_writer_task(console_tx: &'static SharedConsole) {
    debug::debug_writer_task(console_tx).await
}

/// Task that reads shell commands from USB serial
#[embassy_executor::task]
async fn shell_task(usb_rx: UsbSerialJtagRx<'static, Async>, console_tx: &'static SharedConsole) {
    tasks::shell_task(usb_rx, console_tx, &BRIDGE).await
}

/// Task that copies bytes received over BLE to the console
#[embassy_executor::task]
async fn bridge_task(console_tx: &'static SharedConsole) {
    tasks::bridge_task(&BRIDGE, console_tx).await
}

/// Heartbeat LED
#[embassy_executor::task]
async fn led_task(led: Output<'static>) {
    tasks::led_task(led).await
}

/// Task that manages BLE connectivity
///
/// This task handles BLE advertising and connections, and carries the
/// bridge's traffic over the Nordic UART Service.
#[embassy_executor::task]
async fn ble_host_task(controller: BleController, address: [u8; 6]) {
    tasks::ble_task(controller, &BRIDGE, &GATT_HOST, address).await;
}
