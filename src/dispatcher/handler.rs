//! Shell command handler
//!
//! Executes parsed shell commands against the BLE UART bridge and prints
//! the outcome on the console.

use core::fmt::{self, Write as _};

use embassy_sync::blocking_mutex::raw::RawMutex;
use embedded_hal_async::delay::DelayNs;
use embedded_io_async::Write;
use heapless::String;
use log::{info, warn};

use crate::ble::bleuart::BleUart;
use crate::ble::gatt::GattHost;
use crate::commands::types::{CommandError, NusTestReport, ShellCommand};
use crate::config::{console, nustest};

/// Millisecond time source
pub trait Clock {
    fn now_ms(&self) -> u64;
}

const HELP: &str = "commands:\r\n\
    \x20 bleuarttx <text|AA-BB-CC>  send to the connected peer\r\n\
    \x20 bleuartrx                  print bytes received from the peer\r\n\
    \x20 nustest [count] [size]     send count packets of size bytes\r\n\
    \x20 help                       this list\r\n";

/// Write formatted text, truncated to one console line
async fn print<W: Write>(out: &mut W, args: fmt::Arguments<'_>) -> Result<(), W::Error> {
    let mut line: String<{ console::MAX_LINE_LEN }> = String::new();
    let _ = line.write_fmt(args);
    out.write_all(line.as_bytes()).await
}

/// Print a rejected command line
pub async fn report_error<W: Write>(out: &mut W, error: CommandError) -> Result<(), W::Error> {
    print(out, format_args!("error: {}\r\n", error.message())).await
}

/// Copy everything waiting in the bridge's RX FIFO to `out`.
///
/// Returns the number of bytes forwarded.
pub async fn forward_pending<M, H, W, const N: usize>(
    bridge: &BleUart<'_, M, H, N>,
    out: &mut W,
) -> Result<usize, W::Error>
where
    M: RawMutex,
    H: GattHost,
    W: Write,
{
    let mut chunk = [0u8; console::FORWARD_CHUNK];
    let mut total = 0;
    loop {
        let n = bridge.read(&mut chunk);
        if n == 0 {
            return Ok(total);
        }
        out.write_all(&chunk[..n]).await?;
        total += n;
    }
}

/// Shell command handler
pub struct CommandHandler<C: Clock, D: DelayNs> {
    clock: C,
    delay: D,
}

impl<C: Clock, D: DelayNs> CommandHandler<C, D> {
    pub fn new(clock: C, delay: D) -> Self {
        Self { clock, delay }
    }

    /// Execute a command and print its result
    pub async fn execute<M, H, W, const N: usize>(
        &mut self,
        command: ShellCommand,
        bridge: &BleUart<'_, M, H, N>,
        out: &mut W,
    ) -> Result<(), W::Error>
    where
        M: RawMutex,
        H: GattHost,
        W: Write,
    {
        match command {
            ShellCommand::BleUartTx(payload) => {
                let data = payload.as_bytes();
                let sent = bridge.write(data);
                if sent == 0 && !bridge.is_connected() {
                    print(out, format_args!("not connected\r\n")).await
                } else {
                    print(out, format_args!("sent {}/{} bytes\r\n", sent, data.len())).await
                }
            }
            ShellCommand::BleUartRx => {
                forward_pending(bridge, out).await?;
                out.write_all(b"\r\n").await
            }
            ShellCommand::NusTest { count, size } => {
                let report = self.nustest(bridge, count, size).await;
                print(
                    out,
                    format_args!(
                        "Submitted {} bytes ({} packets of {} size), {} accepted in {} ms, {} KB/s\r\n",
                        report.attempted,
                        report.packets,
                        report.size,
                        report.accepted,
                        report.elapsed_ms,
                        report.throughput_kbps()
                    ),
                )
                .await
            }
            ShellCommand::Help => out.write_all(HELP.as_bytes()).await,
        }
    }

    /// Send `count` packets of `size` bytes through the bridge.
    ///
    /// Each packet is the digits `0123456789` repeated. `count` and `size`
    /// are clamped to the shell limits. Packets larger than
    /// the default ATT payload first request an MTU exchange if a peer is
    /// connected.
    pub async fn nustest<M, H, const N: usize>(
        &mut self,
        bridge: &BleUart<'_, M, H, N>,
        count: u32,
        size: u32,
    ) -> NusTestReport
    where
        M: RawMutex,
        H: GattHost,
    {
        let count = count.min(nustest::MAX_COUNT);
        let size = size.min(nustest::MAX_SIZE);
        let mut buf = [0u8; nustest::MAX_SIZE as usize];
        for (i, byte) in buf.iter_mut().enumerate() {
            *byte = (i % 10) as u8 + b'0';
        }
        let payload = &buf[..size as usize];

        if size > nustest::MTU_EXCHANGE_THRESHOLD && bridge.is_connected() {
            if let Err(e) = bridge.exchange_mtu() {
                warn!("nustest: MTU exchange failed: {:?}", e);
            }
            self.delay.delay_ms(nustest::MTU_SETTLE_MS).await;
        }

        let start = self.clock.now_ms();
        let mut accepted: u32 = 0;
        for _ in 0..count {
            accepted += bridge.write(payload) as u32;
        }
        let elapsed_ms = self.clock.now_ms().saturating_sub(start) as u32;

        let report = NusTestReport {
            packets: count,
            size,
            attempted: count * size,
            accepted,
            elapsed_ms,
        };
        info!(
            "nustest: {} of {} bytes accepted in {} ms",
            report.accepted, report.attempted, report.elapsed_ms
        );
        report
    }
}
