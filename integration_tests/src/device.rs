//! Console client for the device shell.

#![allow(dead_code)]

use std::io::{Read, Write};
use std::time::{Duration, Instant};

use anyhow::Result;
use serialport::SerialPort;

/// Find the console port by scanning USB serial devices and sending `help`.
pub fn find_console_port() -> Result<String> {
    let ports = serialport::available_ports()?;

    for port_info in ports {
        // Filter to ttyACM devices (USB Serial JTAG enumerates as CDC-ACM)
        if !port_info.port_name.contains("ttyACM") {
            continue;
        }

        if let Ok(mut client) = DeviceClient::new(&port_info.port_name, 115200) {
            if client.drain_buffer().is_err() {
                continue;
            }
            if client.send_line("help").is_ok()
                && client
                    .read_until("nustest", Duration::from_millis(500))
                    .is_ok()
            {
                return Ok(port_info.port_name.clone());
            }
        }
    }

    anyhow::bail!("No console port found - ensure device is connected")
}

/// Resolve a port argument - returns the port path if not "auto", otherwise auto-detects.
pub fn resolve_port(port_arg: &str) -> Result<String> {
    if port_arg == "auto" {
        find_console_port()
    } else {
        Ok(port_arg.to_string())
    }
}

/// Client for the line-based shell on the device console.
pub struct DeviceClient {
    port: Box<dyn SerialPort>,
    timeout: Duration,
}

impl DeviceClient {
    /// Create a new device client.
    pub fn new(port_name: &str, baud_rate: u32) -> Result<Self> {
        let port = serialport::new(port_name, baud_rate)
            .timeout(Duration::from_millis(100))
            .open()?;

        Ok(Self {
            port,
            timeout: Duration::from_secs(2),
        })
    }

    /// Set the response timeout.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// Clear any pending data in the serial buffer.
    pub fn clear_buffer(&mut self) -> Result<()> {
        self.port.clear(serialport::ClearBuffer::All)?;
        Ok(())
    }

    /// Drain all pending data from the serial port.
    /// Reads until no more data is available (with a short timeout).
    pub fn drain_buffer(&mut self) -> Result<()> {
        self.port.clear(serialport::ClearBuffer::All)?;

        let mut buf = [0u8; 256];
        loop {
            match self.port.read(&mut buf) {
                Ok(0) => break,
                Ok(_) => continue,
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => break,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// Send one shell line.
    pub fn send_line(&mut self, line: &str) -> Result<()> {
        self.port.write_all(line.as_bytes())?;
        self.port.write_all(b"\r\n")?;
        self.port.flush()?;
        Ok(())
    }

    /// Send a command and collect output until `marker` appears.
    pub fn command(&mut self, line: &str, marker: &str) -> Result<String> {
        self.send_line(line)?;
        self.read_until(marker, self.timeout)
    }

    /// Read console output until it contains `marker`.
    ///
    /// Returns everything read up to and including the line holding the
    /// marker.
    pub fn read_until(&mut self, marker: &str, timeout: Duration) -> Result<String> {
        let mut data = Vec::new();
        let mut buf = [0u8; 64];
        let start = Instant::now();

        while start.elapsed() < timeout {
            match self.port.read(&mut buf) {
                Ok(n) => {
                    data.extend_from_slice(&buf[..n]);
                    let text = String::from_utf8_lossy(&data);
                    if let Some(pos) = text.find(marker) {
                        // Finish the line the marker is on
                        if text[pos..].contains('\n') {
                            return Ok(text.into_owned());
                        }
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => continue,
                Err(e) => return Err(e.into()),
            }
        }

        anyhow::bail!(
            "Timeout waiting for {:?}, got {} bytes: {:?}",
            marker,
            data.len(),
            String::from_utf8_lossy(&data)
        );
    }

    /// Read exactly `len` raw bytes from the console.
    pub fn read_bytes(&mut self, len: usize, timeout: Duration) -> Result<Vec<u8>> {
        let mut data = Vec::with_capacity(len);
        let mut buf = [0u8; 64];
        let start = Instant::now();

        while data.len() < len && start.elapsed() < timeout {
            let want = (len - data.len()).min(buf.len());
            match self.port.read(&mut buf[..want]) {
                Ok(n) => data.extend_from_slice(&buf[..n]),
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => continue,
                Err(e) => return Err(e.into()),
            }
        }

        if data.len() < len {
            anyhow::bail!(
                "Timeout waiting for {} bytes, got {}: {:02x?}",
                len,
                data.len(),
                data
            );
        }
        Ok(data)
    }

    /// Port path, for reporting.
    pub fn port_name(&self) -> Result<String> {
        Ok(self.port.name().unwrap_or_default())
    }
}
