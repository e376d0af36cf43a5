//! Serial port configuration and connection management
//!
//! Handles USB serial port discovery and the line-oriented connection used to
//! talk to the demo board.

use anyhow::{Context, Result};
use colored::Colorize;
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io::{self, Read, Write};
use std::time::{Duration, Instant};

use super::LineSource;

/// Baud rate the demo firmware configures its console UART with
pub const DEFAULT_BAUD: u32 = 115200;

/// Per-read timeout; a read returning nothing after this long is not an error
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(1);

/// Longest unterminated line kept; anything beyond is noise from a wrong baud rate
pub const MAX_PENDING: usize = 4096;

/// Configuration for serial port connection
#[derive(Debug, Clone)]
pub struct PortConfig {
    /// Serial port path (e.g., /dev/ttyUSB0, /dev/ttyACM0, COM3)
    pub port_path: String,
    /// Baud rate (default: 115200)
    pub baud_rate: u32,
    /// Data bits (default: 8)
    pub data_bits: DataBits,
    /// Parity (default: None)
    pub parity: Parity,
    /// Stop bits (default: 1)
    pub stop_bits: StopBits,
    /// Flow control (default: None)
    pub flow_control: FlowControl,
    /// Read timeout
    pub timeout: Duration,
}

impl Default for PortConfig {
    fn default() -> Self {
        Self {
            port_path: String::from("/dev/ttyUSB0"),
            baud_rate: DEFAULT_BAUD,
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
            flow_control: FlowControl::None,
            timeout: DEFAULT_READ_TIMEOUT,
        }
    }
}

impl PortConfig {
    /// Create a new configuration with the default 115200 8N1 settings
    pub fn new(port_path: &str) -> Self {
        Self {
            port_path: port_path.to_string(),
            ..Default::default()
        }
    }

    /// Set the baud rate
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// Set the read timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// An open serial port read as a stream of text lines
pub struct SerialConnection {
    port: Box<dyn SerialPort>,
    config: PortConfig,
    /// Bytes received after the last complete line
    pending: Vec<u8>,
}

impl SerialConnection {
    /// Open a serial connection with the given configuration
    pub fn open(config: PortConfig) -> Result<Self> {
        let port = serialport::new(&config.port_path, config.baud_rate)
            .data_bits(config.data_bits)
            .parity(config.parity)
            .stop_bits(config.stop_bits)
            .flow_control(config.flow_control)
            .timeout(config.timeout)
            .open()
            .with_context(|| format!("Failed to open serial port: {}", config.port_path))?;

        log::debug!(
            "opened {} at {} baud (read timeout {:?})",
            config.port_path,
            config.baud_rate,
            config.timeout
        );

        Ok(Self::from_port(port, config))
    }

    fn from_port(port: Box<dyn SerialPort>, config: PortConfig) -> Self {
        Self {
            port,
            config,
            pending: Vec::new(),
        }
    }

    /// Get the port configuration
    pub fn config(&self) -> &PortConfig {
        &self.config
    }

    /// Read a line from the serial port (until newline)
    ///
    /// Returns `Ok(None)` once the read timeout has passed without a full
    /// line, even if bytes are still arriving. A partial line is kept and
    /// completed by later reads, up to `MAX_PENDING` bytes.
    pub fn read_line(&mut self) -> io::Result<Option<String>> {
        let started = Instant::now();
        let mut chunk = [0u8; 256];

        loop {
            if let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
                let mut line: Vec<u8> = self.pending.drain(..=pos).collect();
                line.pop();
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
                return Ok(Some(String::from_utf8_lossy(&line).into_owned()));
            }

            if self.pending.len() > MAX_PENDING {
                log::warn!(
                    "dropping {} bytes without a newline (wrong baud rate?)",
                    self.pending.len()
                );
                self.pending.clear();
            }

            if started.elapsed() >= self.config.timeout {
                return Ok(None);
            }

            match self.port.read(&mut chunk) {
                Ok(0) => return Ok(None),
                Ok(n) => self.pending.extend_from_slice(&chunk[..n]),
                Err(ref e) if e.kind() == io::ErrorKind::TimedOut => return Ok(None),
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    /// Write a string to the serial port
    pub fn write_str(&mut self, s: &str) -> Result<()> {
        self.port
            .write_all(s.as_bytes())
            .with_context(|| "Failed to write to serial port")
    }

    /// Flush output buffer
    pub fn flush(&mut self) -> Result<()> {
        self.port
            .flush()
            .with_context(|| "Failed to flush serial port")
    }

    /// Discard anything the device sent before we were ready to listen
    pub fn clear_input(&mut self) -> Result<()> {
        self.pending.clear();
        self.port
            .clear(serialport::ClearBuffer::Input)
            .with_context(|| "Failed to clear serial input buffer")
    }
}

impl LineSource for SerialConnection {
    fn read_line(&mut self) -> io::Result<Option<String>> {
        SerialConnection::read_line(self)
    }
}

/// Information about a detected serial port
#[derive(Debug, Clone)]
pub struct PortInfo {
    pub path: String,
    pub port_type: PortType,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
    pub vid: Option<u16>,
    pub pid: Option<u16>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PortType {
    UsbSerial,
    PciSerial,
    Bluetooth,
    Unknown,
}

impl std::fmt::Display for PortType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PortType::UsbSerial => write!(f, "USB Serial"),
            PortType::PciSerial => write!(f, "PCI Serial"),
            PortType::Bluetooth => write!(f, "Bluetooth"),
            PortType::Unknown => write!(f, "Unknown"),
        }
    }
}

/// List all available serial ports
pub fn list_ports() -> Result<Vec<PortInfo>> {
    let ports = serialport::available_ports().with_context(|| "Failed to enumerate serial ports")?;

    Ok(ports
        .into_iter()
        .map(|p| {
            let (port_type, manufacturer, product, vid, pid) = match p.port_type {
                serialport::SerialPortType::UsbPort(info) => (
                    PortType::UsbSerial,
                    info.manufacturer,
                    info.product,
                    Some(info.vid),
                    Some(info.pid),
                ),
                serialport::SerialPortType::PciPort => (PortType::PciSerial, None, None, None, None),
                serialport::SerialPortType::BluetoothPort => {
                    (PortType::Bluetooth, None, None, None, None)
                }
                serialport::SerialPortType::Unknown => (PortType::Unknown, None, None, None, None),
            };

            PortInfo {
                path: p.port_name,
                port_type,
                manufacturer,
                product,
                vid,
                pid,
            }
        })
        .collect())
}

/// Print formatted list of available serial ports
pub fn print_ports() -> Result<()> {
    let ports = list_ports()?;

    if ports.is_empty() {
        println!("{}", "No serial ports found".yellow());
        println!("\n{}", "Troubleshooting tips:".cyan().bold());
        println!("  1. Connect the board over USB");
        println!("  2. Check if the device is recognized: ls -la /dev/ttyUSB* /dev/ttyACM*");
        println!("  3. Add your user to the 'dialout' group: sudo usermod -aG dialout $USER");
        return Ok(());
    }

    println!("{}", "Available Serial Ports:".green().bold());
    println!("{}", "=".repeat(60));

    for port in ports {
        println!("\n{}: {}", "Port".cyan(), port.path.white().bold());
        println!("  Type: {}", port.port_type);

        if let Some(ref mfg) = port.manufacturer {
            println!("  Manufacturer: {}", mfg);
        }
        if let Some(ref prod) = port.product {
            println!("  Product: {}", prod);
        }
        if let (Some(vid), Some(pid)) = (port.vid, port.pid) {
            println!("  VID:PID: {:04x}:{:04x}", vid, pid);
        }
    }

    println!("\n{}", "=".repeat(60));
    println!("{}", "Use: dump-csv <PORT> <OUTPUT_CSV> to capture the log".yellow());

    Ok(())
}
