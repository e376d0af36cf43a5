//! Serial port communication for the demo board
//!
//! This module provides functionality for:
//! - Listing available serial ports (USB-to-serial adapters)
//! - Opening a port and reading its output line by line

pub mod port;

pub use port::{PortConfig, SerialConnection};

use std::io;

/// Anything that yields newline-delimited text, one line per call.
///
/// `Ok(None)` means the per-read timeout expired with no complete line.
pub trait LineSource {
    fn read_line(&mut self) -> io::Result<Option<String>>;
}
