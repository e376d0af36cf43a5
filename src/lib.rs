//! ESP32 Demo Tools
//!
//! Developer tooling for the ESP32 Web Bluetooth demo.
//!
//! # Features
//!
//! - **CSV Capture**: Ask the board for its CSV log over the serial console
//!   and save it to disk (`dump-csv`)
//! - **HTTPS Dev Server**: Serve the web app over HTTPS with a generated
//!   self-signed certificate, since Web Bluetooth needs a secure context
//!   (`https-dev-server`)
//!
//! # Usage
//!
//! ```bash
//! # List serial ports
//! dump-csv --list
//!
//! # Dump the board's log
//! dump-csv /dev/ttyUSB0 log.csv
//!
//! # Serve the demo at https://127.0.0.1:8443
//! https-dev-server --dir ../docs
//! ```

pub mod capture;
pub mod cert;
pub mod serial;
pub mod server;
