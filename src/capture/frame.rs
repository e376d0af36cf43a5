//! Framing markers of the CSV dump protocol
//!
//! The firmware answers `CSV_DUMP` with:
//!
//! ```text
//! CSV_BEGIN
//! CSV_SIZE:<bytes>
//! <payload lines>
//! CSV_END
//! ```
//!
//! interleaved with whatever else it happens to log on the same UART.

/// Command that asks the firmware to dump its CSV log
pub const TRIGGER: &str = "CSV_DUMP\n";

/// Line that opens the CSV frame
pub const BEGIN_MARKER: &str = "CSV_BEGIN";
/// Line that closes the CSV frame
pub const END_MARKER: &str = "CSV_END";
/// Prefix of the optional payload size line, e.g. `CSV_SIZE:1234`
pub const SIZE_PREFIX: &str = "CSV_SIZE:";

/// Classification of one received (already trimmed) line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame<'a> {
    Begin,
    /// Informational payload size; `None` if the value is not a number
    Size(Option<usize>),
    End,
    Data(&'a str),
}

impl<'a> Frame<'a> {
    pub fn classify(line: &'a str) -> Self {
        if line == BEGIN_MARKER {
            Frame::Begin
        } else if let Some(size) = line.strip_prefix(SIZE_PREFIX) {
            Frame::Size(size.trim().parse().ok())
        } else if line == END_MARKER {
            Frame::End
        } else {
            Frame::Data(line)
        }
    }
}
