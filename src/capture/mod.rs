//! CSV log capture over the serial console
//!
//! Sends `CSV_DUMP` to the board, collects the framed reply and saves it.

pub mod frame;
pub mod session;

pub use frame::{Frame, TRIGGER};
pub use session::{CaptureOutcome, CaptureSession, CaptureSettings, CaptureState};

use anyhow::Result;
use log::info;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::serial::{PortConfig, SerialConnection};

/// Time the board gets after the port opens (opening may reset it)
pub const SETTLE_DELAY: Duration = Duration::from_millis(200);

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("No CSV received.")]
    NoData,
    #[error("failed to read from serial port: {0}")]
    Read(#[from] io::Error),
    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Open the port, trigger a dump and collect the reply.
///
/// The port is closed when this returns, whatever the outcome.
pub fn capture_from_port(port: PortConfig, settings: CaptureSettings) -> Result<CaptureOutcome> {
    let mut conn = SerialConnection::open(port)?;

    std::thread::sleep(SETTLE_DELAY);
    conn.clear_input()?;
    conn.write_str(TRIGGER)?;
    conn.flush()?;
    info!("sent {:?} to {}", TRIGGER.trim_end(), conn.config().port_path);

    let outcome = CaptureSession::new(settings).run(&mut conn)?;
    Ok(outcome)
}

/// Write captured lines as a newline-terminated file; returns the line count.
pub fn write_csv(path: &Path, lines: &[String]) -> Result<usize, CaptureError> {
    if lines.is_empty() {
        return Err(CaptureError::NoData);
    }

    let mut contents = lines.join("\n");
    contents.push('\n');
    fs::write(path, contents).map_err(|source| CaptureError::Write {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(lines.len())
}

/// Success line printed after the CSV file is written
pub fn wrote_message(count: usize, path: &Path) -> String {
    format!("Wrote {} lines to {}", count, path.display())
}

#[cfg(test)]
mod tests {
    use super::session::tests::ScriptedSource;
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_capture_writes_payload() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("log.csv");

        let mut device =
            ScriptedSource::lines(&["CSV_BEGIN", "CSV_SIZE:2", "a", "b", "CSV_END"]);
        let outcome = CaptureSession::new(CaptureSettings::default())
            .run(&mut device)
            .unwrap();

        let count = write_csv(&out, outcome.lines()).unwrap();
        assert_eq!(count, 2);
        assert_eq!(fs::read_to_string(&out).unwrap(), "a\nb\n");
        assert!(wrote_message(count, &out).starts_with("Wrote 2 lines"));
    }

    #[test]
    fn test_silent_device_reports_no_csv() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("log.csv");

        let mut device = ScriptedSource::new(&[]);
        let settings = CaptureSettings::default().with_idle_timeout(Duration::from_millis(20));
        let outcome = CaptureSession::new(settings).run(&mut device).unwrap();

        let err = write_csv(&out, outcome.lines()).unwrap_err();
        assert!(matches!(err, CaptureError::NoData));
        assert_eq!(err.to_string(), "No CSV received.");
        assert!(!out.exists());
    }

    #[test]
    fn test_write_into_missing_directory_fails() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("missing").join("log.csv");

        let err = write_csv(&out, &["a".to_string()]).unwrap_err();
        assert!(matches!(err, CaptureError::Write { .. }));
    }
}
