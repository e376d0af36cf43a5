//! Capture session: the idle → collecting → done scan over incoming lines,
//! guarded by an idle deadline.

use log::{debug, info, warn};
use std::time::{Duration, Instant};

use super::frame::Frame;
use super::CaptureError;
use crate::serial::LineSource;

/// Longest allowed silence between two received lines
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    /// Waiting for `CSV_BEGIN`
    Idle,
    Collecting,
    /// `CSV_END` seen; nothing more is accepted
    Done,
}

/// Tunables for a capture run
#[derive(Debug, Clone)]
pub struct CaptureSettings {
    pub idle_timeout: Duration,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }
}

impl CaptureSettings {
    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }
}

/// How a capture ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// `CSV_END` was received
    Complete(Vec<String>),
    /// The device went quiet first; holds whatever was collected
    TimedOut(Vec<String>),
}

impl CaptureOutcome {
    pub fn lines(&self) -> &[String] {
        match self {
            CaptureOutcome::Complete(lines) | CaptureOutcome::TimedOut(lines) => lines,
        }
    }

    pub fn into_lines(self) -> Vec<String> {
        match self {
            CaptureOutcome::Complete(lines) | CaptureOutcome::TimedOut(lines) => lines,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, CaptureOutcome::Complete(_))
    }
}

/// Scans incoming lines for one CSV frame and collects its payload
pub struct CaptureSession {
    settings: CaptureSettings,
    state: CaptureState,
    lines: Vec<String>,
    last_activity: Instant,
}

impl CaptureSession {
    pub fn new(settings: CaptureSettings) -> Self {
        Self {
            settings,
            state: CaptureState::Idle,
            lines: Vec::new(),
            last_activity: Instant::now(),
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn is_done(&self) -> bool {
        self.state == CaptureState::Done
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn into_lines(self) -> Vec<String> {
        self.lines
    }

    /// Advance the scan by one raw line as read from the device.
    pub fn feed(&mut self, raw: &str) {
        if self.state == CaptureState::Done {
            return;
        }

        let text = raw.trim();
        match Frame::classify(text) {
            Frame::Begin => {
                debug!("CSV_BEGIN received");
                self.state = CaptureState::Collecting;
            }
            Frame::Size(size) => {
                debug!("device announced CSV size {:?}", size);
            }
            Frame::End => {
                debug!("CSV_END received after {} lines", self.lines.len());
                self.state = CaptureState::Done;
            }
            Frame::Data(line) => {
                if self.state == CaptureState::Collecting {
                    self.lines.push(line.to_string());
                }
            }
        }
    }

    fn idle_expired(&self) -> bool {
        self.last_activity.elapsed() > self.settings.idle_timeout
    }

    /// Read from `source` until `CSV_END` or until it stays silent for
    /// longer than the idle timeout.
    pub fn run<S: LineSource + ?Sized>(
        mut self,
        source: &mut S,
    ) -> Result<CaptureOutcome, CaptureError> {
        self.last_activity = Instant::now();

        loop {
            match source.read_line()? {
                Some(line) => {
                    self.last_activity = Instant::now();
                    self.feed(&line);
                    if self.is_done() {
                        info!("capture complete: {} lines", self.lines.len());
                        return Ok(CaptureOutcome::Complete(self.lines));
                    }
                }
                None => {
                    if self.idle_expired() {
                        if self.lines.is_empty() {
                            warn!(
                                "no data for {:?}, giving up",
                                self.settings.idle_timeout
                            );
                        } else {
                            warn!(
                                "no data for {:?} before CSV_END, keeping {} partial lines",
                                self.settings.idle_timeout,
                                self.lines.len()
                            );
                        }
                        return Ok(CaptureOutcome::TimedOut(self.lines));
                    }
                }
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::io;

    /// Simulated device: `Some` entries are lines, `None` entries are
    /// read timeouts. Once the script runs out the device stays silent.
    pub(crate) struct ScriptedSource {
        script: VecDeque<Option<String>>,
        read_delay: Duration,
    }

    impl ScriptedSource {
        pub(crate) fn new(script: &[Option<&str>]) -> Self {
            Self {
                script: script.iter().map(|s| s.map(str::to_string)).collect(),
                read_delay: Duration::from_millis(1),
            }
        }

        pub(crate) fn lines(lines: &[&str]) -> Self {
            let script: Vec<Option<&str>> = lines.iter().copied().map(Some).collect();
            Self::new(&script)
        }

        fn with_read_delay(mut self, read_delay: Duration) -> Self {
            self.read_delay = read_delay;
            self
        }

        fn remaining(&self) -> usize {
            self.script.len()
        }
    }

    impl LineSource for ScriptedSource {
        fn read_line(&mut self) -> io::Result<Option<String>> {
            match self.script.pop_front() {
                Some(Some(line)) => Ok(Some(line)),
                _ => {
                    std::thread::sleep(self.read_delay);
                    Ok(None)
                }
            }
        }
    }

    struct BrokenSource;

    impl LineSource for BrokenSource {
        fn read_line(&mut self) -> io::Result<Option<String>> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "device unplugged"))
        }
    }

    fn quick() -> CaptureSettings {
        CaptureSettings::default().with_idle_timeout(Duration::from_millis(30))
    }

    #[test]
    fn test_complete_capture() {
        let mut device =
            ScriptedSource::lines(&["CSV_BEGIN", "CSV_SIZE:2", "a", "b", "CSV_END"]);
        let outcome = CaptureSession::new(quick()).run(&mut device).unwrap();

        assert!(outcome.is_complete());
        assert_eq!(outcome.lines(), ["a", "b"]);
    }

    #[test]
    fn test_lines_outside_frame_are_dropped() {
        let mut device = ScriptedSource::lines(&[
            "[BLE] advertising",
            "ts,temp",
            "CSV_BEGIN",
            "x",
            "CSV_END",
            "late",
        ]);
        let outcome = CaptureSession::new(quick()).run(&mut device).unwrap();

        assert_eq!(outcome, CaptureOutcome::Complete(vec!["x".to_string()]));
        // The loop stops at CSV_END without reading further
        assert_eq!(device.remaining(), 1);
    }

    #[test]
    fn test_silent_device_times_out_empty() {
        let mut device = ScriptedSource::new(&[]);
        let outcome = CaptureSession::new(quick()).run(&mut device).unwrap();

        assert_eq!(outcome, CaptureOutcome::TimedOut(Vec::new()));
    }

    #[test]
    fn test_partial_capture_is_kept() {
        let mut device = ScriptedSource::lines(&["CSV_BEGIN", "a", "b"]);
        let outcome = CaptureSession::new(quick()).run(&mut device).unwrap();

        assert!(!outcome.is_complete());
        assert_eq!(outcome.into_lines(), vec!["a", "b"]);
    }

    #[test]
    fn test_idle_timeout_restarts_on_each_line() {
        // Every gap is shorter than the timeout, the whole exchange is longer
        let gap = [None, None, None];
        let mut script = vec![Some("CSV_BEGIN")];
        for line in ["a", "b", "c"] {
            script.extend_from_slice(&gap);
            script.push(Some(line));
        }
        script.extend_from_slice(&gap);
        script.push(Some("CSV_END"));

        let mut device = ScriptedSource::new(&script).with_read_delay(Duration::from_millis(10));
        let settings = CaptureSettings::default().with_idle_timeout(Duration::from_millis(100));
        let outcome = CaptureSession::new(settings).run(&mut device).unwrap();

        assert_eq!(outcome, CaptureOutcome::Complete(vec!["a".into(), "b".into(), "c".into()]));
    }

    #[test]
    fn test_lines_are_trimmed() {
        let mut session = CaptureSession::new(CaptureSettings::default());
        session.feed("CSV_BEGIN\r");
        session.feed("  1,2,3 \r");
        session.feed("CSV_END\r");

        assert!(session.is_done());
        assert_eq!(session.lines(), ["1,2,3"]);
    }

    #[test]
    fn test_state_transitions() {
        let mut session = CaptureSession::new(CaptureSettings::default());
        assert_eq!(session.state(), CaptureState::Idle);

        session.feed("noise");
        assert_eq!(session.state(), CaptureState::Idle);
        assert!(session.lines().is_empty());

        session.feed("CSV_BEGIN");
        assert_eq!(session.state(), CaptureState::Collecting);

        session.feed("CSV_SIZE:10");
        session.feed("row");
        session.feed("CSV_END");
        assert_eq!(session.state(), CaptureState::Done);

        session.feed("CSV_BEGIN");
        session.feed("after");
        assert_eq!(session.state(), CaptureState::Done);
        assert_eq!(session.into_lines(), vec!["row"]);
    }

    #[test]
    fn test_read_error_propagates() {
        let err = CaptureSession::new(quick()).run(&mut BrokenSource).unwrap_err();
        assert!(matches!(err, CaptureError::Read(_)));
    }
}
