use std::fmt;
use std::io::{self, Write};
use std::time::Duration;

use parking_lot::Mutex;

use crate::message::ShortMessage;
use crate::MidiError;

/// Side of the thru connection a port belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PortDirection {
    Input,
    Output,
}

impl fmt::Display for PortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortDirection::Input => f.write_str("Midi In"),
            PortDirection::Output => f.write_str("Midi Out"),
        }
    }
}

/// Receives user-facing notifications from a thru session.
///
/// `send_timed` and `send_failed` are called from the MIDI backend's thread.
pub trait ThruReporter: Send + Sync {
    /// A port was opened successfully.
    fn port_opened(&self, _direction: PortDirection, _name: &str) {}

    /// A send call returned, successfully or not; `elapsed` covers the send call only.
    fn send_timed(&self, message: &ShortMessage, elapsed: Duration);

    /// The output port rejected a message. Follows the `send_timed` call for it.
    fn send_failed(&self, message: &ShortMessage, error: &MidiError);
}

/// Convert a measured duration to fractional milliseconds.
pub fn elapsed_millis(elapsed: Duration) -> f64 {
    elapsed.as_nanos() as f64 / 1_000_000.0
}

/// Reporter writing one line per notification to a writer, stdout by default.
pub struct LineReporter<W: Write + Send> {
    out: Mutex<W>,
}

impl LineReporter<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> LineReporter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    /// Recover the underlying writer.
    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }

    fn line(&self, args: fmt::Arguments<'_>) {
        let mut out = self.out.lock();
        // Console output is best effort; a closed stdout must not stop forwarding.
        let _ = writeln!(out, "{args}");
        let _ = out.flush();
    }
}

impl<W: Write + Send> ThruReporter for LineReporter<W> {
    fn port_opened(&self, direction: PortDirection, name: &str) {
        self.line(format_args!("{direction} Port is open: {name}"));
    }

    fn send_timed(&self, _message: &ShortMessage, elapsed: Duration) {
        self.line(format_args!("Midi Out ms: {}", elapsed_millis(elapsed)));
    }

    fn send_failed(&self, message: &ShortMessage, error: &MidiError) {
        self.line(format_args!("Midi Out failed ({message}): {error}"));
    }
}
