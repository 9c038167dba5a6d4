//! The thru forwarder and the session that wires it between two ports.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, info, trace, warn};

use crate::backend::{InputConnection, MidiBackend, OutputPort};
use crate::message::{InputEvent, ShortMessage};
use crate::report::{elapsed_millis, PortDirection, ThruReporter};
use crate::{MidiError, ThruConfig};

/// Fatal failures while setting up a thru session.
#[derive(Debug, Error)]
pub enum ThruError {
    #[error("Midi Out Port could not be opened.")]
    OutputOpen { index: usize, source: MidiError },
    #[error("Midi In Port could not be opened.")]
    InputOpen { index: usize, source: MidiError },
}

impl ThruError {
    /// Which side failed to open.
    pub fn direction(&self) -> PortDirection {
        match self {
            ThruError::OutputOpen { .. } => PortDirection::Output,
            ThruError::InputOpen { .. } => PortDirection::Input,
        }
    }

    /// Requested port index on the failing side.
    pub fn index(&self) -> usize {
        match self {
            ThruError::OutputOpen { index, .. } | ThruError::InputOpen { index, .. } => *index,
        }
    }

    /// Backend error behind the failure.
    pub fn cause(&self) -> &MidiError {
        match self {
            ThruError::OutputOpen { source, .. } | ThruError::InputOpen { source, .. } => source,
        }
    }
}

/// Counters updated from the forwarding handler.
#[derive(Debug, Default)]
pub struct ThruStats {
    forwarded: AtomicU64,
    failed: AtomicU64,
    ignored: AtomicU64,
}

/// Point in time copy of [`ThruStats`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Messages delivered to the output port.
    pub forwarded: u64,
    /// Messages the output port rejected.
    pub failed: u64,
    /// Input events that were not short messages.
    pub ignored: u64,
}

impl ThruStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            forwarded: self.forwarded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            ignored: self.ignored.load(Ordering::Relaxed),
        }
    }
}

/// Sends every received short message to an output port, timing each send.
pub struct ThruForwarder<O: OutputPort> {
    // The lock serializes deliveries if the backend ever overlaps callbacks.
    output: Mutex<O>,
    reporter: Arc<dyn ThruReporter>,
    stats: ThruStats,
}

impl<O: OutputPort> ThruForwarder<O> {
    pub fn new(output: O, reporter: Arc<dyn ThruReporter>) -> Self {
        Self {
            output: Mutex::new(output),
            reporter,
            stats: ThruStats::default(),
        }
    }

    /// Handle one input event. Only [`InputEvent::Data`] produces a send.
    pub fn handle(&self, event: InputEvent) {
        match event {
            InputEvent::Data { message, .. } => self.forward(&message),
            InputEvent::Error { message } => {
                self.stats.ignored.fetch_add(1, Ordering::Relaxed);
                warn!(%message, "midi input reported an error");
            }
            other => {
                self.stats.ignored.fetch_add(1, Ordering::Relaxed);
                debug!(kind = other.kind(), "ignoring midi input event");
            }
        }
    }

    fn forward(&self, message: &ShortMessage) {
        let mut output = self.output.lock();
        let started = Instant::now();
        let result = output.send(message);
        let elapsed = started.elapsed();
        drop(output);

        trace!(%message, ms = elapsed_millis(elapsed), ok = result.is_ok(), "send returned");
        self.reporter.send_timed(message, elapsed);
        match result {
            Ok(()) => {
                self.stats.forwarded.fetch_add(1, Ordering::Relaxed);
            }
            Err(err) => {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                warn!(%message, error = %err, "failed to forward midi message");
                self.reporter.send_failed(message, &err);
            }
        }
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Name of the output port this forwarder sends to.
    pub fn output_name(&self) -> String {
        self.output.lock().name().to_owned()
    }
}

/// An output port and an input port bridged by a [`ThruForwarder`].
///
/// Dropping the session closes the input before the output, so no event is
/// delivered to a released output.
pub struct ThruSession<B: MidiBackend> {
    input: Option<B::Input>,
    forwarder: Arc<ThruForwarder<B::Output>>,
}

impl<B: MidiBackend> ThruSession<B> {
    /// Open the output port, then the input port, and start forwarding.
    ///
    /// The input is never touched when the output fails to open.
    pub fn open(
        backend: &mut B,
        config: &ThruConfig,
        reporter: Arc<dyn ThruReporter>,
    ) -> Result<Self, ThruError> {
        let output = backend
            .open_output(config.output_port, &config.client_name)
            .map_err(|source| ThruError::OutputOpen {
                index: config.output_port,
                source,
            })?;
        info!(index = config.output_port, port = output.name(), "midi output open");
        reporter.port_opened(PortDirection::Output, output.name());

        let forwarder = Arc::new(ThruForwarder::new(output, Arc::clone(&reporter)));
        let handler = Arc::clone(&forwarder);
        let input = backend
            .open_input(
                config.input_port,
                &config.client_name,
                Box::new(move |event: InputEvent| handler.handle(event)),
            )
            .map_err(|source| ThruError::InputOpen {
                index: config.input_port,
                source,
            })?;
        info!(index = config.input_port, port = input.name(), "midi input open");
        reporter.port_opened(PortDirection::Input, input.name());

        Ok(Self {
            input: Some(input),
            forwarder,
        })
    }

    pub fn input_name(&self) -> Option<&str> {
        self.input.as_ref().map(|input| input.name())
    }

    pub fn output_name(&self) -> String {
        self.forwarder.output_name()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.forwarder.stats()
    }

    /// Stop receiving and release both ports, returning the final counters.
    pub fn close(mut self) -> StatsSnapshot {
        self.input.take();
        let stats = self.forwarder.stats();
        info!(
            forwarded = stats.forwarded,
            failed = stats.failed,
            ignored = stats.ignored,
            "midi thru closed"
        );
        stats
    }
}

impl<B: MidiBackend> Drop for ThruSession<B> {
    fn drop(&mut self) {
        self.input.take();
    }
}
