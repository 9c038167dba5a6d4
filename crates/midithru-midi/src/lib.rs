//! MIDI thru: forwards every short message received on one input port to one output port.

use thiserror::Error;

pub mod backend;
pub mod backend_midir;
pub mod forwarder;
pub mod message;
pub mod report;

pub use backend::{InputConnection, InputHandler, MidiBackend, OutputPort};
pub use backend_midir::MidirBackend;
pub use forwarder::{StatsSnapshot, ThruError, ThruForwarder, ThruSession, ThruStats};
pub use message::{InputEvent, ShortMessage};
pub use report::{elapsed_millis, LineReporter, PortDirection, ThruReporter};

/// Client name announced to the host MIDI subsystem when none is configured.
pub const DEFAULT_CLIENT_NAME: &str = "midithru";

/// Errors that can be produced while dealing with MIDI backends.
#[derive(Debug, Error)]
pub enum MidiError {
    /// The requested port index is not in the enumerated port list.
    #[error("MIDI port {index} does not exist ({available} available)")]
    UnknownPort { index: usize, available: usize },
    /// The host MIDI client could not be created.
    #[error("failed to initialise MIDI client: {0}")]
    Init(String),
    /// The port exists but the connection was refused.
    #[error("failed to connect MIDI port: {0}")]
    Connect(String),
    /// A message could not be delivered to the output port.
    #[error("failed to send MIDI message: {0}")]
    Send(String),
}

/// Which ports to bridge and how to present ourselves to the host.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ThruConfig {
    /// Index of the input port in the backend's enumeration.
    pub input_port: usize,
    /// Index of the output port in the backend's enumeration.
    pub output_port: usize,
    /// Client and connection name given to the host MIDI API.
    pub client_name: String,
}

impl Default for ThruConfig {
    fn default() -> Self {
        Self {
            input_port: 0,
            output_port: 0,
            client_name: DEFAULT_CLIENT_NAME.to_owned(),
        }
    }
}

impl ThruConfig {
    /// Bridge `input_port` to `output_port` using the default client name.
    pub fn new(input_port: usize, output_port: usize) -> Self {
        Self {
            input_port,
            output_port,
            ..Self::default()
        }
    }

    /// Replace the client name announced to the host.
    pub fn with_client_name(mut self, name: impl Into<String>) -> Self {
        self.client_name = name.into();
        self
    }
}
