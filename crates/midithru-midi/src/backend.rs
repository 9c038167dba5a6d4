use crate::message::{InputEvent, ShortMessage};
use crate::MidiError;

/// Handler registered with an input port. Runs on a thread owned by the MIDI backend.
pub type InputHandler = Box<dyn FnMut(InputEvent) + Send + 'static>;

/// An open output port.
pub trait OutputPort: Send {
    /// Name of the connected port.
    fn name(&self) -> &str;

    /// Blocking send of a single short message.
    fn send(&mut self, message: &ShortMessage) -> Result<(), MidiError>;
}

/// An open input port. Dropping it stops event delivery.
pub trait InputConnection {
    /// Name of the connected port.
    fn name(&self) -> &str;
}

/// Backend abstraction for platform specific MIDI implementations.
pub trait MidiBackend {
    type Output: OutputPort + 'static;
    type Input: InputConnection;

    /// Enumerate available input port names, in index order.
    fn input_ports(&self) -> Result<Vec<String>, MidiError>;

    /// Enumerate available output port names, in index order.
    fn output_ports(&self) -> Result<Vec<String>, MidiError>;

    /// Open the output port at `index`.
    fn open_output(&mut self, index: usize, client_name: &str) -> Result<Self::Output, MidiError>;

    /// Open the input port at `index` and start delivering events to `handler`.
    fn open_input(
        &mut self,
        index: usize,
        client_name: &str,
        handler: InputHandler,
    ) -> Result<Self::Input, MidiError>;
}
