use midir::{Ignore, MidiInput, MidiInputConnection, MidiOutput, MidiOutputConnection};
use tracing::debug;

use crate::backend::{InputConnection, InputHandler, MidiBackend, OutputPort};
use crate::message::{InputEvent, ShortMessage};
use crate::MidiError;

/// Backend implemented using the `midir` crate.
#[derive(Debug, Default)]
pub struct MidirBackend;

/// Output connection opened through midir.
pub struct MidirOutput {
    name: String,
    connection: MidiOutputConnection,
}

impl OutputPort for MidirOutput {
    fn name(&self) -> &str {
        &self.name
    }

    fn send(&mut self, message: &ShortMessage) -> Result<(), MidiError> {
        self.connection
            .send(message.as_bytes())
            .map_err(|err| MidiError::Send(err.to_string()))
    }
}

/// Input connection opened through midir. Events stop when this is dropped.
pub struct MidirInput {
    name: String,
    _connection: MidiInputConnection<()>,
}

impl InputConnection for MidirInput {
    fn name(&self) -> &str {
        &self.name
    }
}

fn new_input(client_name: &str) -> Result<MidiInput, MidiError> {
    let mut input = MidiInput::new(client_name).map_err(|err| MidiError::Init(err.to_string()))?;
    // Clock, active sensing and sysex all reach the handler; sysex is classified there.
    input.ignore(Ignore::None);
    Ok(input)
}

fn new_output(client_name: &str) -> Result<MidiOutput, MidiError> {
    MidiOutput::new(client_name).map_err(|err| MidiError::Init(err.to_string()))
}

impl MidiBackend for MidirBackend {
    type Output = MidirOutput;
    type Input = MidirInput;

    fn input_ports(&self) -> Result<Vec<String>, MidiError> {
        let input = new_input("midithru-list")?;
        Ok(input
            .ports()
            .iter()
            .enumerate()
            .map(|(index, port)| {
                input
                    .port_name(port)
                    .unwrap_or_else(|_| format!("Port {index}"))
            })
            .collect())
    }

    fn output_ports(&self) -> Result<Vec<String>, MidiError> {
        let output = new_output("midithru-list")?;
        Ok(output
            .ports()
            .iter()
            .enumerate()
            .map(|(index, port)| {
                output
                    .port_name(port)
                    .unwrap_or_else(|_| format!("Port {index}"))
            })
            .collect())
    }

    fn open_output(&mut self, index: usize, client_name: &str) -> Result<MidirOutput, MidiError> {
        let output = new_output(client_name)?;
        let ports = output.ports();
        let Some(port) = ports.get(index) else {
            return Err(MidiError::UnknownPort {
                index,
                available: ports.len(),
            });
        };
        let name = output
            .port_name(port)
            .unwrap_or_else(|_| format!("Port {index}"));
        let connection = output
            .connect(port, &format!("{client_name}-out"))
            .map_err(|err| MidiError::Connect(err.to_string()))?;
        debug!(index, port = %name, "midir output connected");
        Ok(MidirOutput { name, connection })
    }

    fn open_input(
        &mut self,
        index: usize,
        client_name: &str,
        mut handler: InputHandler,
    ) -> Result<MidirInput, MidiError> {
        let input = new_input(client_name)?;
        let ports = input.ports();
        let Some(port) = ports.get(index) else {
            return Err(MidiError::UnknownPort {
                index,
                available: ports.len(),
            });
        };
        let name = input
            .port_name(port)
            .unwrap_or_else(|_| format!("Port {index}"));
        let connection = input
            .connect(
                port,
                &format!("{client_name}-in"),
                move |timestamp, bytes, _| handler(InputEvent::from_raw(timestamp, bytes)),
                (),
            )
            .map_err(|err| MidiError::Connect(err.to_string()))?;
        debug!(index, port = %name, "midir input connected");
        Ok(MidirInput {
            name,
            _connection: connection,
        })
    }
}
