use clap::Parser;
use midithru_midi::{ThruConfig, DEFAULT_CLIENT_NAME};
use thiserror::Error;

/// One-line usage printed for a malformed command line.
pub const USAGE: &str = "midithru InPortId OutPortId";

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Forward every message from one MIDI input port to one MIDI output port"
)]
pub struct Cli {
    /// List the available MIDI ports with their indices and exit.
    #[arg(long)]
    pub list: bool,
    /// Client name announced to the host MIDI subsystem.
    #[arg(long, default_value = DEFAULT_CLIENT_NAME)]
    pub client_name: String,
    /// Input port index followed by output port index. Both default to 0.
    #[arg(value_name = "PORT", allow_negative_numbers = true)]
    pub ports: Vec<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("expected zero or two port arguments, got {0}")]
pub struct UsageError(pub usize);

impl Cli {
    /// Build the thru configuration from the positional port arguments.
    pub fn thru_config(&self) -> Result<ThruConfig, UsageError> {
        let (input, output) = select_ports(&self.ports)?;
        Ok(ThruConfig::new(input, output).with_client_name(self.client_name.clone()))
    }
}

/// Resolve `(input, output)` port indices from the positional arguments.
pub fn select_ports(ports: &[String]) -> Result<(usize, usize), UsageError> {
    match ports {
        [] => Ok((0, 0)),
        [input, output] => Ok((parse_port_index(input), parse_port_index(output))),
        other => Err(UsageError(other.len())),
    }
}

/// Best-effort index parse: leading decimal digits after optional whitespace
/// and `+`. Anything unparsable, including negative numbers, yields 0.
pub fn parse_port_index(text: &str) -> usize {
    let text = text.trim_start();
    let text = text.strip_prefix('+').unwrap_or(text);
    let end = text
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(text.len());
    text[..end].parse().unwrap_or(0)
}
