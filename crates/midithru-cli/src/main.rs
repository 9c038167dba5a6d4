mod args;
mod shutdown;

use std::ffi::OsString;
use std::io::{self, Write};
use std::process;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::Parser;
use midithru_midi::{LineReporter, MidiBackend, MidirBackend, ThruReporter, ThruSession};
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use crate::args::{Cli, USAGE};
use crate::shutdown::ShutdownSignal;

const EXIT_SUCCESS: i32 = 0;
/// Exit status for usage errors and ports that could not be opened.
const EXIT_FAILURE: i32 = -1;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .try_init()
        .ok();

    let shutdown = ShutdownSignal::new();
    shutdown
        .install_ctrlc()
        .context("failed to install Ctrl+C handler")?;
    shutdown
        .watch_stdin()
        .context("failed to watch stdin for a keypress")?;

    let code = run(
        std::env::args_os(),
        &mut MidirBackend,
        &mut io::stdout(),
        Arc::new(LineReporter::stdout()),
        &shutdown,
    )?;
    process::exit(code);
}

/// Parse `args`, bridge the selected ports until `shutdown` fires, and return the exit status.
///
/// User-facing lines go to `out`; per-message lines go through `reporter`.
fn run<B, I, T, W>(
    args: I,
    backend: &mut B,
    out: &mut W,
    reporter: Arc<dyn ThruReporter>,
    shutdown: &ShutdownSignal,
) -> Result<i32>
where
    B: MidiBackend,
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
    W: Write,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            write!(out, "{}", err.render())?;
            return Ok(EXIT_SUCCESS);
        }
        Err(err) => {
            debug!(%err, "rejected command line");
            return usage(out);
        }
    };

    if cli.list {
        list_ports(backend, out)?;
        return Ok(EXIT_SUCCESS);
    }

    let config = match cli.thru_config() {
        Ok(config) => config,
        Err(err) => {
            debug!(%err, "rejected port arguments");
            return usage(out);
        }
    };

    let session = match ThruSession::open(backend, &config, reporter) {
        Ok(session) => session,
        Err(err) => {
            error!(
                index = err.index(),
                cause = %err.cause(),
                "{err}"
            );
            writeln!(out, "{err}")?;
            return Ok(EXIT_FAILURE);
        }
    };

    writeln!(out, "Press any key to exit...")?;
    out.flush()?;
    shutdown.wait();

    let stats = session.close();
    info!(forwarded = stats.forwarded, failed = stats.failed, "shutting down");
    Ok(EXIT_SUCCESS)
}

fn usage<W: Write>(out: &mut W) -> Result<i32> {
    writeln!(out, "{USAGE}")?;
    Ok(EXIT_FAILURE)
}

fn list_ports<B: MidiBackend, W: Write>(backend: &B, out: &mut W) -> Result<()> {
    let inputs = backend.input_ports().context("failed to list MIDI inputs")?;
    let outputs = backend.output_ports().context("failed to list MIDI outputs")?;

    print_ports(out, "MIDI inputs", &inputs)?;
    print_ports(out, "MIDI outputs", &outputs)?;
    Ok(())
}

fn print_ports<W: Write>(out: &mut W, title: &str, ports: &[String]) -> io::Result<()> {
    if ports.is_empty() {
        return writeln!(out, "No {title} detected.");
    }
    writeln!(out, "Available {title}:")?;
    for (index, name) in ports.iter().enumerate() {
        writeln!(out, "  {index}: {name}")?;
    }
    Ok(())
}
