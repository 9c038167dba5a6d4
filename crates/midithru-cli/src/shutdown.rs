use std::io::{self, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::debug;

/// How often the main thread checks for a shutdown request.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Cancellation flag raised by a keypress on stdin or by Ctrl+C.
#[derive(Clone, Debug, Default)]
pub struct ShutdownSignal {
    requested: Arc<AtomicBool>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Trigger on Ctrl+C. Can only be installed once per process.
    pub fn install_ctrlc(&self) -> Result<(), ctrlc::Error> {
        let signal = self.clone();
        ctrlc::set_handler(move || signal.trigger())
    }

    /// Trigger as soon as one byte arrives on `reader`.
    ///
    /// End of input does not trigger, so a detached stdin keeps the process
    /// running until Ctrl+C.
    pub fn watch_reader<R>(&self, mut reader: R) -> io::Result<thread::JoinHandle<()>>
    where
        R: Read + Send + 'static,
    {
        let signal = self.clone();
        thread::Builder::new()
            .name("midithru-keypress".into())
            .spawn(move || {
                let mut byte = [0u8; 1];
                match reader.read(&mut byte) {
                    Ok(0) => debug!("stdin closed; waiting for Ctrl+C"),
                    Ok(_) => signal.trigger(),
                    Err(err) => debug!(?err, "stdin read failed; waiting for Ctrl+C"),
                }
            })
    }

    pub fn watch_stdin(&self) -> io::Result<thread::JoinHandle<()>> {
        self.watch_reader(io::stdin())
    }

    /// Block the calling thread until the signal is triggered.
    pub fn wait(&self) {
        while !self.is_triggered() {
            thread::sleep(POLL_INTERVAL);
        }
    }
}
