use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use midithru_midi::{
    InputConnection, InputEvent, InputHandler, LineReporter, MidiBackend, MidiError, OutputPort,
    PortDirection, ShortMessage, ThruConfig, ThruError, ThruReporter, ThruSession,
};
use parking_lot::Mutex;

#[derive(Clone, Debug, PartialEq, Eq)]
enum Call {
    OpenOutput(usize),
    OpenInput(usize),
    Send(Vec<u8>),
    CloseInput,
}

type CallLog = Arc<Mutex<Vec<Call>>>;

/// Backend double that records every call and lets the test inject input events.
#[derive(Default)]
struct ScriptedBackend {
    calls: CallLog,
    handler: Arc<Mutex<Option<InputHandler>>>,
    fail_output: bool,
    fail_input: bool,
    fail_sends: bool,
}

impl ScriptedBackend {
    fn deliver(&self, event: InputEvent) {
        let mut handler = self.handler.lock();
        let handler = handler.as_mut().expect("input not open");
        handler(event);
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    fn sends(&self) -> Vec<Vec<u8>> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Send(bytes) => Some(bytes),
                _ => None,
            })
            .collect()
    }
}

struct ScriptedOutput {
    calls: CallLog,
    fail: bool,
}

impl OutputPort for ScriptedOutput {
    fn name(&self) -> &str {
        "Scripted Out"
    }

    fn send(&mut self, message: &ShortMessage) -> Result<(), MidiError> {
        if self.fail {
            return Err(MidiError::Send("device disconnected".into()));
        }
        self.calls.lock().push(Call::Send(message.as_bytes().to_vec()));
        Ok(())
    }
}

struct ScriptedInput {
    calls: CallLog,
}

impl InputConnection for ScriptedInput {
    fn name(&self) -> &str {
        "Scripted In"
    }
}

impl Drop for ScriptedInput {
    fn drop(&mut self) {
        self.calls.lock().push(Call::CloseInput);
    }
}

impl MidiBackend for ScriptedBackend {
    type Output = ScriptedOutput;
    type Input = ScriptedInput;

    fn input_ports(&self) -> Result<Vec<String>, MidiError> {
        Ok(vec!["Scripted In".into()])
    }

    fn output_ports(&self) -> Result<Vec<String>, MidiError> {
        Ok(vec!["Scripted Out".into()])
    }

    fn open_output(&mut self, index: usize, _client_name: &str) -> Result<ScriptedOutput, MidiError> {
        self.calls.lock().push(Call::OpenOutput(index));
        if self.fail_output {
            return Err(MidiError::UnknownPort {
                index,
                available: 0,
            });
        }
        Ok(ScriptedOutput {
            calls: Arc::clone(&self.calls),
            fail: self.fail_sends,
        })
    }

    fn open_input(
        &mut self,
        index: usize,
        _client_name: &str,
        handler: InputHandler,
    ) -> Result<ScriptedInput, MidiError> {
        self.calls.lock().push(Call::OpenInput(index));
        if self.fail_input {
            return Err(MidiError::Connect("port busy".into()));
        }
        *self.handler.lock() = Some(handler);
        Ok(ScriptedInput {
            calls: Arc::clone(&self.calls),
        })
    }
}

#[derive(Default)]
struct RecordingReporter {
    opened: Mutex<Vec<(PortDirection, String)>>,
    timings_ms: Mutex<Vec<f64>>,
    failures: Mutex<Vec<String>>,
}

impl ThruReporter for RecordingReporter {
    fn port_opened(&self, direction: PortDirection, name: &str) {
        self.opened.lock().push((direction, name.to_owned()));
    }

    fn send_timed(&self, _message: &ShortMessage, elapsed: Duration) {
        self.timings_ms
            .lock()
            .push(midithru_midi::elapsed_millis(elapsed));
    }

    fn send_failed(&self, message: &ShortMessage, error: &MidiError) {
        self.failures.lock().push(format!("{message}: {error}"));
    }
}

fn data(bytes: &[u8]) -> InputEvent {
    InputEvent::Data {
        message: ShortMessage::from_bytes(bytes).unwrap(),
        timestamp_us: 0,
    }
}

#[test]
fn opens_output_before_input() {
    let mut backend = ScriptedBackend::default();
    let reporter = Arc::new(RecordingReporter::default());
    let session = ThruSession::open(&mut backend, &ThruConfig::new(3, 5), reporter.clone()).unwrap();

    assert_eq!(backend.calls(), vec![Call::OpenOutput(5), Call::OpenInput(3)]);
    assert_eq!(session.input_name(), Some("Scripted In"));
    assert_eq!(session.output_name(), "Scripted Out");
    assert_eq!(
        *reporter.opened.lock(),
        vec![
            (PortDirection::Output, "Scripted Out".to_owned()),
            (PortDirection::Input, "Scripted In".to_owned()),
        ]
    );
}

#[test]
fn forwards_every_data_event_in_order() {
    let mut backend = ScriptedBackend::default();
    let reporter = Arc::new(RecordingReporter::default());
    let session = ThruSession::open(&mut backend, &ThruConfig::default(), reporter.clone()).unwrap();

    let payloads: Vec<Vec<u8>> = vec![
        vec![0x90, 60, 100],
        vec![0x80, 60, 0],
        vec![0xC2, 12],
        vec![0xF8],
        vec![0x12, 0xFF, 0xFF],
        vec![0xE0, 0x00, 0x40],
    ];
    for payload in &payloads {
        backend.deliver(data(payload));
    }

    assert_eq!(backend.sends(), payloads);
    let timings = reporter.timings_ms.lock().clone();
    assert_eq!(timings.len(), payloads.len());
    assert!(timings.iter().all(|ms| *ms >= 0.0));
    assert_eq!(session.stats().forwarded, payloads.len() as u64);
}

#[test]
fn non_data_events_send_nothing() {
    let mut backend = ScriptedBackend::default();
    let reporter = Arc::new(RecordingReporter::default());
    let session = ThruSession::open(&mut backend, &ThruConfig::default(), reporter.clone()).unwrap();

    backend.deliver(InputEvent::Opened);
    backend.deliver(InputEvent::Error {
        message: "invalid status".into(),
    });
    backend.deliver(InputEvent::LongData(vec![0xF0, 0x43, 0x10, 0xF7]));
    backend.deliver(InputEvent::DeviceRemoved);
    backend.deliver(InputEvent::Closed);

    assert!(backend.sends().is_empty());
    assert!(reporter.timings_ms.lock().is_empty());
    assert_eq!(session.stats().ignored, 5);
}

#[test]
fn output_failure_skips_input() {
    let mut backend = ScriptedBackend {
        fail_output: true,
        ..ScriptedBackend::default()
    };
    let reporter = Arc::new(RecordingReporter::default());
    let err = match ThruSession::open(&mut backend, &ThruConfig::new(1, 2), reporter.clone()) {
        Ok(_) => panic!("output open should fail"),
        Err(err) => err,
    };

    assert!(matches!(err, ThruError::OutputOpen { index: 2, .. }));
    assert_eq!(err.to_string(), "Midi Out Port could not be opened.");
    assert_eq!(backend.calls(), vec![Call::OpenOutput(2)]);
    assert!(reporter.opened.lock().is_empty());
}

#[test]
fn input_failure_is_reported_after_output_opened() {
    let mut backend = ScriptedBackend {
        fail_input: true,
        ..ScriptedBackend::default()
    };
    let reporter = Arc::new(RecordingReporter::default());
    let err = match ThruSession::open(&mut backend, &ThruConfig::new(1, 2), reporter.clone()) {
        Ok(_) => panic!("input open should fail"),
        Err(err) => err,
    };

    assert!(matches!(err, ThruError::InputOpen { index: 1, .. }));
    assert_eq!(err.to_string(), "Midi In Port could not be opened.");
    assert_eq!(backend.calls(), vec![Call::OpenOutput(2), Call::OpenInput(1)]);
    assert_eq!(reporter.opened.lock().len(), 1);
}

#[test]
fn send_failures_do_not_stop_forwarding() {
    let mut backend = ScriptedBackend {
        fail_sends: true,
        ..ScriptedBackend::default()
    };
    let reporter = Arc::new(RecordingReporter::default());
    let session = ThruSession::open(&mut backend, &ThruConfig::default(), reporter.clone()).unwrap();

    backend.deliver(data(&[0x90, 64, 90]));
    backend.deliver(data(&[0x80, 64, 0]));

    assert_eq!(
        *reporter.failures.lock(),
        vec![
            "90 40 5A: failed to send MIDI message: device disconnected".to_owned(),
            "80 40 00: failed to send MIDI message: device disconnected".to_owned(),
        ]
    );
    assert_eq!(reporter.timings_ms.lock().len(), 2);
    let stats = session.close();
    assert_eq!(stats.failed, 2);
    assert_eq!(stats.forwarded, 0);
}

/// Writer shared between the test and a `LineReporter`.
#[derive(Clone, Default)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    fn lines(&self) -> Vec<String> {
        String::from_utf8(self.0.lock().clone())
            .unwrap()
            .lines()
            .map(str::to_owned)
            .collect()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn failed_send_prints_timing_then_failure() {
    let mut backend = ScriptedBackend {
        fail_sends: true,
        ..ScriptedBackend::default()
    };
    let console = SharedBuffer::default();
    let reporter = Arc::new(LineReporter::new(console.clone()));
    let _session = ThruSession::open(&mut backend, &ThruConfig::default(), reporter).unwrap();

    backend.deliver(data(&[0x90, 60, 100]));

    let lines = console.lines();
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[0], "Midi Out Port is open: Scripted Out");
    assert_eq!(lines[1], "Midi In Port is open: Scripted In");
    let ms: f64 = lines[2]
        .strip_prefix("Midi Out ms: ")
        .expect("timing line")
        .parse()
        .unwrap();
    assert!(ms >= 0.0);
    assert_eq!(
        lines[3],
        "Midi Out failed (90 3C 64): failed to send MIDI message: device disconnected"
    );
}

#[test]
fn close_releases_input() {
    let mut backend = ScriptedBackend::default();
    let session = ThruSession::open(
        &mut backend,
        &ThruConfig::default(),
        Arc::new(RecordingReporter::default()),
    )
    .unwrap();

    backend.deliver(data(&[0xB0, 7, 100]));
    let stats = session.close();

    assert_eq!(stats.forwarded, 1);
    assert_eq!(backend.calls().last(), Some(&Call::CloseInput));
}

#[test]
fn deliveries_from_several_threads_are_all_forwarded() {
    let mut backend = ScriptedBackend::default();
    let reporter = Arc::new(RecordingReporter::default());
    let session = ThruSession::open(&mut backend, &ThruConfig::default(), reporter.clone()).unwrap();

    let backend = Arc::new(backend);
    let threads: Vec<_> = (0..4u8)
        .map(|channel| {
            let backend = Arc::clone(&backend);
            std::thread::spawn(move || {
                for note in 0..25u8 {
                    backend.deliver(data(&[0x90 | channel, note, 100]));
                }
            })
        })
        .collect();
    for thread in threads {
        thread.join().unwrap();
    }

    assert_eq!(backend.sends().len(), 100);
    assert_eq!(reporter.timings_ms.lock().len(), 100);
    assert_eq!(session.stats().forwarded, 100);
}
