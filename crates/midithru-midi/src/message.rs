use std::fmt;

/// Status byte that opens a system exclusive message.
const SYSEX_START: u8 = 0xF0;

/// A MIDI short message: a status byte and up to two data bytes.
///
/// The bytes are kept exactly as received, malformed or not, together with the
/// number of bytes that were actually present. Sending `as_bytes()` therefore
/// reproduces the input byte for byte.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShortMessage {
    data: [u8; 3],
    len: u8,
}

impl ShortMessage {
    /// Build a message from 1 to 3 raw bytes. Returns `None` for any other length.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.is_empty() || bytes.len() > 3 {
            return None;
        }
        let mut data = [0u8; 3];
        data[..bytes.len()].copy_from_slice(bytes);
        Some(Self {
            data,
            len: bytes.len() as u8,
        })
    }

    /// Unpack a 32-bit short message: status in the low byte, then data 1 and data 2.
    ///
    /// The length is derived from the status byte. Unknown or running-status
    /// bytes keep all three bytes so nothing is dropped.
    pub fn from_packed(packed: u32) -> Self {
        let [status, data1, data2, _] = packed.to_le_bytes();
        Self {
            data: [status, data1, data2],
            len: expected_len(status),
        }
    }

    /// The 32-bit packed form of this message. Missing bytes pack as zero.
    pub fn packed(&self) -> u32 {
        let mut bytes = [0u8; 4];
        bytes[..self.byte_len()].copy_from_slice(self.as_bytes());
        u32::from_le_bytes(bytes)
    }

    /// Raw bytes as received.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..self.byte_len()]
    }

    /// Number of bytes in the message (1 to 3).
    pub fn byte_len(&self) -> usize {
        self.len as usize
    }

    pub fn status(&self) -> u8 {
        self.data[0]
    }

    pub fn data1(&self) -> Option<u8> {
        self.as_bytes().get(1).copied()
    }

    pub fn data2(&self) -> Option<u8> {
        self.as_bytes().get(2).copied()
    }
}

impl fmt::Debug for ShortMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ShortMessage({self})")
    }
}

impl fmt::Display for ShortMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.as_bytes().iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{byte:02X}")?;
        }
        Ok(())
    }
}

fn expected_len(status: u8) -> u8 {
    match status {
        0x80..=0xBF | 0xE0..=0xEF | 0xF2 => 3,
        0xC0..=0xDF | 0xF1 | 0xF3 => 2,
        0xF6 | 0xF8..=0xFF => 1,
        _ => 3,
    }
}

/// Notification delivered by an input port.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InputEvent {
    /// The driver finished opening the port.
    Opened,
    /// A short message was received.
    Data {
        message: ShortMessage,
        /// Driver timestamp in microseconds.
        timestamp_us: u64,
    },
    /// A system exclusive or otherwise oversized message was received.
    LongData(Vec<u8>),
    /// The driver reported an invalid or failed receive.
    Error { message: String },
    /// The device disappeared while the port was open.
    DeviceRemoved,
    /// The driver closed the port.
    Closed,
}

impl InputEvent {
    /// Classify a raw receive from the driver.
    pub fn from_raw(timestamp_us: u64, bytes: &[u8]) -> Self {
        if bytes.is_empty() {
            return InputEvent::Error {
                message: "empty MIDI message".into(),
            };
        }
        if bytes[0] == SYSEX_START {
            return InputEvent::LongData(bytes.to_vec());
        }
        match ShortMessage::from_bytes(bytes) {
            Some(message) => InputEvent::Data {
                message,
                timestamp_us,
            },
            None => InputEvent::LongData(bytes.to_vec()),
        }
    }

    /// Short name used in log output.
    pub fn kind(&self) -> &'static str {
        match self {
            InputEvent::Opened => "opened",
            InputEvent::Data { .. } => "data",
            InputEvent::LongData(_) => "long-data",
            InputEvent::Error { .. } => "error",
            InputEvent::DeviceRemoved => "device-removed",
            InputEvent::Closed => "closed",
        }
    }
}
