//! Outbound report encoding.
//!
//! Reports are the device→host half of the protocol: sampled channel
//! values and query responses. Encoding is a pure function of the report;
//! values wider than the payload allows are truncated, never rejected.

use heapless::Vec;

use crate::frame::{
    ANALOG_MESSAGE, DIGITAL_MESSAGE, END_SYSEX, PROTOCOL_VERSION, START_SYSEX,
    SYSEX_ANALOG_MAPPING_RESPONSE, SYSEX_CAPABILITY_RESPONSE, SYSEX_EVENT_REPORT,
    SYSEX_PIN_STATE_RESPONSE, SYSEX_REPORT_FIRMWARE, SYSEX_STRING_DATA,
};
use crate::frame::FrameError;
use crate::pins::{Capabilities, PinMode, MODE_UNKNOWN};

/// Protocol version advertised in version reports
pub const PROTOCOL_MAJOR: u8 = 2;
pub const PROTOCOL_MINOR: u8 = 6;

/// Pin separator byte in capability responses
pub const CAPABILITY_PIN_SEPARATOR: u8 = 0x7F;

/// Channel byte in mapping responses for pins without an analog channel
pub const NO_ANALOG_CHANNEL: u8 = 0x7F;

/// Largest encoded report: the capability response for a full pin table
/// (up to 32 pins x 6 modes x 2 bytes, plus separators and sysex framing)
pub const MAX_REPORT_SIZE: usize = 448;

/// An outbound frame: a sampled channel value or a query response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Report<'a> {
    /// Sampled analog channel value
    Analog { channel: u8, value: u16 },
    /// Sampled digital port bitmask
    Digital { port: u8, mask: u16 },
    /// Protocol version
    ProtocolVersion,
    /// Firmware version and name (sysex)
    Firmware {
        major: u8,
        minor: u8,
        name: &'a str,
    },
    /// 7-bit ASCII diagnostic text (sysex)
    Text { text: &'a str },
    /// One pin's mode and last-known state (sysex)
    PinState {
        pin: u8,
        mode: Option<PinMode>,
        state: u16,
    },
    /// The per-pin capability table (sysex)
    Capabilities { table: &'a [Capabilities] },
    /// Per-pin analog channel assignment (sysex)
    AnalogMapping { channels: &'a [u8] },
    /// Board event such as a button press (sysex)
    Event { source: u16, value: u16 },
}

impl Report<'_> {
    /// Encode this report into a byte buffer
    ///
    /// Returns the number of bytes written.
    pub fn encode(&self, buffer: &mut [u8]) -> Result<usize, FrameError> {
        let mut w = ByteWriter::new(buffer);
        match *self {
            Report::Analog { channel, value } => {
                w.push(ANALOG_MESSAGE | (channel & 0x0F))?;
                w.push_value14(value)?;
            }
            Report::Digital { port, mask } => {
                w.push(DIGITAL_MESSAGE | (port & 0x0F))?;
                w.push_value14(mask)?;
            }
            Report::ProtocolVersion => {
                w.push(PROTOCOL_VERSION)?;
                w.push(PROTOCOL_MAJOR)?;
                w.push(PROTOCOL_MINOR)?;
            }
            Report::Firmware { major, minor, name } => {
                w.push(START_SYSEX)?;
                w.push(SYSEX_REPORT_FIRMWARE)?;
                w.push(major & 0x7F)?;
                w.push(minor & 0x7F)?;
                // Each 8-bit character is split across two payload bytes
                for &b in name.as_bytes() {
                    w.push(b & 0x7F)?;
                    w.push((b >> 7) & 0x01)?;
                }
                w.push(END_SYSEX)?;
            }
            Report::Text { text } => {
                w.push(START_SYSEX)?;
                w.push(SYSEX_STRING_DATA)?;
                for &b in text.as_bytes() {
                    w.push(b & 0x7F)?;
                }
                w.push(END_SYSEX)?;
            }
            Report::PinState { pin, mode, state } => {
                w.push(START_SYSEX)?;
                w.push(SYSEX_PIN_STATE_RESPONSE)?;
                w.push(pin & 0x7F)?;
                w.push(mode.map_or(MODE_UNKNOWN, PinMode::to_wire))?;
                w.push_value14(state)?;
                w.push(END_SYSEX)?;
            }
            Report::Capabilities { table } => {
                w.push(START_SYSEX)?;
                w.push(SYSEX_CAPABILITY_RESPONSE)?;
                for (pin, caps) in table.iter().enumerate() {
                    for mode in caps.modes() {
                        w.push(mode.to_wire())?;
                        w.push(mode.resolution())?;
                    }
                    if pin + 1 < table.len() {
                        w.push(CAPABILITY_PIN_SEPARATOR)?;
                    }
                }
                w.push(END_SYSEX)?;
            }
            Report::AnalogMapping { channels } => {
                w.push(START_SYSEX)?;
                w.push(SYSEX_ANALOG_MAPPING_RESPONSE)?;
                for &channel in channels {
                    w.push(channel & 0x7F)?;
                }
                w.push(END_SYSEX)?;
            }
            Report::Event { source, value } => {
                w.push(START_SYSEX)?;
                w.push(SYSEX_EVENT_REPORT)?;
                w.push_value21(source as u32)?;
                w.push_value21(value as u32)?;
                w.push(END_SYSEX)?;
            }
        }
        Ok(w.len())
    }

    /// Encode this report into a heapless Vec
    pub fn encode_to_vec(&self) -> Result<Vec<u8, MAX_REPORT_SIZE>, FrameError> {
        let mut buffer = [0u8; MAX_REPORT_SIZE];
        let len = self.encode(&mut buffer)?;
        let mut vec = Vec::new();
        vec.extend_from_slice(&buffer[..len])
            .map_err(|_| FrameError::BufferTooSmall)?;
        Ok(vec)
    }
}

/// Bounds-checked byte sink for encoding
struct ByteWriter<'a> {
    buffer: &'a mut [u8],
    len: usize,
}

impl<'a> ByteWriter<'a> {
    fn new(buffer: &'a mut [u8]) -> Self {
        Self { buffer, len: 0 }
    }

    fn len(&self) -> usize {
        self.len
    }

    fn push(&mut self, byte: u8) -> Result<(), FrameError> {
        if self.len == self.buffer.len() {
            return Err(FrameError::BufferTooSmall);
        }
        self.buffer[self.len] = byte;
        self.len += 1;
        Ok(())
    }

    /// Two 7-bit groups, least-significant first; bits above 14 dropped
    fn push_value14(&mut self, value: u16) -> Result<(), FrameError> {
        self.push((value & 0x7F) as u8)?;
        self.push(((value >> 7) & 0x7F) as u8)
    }

    /// Three 7-bit groups, least-significant first; bits above 21 dropped
    fn push_value21(&mut self, value: u32) -> Result<(), FrameError> {
        self.push((value & 0x7F) as u8)?;
        self.push(((value >> 7) & 0x7F) as u8)?;
        self.push(((value >> 14) & 0x7F) as u8)
    }
}
