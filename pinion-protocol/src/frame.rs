//! Frame assembly and parsing.
//!
//! Frame format:
//! - OPCODE (1 byte): high bit set, identifies the message
//! - PAYLOAD (0-N bytes): high bit clear, 7 usable bits per byte
//!
//! Fixed-length frames imply their payload length from the opcode alone.
//! Variable-length frames start with [`START_SYSEX`], carry a sysex id as
//! the first payload byte, and end with [`END_SYSEX`].

use heapless::Vec;

/// Start of a variable-length sysex frame
pub const START_SYSEX: u8 = 0xF0;
/// Terminator of a variable-length sysex frame
pub const END_SYSEX: u8 = 0xF7;

/// Digital port value, host->device write or device->host report (low nibble = port)
pub const DIGITAL_MESSAGE: u8 = 0x90;
/// Enable/disable analog channel streaming (low nibble = channel)
pub const REPORT_ANALOG: u8 = 0xC0;
/// Enable/disable digital port streaming (low nibble = port)
pub const REPORT_DIGITAL: u8 = 0xD0;
/// Analog value, host->device write or device->host report (low nibble = pin/channel)
pub const ANALOG_MESSAGE: u8 = 0xE0;
/// Set a pin's mode
pub const SET_PIN_MODE: u8 = 0xF4;
/// Drive a single digital pin
pub const SET_DIGITAL_PIN: u8 = 0xF5;
/// Protocol version query (host->device) and report (device->host)
pub const PROTOCOL_VERSION: u8 = 0xF9;
/// Return the engine to power-on defaults
pub const SYSTEM_RESET: u8 = 0xFF;

// Sysex ids
pub const SYSEX_EVENT_REPORT: u8 = 0x0D;
pub const SYSEX_ANALOG_MAPPING_QUERY: u8 = 0x69;
pub const SYSEX_ANALOG_MAPPING_RESPONSE: u8 = 0x6A;
pub const SYSEX_CAPABILITY_QUERY: u8 = 0x6B;
pub const SYSEX_CAPABILITY_RESPONSE: u8 = 0x6C;
pub const SYSEX_PIN_STATE_QUERY: u8 = 0x6D;
pub const SYSEX_PIN_STATE_RESPONSE: u8 = 0x6E;
pub const SYSEX_EXTENDED_ANALOG: u8 = 0x6F;
pub const SYSEX_STRING_DATA: u8 = 0x71;
pub const SYSEX_REPORT_FIRMWARE: u8 = 0x79;
pub const SYSEX_SAMPLING_INTERVAL: u8 = 0x7A;

/// Maximum sysex payload size (sysex id plus arguments)
pub const MAX_SYSEX_PAYLOAD: usize = 64;

/// Maximum encoded frame size (opcode + payload + sysex terminator)
pub const MAX_FRAME_SIZE: usize = 1 + MAX_SYSEX_PAYLOAD + 1;

/// Payload length implied by a fixed-length opcode.
///
/// Returns `None` for bytes that do not start a fixed-length frame
/// (including [`START_SYSEX`] and all payload-range bytes).
pub fn fixed_payload_len(opcode: u8) -> Option<usize> {
    match opcode & 0xF0 {
        DIGITAL_MESSAGE | ANALOG_MESSAGE => return Some(2),
        REPORT_ANALOG | REPORT_DIGITAL => return Some(1),
        _ => {}
    }
    match opcode {
        SET_PIN_MODE | SET_DIGITAL_PIN => Some(2),
        PROTOCOL_VERSION | SYSTEM_RESET => Some(0),
        _ => None,
    }
}

/// Split a value into two 7-bit payload bytes, least-significant first.
///
/// Bits above 14 are dropped; payload bytes never carry the high bit.
pub fn pack14(value: u16) -> [u8; 2] {
    [(value & 0x7F) as u8, ((value >> 7) & 0x7F) as u8]
}

/// Reassemble a value from two 7-bit payload bytes
pub fn unpack14(lo: u8, hi: u8) -> u16 {
    (lo & 0x7F) as u16 | (((hi & 0x7F) as u16) << 7)
}

/// Errors that can occur while constructing or encoding frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    /// Payload exceeds maximum allowed size
    PayloadTooLarge,
    /// Buffer too small for encoding
    BufferTooSmall,
}

/// A parsed or constructed frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Opcode byte (high bit set); [`START_SYSEX`] for sysex frames
    pub opcode: u8,
    /// Payload bytes; for sysex frames the first byte is the sysex id
    pub payload: Vec<u8, MAX_SYSEX_PAYLOAD>,
}

impl Frame {
    /// Create a new frame with the given opcode and payload
    pub fn new(opcode: u8, payload: &[u8]) -> Result<Self, FrameError> {
        let mut payload_vec = Vec::new();
        payload_vec
            .extend_from_slice(payload)
            .map_err(|_| FrameError::PayloadTooLarge)?;

        Ok(Self {
            opcode,
            payload: payload_vec,
        })
    }

    /// Create a frame with no payload
    pub fn empty(opcode: u8) -> Self {
        Self {
            opcode,
            payload: Vec::new(),
        }
    }

    /// Low nibble of the opcode: the port or channel of per-channel opcodes
    pub fn channel(&self) -> u8 {
        self.opcode & 0x0F
    }

    /// True when this frame is a sysex frame
    pub fn is_sysex(&self) -> bool {
        self.opcode == START_SYSEX
    }

    /// Encode this frame into a byte buffer as it appears on the wire
    ///
    /// Returns the number of bytes written.
    pub fn encode(&self, buffer: &mut [u8]) -> Result<usize, FrameError> {
        let terminator = if self.is_sysex() { 1 } else { 0 };
        let frame_len = 1 + self.payload.len() + terminator;
        if buffer.len() < frame_len {
            return Err(FrameError::BufferTooSmall);
        }

        buffer[0] = self.opcode;
        buffer[1..1 + self.payload.len()].copy_from_slice(&self.payload);
        if self.is_sysex() {
            buffer[1 + self.payload.len()] = END_SYSEX;
        }

        Ok(frame_len)
    }

    /// Encode this frame into a heapless Vec
    pub fn encode_to_vec(&self) -> Result<Vec<u8, MAX_FRAME_SIZE>, FrameError> {
        let mut buffer = [0u8; MAX_FRAME_SIZE];
        let len = self.encode(&mut buffer)?;
        let mut vec = Vec::new();
        vec.extend_from_slice(&buffer[..len])
            .map_err(|_| FrameError::BufferTooSmall)?;
        Ok(vec)
    }
}

/// State machine for parsing incoming frames
///
/// Bytes may arrive in arbitrary fragments; partial frames are held until
/// their final byte arrives. Malformed input is recovered locally: a
/// command byte arriving mid-frame aborts the partial frame and is
/// reprocessed as a fresh frame start, so garbage never swallows the next
/// valid frame.
#[derive(Debug, Clone)]
pub struct FrameParser {
    state: ParseState,
    buffer: Vec<u8, MAX_SYSEX_PAYLOAD>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    /// Waiting for a frame-starting command byte
    Idle,
    /// Accumulating a fixed-length payload
    Fixed { opcode: u8, expected: u8 },
    /// Accumulating sysex payload until END_SYSEX
    Sysex,
}

impl Default for FrameParser {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameParser {
    /// Create a new frame parser
    pub fn new() -> Self {
        Self {
            state: ParseState::Idle,
            buffer: Vec::new(),
        }
    }

    /// Reset the parser state
    pub fn reset(&mut self) {
        self.state = ParseState::Idle;
        self.buffer.clear();
    }

    /// Feed a single byte to the parser
    ///
    /// Returns `Some(frame)` when the byte completes a frame, `None` while
    /// more bytes are needed or the byte was discarded. Never blocks.
    pub fn feed(&mut self, byte: u8) -> Option<Frame> {
        match self.state {
            ParseState::Idle => self.begin(byte),
            ParseState::Fixed { opcode, expected } => {
                if byte & 0x80 != 0 {
                    // Command byte mid-frame: the partial frame is lost,
                    // but the new byte may start a valid one
                    self.reset();
                    return self.begin(byte);
                }
                // Cannot overflow: fixed payloads are at most 2 bytes
                let _ = self.buffer.push(byte);
                if self.buffer.len() == expected as usize {
                    let frame = Frame {
                        opcode,
                        payload: self.buffer.clone(),
                    };
                    self.reset();
                    return Some(frame);
                }
                None
            }
            ParseState::Sysex => {
                if byte == END_SYSEX {
                    // A sysex without even an id byte carries nothing
                    if self.buffer.is_empty() {
                        self.reset();
                        return None;
                    }
                    let frame = Frame {
                        opcode: START_SYSEX,
                        payload: self.buffer.clone(),
                    };
                    self.reset();
                    return Some(frame);
                }
                if byte & 0x80 != 0 {
                    self.reset();
                    return self.begin(byte);
                }
                if self.buffer.push(byte).is_err() {
                    // Oversized sysex: drop it; the tail is discarded in Idle
                    self.reset();
                }
                None
            }
        }
    }

    /// Handle a byte while no frame is in progress
    fn begin(&mut self, byte: u8) -> Option<Frame> {
        if byte == START_SYSEX {
            self.buffer.clear();
            self.state = ParseState::Sysex;
            return None;
        }
        match fixed_payload_len(byte) {
            Some(0) => Some(Frame::empty(byte)),
            Some(expected) => {
                self.buffer.clear();
                self.state = ParseState::Fixed {
                    opcode: byte,
                    expected: expected as u8,
                };
                None
            }
            // Not a recognized frame start; discard
            None => None,
        }
    }
}
