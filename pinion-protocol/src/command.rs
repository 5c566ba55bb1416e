//! Inbound command decoding.
//!
//! A [`Frame`] produced by the parser is decoded into a typed [`Command`];
//! the engine acts on commands, never on raw frames. Undecodable frames
//! are rejected with a [`DecodeError`] and skipped by the engine, which
//! keeps the stream in sync regardless of what a host sends.

use crate::frame::{
    unpack14, Frame, FrameError, ANALOG_MESSAGE, DIGITAL_MESSAGE, PROTOCOL_VERSION, REPORT_ANALOG,
    REPORT_DIGITAL, SET_DIGITAL_PIN, SET_PIN_MODE, START_SYSEX, SYSEX_ANALOG_MAPPING_QUERY,
    SYSEX_CAPABILITY_QUERY, SYSEX_EXTENDED_ANALOG, SYSEX_PIN_STATE_QUERY, SYSEX_REPORT_FIRMWARE,
    SYSEX_SAMPLING_INTERVAL, SYSTEM_RESET,
};
use crate::frame::pack14;
use crate::pins::PinMode;

/// Errors from decoding a frame into a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DecodeError {
    /// Frame payload is shorter than the command requires
    TruncatedPayload,
    /// Opcode or argument does not decode to any known command
    UnknownCommand,
}

/// A command received from the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    /// Switch a pin to a new mode
    SetPinMode { pin: u8, mode: PinMode },
    /// Drive a single digital output pin
    SetDigitalPin { pin: u8, high: bool },
    /// Drive the output pins of a port from a bitmask
    WriteDigitalPort { port: u8, mask: u16 },
    /// Drive a PWM pin
    WriteAnalog { pin: u8, value: u16 },
    /// Enable or disable streaming of an analog channel
    ReportAnalog { channel: u8, enabled: bool },
    /// Enable or disable streaming of a digital port
    ReportDigital { port: u8, enabled: bool },
    /// Host asked for the protocol version
    QueryProtocolVersion,
    /// Return the engine to power-on defaults
    SystemReset,
    /// Variable-length command
    Sysex(SysexCommand),
}

/// Commands carried in sysex frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SysexCommand {
    /// Host asked for the per-pin capability table
    CapabilityQuery,
    /// Host asked which pins carry analog channels
    AnalogMappingQuery,
    /// Host asked for one pin's mode and last-known state
    PinStateQuery { pin: u8 },
    /// Analog write for pins beyond 15 or values beyond 14 bits
    ExtendedAnalogWrite { pin: u8, value: u32 },
    /// Host asked for the firmware name and version
    ReportFirmware,
    /// Set the report tick interval
    SamplingInterval { ms: u16 },
    /// A sysex id this profile does not handle; ignored without desync
    Unknown { id: u8 },
}

impl Command {
    /// Decode a parsed frame
    pub fn from_frame(frame: &Frame) -> Result<Self, DecodeError> {
        let p = frame.payload.as_slice();

        if frame.opcode == START_SYSEX {
            return Ok(Command::Sysex(SysexCommand::from_payload(p)?));
        }

        let arg = |i: usize| p.get(i).copied().ok_or(DecodeError::TruncatedPayload);

        match frame.opcode & 0xF0 {
            DIGITAL_MESSAGE => {
                return Ok(Command::WriteDigitalPort {
                    port: frame.channel(),
                    mask: unpack14(arg(0)?, arg(1)?),
                })
            }
            ANALOG_MESSAGE => {
                return Ok(Command::WriteAnalog {
                    pin: frame.channel(),
                    value: unpack14(arg(0)?, arg(1)?),
                })
            }
            REPORT_ANALOG => {
                return Ok(Command::ReportAnalog {
                    channel: frame.channel(),
                    enabled: arg(0)? != 0,
                })
            }
            REPORT_DIGITAL => {
                return Ok(Command::ReportDigital {
                    port: frame.channel(),
                    enabled: arg(0)? != 0,
                })
            }
            _ => {}
        }

        match frame.opcode {
            SET_PIN_MODE => Ok(Command::SetPinMode {
                pin: arg(0)?,
                mode: PinMode::from_wire(arg(1)?).ok_or(DecodeError::UnknownCommand)?,
            }),
            SET_DIGITAL_PIN => Ok(Command::SetDigitalPin {
                pin: arg(0)?,
                high: arg(1)? != 0,
            }),
            PROTOCOL_VERSION => Ok(Command::QueryProtocolVersion),
            SYSTEM_RESET => Ok(Command::SystemReset),
            _ => Err(DecodeError::UnknownCommand),
        }
    }

    /// Encode this command into a frame (for testing or simulation)
    pub fn to_frame(&self) -> Result<Frame, FrameError> {
        match *self {
            Command::SetPinMode { pin, mode } => {
                Frame::new(SET_PIN_MODE, &[pin, mode.to_wire()])
            }
            Command::SetDigitalPin { pin, high } => {
                Frame::new(SET_DIGITAL_PIN, &[pin, high as u8])
            }
            Command::WriteDigitalPort { port, mask } => {
                Frame::new(DIGITAL_MESSAGE | (port & 0x0F), &pack14(mask))
            }
            Command::WriteAnalog { pin, value } => {
                Frame::new(ANALOG_MESSAGE | (pin & 0x0F), &pack14(value))
            }
            Command::ReportAnalog { channel, enabled } => {
                Frame::new(REPORT_ANALOG | (channel & 0x0F), &[enabled as u8])
            }
            Command::ReportDigital { port, enabled } => {
                Frame::new(REPORT_DIGITAL | (port & 0x0F), &[enabled as u8])
            }
            Command::QueryProtocolVersion => Ok(Frame::empty(PROTOCOL_VERSION)),
            Command::SystemReset => Ok(Frame::empty(SYSTEM_RESET)),
            Command::Sysex(sysex) => sysex.to_frame(),
        }
    }
}

impl SysexCommand {
    /// Decode a sysex payload (id byte plus arguments)
    fn from_payload(p: &[u8]) -> Result<Self, DecodeError> {
        let id = *p.first().ok_or(DecodeError::TruncatedPayload)?;
        let arg = |i: usize| p.get(i).copied().ok_or(DecodeError::TruncatedPayload);

        match id {
            SYSEX_CAPABILITY_QUERY => Ok(SysexCommand::CapabilityQuery),
            SYSEX_ANALOG_MAPPING_QUERY => Ok(SysexCommand::AnalogMappingQuery),
            SYSEX_REPORT_FIRMWARE => Ok(SysexCommand::ReportFirmware),
            SYSEX_PIN_STATE_QUERY => Ok(SysexCommand::PinStateQuery { pin: arg(1)? }),
            SYSEX_SAMPLING_INTERVAL => Ok(SysexCommand::SamplingInterval {
                ms: unpack14(arg(1)?, arg(2)?),
            }),
            SYSEX_EXTENDED_ANALOG => {
                let pin = arg(1)?;
                // One to three 7-bit groups, least-significant first
                let mut value: u32 = arg(2)? as u32 & 0x7F;
                if let Ok(b) = arg(3) {
                    value |= (b as u32 & 0x7F) << 7;
                }
                if let Ok(b) = arg(4) {
                    value |= (b as u32 & 0x7F) << 14;
                }
                Ok(SysexCommand::ExtendedAnalogWrite { pin, value })
            }
            _ => Ok(SysexCommand::Unknown { id }),
        }
    }

    /// Encode this command into a sysex frame (for testing or simulation)
    pub fn to_frame(&self) -> Result<Frame, FrameError> {
        match *self {
            SysexCommand::CapabilityQuery => Frame::new(START_SYSEX, &[SYSEX_CAPABILITY_QUERY]),
            SysexCommand::AnalogMappingQuery => {
                Frame::new(START_SYSEX, &[SYSEX_ANALOG_MAPPING_QUERY])
            }
            SysexCommand::ReportFirmware => Frame::new(START_SYSEX, &[SYSEX_REPORT_FIRMWARE]),
            SysexCommand::PinStateQuery { pin } => {
                Frame::new(START_SYSEX, &[SYSEX_PIN_STATE_QUERY, pin])
            }
            SysexCommand::SamplingInterval { ms } => {
                let [lo, hi] = pack14(ms);
                Frame::new(START_SYSEX, &[SYSEX_SAMPLING_INTERVAL, lo, hi])
            }
            SysexCommand::ExtendedAnalogWrite { pin, value } => Frame::new(
                START_SYSEX,
                &[
                    SYSEX_EXTENDED_ANALOG,
                    pin,
                    (value & 0x7F) as u8,
                    ((value >> 7) & 0x7F) as u8,
                    ((value >> 14) & 0x7F) as u8,
                ],
            ),
            SysexCommand::Unknown { id } => Frame::new(START_SYSEX, &[id & 0x7F]),
        }
    }
}
