//! Wire protocol for the Pinion pin bridge.
//!
//! This crate defines the serial protocol between a host computer and the
//! board firmware. The framing follows the Firmata 2.6 discipline:
//!
//! ```text
//! ┌────────────┬──────────────────────────────┐
//! │ OPCODE     │ PAYLOAD                      │
//! │ 1B, >=0x80 │ 0-N bytes, 7 usable bits each│
//! └────────────┴──────────────────────────────┘
//! ```
//!
//! Fixed-length frames carry their payload length in the opcode itself;
//! variable-length frames are bracketed by [`frame::START_SYSEX`] and
//! [`frame::END_SYSEX`]. Multi-byte values are packed 7 bits per payload
//! byte, least-significant group first, so payload bytes never collide
//! with the opcode range.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

pub mod command;
pub mod frame;
pub mod pins;
pub mod report;

pub use command::{Command, DecodeError, SysexCommand};
pub use frame::{Frame, FrameError, FrameParser, MAX_SYSEX_PAYLOAD};
pub use pins::{Capabilities, PinMode};
pub use report::{Report, MAX_REPORT_SIZE, PROTOCOL_MAJOR, PROTOCOL_MINOR};
