//! Capability traits consumed by the protocol engine
//!
//! The engine drives hardware only through these two seams: a byte-oriented
//! serial link to the host and the board's pin I/O. The firmware binary
//! implements them for real peripherals; tests implement them in memory.

pub mod board;
pub mod link;

pub use board::{BoardPins, ANALOG_CHANNEL_COUNT};
pub use link::{LinkConfig, LinkError, SerialLink};
