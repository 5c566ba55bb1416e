//! Board pin-I/O abstraction

use pinion_protocol::{Capabilities, PinMode};

/// Analog channels addressable by the wire protocol
pub const ANALOG_CHANNEL_COUNT: u8 = 16;

/// The board's pin I/O capability
///
/// Pins are indexed `0..pin_count()`. Analog channels are a separate,
/// board-defined namespace: low channels usually map onto ADC-capable pins
/// (see [`BoardPins::analog_channel_pin`]), while higher channels may
/// sample on-board sensors with no pin at all.
///
/// Implementations apply and read raw hardware state; validation against
/// the capability table happens in the engine's pin model, which is the
/// only caller of the mutating methods.
pub trait BoardPins {
    /// Number of pins in the board's table
    fn pin_count(&self) -> u8;

    /// Supported modes for a pin; [`Capabilities::NONE`] for reserved pins
    fn capabilities(&self, pin: u8) -> Capabilities;

    /// Apply an already-validated mode change to the physical pin
    fn apply_mode(&mut self, pin: u8, mode: PinMode);

    /// Sample a digital pin
    fn digital_read(&mut self, pin: u8) -> bool;

    /// Drive a digital output pin
    fn digital_write(&mut self, pin: u8, high: bool);

    /// Sample an analog channel
    fn analog_read(&mut self, channel: u8) -> u16;

    /// Drive a PWM pin
    fn analog_write(&mut self, pin: u8, value: u16);

    /// The pin backing an analog channel, if the channel maps to a pin
    fn analog_channel_pin(&self, channel: u8) -> Option<u8>;
}
