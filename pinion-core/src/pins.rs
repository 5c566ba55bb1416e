//! Pin state table and validated mutation
//!
//! The pin model holds the engine's view of every pin: the active mode and
//! the last value read from or driven onto it. All mutation is validated
//! against the board's capability table before any hardware is touched,
//! and this module is the only one that drives pins through [`BoardPins`].

use heapless::Vec;
use pinion_protocol::PinMode;

use crate::traits::BoardPins;

/// Largest pin table the engine supports
pub const MAX_PINS: usize = 32;

/// Errors from pin configuration and writes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Pin index beyond the board's pin count
    OutOfRange,
    /// Requested mode is not in the pin's capability set
    UnsupportedMode,
    /// Pin is not in a mode that allows the operation
    WrongMode,
}

/// Per-pin engine state
#[derive(Debug, Clone, Copy, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PinState {
    /// Active mode; `None` until the host configures the pin
    pub mode: Option<PinMode>,
    /// Last value read from or driven onto the pin
    pub value: Option<u16>,
}

/// The engine's pin table
#[derive(Debug)]
pub struct PinModel {
    pins: Vec<PinState, MAX_PINS>,
}

impl PinModel {
    /// Build a table sized to the board's pin count
    pub fn new<B: BoardPins>(board: &B) -> Self {
        let count = (board.pin_count() as usize).min(MAX_PINS);
        let mut pins = Vec::new();
        for _ in 0..count {
            let _ = pins.push(PinState::default());
        }
        Self { pins }
    }

    /// Number of pins in the table
    pub fn pin_count(&self) -> u8 {
        self.pins.len() as u8
    }

    /// Number of 8-pin digital ports covering the table
    pub fn port_count(&self) -> u8 {
        self.pins.len().div_ceil(8) as u8
    }

    /// A pin's active mode
    pub fn mode(&self, pin: u8) -> Option<PinMode> {
        self.pins.get(pin as usize).and_then(|p| p.mode)
    }

    /// A pin's last-known value
    pub fn value(&self, pin: u8) -> Option<u16> {
        self.pins.get(pin as usize).and_then(|p| p.value)
    }

    /// Forget every mode and value (system reset)
    pub fn reset(&mut self) {
        for pin in self.pins.iter_mut() {
            *pin = PinState::default();
        }
    }

    /// Switch a pin to a new mode and apply it to the hardware
    ///
    /// On failure the pin's mode and value are unchanged.
    pub fn configure<B: BoardPins>(
        &mut self,
        board: &mut B,
        pin: u8,
        mode: PinMode,
    ) -> Result<(), ConfigError> {
        let state = self
            .pins
            .get_mut(pin as usize)
            .ok_or(ConfigError::OutOfRange)?;
        if !board.capabilities(pin).supports(mode) {
            return Err(ConfigError::UnsupportedMode);
        }

        state.mode = Some(mode);
        state.value = None;
        board.apply_mode(pin, mode);

        // Output modes start driven to zero so the pin is in a known state
        match mode {
            PinMode::DigitalOutput => {
                state.value = Some(0);
                board.digital_write(pin, false);
            }
            PinMode::Pwm => {
                state.value = Some(0);
                board.analog_write(pin, 0);
            }
            _ => {}
        }
        Ok(())
    }

    /// Drive a digital output pin
    pub fn set_digital<B: BoardPins>(
        &mut self,
        board: &mut B,
        pin: u8,
        high: bool,
    ) -> Result<(), ConfigError> {
        let state = self
            .pins
            .get_mut(pin as usize)
            .ok_or(ConfigError::OutOfRange)?;
        if state.mode != Some(PinMode::DigitalOutput) {
            return Err(ConfigError::WrongMode);
        }
        state.value = Some(high as u16);
        board.digital_write(pin, high);
        Ok(())
    }

    /// Drive the output pins of a port from a bitmask
    ///
    /// Pins of the port that are not in digital output mode keep their
    /// state; the host may freely mix inputs and outputs within a port.
    pub fn write_port<B: BoardPins>(&mut self, board: &mut B, port: u8, mask: u16) {
        for bit in 0..8u16 {
            let pin = port as u16 * 8 + bit;
            if pin as usize >= self.pins.len() {
                break;
            }
            let _ = self.set_digital(board, pin as u8, mask & (1 << bit) != 0);
        }
    }

    /// Drive a PWM pin; the value is truncated to the mode's resolution
    pub fn set_analog<B: BoardPins>(
        &mut self,
        board: &mut B,
        pin: u8,
        value: u16,
    ) -> Result<(), ConfigError> {
        let state = self
            .pins
            .get_mut(pin as usize)
            .ok_or(ConfigError::OutOfRange)?;
        if state.mode != Some(PinMode::Pwm) {
            return Err(ConfigError::WrongMode);
        }
        let value = value & PinMode::Pwm.max_value();
        state.value = Some(value);
        board.analog_write(pin, value);
        Ok(())
    }

    /// Sample every digital-input pin of a port and return the port bitmask
    ///
    /// Returns `None` when no pin of the port is in a digital input mode.
    /// Sampled values are recorded as the pins' last-known values.
    pub fn digital_port_mask<B: BoardPins>(&mut self, board: &mut B, port: u8) -> Option<u16> {
        let mut any_input = false;
        let mut mask = 0u16;
        for bit in 0..8u16 {
            let pin = port as u16 * 8 + bit;
            if pin as usize >= self.pins.len() {
                break;
            }
            let state = &mut self.pins[pin as usize];
            if state.mode.is_some_and(PinMode::is_digital_input) {
                any_input = true;
                let high = board.digital_read(pin as u8);
                state.value = Some(high as u16);
                if high {
                    mask |= 1 << bit;
                }
            }
        }
        any_input.then_some(mask)
    }
}
