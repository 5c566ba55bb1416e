//! Raspberry Pi Pico pin table and pin I/O
//!
//! The host-visible pin table covers GP0-GP29:
//! - GP0-GP22 and GP25 (the on-board LED): digital I/O with pulls
//! - GP23, GP24: reserved (SMPS control and VBUS sense)
//! - GP26-GP29: analog channels 0-3, dedicated to the ADC
//! - analog channel 4: the on-chip temperature sensor (no pin)
//!
//! TODO: route PWM through the RP2040 PWM slices; until then the Pwm
//! capability is withheld from the table so hosts cannot select it.

use embassy_rp::adc::{Adc, Blocking, Channel};
use embassy_rp::gpio::{Flex, Pull};

use pinion_core::traits::BoardPins;
use pinion_protocol::{Capabilities, PinMode};

/// Host-visible pins
pub const PIN_COUNT: u8 = 30;

/// ADC channels: four pins plus the temperature sensor
pub const ADC_CHANNEL_COUNT: usize = 5;

/// First GPIO with an ADC channel
const FIRST_ADC_PIN: u8 = 26;

pub struct PicoBoard {
    /// Digital pins by index; `None` where the pin is reserved or analog
    pins: [Option<Flex<'static>>; PIN_COUNT as usize],
    adc: Adc<'static, Blocking>,
    adc_channels: [Channel<'static>; ADC_CHANNEL_COUNT],
}

impl PicoBoard {
    pub fn new(
        pins: [Option<Flex<'static>>; PIN_COUNT as usize],
        adc: Adc<'static, Blocking>,
        adc_channels: [Channel<'static>; ADC_CHANNEL_COUNT],
    ) -> Self {
        Self {
            pins,
            adc,
            adc_channels,
        }
    }
}

impl BoardPins for PicoBoard {
    fn pin_count(&self) -> u8 {
        PIN_COUNT
    }

    fn capabilities(&self, pin: u8) -> Capabilities {
        match pin {
            23 | 24 => Capabilities::NONE,
            26..=29 => Capabilities::NONE.with(PinMode::AnalogInput),
            _ if pin < PIN_COUNT => Capabilities::digital_io(),
            _ => Capabilities::NONE,
        }
    }

    fn apply_mode(&mut self, pin: u8, mode: PinMode) {
        let Some(flex) = self.pins.get_mut(pin as usize).and_then(Option::as_mut) else {
            return;
        };
        match mode {
            PinMode::DigitalInput => {
                flex.set_as_input();
                flex.set_pull(Pull::None);
            }
            PinMode::InputPullup => {
                flex.set_as_input();
                flex.set_pull(Pull::Up);
            }
            PinMode::InputPulldown => {
                flex.set_as_input();
                flex.set_pull(Pull::Down);
            }
            PinMode::DigitalOutput => {
                flex.set_low();
                flex.set_as_output();
            }
            // ADC pins are dedicated; PWM is not in the table
            PinMode::AnalogInput | PinMode::Pwm => {}
        }
    }

    fn digital_read(&mut self, pin: u8) -> bool {
        self.pins
            .get_mut(pin as usize)
            .and_then(Option::as_mut)
            .is_some_and(|flex| flex.is_high())
    }

    fn digital_write(&mut self, pin: u8, high: bool) {
        if let Some(flex) = self.pins.get_mut(pin as usize).and_then(Option::as_mut) {
            flex.set_level(high.into());
        }
    }

    fn analog_read(&mut self, channel: u8) -> u16 {
        let Some(adc_channel) = self.adc_channels.get_mut(channel as usize) else {
            return 0;
        };
        // The RP2040 ADC is 12-bit; the wire declares 10-bit channels
        self.adc
            .blocking_read(adc_channel)
            .map(|raw| raw >> 2)
            .unwrap_or(0)
    }

    fn analog_write(&mut self, _pin: u8, _value: u16) {
        // Unreachable while Pwm stays out of the capability table
    }

    fn analog_channel_pin(&self, channel: u8) -> Option<u8> {
        match channel {
            0..=3 => Some(FIRST_ADC_PIN + channel),
            _ => None,
        }
    }
}
