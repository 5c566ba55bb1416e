//! Pin modes and per-pin capability sets.

/// Pin mode, as carried in set-pin-mode commands and capability and
/// pin-state responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PinMode {
    /// High-impedance digital input
    DigitalInput,
    /// Digital output
    DigitalOutput,
    /// Analog input (ADC)
    AnalogInput,
    /// PWM output
    Pwm,
    /// Digital input with pull-up
    InputPullup,
    /// Digital input with pull-down
    InputPulldown,
}

// Wire format values
const MODE_DIGITAL_INPUT: u8 = 0x00;
const MODE_DIGITAL_OUTPUT: u8 = 0x01;
const MODE_ANALOG_INPUT: u8 = 0x02;
const MODE_PWM: u8 = 0x03;
const MODE_INPUT_PULLUP: u8 = 0x0B;
const MODE_INPUT_PULLDOWN: u8 = 0x0F;

/// Wire value reported for a pin the host has not configured yet
pub const MODE_UNKNOWN: u8 = 0x0E;

impl PinMode {
    /// Every mode, in wire-value order (the order used in capability
    /// responses)
    pub const ALL: [PinMode; 6] = [
        PinMode::DigitalInput,
        PinMode::DigitalOutput,
        PinMode::AnalogInput,
        PinMode::Pwm,
        PinMode::InputPullup,
        PinMode::InputPulldown,
    ];

    /// Parse a mode from its wire format byte
    pub fn from_wire(byte: u8) -> Option<Self> {
        match byte {
            MODE_DIGITAL_INPUT => Some(PinMode::DigitalInput),
            MODE_DIGITAL_OUTPUT => Some(PinMode::DigitalOutput),
            MODE_ANALOG_INPUT => Some(PinMode::AnalogInput),
            MODE_PWM => Some(PinMode::Pwm),
            MODE_INPUT_PULLUP => Some(PinMode::InputPullup),
            MODE_INPUT_PULLDOWN => Some(PinMode::InputPulldown),
            _ => None,
        }
    }

    /// Convert to wire format byte
    pub fn to_wire(self) -> u8 {
        match self {
            PinMode::DigitalInput => MODE_DIGITAL_INPUT,
            PinMode::DigitalOutput => MODE_DIGITAL_OUTPUT,
            PinMode::AnalogInput => MODE_ANALOG_INPUT,
            PinMode::Pwm => MODE_PWM,
            PinMode::InputPullup => MODE_INPUT_PULLUP,
            PinMode::InputPulldown => MODE_INPUT_PULLDOWN,
        }
    }

    /// Value resolution in bits, as advertised in capability responses
    pub fn resolution(self) -> u8 {
        match self {
            PinMode::AnalogInput | PinMode::Pwm => 10,
            _ => 1,
        }
    }

    /// Largest value representable at this mode's resolution
    pub fn max_value(self) -> u16 {
        (1u16 << self.resolution()) - 1
    }

    /// True for the digital input modes (plain, pull-up, pull-down)
    pub fn is_digital_input(self) -> bool {
        matches!(
            self,
            PinMode::DigitalInput | PinMode::InputPullup | PinMode::InputPulldown
        )
    }

    /// True for modes that drive the pin
    pub fn is_output(self) -> bool {
        matches!(self, PinMode::DigitalOutput | PinMode::Pwm)
    }
}

/// The set of modes a pin supports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Capabilities(u8);

impl Capabilities {
    /// A pin with no host-visible capabilities (power pins, reserved pins)
    pub const NONE: Capabilities = Capabilities(0);

    /// Add a mode to the set
    pub const fn with(self, mode: PinMode) -> Self {
        Capabilities(self.0 | 1 << mode as u8)
    }

    /// True when the set contains the mode
    pub const fn supports(self, mode: PinMode) -> bool {
        self.0 & (1 << mode as u8) != 0
    }

    /// True when the pin supports nothing
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Supported modes in wire-value order
    pub fn modes(self) -> impl Iterator<Item = PinMode> {
        PinMode::ALL.iter().copied().filter(move |m| self.supports(*m))
    }

    /// Digital input/output with pulls
    pub const fn digital_io() -> Self {
        Capabilities::NONE
            .with(PinMode::DigitalInput)
            .with(PinMode::DigitalOutput)
            .with(PinMode::InputPullup)
            .with(PinMode::InputPulldown)
    }

    /// Digital input/output plus PWM
    pub const fn digital_io_pwm() -> Self {
        Capabilities::digital_io().with(PinMode::Pwm)
    }

    /// Everything: digital, PWM, and an ADC channel
    pub const fn full() -> Self {
        Capabilities::digital_io_pwm().with(PinMode::AnalogInput)
    }
}
