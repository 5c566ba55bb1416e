//! Shared test fixtures: an in-memory serial link and a scripted board

use heapless::{Deque, Vec};
use pinion_protocol::{Capabilities, PinMode};

use crate::traits::{BoardPins, LinkError, SerialLink};

/// Queue bound for the loopback link
pub const LOOPBACK_QUEUE: usize = 256;

/// In-memory serial link with a bounded transmit queue
///
/// Tests script the receive side with [`LoopbackLink::push_rx`] and read
/// what reached the "wire" from [`LoopbackLink::wire`]. With `auto_drain`
/// set, a full transmit queue sheds its oldest byte onto the wire instead
/// of rejecting the write, imitating a UART that keeps draining while the
/// engine runs.
pub struct LoopbackLink {
    rx: Deque<u8, LOOPBACK_QUEUE>,
    tx: Deque<u8, LOOPBACK_QUEUE>,
    capacity: usize,
    auto_drain: bool,
    /// Bytes that have left the transmit queue, in wire order
    pub wire: Vec<u8, 2048>,
}

impl LoopbackLink {
    /// Link whose transmit queue rejects writes when full
    pub fn new(capacity: usize) -> Self {
        Self {
            rx: Deque::new(),
            tx: Deque::new(),
            capacity: capacity.min(LOOPBACK_QUEUE),
            auto_drain: false,
            wire: Vec::new(),
        }
    }

    /// Link whose transmit queue drains itself when full
    pub fn auto_drain(capacity: usize) -> Self {
        Self {
            auto_drain: true,
            ..Self::new(capacity)
        }
    }

    /// Script bytes to arrive on the receive side
    pub fn push_rx(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.rx
                .push_back(b)
                .expect("loopback rx queue overflow in test");
        }
    }

    /// Move up to `n` bytes from the transmit queue onto the wire
    pub fn drain(&mut self, n: usize) {
        for _ in 0..n {
            match self.tx.pop_front() {
                Some(b) => self.wire.push(b).expect("loopback wire log overflow"),
                None => break,
            }
        }
    }

    /// Drain the whole transmit queue onto the wire
    pub fn drain_all(&mut self) {
        self.drain(self.tx.len());
    }
}

impl SerialLink for LoopbackLink {
    fn read_byte(&mut self) -> Option<u8> {
        self.rx.pop_front()
    }

    fn write_byte(&mut self, byte: u8) -> Result<(), LinkError> {
        if self.tx.len() >= self.capacity {
            if !self.auto_drain {
                return Err(LinkError::TxFull);
            }
            self.drain(1);
        }
        self.tx
            .push_back(byte)
            .map_err(|_| LinkError::TxFull)
    }

    fn tx_buffered(&self) -> usize {
        self.tx.len()
    }

    fn tx_capacity(&self) -> usize {
        self.capacity
    }

    fn flush(&mut self) {
        // Nothing drains a loopback but the test itself
        self.drain_all();
    }
}

/// Pins in the scripted board's table
pub const TEST_PIN_COUNT: u8 = 21;

/// Board fixture with a small dev board's capability table: pins 0-4 and
/// 10 carry ADC channels 0-5, pins 17 and 18 are reserved (power), and
/// analog channels 8-15 sample on-board sensors with no backing pin.
pub struct ScriptedBoard {
    pub digital: [bool; TEST_PIN_COUNT as usize],
    pub analog: [u16; 16],
    pub modes_applied: Vec<(u8, PinMode), 64>,
    pub digital_writes: Vec<(u8, bool), 64>,
    pub analog_writes: Vec<(u8, u16), 64>,
}

impl Default for ScriptedBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedBoard {
    pub fn new() -> Self {
        Self {
            digital: [false; TEST_PIN_COUNT as usize],
            analog: [0; 16],
            modes_applied: Vec::new(),
            digital_writes: Vec::new(),
            analog_writes: Vec::new(),
        }
    }
}

impl BoardPins for ScriptedBoard {
    fn pin_count(&self) -> u8 {
        TEST_PIN_COUNT
    }

    fn capabilities(&self, pin: u8) -> Capabilities {
        match pin {
            17 | 18 => Capabilities::NONE,
            0..=4 | 10 => Capabilities::full(),
            _ if pin < TEST_PIN_COUNT => Capabilities::digital_io_pwm(),
            _ => Capabilities::NONE,
        }
    }

    fn apply_mode(&mut self, pin: u8, mode: PinMode) {
        let _ = self.modes_applied.push((pin, mode));
    }

    fn digital_read(&mut self, pin: u8) -> bool {
        self.digital[pin as usize]
    }

    fn digital_write(&mut self, pin: u8, high: bool) {
        self.digital[pin as usize] = high;
        let _ = self.digital_writes.push((pin, high));
    }

    fn analog_read(&mut self, channel: u8) -> u16 {
        self.analog[channel as usize % 16]
    }

    fn analog_write(&mut self, pin: u8, value: u16) {
        let _ = self.analog_writes.push((pin, value));
    }

    fn analog_channel_pin(&self, channel: u8) -> Option<u8> {
        match channel {
            0..=4 => Some(channel),
            5 => Some(10),
            _ => None,
        }
    }
}
