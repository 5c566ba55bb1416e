//! Report scheduling for streaming channels
//!
//! The sampler owns the streaming flags and the sampling interval, and
//! decides once per engine step which channels are due for a report. Report
//! order is fixed: digital ports in ascending order, then analog channels
//! in ascending order, so a host (and a test) always sees the same
//! sequence for the same state.

use heapless::Vec;
use pinion_protocol::{PinMode, Report};

use crate::config::{EngineConfig, MIN_SAMPLING_INTERVAL_MS};
use crate::pins::PinModel;
use crate::traits::{BoardPins, ANALOG_CHANNEL_COUNT};

/// Digital ports addressable by the wire protocol
pub const DIGITAL_PORT_COUNT: u8 = 16;

/// Upper bound on reports produced by one tick
pub const MAX_TICK_REPORTS: usize = (DIGITAL_PORT_COUNT + ANALOG_CHANNEL_COUNT) as usize;

/// Decides which streaming channels are reported on each tick
#[derive(Debug)]
pub struct Sampler {
    interval_ms: u16,
    on_change_only: bool,
    stream_ports: u16,
    stream_channels: u16,
    last_tick_ms: Option<u32>,
    last_port_mask: [Option<u16>; DIGITAL_PORT_COUNT as usize],
    last_channel_value: [Option<u16>; ANALOG_CHANNEL_COUNT as usize],
}

impl Sampler {
    /// Create a sampler with power-on defaults from the config
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            interval_ms: config.sampling_interval_ms.max(MIN_SAMPLING_INTERVAL_MS),
            on_change_only: config.report_on_change_only,
            stream_ports: 0,
            stream_channels: 0,
            last_tick_ms: None,
            last_port_mask: [None; DIGITAL_PORT_COUNT as usize],
            last_channel_value: [None; ANALOG_CHANNEL_COUNT as usize],
        }
    }

    /// Return to power-on defaults (system reset)
    pub fn reset(&mut self, config: &EngineConfig) {
        *self = Self::new(config);
    }

    /// Set the sampling interval, clamped to the minimum
    pub fn set_interval(&mut self, ms: u16) {
        self.interval_ms = ms.max(MIN_SAMPLING_INTERVAL_MS);
    }

    /// Current sampling interval in milliseconds
    pub fn interval_ms(&self) -> u16 {
        self.interval_ms
    }

    /// Turn streaming of an analog channel on or off
    pub fn stream_analog(&mut self, channel: u8, enabled: bool) {
        if channel >= ANALOG_CHANNEL_COUNT {
            return;
        }
        let bit = 1 << channel;
        if enabled {
            self.stream_channels |= bit;
        } else {
            self.stream_channels &= !bit;
            // The next enable starts with a fresh report
            self.last_channel_value[channel as usize] = None;
        }
    }

    /// Turn streaming of a digital port on or off
    pub fn stream_digital(&mut self, port: u8, enabled: bool) {
        if port >= DIGITAL_PORT_COUNT {
            return;
        }
        let bit = 1 << port;
        if enabled {
            self.stream_ports |= bit;
        } else {
            self.stream_ports &= !bit;
            self.last_port_mask[port as usize] = None;
        }
    }

    /// True when the channel's streaming flag is set
    pub fn is_streaming_analog(&self, channel: u8) -> bool {
        channel < ANALOG_CHANNEL_COUNT && self.stream_channels & (1 << channel) != 0
    }

    /// True when the port's streaming flag is set
    pub fn is_streaming_digital(&self, port: u8) -> bool {
        port < DIGITAL_PORT_COUNT && self.stream_ports & (1 << port) != 0
    }

    /// True when the sampling interval has elapsed since the previous tick
    fn due(&self, now_ms: u32) -> bool {
        match self.last_tick_ms {
            None => true,
            Some(last) => now_ms.wrapping_sub(last) >= self.interval_ms as u32,
        }
    }

    /// Collect the reports due this engine step
    ///
    /// Digital ports sample every pin currently in a digital input mode;
    /// analog channels that map onto a pin are sampled only while that pin
    /// is in analog input mode, and unmapped channels (board sensors)
    /// whenever their flag is set. Values are truncated to the channel's
    /// resolution before they reach the encoder.
    pub fn tick<B: BoardPins>(
        &mut self,
        pins: &mut PinModel,
        board: &mut B,
        now_ms: u32,
    ) -> Vec<Report<'static>, MAX_TICK_REPORTS> {
        let mut reports = Vec::new();
        if !self.due(now_ms) {
            return reports;
        }
        self.last_tick_ms = Some(now_ms);

        for port in 0..pins.port_count().min(DIGITAL_PORT_COUNT) {
            if !self.is_streaming_digital(port) {
                continue;
            }
            let Some(mask) = pins.digital_port_mask(board, port) else {
                continue;
            };
            let last = &mut self.last_port_mask[port as usize];
            if self.on_change_only && *last == Some(mask) {
                continue;
            }
            *last = Some(mask);
            let _ = reports.push(Report::Digital { port, mask });
        }

        for channel in 0..ANALOG_CHANNEL_COUNT {
            if !self.is_streaming_analog(channel) {
                continue;
            }
            if let Some(pin) = board.analog_channel_pin(channel) {
                if pins.mode(pin) != Some(PinMode::AnalogInput) {
                    continue;
                }
            }
            let value = board.analog_read(channel) & PinMode::AnalogInput.max_value();
            let last = &mut self.last_channel_value[channel as usize];
            if self.on_change_only && *last == Some(value) {
                continue;
            }
            *last = Some(value);
            let _ = reports.push(Report::Analog { channel, value });
        }

        reports
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::ScriptedBoard;

    fn setup() -> (ScriptedBoard, PinModel, Sampler) {
        let board = ScriptedBoard::new();
        let pins = PinModel::new(&board);
        let sampler = Sampler::new(&EngineConfig::default());
        (board, pins, sampler)
    }

    #[test]
    fn test_nothing_streams_by_default() {
        let (mut board, mut pins, mut sampler) = setup();
        assert!(sampler.tick(&mut pins, &mut board, 0).is_empty());
    }

    #[test]
    fn test_two_ports_and_one_channel_make_three_frames() {
        let (mut board, mut pins, mut sampler) = setup();

        // Two digital input pins in different ports plus one analog pin
        pins.configure(&mut board, 0, PinMode::DigitalInput).unwrap();
        pins.configure(&mut board, 8, PinMode::DigitalInput).unwrap();
        pins.configure(&mut board, 2, PinMode::AnalogInput).unwrap();
        sampler.stream_digital(0, true);
        sampler.stream_digital(1, true);
        sampler.stream_analog(2, true);

        board.analog[2] = 1023;

        let reports = sampler.tick(&mut pins, &mut board, 0);
        assert_eq!(
            reports.as_slice(),
            &[
                Report::Digital { port: 0, mask: 0 },
                Report::Digital { port: 1, mask: 0 },
                Report::Analog {
                    channel: 2,
                    value: 1023
                },
            ]
        );
    }

    #[test]
    fn test_report_order_is_ports_then_channels_ascending() {
        let (mut board, mut pins, mut sampler) = setup();

        pins.configure(&mut board, 1, PinMode::DigitalInput).unwrap();
        pins.configure(&mut board, 9, PinMode::DigitalInput).unwrap();
        pins.configure(&mut board, 0, PinMode::AnalogInput).unwrap();
        pins.configure(&mut board, 4, PinMode::AnalogInput).unwrap();

        // Enable out of order; reports still come back sorted
        sampler.stream_analog(4, true);
        sampler.stream_analog(0, true);
        sampler.stream_digital(1, true);
        sampler.stream_digital(0, true);

        let first = sampler.tick(&mut pins, &mut board, 0);
        let kinds: std::vec::Vec<(bool, u8)> = first
            .iter()
            .map(|r| match *r {
                Report::Digital { port, .. } => (false, port),
                Report::Analog { channel, .. } => (true, channel),
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(kinds, [(false, 0), (false, 1), (true, 0), (true, 4)]);

        // Determinism: the same state yields the same sequence again
        let second = sampler.tick(&mut pins, &mut board, 1000);
        assert_eq!(first, second);
    }

    #[test]
    fn test_interval_gates_ticks() {
        let (mut board, mut pins, mut sampler) = setup();
        pins.configure(&mut board, 0, PinMode::DigitalInput).unwrap();
        sampler.stream_digital(0, true);

        assert_eq!(sampler.tick(&mut pins, &mut board, 0).len(), 1);
        // 99 ms later: not due yet at the default 100 ms interval
        assert!(sampler.tick(&mut pins, &mut board, 99).is_empty());
        assert_eq!(sampler.tick(&mut pins, &mut board, 100).len(), 1);
    }

    #[test]
    fn test_interval_clamped_to_minimum() {
        let (_, _, mut sampler) = setup();
        sampler.set_interval(0);
        assert_eq!(sampler.interval_ms(), MIN_SAMPLING_INTERVAL_MS);
        sampler.set_interval(300);
        assert_eq!(sampler.interval_ms(), 300);
    }

    #[test]
    fn test_clock_rollover_does_not_stall_sampling() {
        let (mut board, mut pins, mut sampler) = setup();
        pins.configure(&mut board, 0, PinMode::DigitalInput).unwrap();
        sampler.stream_digital(0, true);

        assert_eq!(sampler.tick(&mut pins, &mut board, u32::MAX - 10).len(), 1);
        // now_ms wrapped past zero; elapsed time is still ~110 ms
        assert_eq!(sampler.tick(&mut pins, &mut board, 100).len(), 1);
    }

    #[test]
    fn test_analog_channel_requires_analog_mode_on_mapped_pin() {
        let (mut board, mut pins, mut sampler) = setup();
        sampler.stream_analog(0, true); // channel 0 maps to pin 0

        assert!(sampler.tick(&mut pins, &mut board, 0).is_empty());

        pins.configure(&mut board, 0, PinMode::AnalogInput).unwrap();
        assert_eq!(sampler.tick(&mut pins, &mut board, 200).len(), 1);
    }

    #[test]
    fn test_sensor_channels_stream_without_a_pin() {
        let (mut board, mut pins, mut sampler) = setup();
        // Channel 8 has no backing pin on this board
        sampler.stream_analog(8, true);
        board.analog[8] = 101;

        let reports = sampler.tick(&mut pins, &mut board, 0);
        assert_eq!(
            reports.as_slice(),
            &[Report::Analog {
                channel: 8,
                value: 101
            }]
        );
    }

    #[test]
    fn test_analog_values_truncated_to_channel_resolution() {
        let (mut board, mut pins, mut sampler) = setup();
        sampler.stream_analog(8, true);
        board.analog[8] = 0x7FF; // wider than the 10-bit channel

        let reports = sampler.tick(&mut pins, &mut board, 0);
        assert_eq!(
            reports.as_slice(),
            &[Report::Analog {
                channel: 8,
                value: 0x3FF
            }]
        );
    }

    #[test]
    fn test_change_suppression() {
        let mut board = ScriptedBoard::new();
        let mut pins = PinModel::new(&board);
        let mut sampler = Sampler::new(&EngineConfig {
            report_on_change_only: true,
            ..EngineConfig::default()
        });
        pins.configure(&mut board, 0, PinMode::DigitalInput).unwrap();
        sampler.stream_digital(0, true);
        sampler.stream_analog(8, true);

        // First tick always reports: the host needs an initial value
        assert_eq!(sampler.tick(&mut pins, &mut board, 0).len(), 2);
        // Nothing changed: nothing reported
        assert!(sampler.tick(&mut pins, &mut board, 100).is_empty());

        board.digital[0] = true;
        let reports = sampler.tick(&mut pins, &mut board, 200);
        assert_eq!(reports.as_slice(), &[Report::Digital { port: 0, mask: 1 }]);

        board.analog[8] = 55;
        let reports = sampler.tick(&mut pins, &mut board, 300);
        assert_eq!(
            reports.as_slice(),
            &[Report::Analog {
                channel: 8,
                value: 55
            }]
        );
    }

    #[test]
    fn test_disabling_a_channel_resets_its_change_tracking() {
        let mut board = ScriptedBoard::new();
        let mut pins = PinModel::new(&board);
        let mut sampler = Sampler::new(&EngineConfig {
            report_on_change_only: true,
            ..EngineConfig::default()
        });
        sampler.stream_analog(8, true);

        assert_eq!(sampler.tick(&mut pins, &mut board, 0).len(), 1);
        sampler.stream_analog(8, false);
        sampler.stream_analog(8, true);
        // Re-enabled with an unchanged value: still reported once
        assert_eq!(sampler.tick(&mut pins, &mut board, 100).len(), 1);
    }
}
