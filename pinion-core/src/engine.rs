//! The protocol engine
//!
//! One [`Engine::step`] parses every byte the transport has received,
//! applies the decoded commands, and then emits every report the sampler
//! declares due. The driving loop owns the hardware capabilities, lends
//! them to the engine through a [`Context`], and must hold at
//! [`Engine::drain_barrier`] between steps.

use heapless::Vec;
use pinion_protocol::{
    report::NO_ANALOG_CHANNEL, Capabilities, Command, Frame, FrameParser, Report, SysexCommand,
    MAX_REPORT_SIZE,
};

use crate::config::EngineConfig;
use crate::flow::TxFlow;
use crate::pins::{PinModel, MAX_PINS};
use crate::sampler::Sampler;
use crate::traits::{BoardPins, SerialLink, ANALOG_CHANNEL_COUNT};

/// Firmware version advertised in firmware reports
pub const FIRMWARE_MAJOR: u8 = 0;
pub const FIRMWARE_MINOR: u8 = 1;
/// Firmware name advertised in firmware reports
pub const FIRMWARE_NAME: &str = "Pinion";

/// Hardware capabilities owned by the run loop and lent to the engine
///
/// Bundling the transport and the pin I/O keeps the engine free of global
/// state: whoever owns the context decides what hardware the engine talks
/// to, and tests pass in-memory fakes.
pub struct Context<'a, L: SerialLink, B: BoardPins> {
    pub link: &'a mut L,
    pub board: &'a mut B,
}

/// The protocol engine
pub struct Engine {
    parser: FrameParser,
    pins: PinModel,
    sampler: Sampler,
    flow: TxFlow,
    config: EngineConfig,
}

impl Engine {
    /// Create an engine for the given board
    pub fn new<B: BoardPins>(board: &B, config: EngineConfig) -> Self {
        Self {
            parser: FrameParser::new(),
            pins: PinModel::new(board),
            sampler: Sampler::new(&config),
            flow: TxFlow::new(),
            config,
        }
    }

    /// One engine step: parse everything available, then emit everything due
    ///
    /// `now_ms` is a monotonic millisecond clock; wraparound is handled.
    /// After this returns, the caller must wait on [`Engine::drain_barrier`]
    /// (or poll [`Engine::is_drained`]) before stepping again.
    pub fn step<L: SerialLink, B: BoardPins>(&mut self, ctx: &mut Context<'_, L, B>, now_ms: u32) {
        self.flow.begin_step();

        while let Some(byte) = ctx.link.read_byte() {
            if let Some(frame) = self.parser.feed(byte) {
                self.dispatch(ctx, &frame);
            }
        }

        let reports = self.sampler.tick(&mut self.pins, ctx.board, now_ms);
        for report in &reports {
            self.send(ctx.link, report);
        }
    }

    /// Wait until the previous step's bytes are on the wire
    pub fn drain_barrier<L: SerialLink, B: BoardPins>(&self, ctx: &mut Context<'_, L, B>) {
        self.flow.drain_barrier(ctx.link);
    }

    /// True when the transport's transmit queue has emptied
    pub fn is_drained<L: SerialLink, B: BoardPins>(&self, ctx: &Context<'_, L, B>) -> bool {
        self.flow.is_drained(ctx.link)
    }

    /// Bytes submitted during the most recent step
    pub fn step_bytes(&self) -> usize {
        self.flow.step_bytes()
    }

    /// The engine's pin table
    pub fn pins(&self) -> &PinModel {
        &self.pins
    }

    /// The engine's report scheduler
    pub fn sampler(&self) -> &Sampler {
        &self.sampler
    }

    /// Stream a board event to the host (button presses, gestures, ...)
    pub fn report_event<L: SerialLink, B: BoardPins>(
        &mut self,
        ctx: &mut Context<'_, L, B>,
        source: u16,
        value: u16,
    ) {
        self.send(ctx.link, &Report::Event { source, value });
    }

    /// Send a 7-bit ASCII diagnostic string to the host
    pub fn send_string<L: SerialLink, B: BoardPins>(
        &mut self,
        ctx: &mut Context<'_, L, B>,
        text: &str,
    ) {
        self.send(ctx.link, &Report::Text { text });
    }

    /// Act on one decoded frame
    ///
    /// Undecodable frames and rejected pin operations are dropped: a bad
    /// command must neither crash the engine nor desynchronize the stream.
    fn dispatch<L: SerialLink, B: BoardPins>(&mut self, ctx: &mut Context<'_, L, B>, frame: &Frame) {
        let Ok(command) = Command::from_frame(frame) else {
            return;
        };
        match command {
            Command::SetPinMode { pin, mode } => {
                let _ = self.pins.configure(ctx.board, pin, mode);
            }
            Command::SetDigitalPin { pin, high } => {
                let _ = self.pins.set_digital(ctx.board, pin, high);
            }
            Command::WriteDigitalPort { port, mask } => {
                self.pins.write_port(ctx.board, port, mask);
            }
            Command::WriteAnalog { pin, value } => {
                let _ = self.pins.set_analog(ctx.board, pin, value);
            }
            Command::ReportAnalog { channel, enabled } => {
                self.sampler.stream_analog(channel, enabled);
            }
            Command::ReportDigital { port, enabled } => {
                self.sampler.stream_digital(port, enabled);
            }
            Command::QueryProtocolVersion => self.send(ctx.link, &Report::ProtocolVersion),
            Command::SystemReset => self.system_reset(),
            Command::Sysex(sysex) => self.dispatch_sysex(ctx, sysex),
        }
    }

    fn dispatch_sysex<L: SerialLink, B: BoardPins>(
        &mut self,
        ctx: &mut Context<'_, L, B>,
        sysex: SysexCommand,
    ) {
        match sysex {
            SysexCommand::CapabilityQuery => self.send_capabilities(ctx),
            SysexCommand::AnalogMappingQuery => self.send_analog_mapping(ctx),
            SysexCommand::PinStateQuery { pin } => self.send_pin_state(ctx, pin),
            SysexCommand::ExtendedAnalogWrite { pin, value } => {
                let _ = self.pins.set_analog(ctx.board, pin, value as u16);
            }
            SysexCommand::ReportFirmware => self.send(
                ctx.link,
                &Report::Firmware {
                    major: FIRMWARE_MAJOR,
                    minor: FIRMWARE_MINOR,
                    name: FIRMWARE_NAME,
                },
            ),
            SysexCommand::SamplingInterval { ms } => self.sampler.set_interval(ms),
            SysexCommand::Unknown { .. } => {}
        }
    }

    fn send_capabilities<L: SerialLink, B: BoardPins>(&mut self, ctx: &mut Context<'_, L, B>) {
        let mut table: Vec<Capabilities, MAX_PINS> = Vec::new();
        for pin in 0..self.pins.pin_count() {
            let _ = table.push(ctx.board.capabilities(pin));
        }
        self.send(ctx.link, &Report::Capabilities { table: &table });
    }

    fn send_analog_mapping<L: SerialLink, B: BoardPins>(&mut self, ctx: &mut Context<'_, L, B>) {
        let mut channels: Vec<u8, MAX_PINS> = Vec::new();
        for pin in 0..self.pins.pin_count() {
            let channel = (0..ANALOG_CHANNEL_COUNT)
                .find(|&c| ctx.board.analog_channel_pin(c) == Some(pin))
                .unwrap_or(NO_ANALOG_CHANNEL);
            let _ = channels.push(channel);
        }
        self.send(ctx.link, &Report::AnalogMapping { channels: &channels });
    }

    fn send_pin_state<L: SerialLink, B: BoardPins>(&mut self, ctx: &mut Context<'_, L, B>, pin: u8) {
        if pin >= self.pins.pin_count() {
            return;
        }
        self.send(
            ctx.link,
            &Report::PinState {
                pin,
                mode: self.pins.mode(pin),
                state: self.pins.value(pin).unwrap_or(0),
            },
        );
    }

    fn system_reset(&mut self) {
        self.pins.reset();
        self.sampler.reset(&self.config);
    }

    fn send<L: SerialLink>(&mut self, link: &mut L, report: &Report<'_>) {
        let mut buffer = [0u8; MAX_REPORT_SIZE];
        // MAX_REPORT_SIZE bounds every report this engine produces
        if let Ok(len) = report.encode(&mut buffer) {
            self.flow.submit(link, &buffer[..len]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{LoopbackLink, ScriptedBoard, TEST_PIN_COUNT};
    use pinion_protocol::frame::{
        END_SYSEX, START_SYSEX, SYSEX_ANALOG_MAPPING_RESPONSE, SYSEX_CAPABILITY_QUERY,
        SYSEX_CAPABILITY_RESPONSE, SYSEX_PIN_STATE_RESPONSE, SYSEX_REPORT_FIRMWARE,
    };
    use pinion_protocol::frame::unpack14;
    use pinion_protocol::PinMode;

    fn setup() -> (LoopbackLink, ScriptedBoard, Engine) {
        let link = LoopbackLink::auto_drain(64);
        let board = ScriptedBoard::new();
        let engine = Engine::new(&board, EngineConfig::default());
        (link, board, engine)
    }

    /// Run one step over the scripted rx bytes and return the wire output
    fn step_with(
        engine: &mut Engine,
        link: &mut LoopbackLink,
        board: &mut ScriptedBoard,
        rx: &[u8],
        now_ms: u32,
    ) -> std::vec::Vec<u8> {
        link.push_rx(rx);
        let mut ctx = Context { link, board };
        engine.step(&mut ctx, now_ms);
        engine.drain_barrier(&mut ctx);
        let out = link.wire.as_slice().to_vec();
        link.wire.clear();
        out
    }

    #[test]
    fn test_set_pin_mode_drives_board() {
        let (mut link, mut board, mut engine) = setup();

        let out = step_with(&mut engine, &mut link, &mut board, &[0xF4, 13, 0x01], 0);
        assert!(out.is_empty());
        assert_eq!(engine.pins().mode(13), Some(PinMode::DigitalOutput));
        assert_eq!(board.modes_applied.as_slice(), &[(13, PinMode::DigitalOutput)]);
    }

    #[test]
    fn test_invalid_commands_are_noops() {
        let (mut link, mut board, mut engine) = setup();

        // Unsupported mode (analog on a digital-only pin), out-of-range pin,
        // digital write to an unconfigured pin
        let out = step_with(
            &mut engine,
            &mut link,
            &mut board,
            &[0xF4, 8, 0x02, 0xF4, 99, 0x00, 0xF5, 6, 1],
            0,
        );
        assert!(out.is_empty());
        assert_eq!(engine.pins().mode(8), None);
        assert!(board.digital_writes.is_empty());

        // The engine still works afterwards
        let out = step_with(&mut engine, &mut link, &mut board, &[0xF9], 1);
        assert_eq!(out, [0xF9, 2, 6]);
    }

    #[test]
    fn test_streaming_scenario_three_frames() {
        let (mut link, mut board, mut engine) = setup();
        board.analog[2] = 1023;

        // Configure two digital inputs in different ports and one analog
        // pin, then enable streaming for all three channels
        let out = step_with(
            &mut engine,
            &mut link,
            &mut board,
            &[
                0xF4, 0, 0x00, // pin 0: digital input (port 0)
                0xF4, 8, 0x00, // pin 8: digital input (port 1)
                0xF4, 2, 0x02, // pin 2: analog input (channel 2)
                0xD0, 1, // stream port 0
                0xD1, 1, // stream port 1
                0xC2, 1, // stream channel 2
            ],
            0,
        );

        // Exactly three report frames, ports first
        assert_eq!(out.len(), 9);
        assert_eq!(out[0], 0x90);
        assert_eq!(out[3], 0x91);
        assert_eq!(out[6], 0xE2);
        // The analog value survives the 7-bit split
        assert_eq!(unpack14(out[7], out[8]), 1023);
        assert_eq!(engine.step_bytes(), 9);
    }

    #[test]
    fn test_no_reports_before_interval_elapses() {
        let (mut link, mut board, mut engine) = setup();

        let out = step_with(
            &mut engine,
            &mut link,
            &mut board,
            &[0xF4, 0, 0x00, 0xD0, 1],
            0,
        );
        assert_eq!(out.len(), 3);

        // Next step lands inside the sampling interval: nothing due
        let out = step_with(&mut engine, &mut link, &mut board, &[], 50);
        assert!(out.is_empty());
        assert_eq!(engine.step_bytes(), 0);

        let out = step_with(&mut engine, &mut link, &mut board, &[], 100);
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn test_command_split_across_steps() {
        let (mut link, mut board, mut engine) = setup();

        // First two bytes of a digital port write arrive in one step...
        let out = step_with(&mut engine, &mut link, &mut board, &[0x90, 0x03], 0);
        assert!(out.is_empty());
        assert!(board.digital_writes.is_empty());

        // ...the final byte a step later completes exactly one command
        engine
            .pins
            .configure(&mut board, 0, PinMode::DigitalOutput)
            .unwrap();
        engine
            .pins
            .configure(&mut board, 1, PinMode::DigitalOutput)
            .unwrap();
        board.digital_writes.clear();

        let out = step_with(&mut engine, &mut link, &mut board, &[0x00], 1);
        assert!(out.is_empty());
        assert_eq!(board.digital_writes.as_slice(), &[(0, true), (1, true)]);
    }

    #[test]
    fn test_protocol_version_query() {
        let (mut link, mut board, mut engine) = setup();
        let out = step_with(&mut engine, &mut link, &mut board, &[0xF9], 0);
        assert_eq!(out, [0xF9, 2, 6]);
    }

    #[test]
    fn test_firmware_report() {
        let (mut link, mut board, mut engine) = setup();
        let out = step_with(
            &mut engine,
            &mut link,
            &mut board,
            &[START_SYSEX, SYSEX_REPORT_FIRMWARE, END_SYSEX],
            0,
        );
        assert_eq!(out[0], START_SYSEX);
        assert_eq!(out[1], SYSEX_REPORT_FIRMWARE);
        assert_eq!(out[2], FIRMWARE_MAJOR);
        assert_eq!(out[3], FIRMWARE_MINOR);
        assert_eq!(*out.last().unwrap(), END_SYSEX);
        assert_eq!(out.len(), 4 + 2 * FIRMWARE_NAME.len() + 1);
    }

    #[test]
    fn test_capability_query_covers_every_pin() {
        let (mut link, mut board, mut engine) = setup();
        let out = step_with(
            &mut engine,
            &mut link,
            &mut board,
            &[START_SYSEX, SYSEX_CAPABILITY_QUERY, END_SYSEX],
            0,
        );
        assert_eq!(out[1], SYSEX_CAPABILITY_RESPONSE);
        // One separator between each pair of adjacent pins
        let separators = out[2..out.len() - 1]
            .iter()
            .filter(|&&b| b == 0x7F)
            .count();
        assert_eq!(separators, TEST_PIN_COUNT as usize - 1);
    }

    #[test]
    fn test_analog_mapping_response() {
        let (mut link, mut board, mut engine) = setup();
        let out = step_with(
            &mut engine,
            &mut link,
            &mut board,
            &[START_SYSEX, 0x69, END_SYSEX],
            0,
        );
        assert_eq!(out[1], SYSEX_ANALOG_MAPPING_RESPONSE);
        let body = &out[2..out.len() - 1];
        assert_eq!(body.len(), TEST_PIN_COUNT as usize);
        // Pins 0-4 carry channels 0-4, pin 10 carries channel 5
        assert_eq!(&body[..5], &[0, 1, 2, 3, 4]);
        assert_eq!(body[10], 5);
        assert_eq!(body[6], NO_ANALOG_CHANNEL);
    }

    #[test]
    fn test_pin_state_query() {
        let (mut link, mut board, mut engine) = setup();

        let out = step_with(
            &mut engine,
            &mut link,
            &mut board,
            &[
                0xF4, 5, 0x01, // pin 5: digital output
                0xF5, 5, 1, // drive it high
                START_SYSEX, 0x6D, 5, END_SYSEX,
            ],
            0,
        );
        assert_eq!(
            out,
            [
                START_SYSEX,
                SYSEX_PIN_STATE_RESPONSE,
                5,
                PinMode::DigitalOutput.to_wire(),
                1,
                0,
                END_SYSEX
            ]
        );

        // Out-of-range pins are ignored, matching the other pin commands
        let out = step_with(
            &mut engine,
            &mut link,
            &mut board,
            &[START_SYSEX, 0x6D, 0x40, END_SYSEX],
            1,
        );
        assert!(out.is_empty());
    }

    #[test]
    fn test_extended_analog_write() {
        let (mut link, mut board, mut engine) = setup();

        let out = step_with(
            &mut engine,
            &mut link,
            &mut board,
            &[
                0xF4, 16, 0x03, // pin 16 (beyond the 0xE0 nibble range): PWM
                START_SYSEX, 0x6F, 16, 0x00, 0x04, END_SYSEX, // value 512
            ],
            0,
        );
        assert!(out.is_empty());
        assert_eq!(board.analog_writes.last(), Some(&(16, 512)));
    }

    #[test]
    fn test_sampling_interval_command() {
        let (mut link, mut board, mut engine) = setup();

        step_with(
            &mut engine,
            &mut link,
            &mut board,
            &[START_SYSEX, 0x7A, 0x2C, 0x01, END_SYSEX],
            0,
        );
        assert_eq!(engine.sampler().interval_ms(), 300);

        // Below the floor: clamped
        step_with(
            &mut engine,
            &mut link,
            &mut board,
            &[START_SYSEX, 0x7A, 0x01, 0x00, END_SYSEX],
            1,
        );
        assert_eq!(engine.sampler().interval_ms(), 5);
    }

    #[test]
    fn test_system_reset_restores_power_on_state() {
        let (mut link, mut board, mut engine) = setup();

        step_with(
            &mut engine,
            &mut link,
            &mut board,
            &[
                0xF4, 0, 0x00, // pin 0: digital input
                0xD0, 1, // stream port 0
                START_SYSEX, 0x7A, 0x0A, 0x00, END_SYSEX, // 10 ms interval
            ],
            0,
        );
        assert!(engine.sampler().is_streaming_digital(0));

        let out = step_with(&mut engine, &mut link, &mut board, &[0xFF], 100);
        assert!(out.is_empty());
        assert_eq!(engine.pins().mode(0), None);
        assert!(!engine.sampler().is_streaming_digital(0));
        assert_eq!(engine.sampler().interval_ms(), 100);

        // Nothing streams after the reset
        let out = step_with(&mut engine, &mut link, &mut board, &[], 500);
        assert!(out.is_empty());
    }

    #[test]
    fn test_unknown_sysex_ignored_without_desync() {
        let (mut link, mut board, mut engine) = setup();

        let out = step_with(
            &mut engine,
            &mut link,
            &mut board,
            &[START_SYSEX, 0x42, 0x01, 0x02, END_SYSEX, 0xF9],
            0,
        );
        // The version query right behind the unknown sysex still answers
        assert_eq!(out, [0xF9, 2, 6]);
    }

    #[test]
    fn test_report_event_and_string() {
        let (mut link, mut board, mut engine) = setup();
        let mut ctx = Context {
            link: &mut link,
            board: &mut board,
        };

        engine.report_event(&mut ctx, 2, 1);
        engine.send_string(&mut ctx, "ok");
        engine.drain_barrier(&mut ctx);

        let wire = link.wire.as_slice();
        assert_eq!(wire[0], START_SYSEX);
        assert_eq!(wire[1], 0x0D);
        // Event frame: id + 3 bytes source + 3 bytes value + terminator
        assert_eq!(wire[8], END_SYSEX);
        assert_eq!(wire[9], START_SYSEX);
        assert_eq!(wire[10], 0x71);
        assert_eq!(&wire[11..13], &b"ok"[..]);
        assert_eq!(wire[13], END_SYSEX);
    }

    #[test]
    fn test_worst_case_step_stays_within_budget() {
        let (mut link, mut board, mut engine) = setup();

        // 16 analog sensor channels take some configuring on this board:
        // channels 0-5 map to pins, 6-15 are sensors. Configure the mapped
        // pins for analog input and stream everything, plus 3 ports.
        let mut rx = std::vec::Vec::new();
        for pin in [0u8, 1, 2, 3, 4, 10] {
            rx.extend([0xF4, pin, 0x02]);
        }
        for pin in [5u8, 6, 7] {
            rx.extend([0xF4, pin, 0x00]);
        }
        // Input pins land in ports 0; add inputs in ports 1 and 2 as well
        rx.extend([0xF4, 8, 0x00, 0xF4, 16, 0x00]);
        for channel in 0..16u8 {
            rx.extend([0xC0 | channel, 1]);
        }
        for port in 0..3u8 {
            rx.extend([0xD0 | port, 1]);
        }

        let out = step_with(&mut engine, &mut link, &mut board, &rx, 0);

        // 3 digital ports + 16 analog channels, 3 bytes each
        assert_eq!(out.len(), crate::flow::WORST_CASE_STEP_BYTES);
        assert_eq!(engine.step_bytes(), crate::flow::WORST_CASE_STEP_BYTES);
    }
}
