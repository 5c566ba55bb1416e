//! Pinion - Firmata-style pin bridge firmware
//!
//! Main firmware binary for the Raspberry Pi Pico (RP2040). Owns the
//! hardware, bundles it into the engine's capability context, and drives
//! the step/drain cycle: parse everything the host sent, emit every due
//! report, then hold until the transmit queue is empty. The drain wait is
//! what keeps a full-rate report burst from ever overrunning the serial
//! link.

#![no_std]
#![no_main]

use defmt::*;
use embassy_executor::Spawner;
use embassy_rp::adc::{Adc, Channel, Config as AdcConfig};
use embassy_rp::bind_interrupts;
use embassy_rp::gpio::{Flex, Pull};
use embassy_rp::peripherals::UART0;
use embassy_rp::uart::{BufferedInterruptHandler, BufferedUart, Config as UartConfig};
use embassy_time::Instant;
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use pinion_core::config::EngineConfig;
use pinion_core::engine::{Context, Engine};
use pinion_core::traits::LinkConfig;

use crate::board::PicoBoard;
use crate::link::UartLink;

mod board;
mod link;

bind_interrupts!(struct Irqs {
    UART0_IRQ => BufferedInterruptHandler<UART0>;
});

// Static cells for UART buffers (must live forever)
static TX_BUF: StaticCell<[u8; 256]> = StaticCell::new();
static RX_BUF: StaticCell<[u8; 256]> = StaticCell::new();

/// Main entry point
#[embassy_executor::main]
async fn main(_spawner: Spawner) {
    info!("Pinion firmware starting...");

    let p = embassy_rp::init(Default::default());
    info!("Peripherals initialized");

    // Host link on UART0 (GP0 = TX, GP1 = RX)
    let link_config = LinkConfig::default();
    let mut uart_config = UartConfig::default();
    uart_config.baudrate = link_config.baudrate;
    let uart = BufferedUart::new(
        p.UART0,
        p.PIN_0,
        p.PIN_1,
        Irqs,
        TX_BUF.init([0; 256]),
        RX_BUF.init([0; 256]),
        uart_config,
    );
    let mut link = UartLink::new(uart, link_config.tx_buffer);

    // Digital pin table; UART pins 0/1, reserved 23/24, and the dedicated
    // ADC pins 26-29 stay out of it
    let pins: [Option<Flex<'static>>; board::PIN_COUNT as usize] = [
        None, // GP0: UART0 TX
        None, // GP1: UART0 RX
        Some(Flex::new(p.PIN_2)),
        Some(Flex::new(p.PIN_3)),
        Some(Flex::new(p.PIN_4)),
        Some(Flex::new(p.PIN_5)),
        Some(Flex::new(p.PIN_6)),
        Some(Flex::new(p.PIN_7)),
        Some(Flex::new(p.PIN_8)),
        Some(Flex::new(p.PIN_9)),
        Some(Flex::new(p.PIN_10)),
        Some(Flex::new(p.PIN_11)),
        Some(Flex::new(p.PIN_12)),
        Some(Flex::new(p.PIN_13)),
        Some(Flex::new(p.PIN_14)),
        Some(Flex::new(p.PIN_15)),
        Some(Flex::new(p.PIN_16)),
        Some(Flex::new(p.PIN_17)),
        Some(Flex::new(p.PIN_18)),
        Some(Flex::new(p.PIN_19)),
        Some(Flex::new(p.PIN_20)),
        Some(Flex::new(p.PIN_21)),
        Some(Flex::new(p.PIN_22)),
        None, // GP23: SMPS power save
        None, // GP24: VBUS sense
        Some(Flex::new(p.PIN_25)), // on-board LED
        None, // GP26-GP29: ADC channels 0-3
        None,
        None,
        None,
    ];

    let adc = Adc::new_blocking(p.ADC, AdcConfig::default());
    let adc_channels = [
        Channel::new_pin(p.PIN_26, Pull::None),
        Channel::new_pin(p.PIN_27, Pull::None),
        Channel::new_pin(p.PIN_28, Pull::None),
        Channel::new_pin(p.PIN_29, Pull::None),
        Channel::new_temp_sensor(p.ADC_TEMP_SENSOR),
    ];
    let mut pico = PicoBoard::new(pins, adc, adc_channels);

    let mut engine = Engine::new(&pico, EngineConfig::default());
    let mut ctx = Context {
        link: &mut link,
        board: &mut pico,
    };
    info!("Protocol engine ready ({} pins)", board::PIN_COUNT);

    loop {
        let now_ms = Instant::now().as_millis() as u32;
        engine.step(&mut ctx, now_ms);

        // Hold until every byte from this step is on the wire. A fixed
        // delay would either be unsafe at worst-case report load or slow
        // at light load; waiting on the queue itself is exact.
        engine.drain_barrier(&mut ctx);
    }
}
