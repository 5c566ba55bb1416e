//! Serial link over the RP2040 buffered UART

use embassy_rp::uart::BufferedUart;
use embedded_io::{Read, ReadReady, Write, WriteReady};

use pinion_core::traits::{LinkError, SerialLink};

/// Buffered UART wrapped as the engine's transport capability
///
/// The IRQ-driven transmit ring drains in the background, so its exact
/// occupancy cannot be observed from here. `pending` counts bytes written
/// since the last flush instead — an upper bound on the real occupancy,
/// which keeps the drain barrier conservative. The barrier itself is the
/// UART's blocking flush (a queue-empty wait rather than a busy-poll).
pub struct UartLink {
    uart: BufferedUart<'static>,
    pending: usize,
    capacity: usize,
}

impl UartLink {
    pub fn new(uart: BufferedUart<'static>, capacity: usize) -> Self {
        Self {
            uart,
            pending: 0,
            capacity,
        }
    }
}

impl SerialLink for UartLink {
    fn read_byte(&mut self) -> Option<u8> {
        match self.uart.read_ready() {
            Ok(true) => {
                let mut buf = [0u8; 1];
                match self.uart.read(&mut buf) {
                    Ok(n) if n > 0 => Some(buf[0]),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    fn write_byte(&mut self, byte: u8) -> Result<(), LinkError> {
        match self.uart.write_ready() {
            Ok(true) => match self.uart.write(&[byte]) {
                Ok(n) if n > 0 => {
                    self.pending += 1;
                    Ok(())
                }
                _ => Err(LinkError::TxFull),
            },
            _ => Err(LinkError::TxFull),
        }
    }

    fn tx_buffered(&self) -> usize {
        self.pending.min(self.capacity)
    }

    fn tx_capacity(&self) -> usize {
        self.capacity
    }

    fn flush(&mut self) {
        let _ = self.uart.flush();
        self.pending = 0;
    }
}
