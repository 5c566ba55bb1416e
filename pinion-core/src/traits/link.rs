//! Serial transport abstraction

/// Byte-oriented serial link to the host
///
/// Reads are non-blocking; writes fail with [`LinkError::TxFull`] when the
/// transmit queue has no room, and the caller decides whether to retry.
/// The transmit queue is owned by the transport: the engine observes its
/// occupancy but never drains it.
pub trait SerialLink {
    /// Take the next received byte, if any. Never blocks.
    fn read_byte(&mut self) -> Option<u8>;

    /// Queue one byte for transmission
    fn write_byte(&mut self, byte: u8) -> Result<(), LinkError>;

    /// Bytes queued for transmission but not yet on the wire
    fn tx_buffered(&self) -> usize;

    /// Total capacity of the transmit queue
    fn tx_capacity(&self) -> usize;

    /// Block until every queued byte is on the wire
    ///
    /// The default implementation busy-polls the queue. A transport with a
    /// real queue-empty notification may substitute a blocking wait; the
    /// ordering guarantee is the same either way.
    fn flush(&mut self) {
        while self.tx_buffered() > 0 {
            core::hint::spin_loop();
        }
    }
}

/// Errors from serial link operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkError {
    /// Transmit queue is full; retry once the wire has drained
    TxFull,
}

/// Serial link configuration
///
/// Buffers must hold at least one worst-case report burst
/// ([`crate::flow::WORST_CASE_STEP_BYTES`]) so the no-drop policy cannot
/// overrun them within a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LinkConfig {
    /// Baud rate in bits per second
    pub baudrate: u32,
    /// Receive buffer size in bytes
    pub rx_buffer: usize,
    /// Transmit buffer size in bytes
    pub tx_buffer: usize,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            baudrate: 57_600,
            rx_buffer: 249,
            tx_buffer: 249,
        }
    }
}
