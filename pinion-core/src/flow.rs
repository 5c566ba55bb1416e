//! Transmit flow control
//!
//! The engine must never enqueue outbound bytes faster than the serial
//! link can carry them, and it must never drop a byte to stay fast. The
//! discipline has two halves: [`TxFlow::submit`] waits out a full transmit
//! queue instead of discarding, and the driving loop holds at
//! [`TxFlow::drain_barrier`] after each step so one step's burst is fully
//! on the wire before the next begins. A fixed inter-step delay would
//! either be unsafe at worst-case load or slow at light load; waiting on
//! the actual queue state is both.

use crate::traits::{LinkError, SerialLink};

/// Worst-case bytes emitted by one report tick: 16 analog channels plus
/// 3 digital ports at 3 bytes each. Transmit buffers must hold at least
/// this much (see [`crate::traits::LinkConfig`]).
pub const WORST_CASE_STEP_BYTES: usize = 57;

/// Tracks per-step transmit volume and enforces the no-drop discipline
#[derive(Debug, Default)]
pub struct TxFlow {
    step_bytes: usize,
}

impl TxFlow {
    /// Create a flow controller
    pub fn new() -> Self {
        Self::default()
    }

    /// Start accounting for a new engine step
    pub fn begin_step(&mut self) {
        self.step_bytes = 0;
    }

    /// Bytes submitted since the last [`TxFlow::begin_step`]
    pub fn step_bytes(&self) -> usize {
        self.step_bytes
    }

    /// Enqueue bytes on the link
    ///
    /// A full transmit queue is waited out, not overrun: the write is
    /// retried until the wire drains enough to accept the byte. A step
    /// larger than the queue therefore spills across drain cycles with
    /// every byte intact, at the cost of stalling the engine — the
    /// deliberate trade of liveness for stream integrity.
    pub fn submit<L: SerialLink>(&mut self, link: &mut L, bytes: &[u8]) {
        for &byte in bytes {
            loop {
                match link.write_byte(byte) {
                    Ok(()) => break,
                    Err(LinkError::TxFull) => core::hint::spin_loop(),
                }
            }
            self.step_bytes += 1;
        }
    }

    /// True when the link's transmit queue has fully emptied
    pub fn is_drained<L: SerialLink>(&self, link: &L) -> bool {
        link.tx_buffered() == 0
    }

    /// Wait until every queued byte is on the wire
    ///
    /// The driving loop must call this between steps; emitting a step's
    /// reports before the previous step has drained violates the
    /// protocol's ordering guarantee.
    pub fn drain_barrier<L: SerialLink>(&self, link: &mut L) {
        link.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::LoopbackLink;

    #[test]
    fn test_submit_counts_step_bytes() {
        let mut link = LoopbackLink::new(64);
        let mut flow = TxFlow::new();

        flow.begin_step();
        flow.submit(&mut link, &[1, 2, 3]);
        flow.submit(&mut link, &[4, 5]);
        assert_eq!(flow.step_bytes(), 5);

        flow.begin_step();
        assert_eq!(flow.step_bytes(), 0);
    }

    #[test]
    fn test_worst_case_step_fits_recommended_buffer() {
        let mut link = LoopbackLink::new(crate::traits::LinkConfig::default().tx_buffer);
        let mut flow = TxFlow::new();

        flow.begin_step();
        let burst = [0u8; WORST_CASE_STEP_BYTES];
        flow.submit(&mut link, &burst);

        assert_eq!(flow.step_bytes(), WORST_CASE_STEP_BYTES);
        assert_eq!(link.tx_buffered(), WORST_CASE_STEP_BYTES);
        assert!(!flow.is_drained(&link));

        flow.drain_barrier(&mut link);
        assert!(flow.is_drained(&link));
        assert_eq!(link.wire.len(), WORST_CASE_STEP_BYTES);
    }

    #[test]
    fn test_overflow_spills_without_dropping() {
        // A transmit queue far smaller than the worst-case burst, draining
        // as the engine writes (as a UART does)
        let mut link = LoopbackLink::auto_drain(16);
        let mut flow = TxFlow::new();

        let mut burst = [0u8; WORST_CASE_STEP_BYTES];
        for (i, b) in burst.iter_mut().enumerate() {
            *b = i as u8;
        }

        flow.begin_step();
        flow.submit(&mut link, &burst);
        flow.drain_barrier(&mut link);

        // Every byte reached the wire, in order
        assert_eq!(link.wire.as_slice(), &burst[..]);
    }

    #[test]
    fn test_drained_link_stays_drained() {
        let mut link = LoopbackLink::new(32);
        let flow = TxFlow::new();
        assert!(flow.is_drained(&link));
        flow.drain_barrier(&mut link);
        assert!(flow.is_drained(&link));
    }
}
