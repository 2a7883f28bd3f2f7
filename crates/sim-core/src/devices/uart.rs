use std::io::Write;
use std::sync::mpsc::{Receiver, TryRecvError};

use crate::device::{AddressRegion, Device, WriteRequest};

/// Two 4-byte lanes in one 8-byte region: offset 0 is write-only TX (writing
/// it emits the low byte to stdout; reading it is an invariant violation,
/// matching the source's assert-on-read). Offset 4 is an optional read-only
/// RX lane fed out-of-band by a background stdin-reader thread through an
/// `mpsc` channel; writing it is an invariant violation for symmetry with
/// TX. An empty or disconnected RX channel reads as 0, same as the keyboard
/// device's empty queues.
pub struct UartDevice {
    regions: [AddressRegion; 1],
    base: u64,
    write_queue: Vec<WriteRequest>,
    read_queue: Vec<u64>,
    last_read: u64,
    rx: Option<Receiver<u8>>,
}

impl UartDevice {
    pub fn new(base: u64) -> Self {
        Self {
            regions: [AddressRegion::new(base, base + 8, "serial")],
            base,
            write_queue: Vec::new(),
            read_queue: Vec::new(),
            last_read: 0,
            rx: None,
        }
    }

    /// Builds a UART with its RX lane fed by `rx`, the consumer half of a
    /// channel a background stdin-reader thread writes into.
    pub fn with_rx(base: u64, rx: Receiver<u8>) -> Self {
        let mut dev = Self::new(base);
        dev.rx = Some(rx);
        dev
    }

    /// Polls the RX channel, returning the next pending byte if any. Never
    /// blocks; a disconnected producer is treated the same as "no data".
    fn poll_rx(&self) -> u8 {
        match self.rx.as_ref() {
            Some(rx) => match rx.try_recv() {
                Ok(byte) => byte,
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => 0,
            },
            None => 0,
        }
    }
}

impl Device for UartDevice {
    fn name(&self) -> &'static str {
        "serial"
    }

    fn regions(&self) -> &[AddressRegion] {
        &self.regions
    }

    fn enqueue_read(&mut self, addr: u64) {
        if addr - self.base == 0 {
            panic!("uart: read of tx register not supported");
        }
        self.read_queue.push(addr);
    }

    fn enqueue_write(&mut self, req: WriteRequest) {
        if req.waddr - self.base != 0 {
            panic!("uart: write of rx register not supported");
        }
        self.write_queue.push(req);
    }

    fn has_pending_read(&self) -> bool {
        !self.read_queue.is_empty()
    }

    fn has_pending_write(&self) -> bool {
        !self.write_queue.is_empty()
    }

    fn tick(&mut self) -> u64 {
        if let Some(req) = self.write_queue.pop() {
            let byte = (req.wdata & 0xff) as u8;
            print!("{}", byte as char);
            let _ = std::io::stdout().flush();
        }
        if self.read_queue.pop().is_some() {
            self.last_read = u64::from(self.poll_rx());
        }
        self.last_read
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn empty_rx_channel_reads_as_zero() {
        let (_tx, rx) = mpsc::channel();
        let mut uart = UartDevice::with_rx(0xa000_03f8, rx);
        uart.enqueue_read(0xa000_03fc);
        assert_eq!(uart.tick(), 0);
    }

    #[test]
    fn queued_rx_byte_is_delivered() {
        let (tx, rx) = mpsc::channel();
        tx.send(b'x').unwrap();
        let mut uart = UartDevice::with_rx(0xa000_03f8, rx);
        uart.enqueue_read(0xa000_03fc);
        assert_eq!(uart.tick(), u64::from(b'x'));
    }

    #[test]
    #[should_panic(expected = "uart: read of tx register not supported")]
    fn reading_tx_register_panics() {
        let mut uart = UartDevice::new(0xa000_03f8);
        uart.enqueue_read(0xa000_03f8);
    }
}
