use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};

use crate::device::{AddressRegion, Device};

/// Capacity of each lane's ring buffer. Overflow silently drops the event
/// rather than blocking the producer (§5).
const QUEUE_CAPACITY: usize = 256;

type Cons<T> = HeapCons<T>;
type Prod<T> = HeapProd<T>;

/// Two 4-byte lanes fed by bounded single-producer/single-consumer ring
/// buffers: offset 0 is the next scancode, offset 4 is the next ASCII
/// keycode. An empty queue reads as 0. The two lanes are independent so an
/// ISA-level scancode consumer and an ASCII-consuming program can both
/// drain the same input stream.
pub struct KeyboardDevice {
    regions: [AddressRegion; 1],
    base: u64,
    scancode_rx: Cons<u32>,
    ascii_rx: Cons<u8>,
    read_queue: Vec<u64>,
    last_read: u64,
}

/// The producer-side handles for an input-event thread (e.g. one polling
/// `winit` window events) to push into.
pub struct KeyboardProducer {
    pub scancode_tx: Prod<u32>,
    pub ascii_tx: Prod<u8>,
}

impl KeyboardDevice {
    pub fn new(base: u64) -> (Self, KeyboardProducer) {
        let (scancode_tx, scancode_rx): (Prod<u32>, Cons<u32>) =
            HeapRb::<u32>::new(QUEUE_CAPACITY).split();
        let (ascii_tx, ascii_rx): (Prod<u8>, Cons<u8>) =
            HeapRb::<u8>::new(QUEUE_CAPACITY).split();
        (
            Self {
                regions: [AddressRegion::new(base, base + 8, "keyboard")],
                base,
                scancode_rx,
                ascii_rx,
                read_queue: Vec::new(),
                last_read: 0,
            },
            KeyboardProducer {
                scancode_tx,
                ascii_tx,
            },
        )
    }

    fn poll_scancode(&mut self) -> u32 {
        self.scancode_rx.try_pop().unwrap_or(0)
    }

    fn poll_ascii(&mut self) -> u8 {
        self.ascii_rx.try_pop().unwrap_or(0)
    }
}

impl Device for KeyboardDevice {
    fn name(&self) -> &'static str {
        "keyboard"
    }

    fn regions(&self) -> &[AddressRegion] {
        &self.regions
    }

    fn enqueue_read(&mut self, addr: u64) {
        self.read_queue.push(addr);
    }

    fn enqueue_write(&mut self, _req: crate::device::WriteRequest) {
        panic!("keyboard: write not supported");
    }

    fn has_pending_read(&self) -> bool {
        !self.read_queue.is_empty()
    }

    fn has_pending_write(&self) -> bool {
        false
    }

    fn tick(&mut self) -> u64 {
        if let Some(addr) = self.read_queue.pop() {
            let offset = addr - self.base;
            self.last_read = if offset == 0 {
                u64::from(self.poll_scancode())
            } else {
                u64::from(self.poll_ascii())
            };
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

    #[test]
    fn empty_queues_read_as_zero() {
        let (mut kbd, _producer) = KeyboardDevice::new(0xa000_0060);
        kbd.enqueue_read(0xa000_0060);
        assert_eq!(kbd.tick(), 0);
        kbd.enqueue_read(0xa000_0064);
        assert_eq!(kbd.tick(), 0);
    }

    #[test]
    fn queued_scancode_is_delivered() {
        let (mut kbd, mut producer) = KeyboardDevice::new(0xa000_0060);
        producer.scancode_tx.try_push(0x1e).unwrap();
        kbd.enqueue_read(0xa000_0060);
        assert_eq!(kbd.tick(), 0x1e);
    }
}
