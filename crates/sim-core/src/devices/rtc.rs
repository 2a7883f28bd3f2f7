use std::time::{SystemTime, UNIX_EPOCH};

use crate::device::{AddressRegion, Device};

/// Real-time clock: offset 0 latches a microseconds-since-epoch snapshot and
/// returns its low 32 bits; offset 4 returns the high 32 bits of that *same*
/// snapshot (not a fresh read) — the snapshot only advances on a new
/// offset-0 read. Writes are illegal.
pub struct RtcDevice {
    regions: [AddressRegion; 1],
    base: u64,
    snapshot_us: u64,
    read_queue: Vec<u64>,
    last_read: u64,
}

impl RtcDevice {
    pub fn new(base: u64) -> Self {
        Self {
            regions: [AddressRegion::new(base, base + 8, "rtc")],
            base,
            snapshot_us: 0,
            read_queue: Vec::new(),
            last_read: 0,
        }
    }
}

impl Device for RtcDevice {
    fn name(&self) -> &'static str {
        "rtc"
    }

    fn regions(&self) -> &[AddressRegion] {
        &self.regions
    }

    fn enqueue_read(&mut self, addr: u64) {
        self.read_queue.push(addr);
    }

    fn enqueue_write(&mut self, _req: crate::device::WriteRequest) {
        panic!("rtc: write not supported");
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
            if offset == 0 {
                self.snapshot_us = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .map(|d| d.as_micros() as u64)
                    .unwrap_or(0);
                self.last_read = self.snapshot_us & 0xffff_ffff;
            } else {
                self.last_read = self.snapshot_us >> 32;
            }
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
    fn high_word_reuses_low_word_snapshot() {
        let mut rtc = RtcDevice::new(0xa000_0048);
        rtc.enqueue_read(0xa000_0048);
        let low = rtc.tick();
        rtc.enqueue_read(0xa000_004c);
        let high = rtc.tick();
        assert_eq!(high, rtc.snapshot_us >> 32);
        assert_eq!(low, rtc.snapshot_us & 0xffff_ffff);
    }
}
