/// A half-open, byte-granular address range owned by exactly one device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressRegion {
    pub start: u64,
    pub end: u64,
    pub name: &'static str,
}

impl AddressRegion {
    pub const fn new(start: u64, end: u64, name: &'static str) -> Self {
        Self { start, end, name }
    }

    pub fn contains(&self, addr: u64) -> bool {
        addr >= self.start && addr < self.end
    }

    pub fn overlaps(&self, other: &AddressRegion) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// A staged bus write: byte-lane masked write to an 8-byte-aligned word.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteRequest {
    pub waddr: u64,
    pub wdata: u64,
    pub wstrb: u8,
}

/// Uniform contract for every memory-mapped peripheral on the bus.
///
/// `tick` resolves whatever is queued (at most one pending read and one
/// pending write) and returns the device's current read-latch value. The
/// manager only trusts that return when it queued a read on this device
/// this cycle — see [`crate::device_manager::DeviceManager::tick`].
///
/// `Device: Any` so the manager can hand back a downcast reference to a
/// device's concrete type (see [`crate::device_manager::DeviceManager::device_downcast_mut`])
/// for the handful of watchers (tohost, signature dump) that need
/// memory-device-specific operations beyond the uniform bus contract.
pub trait Device: std::any::Any {
    fn name(&self) -> &'static str;
    fn regions(&self) -> &[AddressRegion];

    fn in_range(&self, addr: u64) -> bool {
        self.regions().iter().any(|r| r.contains(addr))
    }

    fn enqueue_read(&mut self, addr: u64);
    fn enqueue_write(&mut self, req: WriteRequest);
    fn has_pending_read(&self) -> bool;
    fn has_pending_write(&self) -> bool;
    fn tick(&mut self) -> u64;

    fn as_any(&self) -> &dyn std::any::Any;
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any;
}
