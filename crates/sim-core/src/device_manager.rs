use crate::device::{Device, WriteRequest};
use crate::error::SimError;

/// Address-decoded device registry and one-cycle bus request router.
///
/// Devices are kept in registration order; routing and tick dispatch both
/// iterate in that order, so the manager's behavior is deterministic given a
/// deterministic registration sequence.
pub struct DeviceManager {
    devices: Vec<Box<dyn Device>>,
}

impl DeviceManager {
    pub fn new() -> Self {
        Self {
            devices: Vec::new(),
        }
    }

    /// Registers a device, failing if any of its regions overlaps an
    /// already-registered region.
    pub fn register(&mut self, device: Box<dyn Device>) -> Result<(), SimError> {
        for region in device.regions() {
            for existing in &self.devices {
                for existing_region in existing.regions() {
                    if region.overlaps(existing_region) {
                        return Err(SimError::RegionConflict {
                            device: device.name().to_string(),
                            start: region.start,
                            end: region.end,
                        });
                    }
                }
            }
        }
        self.devices.push(device);
        Ok(())
    }

    pub fn print_device_info(&self) {
        tracing::info!(target: "console", "Device Info:");
        for device in &self.devices {
            for region in device.regions() {
                tracing::info!(
                    target: "console",
                    "device: {:<15} {:#010x} ----> {:#010x}",
                    region.name,
                    region.start,
                    region.end
                );
            }
        }
    }

    /// Stages a bus transaction. Returns `Ok(())` if every enabled side
    /// found an owning device, `Err` on the first unmapped access.
    pub fn route(
        &mut self,
        read_addr: Option<u64>,
        write_req: Option<WriteRequest>,
    ) -> Result<(), SimError> {
        if let Some(addr) = read_addr {
            match self.devices.iter_mut().find(|d| d.in_range(addr)) {
                Some(device) => device.enqueue_read(addr),
                None => return Err(SimError::UnmappedRead { addr }),
            }
        }

        if let Some(req) = write_req {
            match self.devices.iter_mut().find(|d| d.in_range(req.waddr)) {
                Some(device) => device.enqueue_write(req),
                None => {
                    return Err(SimError::UnmappedWrite { addr: req.waddr });
                }
            }
        }

        Ok(())
    }

    /// Resolves this cycle's staged requests and returns the bus read
    /// response: the value latched by whichever device had a read queued,
    /// or `0` if none did (no carry-over from a previous cycle).
    pub fn tick(&mut self) -> u64 {
        let mut last_read = 0;
        for device in &mut self.devices {
            let had_read = device.has_pending_read();
            let had_write = device.has_pending_write();
            if had_read || had_write {
                let value = device.tick();
                if had_read {
                    last_read = value;
                }
            }
        }
        last_read
    }

    pub fn device_named(&self, name: &str) -> Option<&dyn Device> {
        self.devices
            .iter()
            .map(std::convert::AsRef::as_ref)
            .find(|d| d.name() == name)
    }

    /// Looks up a device by name and downcasts it to its concrete type.
    /// Used by watchers that need a memory-device-specific operation
    /// (tohost polling, signature dump) that isn't part of the uniform
    /// [`Device`] contract.
    pub fn device_downcast_mut<T: Device>(&mut self, name: &str) -> Option<&mut T> {
        self.devices
            .iter_mut()
            .find(|d| d.name() == name)
            .and_then(|d| d.as_any_mut().downcast_mut::<T>())
    }
}

impl Default for DeviceManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::memory::MemoryDevice;

    #[test]
    fn unmapped_read_is_rejected() {
        let mut mgr = DeviceManager::new();
        mgr.register(Box::new(MemoryDevice::new(0x8000_0000, 0x1000)))
            .unwrap();
        let err = mgr.route(Some(0x9000_0000), None).unwrap_err();
        assert!(matches!(err, SimError::UnmappedRead { addr } if addr == 0x9000_0000));
    }

    #[test]
    fn overlapping_regions_rejected() {
        let mut mgr = DeviceManager::new();
        mgr.register(Box::new(MemoryDevice::new(0x100, 0x100)))
            .unwrap();
        let err = mgr
            .register(Box::new(MemoryDevice::new(0x180, 0x180)))
            .unwrap_err();
        assert!(matches!(err, SimError::RegionConflict { .. }));
    }

    #[test]
    fn routed_read_returns_device_value() {
        let mut mgr = DeviceManager::new();
        mgr.register(Box::new(MemoryDevice::new(0x8000_0000, 0x1000)))
            .unwrap();
        mgr.route(None, Some(WriteRequest { waddr: 0x8000_0000, wdata: 0x42, wstrb: 0xff }))
            .unwrap();
        mgr.tick();
        mgr.route(Some(0x8000_0000), None).unwrap();
        let value = mgr.tick();
        assert_eq!(value, 0x42);
    }
}
