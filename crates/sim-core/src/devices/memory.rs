use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use goblin::elf::program_header::PT_LOAD;
use goblin::elf::Elf;

use crate::device::{AddressRegion, Device, WriteRequest};
use crate::error::SimError;

fn aligned_addr(addr: u64) -> u64 {
    addr & !0x7
}

fn check_aligned(addr: u64, size: u64) -> bool {
    addr & (size - 1) == 0
}

/// Synchronous-read backing memory: a contiguous byte buffer plus the ELF
/// loader, tohost watcher plumbing, and signature dumper that make this the
/// device a RISC-V image actually runs against.
pub struct MemoryDevice {
    regions: [AddressRegion; 1],
    base: u64,
    mem: Vec<u8>,
    symbols: HashMap<String, u64>,
    to_host_addr: Option<u64>,
    last_read: u64,
    read_queue: Vec<u64>,
    write_queue: Vec<WriteRequest>,
}

impl MemoryDevice {
    pub fn new(base: u64, size: u64) -> Self {
        Self {
            regions: [AddressRegion::new(base, base + size, "memory")],
            base,
            mem: vec![0u8; size as usize],
            symbols: HashMap::new(),
            to_host_addr: None,
            last_read: 0,
            read_queue: Vec::new(),
            write_queue: Vec::new(),
        }
    }

    pub fn to_host_addr(&self) -> Option<u64> {
        self.to_host_addr
    }

    fn read(&self, addr: u64) -> u64 {
        assert!(self.in_range(addr), "read address out of range");
        assert!(check_aligned(addr, 8), "read address not aligned");
        let offset = (addr - self.base) as usize;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&self.mem[offset..offset + 8]);
        u64::from_le_bytes(buf)
    }

    fn write(&mut self, addr: u64, wdata: u64, wstrb: u8) {
        assert!(self.in_range(addr), "write address out of range");
        assert!(check_aligned(addr, 8), "write address not aligned");
        let offset = (addr - self.base) as usize;
        let bytes = wdata.to_le_bytes();
        for i in 0..8 {
            if wstrb & (1 << i) != 0 {
                self.mem[offset + i] = bytes[i];
            }
        }
    }

    /// Loads an ELF image if the file parses as one; otherwise streams the
    /// raw bytes into the buffer starting at offset 0.
    pub fn load_file(&mut self, path: &Path) -> Result<(), SimError> {
        let bytes = std::fs::read(path).map_err(|source| SimError::ImageLoad {
            path: path.display().to_string(),
            source,
        })?;

        if self.load_elf(&bytes) {
            tracing::info!(target: "console", "Loading elf file {}", path.display());
            return Ok(());
        }

        tracing::info!(target: "console", "Loading file {}", path.display());
        let len = bytes.len().min(self.mem.len());
        self.mem[..len].copy_from_slice(&bytes[..len]);
        Ok(())
    }

    fn load_elf(&mut self, bytes: &[u8]) -> bool {
        let Ok(elf) = Elf::parse(bytes) else {
            return false;
        };
        if !elf.is_64 || !elf.little_endian || elf.header.e_machine != goblin::elf::header::EM_RISCV {
            return false;
        }

        for ph in &elf.program_headers {
            if ph.p_type == PT_LOAD {
                let dest = (ph.p_paddr - self.base) as usize;
                let file_size = ph.p_filesz as usize;
                let src = ph.p_offset as usize;
                self.mem[dest..dest + file_size].copy_from_slice(&bytes[src..src + file_size]);
            }
        }

        for sym in &elf.syms {
            if let Some(name) = elf.strtab.get_at(sym.st_name) {
                self.symbols.insert(name.to_string(), sym.st_value);
            }
        }

        self.to_host_addr = self.symbols.get("tohost").copied();
        true
    }

    /// Writes the `[begin_signature, end_signature)` range as 8-hex-digit,
    /// newline-terminated lines, one 32-bit word per line.
    pub fn dump_signature(&self, path: &Path) -> Result<(), SimError> {
        let (Some(&start), Some(&end)) = (
            self.symbols.get("begin_signature"),
            self.symbols.get("end_signature"),
        ) else {
            return Ok(());
        };

        let mut out = String::new();
        let mut addr = start;
        while addr < end {
            let offset = (addr - self.base) as usize;
            let mut buf = [0u8; 4];
            buf.copy_from_slice(&self.mem[offset..offset + 4]);
            let word = u32::from_le_bytes(buf);
            out.push_str(&format!("{word:08x}\n"));
            addr += 4;
        }
        std::fs::write(path, out).map_err(|source| SimError::ImageLoad {
            path: path.display().to_string(),
            source,
        })?;
        tracing::info!(
            target: "console",
            "dump signature to {}, sig_start: {:#x}, sig_end: {:#x}",
            path.display(),
            start,
            end
        );
        Ok(())
    }

    /// Reads the tohost word; if non-zero, zeroes it and returns the value
    /// that was there. Decoding the value (FESVR device/command convention)
    /// is the watcher's policy, not this device's — see
    /// [`crate::watchers::TohostWatch`]. Returns `None` if the image has no
    /// `tohost` symbol, or the word currently reads zero.
    pub fn poll_to_host(&mut self) -> Option<u64> {
        let addr = self.to_host_addr?;
        let value = self.read(aligned_addr(addr));
        if value == 0 {
            return None;
        }
        self.write(aligned_addr(addr), 0, 0xff);
        Some(value)
    }
}

impl Device for MemoryDevice {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn regions(&self) -> &[AddressRegion] {
        &self.regions
    }

    fn enqueue_read(&mut self, addr: u64) {
        self.read_queue.push(addr);
    }

    fn enqueue_write(&mut self, req: WriteRequest) {
        self.write_queue.push(req);
    }

    fn has_pending_read(&self) -> bool {
        !self.read_queue.is_empty()
    }

    fn has_pending_write(&self) -> bool {
        !self.write_queue.is_empty()
    }

    fn tick(&mut self) -> u64 {
        if let Some(addr) = self.read_queue.pop() {
            self.last_read = self.read(aligned_addr(addr));
        }
        if let Some(req) = self.write_queue.pop() {
            self.write(aligned_addr(req.waddr), req.wdata, req.wstrb);
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
    fn strobed_write_preserves_unmasked_bytes() {
        let mut mem = MemoryDevice::new(0x8000_0000, 0x1000);
        mem.enqueue_write(WriteRequest {
            waddr: 0x8000_0000,
            wdata: 0xAABB_CCDD_EEFF_0011,
            wstrb: 0b0101_0101,
        });
        mem.tick();
        mem.enqueue_read(0x8000_0000);
        let value = mem.tick();
        let bytes = value.to_le_bytes();
        assert_eq!(bytes[0], 0x11);
        assert_eq!(bytes[2], 0xFF);
        assert_eq!(bytes[4], 0xCC);
        assert_eq!(bytes[6], 0xBB);
        assert_eq!(bytes[1], 0);
        assert_eq!(bytes[3], 0);
        assert_eq!(bytes[5], 0);
        assert_eq!(bytes[7], 0);
    }

    #[test]
    fn poll_to_host_clears_word_after_reading_it() {
        let mut mem = MemoryDevice::new(0x8000_0000, 0x1000);
        mem.to_host_addr = Some(0x8000_0000);
        mem.enqueue_write(WriteRequest {
            waddr: 0x8000_0000,
            wdata: 1,
            wstrb: 0xff,
        });
        mem.tick();
        assert_eq!(mem.poll_to_host(), Some(1));
        assert_eq!(mem.poll_to_host(), None);
    }

    #[test]
    fn same_cycle_read_write_observes_old_value() {
        let mut mem = MemoryDevice::new(0x8000_0000, 0x1000);
        mem.enqueue_read(0x8000_0000);
        mem.enqueue_write(WriteRequest {
            waddr: 0x8000_0000,
            wdata: 0xFFFF_FFFF_FFFF_FFFF,
            wstrb: 0xff,
        });
        let value = mem.tick();
        assert_eq!(value, 0);
        mem.enqueue_read(0x8000_0000);
        let value_after = mem.tick();
        assert_eq!(value_after, u64::MAX);
    }
}
