use std::ffi::CString;
use std::os::raw::{c_char, c_int};

use crate::error::SimError;

#[allow(non_camel_case_types)]
type rv64emu_handle = *mut std::ffi::c_void;

unsafe extern "C" {
    fn create_rv64emu(
        isa: *const c_char,
        mmu_type: c_int,
        boot_pc: u64,
        mem_size: u64,
        mem_base: u64,
        hartid: c_int,
        smode_en: bool,
        umode_en: bool,
    ) -> rv64emu_handle;
    fn destroy_rv64emu(handle: rv64emu_handle);
    fn load_file(handle: rv64emu_handle, path: *const c_char);
    fn step(handle: rv64emu_handle, n: u64);
    fn raise_intr(handle: rv64emu_handle, cause: u64);
    fn get_pc(handle: rv64emu_handle) -> u64;
    fn set_pc(handle: rv64emu_handle, pc: u64);
    fn get_reg(handle: rv64emu_handle, idx: c_int) -> u64;
    fn set_reg(handle: rv64emu_handle, idx: c_int, val: u64);
    fn get_csr(handle: rv64emu_handle, addr: u64) -> u64;
}

/// Narrow, value-oriented adapter over the golden functional model's C-ABI
/// surface. The model is opaque: the only requirement is that it behaves
/// deterministically given the same image and the same sequence of
/// `raise_intr` calls. Owns the handle and frees it on drop.
pub struct GoldenModel {
    handle: rv64emu_handle,
}

impl GoldenModel {
    pub fn new(
        isa: &str,
        mmu_type: i32,
        boot_pc: u64,
        mem_size: u64,
        mem_base: u64,
        hartid: i32,
        smode_en: bool,
        umode_en: bool,
    ) -> Result<Self, SimError> {
        let isa_c = CString::new(isa)
            .map_err(|e| SimError::GoldenModel(format!("invalid isa string: {e}")))?;
        let handle = unsafe {
            create_rv64emu(
                isa_c.as_ptr(),
                mmu_type,
                boot_pc,
                mem_size,
                mem_base,
                hartid,
                smode_en,
                umode_en,
            )
        };
        if handle.is_null() {
            return Err(SimError::GoldenModel(
                "create_rv64emu returned null".to_string(),
            ));
        }
        Ok(Self { handle })
    }

    pub fn load_file(&mut self, path: &str) -> Result<(), SimError> {
        let path_c = CString::new(path)
            .map_err(|e| SimError::GoldenModel(format!("invalid path string: {e}")))?;
        unsafe { load_file(self.handle, path_c.as_ptr()) };
        Ok(())
    }

    pub fn step(&mut self, n: u64) {
        unsafe { step(self.handle, n) };
    }

    pub fn raise_intr(&mut self, cause: u64) {
        unsafe { raise_intr(self.handle, cause) };
    }

    pub fn pc(&self) -> u64 {
        unsafe { get_pc(self.handle) }
    }

    pub fn set_pc_value(&mut self, pc: u64) {
        unsafe { set_pc(self.handle, pc) };
    }

    pub fn reg(&self, idx: usize) -> u64 {
        unsafe { get_reg(self.handle, idx as c_int) }
    }

    pub fn set_reg_value(&mut self, idx: usize, val: u64) {
        unsafe { set_reg(self.handle, idx as c_int, val) };
    }

    /// CSR access. Note: `sstatus` is not independently modeled by the
    /// golden model — it aliases the same underlying storage as `mstatus`,
    /// so a `csr(SSTATUS)` read forwards to the `mstatus` port.
    pub fn csr(&self, addr: u64) -> u64 {
        unsafe { get_csr(self.handle, addr) }
    }
}

impl Drop for GoldenModel {
    fn drop(&mut self) {
        unsafe { destroy_rv64emu(self.handle) };
    }
}

// SAFETY: the golden model is only ever touched from the single simulation
// thread; this just lets the handle live inside `Box<dyn DutPort>`-adjacent
// owning structs without fighting auto-trait inference.
unsafe impl Send for GoldenModel {}
