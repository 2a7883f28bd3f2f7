//! Concrete [`DutPort`] backed by the external, Verilator-generated cycle-step
//! primitive (§1, §9 "FFI to the golden model" — the DUT gets the same
//! treatment). `sim-core` never implements the DUT itself; this module is
//! the one place in the workspace that links against it.

use std::ffi::CString;
use std::os::raw::{c_char, c_int};

use sim_core::{BusSignals, DifftestSignals, DutPort, PerfSample};

#[allow(non_camel_case_types)]
type dut_handle = *mut std::ffi::c_void;

unsafe extern "C" {
    fn dut_create() -> dut_handle;
    fn dut_destroy(handle: dut_handle);

    fn dut_set_clock(handle: dut_handle, high: bool);
    fn dut_set_reset(handle: dut_handle, asserted: bool);
    fn dut_eval(handle: dut_handle);

    fn dut_read_addr(handle: dut_handle) -> u64;
    fn dut_read_en(handle: dut_handle) -> bool;
    fn dut_write_addr(handle: dut_handle) -> u64;
    fn dut_write_data(handle: dut_handle) -> u64;
    fn dut_write_strb(handle: dut_handle) -> u8;
    fn dut_write_en(handle: dut_handle) -> bool;
    fn dut_set_read_data(handle: dut_handle, data: u64);

    fn dut_difftest_valid(handle: dut_handle) -> bool;
    fn dut_difftest_committed_num(handle: dut_handle) -> u64;
    fn dut_difftest_pc(handle: dut_handle) -> u64;
    fn dut_difftest_is_rvc(handle: dut_handle) -> bool;
    fn dut_difftest_inst(handle: dut_handle) -> u32;
    fn dut_difftest_exception_valid(handle: dut_handle) -> bool;
    fn dut_difftest_exception_cause(handle: dut_handle) -> u64;
    fn dut_difftest_has_interrupt(handle: dut_handle) -> bool;
    fn dut_difftest_contains_mmio(handle: dut_handle) -> bool;
    fn dut_difftest_csr_skip(handle: dut_handle) -> bool;

    fn dut_is_halted(handle: dut_handle) -> bool;
    fn dut_pc(handle: dut_handle) -> u64;
    fn dut_reg(handle: dut_handle, idx: c_int) -> u64;
    fn dut_csr(handle: dut_handle, addr: u64) -> u64;
    fn dut_perf_counter(
        handle: dut_handle,
        name: *const c_char,
        hit: *mut u64,
        total: *mut u64,
    ) -> bool;

    fn dut_set_jtag_pins(handle: dut_handle, tck: bool, tms: bool, tdi: bool);
    fn dut_jtag_tdo(handle: dut_handle) -> bool;
}

/// Owns the opaque Verilator model handle and frees it on drop.
pub struct VerilatedDut {
    handle: dut_handle,
}

impl VerilatedDut {
    pub fn new() -> Self {
        let handle = unsafe { dut_create() };
        assert!(!handle.is_null(), "dut_create returned null");
        Self { handle }
    }
}

impl Default for VerilatedDut {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for VerilatedDut {
    fn drop(&mut self) {
        unsafe { dut_destroy(self.handle) };
    }
}

impl DutPort for VerilatedDut {
    fn set_clock(&mut self, high: bool) {
        unsafe { dut_set_clock(self.handle, high) };
    }

    fn set_reset(&mut self, asserted: bool) {
        unsafe { dut_set_reset(self.handle, asserted) };
    }

    fn eval(&mut self) {
        unsafe { dut_eval(self.handle) };
    }

    fn bus_signals(&self) -> BusSignals {
        unsafe {
            BusSignals {
                read_addr: dut_read_addr(self.handle),
                read_en: dut_read_en(self.handle),
                write_addr: dut_write_addr(self.handle),
                write_data: dut_write_data(self.handle),
                write_strb: dut_write_strb(self.handle),
                write_en: dut_write_en(self.handle),
            }
        }
    }

    fn set_read_data(&mut self, data: u64) {
        unsafe { dut_set_read_data(self.handle, data) };
    }

    fn difftest_signals(&self) -> DifftestSignals {
        unsafe {
            DifftestSignals {
                valid: dut_difftest_valid(self.handle),
                committed_num: dut_difftest_committed_num(self.handle),
                pc: dut_difftest_pc(self.handle),
                is_rvc: dut_difftest_is_rvc(self.handle),
                inst: dut_difftest_inst(self.handle),
                exception_valid: dut_difftest_exception_valid(self.handle),
                exception_cause: dut_difftest_exception_cause(self.handle),
                has_interrupt: dut_difftest_has_interrupt(self.handle),
                contains_mmio: dut_difftest_contains_mmio(self.handle),
                csr_skip: dut_difftest_csr_skip(self.handle),
            }
        }
    }

    fn is_halted(&self) -> bool {
        unsafe { dut_is_halted(self.handle) }
    }

    fn pc(&self) -> u64 {
        unsafe { dut_pc(self.handle) }
    }

    fn reg(&self, idx: usize) -> u64 {
        unsafe { dut_reg(self.handle, idx as c_int) }
    }

    fn csr(&self, addr: u64) -> u64 {
        unsafe { dut_csr(self.handle, addr) }
    }

    fn perf_counter(&self, name: &str) -> Option<PerfSample> {
        let name_c = CString::new(name).ok()?;
        let mut hit = 0u64;
        let mut total = 0u64;
        let found =
            unsafe { dut_perf_counter(self.handle, name_c.as_ptr(), &mut hit, &mut total) };
        found.then_some(PerfSample { hit, total })
    }

    fn set_jtag_pins(&mut self, tck: bool, tms: bool, tdi: bool) {
        unsafe { dut_set_jtag_pins(self.handle, tck, tms, tdi) };
    }

    fn jtag_tdo(&self) -> bool {
        unsafe { dut_jtag_tdo(self.handle) }
    }
}

// SAFETY: the DUT is only ever touched from the single simulation thread.
unsafe impl Send for VerilatedDut {}
