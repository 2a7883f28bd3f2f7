/// Bus-facing signals the DUT exposes on a rising edge: a staged memory
/// request the scheduler routes through the [`crate::device_manager::DeviceManager`].
#[derive(Debug, Clone, Copy, Default)]
pub struct BusSignals {
    pub read_addr: u64,
    pub read_en: bool,
    pub write_addr: u64,
    pub write_data: u64,
    pub write_strb: u8,
    pub write_en: bool,
}

/// Per-commit introspection signals consumed by the differential checker.
#[derive(Debug, Clone, Copy, Default)]
pub struct DifftestSignals {
    pub valid: bool,
    pub committed_num: u64,
    pub pc: u64,
    pub is_rvc: bool,
    /// Raw encoding of the retired instruction, for disassembly (§10.3).
    /// Only the low 16 bits are meaningful when `is_rvc`.
    pub inst: u32,
    pub exception_valid: bool,
    pub exception_cause: u64,
    pub has_interrupt: bool,
    pub contains_mmio: bool,
    pub csr_skip: bool,
}

/// A named hit/total counter pair sampled directly from DUT-internal
/// storage (e.g. branch predictor or icache hit rate).
#[derive(Debug, Clone, Copy)]
pub struct PerfSample {
    pub hit: u64,
    pub total: u64,
}

/// Opaque handle over the HDL-generated cycle-step primitive. This crate
/// never implements the DUT itself — it is produced by an external
/// hardware-simulation toolchain (Verilator-style) and only needs to
/// support this narrow advance-and-sample contract.
pub trait DutPort {
    fn set_clock(&mut self, high: bool);
    fn set_reset(&mut self, asserted: bool);
    fn eval(&mut self);

    fn bus_signals(&self) -> BusSignals;
    fn set_read_data(&mut self, data: u64);

    fn difftest_signals(&self) -> DifftestSignals;

    /// Debug-halt signal; suppresses the deadlock watch while asserted.
    fn is_halted(&self) -> bool;

    fn pc(&self) -> u64;
    fn reg(&self, idx: usize) -> u64;
    fn csr(&self, addr: u64) -> u64;

    fn perf_counter(&self, name: &str) -> Option<PerfSample>;

    /// Publishes the remote-bitbang JTAG pin state to the DUT for this tick.
    /// A DUT with no JTAG tap is expected to ignore this.
    fn set_jtag_pins(&mut self, tck: bool, tms: bool, tdi: bool);

    /// Current `tdo` sampled from the DUT's JTAG tap.
    fn jtag_tdo(&self) -> bool;
}
