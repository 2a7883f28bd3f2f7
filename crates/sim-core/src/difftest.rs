use crate::csr::{AUDIT_SET, GPR_NAMES};
use crate::dut::{DifftestSignals, DutPort};
use crate::golden::GoldenModel;
use crate::scheduler::{SimState, Task};

/// Per-commit instruction/exception trace (§10.2's `trace` target), fired on
/// every DUT commit independent of whether the differential checker itself
/// is enabled — mirrors the source, which logs the commit PC and any
/// exception cause from the same `io_difftest_valid` block the diff check
/// runs in, not only when a golden model is attached.
pub struct CommitTrace;

impl Task for CommitTrace {
    fn name(&self) -> &str {
        "commit_trace"
    }

    fn run(&mut self, sim: &mut SimState) {
        let dt = sim.dut.difftest_signals();
        if !dt.valid {
            return;
        }
        tracing::info!(target: "trace", "pc {:#018x}", dt.pc);
        if dt.exception_valid {
            tracing::info!(
                target: "trace",
                "exception cause {:#x}, pc {:#018x}",
                dt.exception_cause,
                dt.pc
            );
        }
    }
}

/// Per-commit differential checker: steps the golden model in lockstep
/// with the DUT and compares architectural state, per §4.5.
pub struct DiffChecker {
    golden: GoldenModel,
}

impl DiffChecker {
    pub fn new(golden: GoldenModel) -> Self {
        Self { golden }
    }

    /// Runs the commit protocol for one `difftest_valid` cycle. Returns the
    /// first divergence message on mismatch or exclusivity violation; `Ok`
    /// otherwise (including the MMIO/CSR-skip path, which never compares).
    pub fn check_commit(&mut self, dut: &dyn DutPort, dt: DifftestSignals) -> Result<(), String> {
        let exclusive_count = [
            dt.exception_valid,
            dt.has_interrupt,
            dt.contains_mmio,
            dt.csr_skip,
        ]
        .iter()
        .filter(|flag| **flag)
        .count();

        if exclusive_count > 1 {
            return Err(format!(
                "exception and interrupt and mmio at the same time: has_interrupt: {}, has_exception: {}, has_mmio: {}, has_csr_skip: {}",
                dt.has_interrupt, dt.exception_valid, dt.contains_mmio, dt.csr_skip
            ));
        }

        let next_pc = dt.pc + if dt.is_rvc { 2 } else { 4 };

        if dt.contains_mmio || dt.csr_skip {
            tracing::info!(
                target: "diff_trace",
                "skip mmio at pc: {:#018x}, next pc: {:#018x}",
                dt.pc,
                next_pc
            );
            self.golden.set_pc_value(next_pc);
            for idx in 0..32 {
                self.golden.set_reg_value(idx, dut.reg(idx));
            }
            return Ok(());
        }

        self.golden.step(dt.committed_num);
        if dt.has_interrupt {
            tracing::info!(
                target: "diff_trace",
                "has_interrupt at pc: {:#018x}, cause: {:#x}",
                dt.pc,
                dt.exception_cause
            );
            self.golden.raise_intr(dt.exception_cause & 0xffff);
        }

        self.check_pc(dut)?;
        self.check_gprs(dut)?;
        self.check_csrs(dut)?;
        Ok(())
    }

    fn check_pc(&self, dut: &dyn DutPort) -> Result<(), String> {
        let (reference, actual) = (self.golden.pc(), dut.pc());
        if reference != actual {
            return Err(format!(
                "pc mismatch: ref: {reference:#018x}, dut: {actual:#018x}"
            ));
        }
        Ok(())
    }

    fn check_gprs(&self, dut: &dyn DutPort) -> Result<(), String> {
        for (idx, name) in GPR_NAMES.iter().enumerate() {
            let (reference, actual) = (self.golden.reg(idx), dut.reg(idx));
            if reference != actual {
                return Err(format!(
                    "reg {name}({idx}) mismatch: ref: {reference:#018x}, dut: {actual:#018x}"
                ));
            }
        }
        Ok(())
    }

    fn check_csrs(&self, dut: &dyn DutPort) -> Result<(), String> {
        for &(addr, name) in AUDIT_SET {
            let (reference, actual) = (self.golden.csr(addr), dut.csr(addr));
            if reference != actual {
                return Err(format!(
                    "csr {name} mismatch: ref: {reference:#018x}, dut: {actual:#018x}"
                ));
            }
        }
        Ok(())
    }
}
