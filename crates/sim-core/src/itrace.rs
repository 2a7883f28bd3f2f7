//! Instruction disassembly trace (C13, §10.3), grounded in the source's
//! `Itrace` class: disassembles every committed instruction to the
//! `itrace` log target using the same backing disassembler (capstone).

use capstone::arch::riscv::ArchMode as RiscVMode;
use capstone::arch::BuildsCapstone;
use capstone::{Capstone, Insn};

use crate::scheduler::{SimState, Task};

/// Periodic (every cycle, `period = 0`) task that disassembles the
/// instruction retired on the most recent commit.
pub struct InstructionTrace {
    cs: Capstone,
}

impl InstructionTrace {
    pub fn new() -> Result<Self, capstone::Error> {
        let cs = Capstone::new()
            .riscv()
            .mode(RiscVMode::RiscV64)
            .extra_mode(std::iter::once(capstone::arch::riscv::ArchExtraMode::RiscVC))
            .detail(false)
            .build()?;
        Ok(Self { cs })
    }

    fn format_insn(insn: &Insn) -> String {
        let mnemonic = insn.mnemonic().unwrap_or("?");
        let op_str = insn.op_str().unwrap_or("");
        format!("{:#x}:\t{mnemonic}\t{op_str}", insn.address())
    }
}

impl Task for InstructionTrace {
    fn name(&self) -> &str {
        "itrace"
    }

    fn run(&mut self, sim: &mut SimState) {
        let dt = sim.dut.difftest_signals();
        if !dt.valid {
            return;
        }
        let width = if dt.is_rvc { 2 } else { 4 };
        let bytes = dt.inst.to_le_bytes();
        match self.cs.disasm_count(&bytes[..width], dt.pc, 1) {
            Ok(insns) => {
                for insn in insns.iter() {
                    tracing::info!(target: "itrace", "{}", Self::format_insn(insn));
                }
            }
            Err(e) => {
                tracing::warn!(target: "itrace", "disassembly failed at {:#018x}: {e}", dt.pc);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_riscv_disassembler() {
        InstructionTrace::new().expect("capstone riscv64 build should succeed");
    }
}
