//! Periodic housekeeping tasks dispatched by the [`crate::scheduler::Scheduler`]
//! that detect termination and liveness conditions (§4.6). Each is a small
//! [`crate::scheduler::Task`] impl rather than a capturing closure, per the
//! source's data-oriented `SimTask_t` design (§9).

use crate::devices::memory::MemoryDevice;
use crate::scheduler::{RunState, SimState, Task};

/// Every 4096 cycles: abort if no instruction has committed in the last
/// 4096 cycles while the DUT isn't halted for debug.
pub struct DeadlockWatch {
    threshold: u64,
}

impl DeadlockWatch {
    pub const PERIOD: u64 = 4096;

    pub fn new() -> Self {
        Self {
            threshold: Self::PERIOD,
        }
    }
}

impl Default for DeadlockWatch {
    fn default() -> Self {
        Self::new()
    }
}

impl Task for DeadlockWatch {
    fn name(&self) -> &str {
        "deadlock_watch"
    }

    fn run(&mut self, sim: &mut SimState) {
        if sim.not_commit_num > self.threshold && !sim.dut.is_halted() {
            let pc = sim.dut.pc();
            tracing::error!(target: "console", "dead lock at pc: {pc:#018x}");
            sim.run_state = RunState::Aborted;
        }
    }
}

/// Every 1024 cycles: poll the tohost word and apply it through the
/// Spike/FESVR device/command convention, and log an IPC sample.
pub struct TohostWatch {
    memory_name: &'static str,
}

impl TohostWatch {
    pub const PERIOD: u64 = 1024;

    pub fn new() -> Self {
        Self {
            memory_name: "memory",
        }
    }

    fn apply(value: u64, sim: &mut SimState) {
        let device = (value >> 56) & 0xff;
        let command = (value >> 48) & 0xff;
        match (device, command) {
            (0, 0) if value & 1 != 0 => {
                let code = ((value & 0x0000_ffff_ffff_ffff) >> 1) as u32;
                if code == 0 {
                    tracing::info!(target: "console", "PASS");
                } else {
                    tracing::error!(target: "console", "FAIL with code {code}");
                }
                sim.exit_code = Some(code);
                sim.run_state = RunState::Stopped;
            }
            (1, 1) => {
                print!("{}", (value & 0xff) as u8 as char);
                use std::io::Write;
                let _ = std::io::stdout().flush();
            }
            _ => {}
        }
    }
}

impl Default for TohostWatch {
    fn default() -> Self {
        Self::new()
    }
}

impl Task for TohostWatch {
    fn name(&self) -> &str {
        "tohost_watch"
    }

    fn run(&mut self, sim: &mut SimState) {
        let polled = sim
            .bus
            .device_downcast_mut::<MemoryDevice>(self.memory_name)
            .and_then(MemoryDevice::poll_to_host);
        if let Some(value) = polled {
            Self::apply(value, sim);
        }

        let ipc = if sim.cycle_num == 0 {
            0.0
        } else {
            sim.commit_num as f64 / sim.cycle_num as f64
        };
        tracing::info!(
            target: "ipc",
            "clk_num: {}, commit_num: {}, IPC: {ipc:.4}",
            sim.cycle_num,
            sim.commit_num,
        );
    }
}

/// RISC-V `ebreak` exception cause, per the ISA's standard encoding.
const EBREAK_CAUSE: u64 = 3;

/// When AM mode is enabled, fires on every committed `ebreak` and finishes
/// the run, reporting `a0` as the exit code.
pub struct AmEbreakWatch {
    enabled: bool,
}

impl AmEbreakWatch {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }
}

impl Task for AmEbreakWatch {
    fn name(&self) -> &str {
        "am_ebreak_watch"
    }

    fn run(&mut self, sim: &mut SimState) {
        if !self.enabled {
            return;
        }
        let dt = sim.dut.difftest_signals();
        if dt.valid && dt.exception_valid && dt.exception_cause == EBREAK_CAUSE {
            let pc = dt.pc;
            let a0 = sim.dut.reg(10);
            tracing::info!(target: "console", "AM exit(ebreak) at pc: {pc:#018x}");
            sim.exit_code = Some(a0 as u32);
            sim.run_state = RunState::Finished;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device_manager::DeviceManager;
    use crate::dut::{BusSignals, DifftestSignals, PerfSample};
    use crate::dut::DutPort;

    struct FakeDut {
        halted: bool,
        pc: u64,
        difftest: DifftestSignals,
    }

    impl DutPort for FakeDut {
        fn set_clock(&mut self, _high: bool) {}
        fn set_reset(&mut self, _asserted: bool) {}
        fn eval(&mut self) {}
        fn bus_signals(&self) -> BusSignals {
            BusSignals::default()
        }
        fn set_read_data(&mut self, _data: u64) {}
        fn difftest_signals(&self) -> DifftestSignals {
            self.difftest
        }
        fn is_halted(&self) -> bool {
            self.halted
        }
        fn pc(&self) -> u64 {
            self.pc
        }
        fn reg(&self, _idx: usize) -> u64 {
            0
        }
        fn csr(&self, _addr: u64) -> u64 {
            0
        }
        fn perf_counter(&self, _name: &str) -> Option<PerfSample> {
            None
        }
        fn set_jtag_pins(&mut self, _tck: bool, _tms: bool, _tdi: bool) {}
        fn jtag_tdo(&self) -> bool {
            false
        }
    }

    fn fake_sim(halted: bool) -> SimState {
        let dut = FakeDut {
            halted,
            pc: 0x8000_0010,
            difftest: DifftestSignals::default(),
        };
        SimState::new(Box::new(dut), DeviceManager::new())
    }

    #[test]
    fn deadlock_fires_when_not_halted() {
        let mut sim = fake_sim(false);
        sim.not_commit_num = DeadlockWatch::PERIOD + 1;
        sim.run_state = RunState::Running;
        let mut watch = DeadlockWatch::new();
        watch.run(&mut sim);
        assert_eq!(sim.run_state, RunState::Aborted);
    }

    #[test]
    fn deadlock_suppressed_while_halted() {
        let mut sim = fake_sim(true);
        sim.not_commit_num = DeadlockWatch::PERIOD + 1;
        sim.run_state = RunState::Running;
        let mut watch = DeadlockWatch::new();
        watch.run(&mut sim);
        assert_eq!(sim.run_state, RunState::Running);
    }

    #[test]
    fn tohost_exit_pass_stops_cleanly() {
        let mut sim = fake_sim(false);
        sim.run_state = RunState::Running;
        TohostWatch::apply(1, &mut sim);
        assert_eq!(sim.run_state, RunState::Stopped);
        assert_eq!(sim.exit_code, Some(0));
    }

    #[test]
    fn tohost_exit_nonzero_code_is_failure() {
        let mut sim = fake_sim(false);
        sim.run_state = RunState::Running;
        TohostWatch::apply((3 << 1) | 1, &mut sim);
        assert_eq!(sim.exit_code, Some(3));
    }
}
