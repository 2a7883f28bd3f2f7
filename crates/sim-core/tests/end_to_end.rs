//! End-to-end scenarios driving the full scheduler loop against a scripted
//! `DutPort`, covering the cases in spec §8 that exercise more than one
//! module at a time (AM ebreak termination, and a main-loop abort on an
//! unmapped bus access).

use sim_core::device_manager::DeviceManager;
use sim_core::devices::memory::MemoryDevice;
use sim_core::dut::{BusSignals, DifftestSignals, DutPort, PerfSample};
use sim_core::scheduler::{RunState, Scheduler, SimState, Task};
use sim_core::{SimError, WriteRequest};

/// A `DutPort` whose bus and difftest signals are driven entirely by a
/// cycle-indexed script, standing in for the verilated model in tests that
/// don't need a real core.
struct ScriptedDut {
    cycle: u64,
    ebreak_at: Option<u64>,
    bus_each_cycle: Option<BusSignals>,
}

impl ScriptedDut {
    fn new() -> Self {
        Self {
            cycle: 0,
            ebreak_at: None,
            bus_each_cycle: None,
        }
    }
}

impl DutPort for ScriptedDut {
    fn set_clock(&mut self, _high: bool) {}
    fn set_reset(&mut self, _asserted: bool) {}
    fn eval(&mut self) {
        self.cycle += 1;
    }
    fn bus_signals(&self) -> BusSignals {
        self.bus_each_cycle.unwrap_or_default()
    }
    fn set_read_data(&mut self, _data: u64) {}
    fn difftest_signals(&self) -> DifftestSignals {
        let ebreak_now = self.ebreak_at == Some(self.cycle);
        DifftestSignals {
            valid: ebreak_now,
            committed_num: u64::from(ebreak_now),
            pc: 0x8000_0004,
            is_rvc: false,
            inst: 0,
            exception_valid: ebreak_now,
            exception_cause: 3, // ebreak
            has_interrupt: false,
            contains_mmio: false,
            csr_skip: false,
        }
    }
    fn is_halted(&self) -> bool {
        false
    }
    fn pc(&self) -> u64 {
        0x8000_0004
    }
    fn reg(&self, idx: usize) -> u64 {
        if idx == 10 {
            0 // a0 == 0, the "pass" exit code
        } else {
            0
        }
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

/// Mirrors `rv-cosim`'s bus-routing task: drains the DUT's staged bus
/// signals into the device queues and aborts the run on an unmapped access.
struct BusRouteTask;

impl Task for BusRouteTask {
    fn name(&self) -> &str {
        "bus_route"
    }

    fn run(&mut self, sim: &mut SimState) {
        let signals = sim.dut.bus_signals();
        let read_addr = signals.read_en.then_some(signals.read_addr);
        let write_req = signals.write_en.then_some(WriteRequest {
            waddr: signals.write_addr,
            wdata: signals.write_data,
            wstrb: signals.write_strb,
        });

        match sim.bus.route(read_addr, write_req) {
            Ok(()) => {
                let value = sim.bus.tick();
                sim.dut.set_read_data(value);
            }
            Err(SimError::UnmappedRead { addr }) => {
                assert_eq!(addr, 0x9000_0000);
                sim.run_state = RunState::Aborted;
            }
            Err(e) => panic!("unexpected bus error: {e}"),
        }
    }
}

#[test]
fn am_ebreak_finishes_with_a0_exit_code() {
    use sim_core::watchers::AmEbreakWatch;

    let dut = ScriptedDut {
        cycle: 0,
        ebreak_at: Some(1),
        bus_each_cycle: None,
    };
    let mut sim = SimState::new(Box::new(dut), DeviceManager::new());
    let mut scheduler = Scheduler::new();
    scheduler.add_post_rise(Box::new(AmEbreakWatch::new(true)), 0);

    scheduler.reset(&mut sim);
    while sim.run_state == RunState::Running && sim.cycle_num < 10 {
        scheduler.step(&mut sim);
    }

    assert_eq!(sim.run_state, RunState::Finished);
    assert_eq!(sim.exit_code, Some(0));
}

#[test]
fn unmapped_bus_access_aborts_the_run_loop() {
    let mut bus = DeviceManager::new();
    bus.register(Box::new(MemoryDevice::new(0x8000_0000, 0x1000)))
        .unwrap();

    let dut = ScriptedDut {
        cycle: 0,
        ebreak_at: None,
        bus_each_cycle: Some(BusSignals {
            read_addr: 0x9000_0000,
            read_en: true,
            write_addr: 0,
            write_data: 0,
            write_strb: 0,
            write_en: false,
        }),
    };
    let mut sim = SimState::new(Box::new(dut), bus);
    let mut scheduler = Scheduler::new();
    scheduler.add_post_rise(Box::new(BusRouteTask), 0);

    scheduler.reset(&mut sim);
    while sim.run_state == RunState::Running && sim.cycle_num < 10 {
        scheduler.step(&mut sim);
    }

    assert_eq!(sim.run_state, RunState::Aborted);
}
