use crate::device_manager::DeviceManager;
use crate::dut::DutPort;

/// The simulator's run-state machine. Terminal states are absorbing: once
/// in `Aborted`, `Finished`, or `Stopped` the run loop exits and stays
/// there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Stopped,
    Running,
    Aborted,
    Finished,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Stopped | RunState::Aborted | RunState::Finished)
    }
}

/// Owned state shared by every scheduled task: the DUT handle, the device
/// bus, the run-state machine, and the cycle/commit counters the step
/// procedure maintains.
pub struct SimState {
    pub dut: Box<dyn DutPort>,
    pub bus: DeviceManager,
    pub run_state: RunState,
    pub cycle_num: u64,
    pub commit_num: u64,
    pub not_commit_num: u64,
    /// Process exit code set by a clean-termination watcher (AM ebreak's
    /// `a0`, or an explicit tohost exit code). `None` until one fires.
    pub exit_code: Option<u32>,
}

impl SimState {
    pub fn new(dut: Box<dyn DutPort>, bus: DeviceManager) -> Self {
        Self {
            dut,
            bus,
            run_state: RunState::Stopped,
            cycle_num: 0,
            commit_num: 0,
            not_commit_num: 0,
            exit_code: None,
        }
    }
}

/// A scheduled unit of work. Tasks are small data-oriented objects rather
/// than capturing closures, so each can be unit tested by constructing it
/// directly and calling `run` against a hand-built [`SimState`].
pub trait Task {
    fn name(&self) -> &str;
    fn run(&mut self, sim: &mut SimState);
}

enum TaskKind {
    Once,
    Periodic { period: u64, counter: u64 },
}

struct ScheduledTask {
    task: Box<dyn Task>,
    kind: TaskKind,
}

impl ScheduledTask {
    fn dispatch(&mut self, sim: &mut SimState) {
        match &mut self.kind {
            TaskKind::Once => self.task.run(sim),
            TaskKind::Periodic { period, counter } => {
                if *period == 0 {
                    self.task.run(sim);
                    return;
                }
                *counter += 1;
                if *counter >= *period {
                    *counter = 0;
                    self.task.run(sim);
                }
            }
        }
    }
}

/// Pre-rise, post-rise, and once task lists, dispatched around each
/// clock-edge step per §4.4.
pub struct Scheduler {
    pre_rise: Vec<ScheduledTask>,
    post_rise: Vec<ScheduledTask>,
    once: Vec<ScheduledTask>,
    clock_high: bool,
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            pre_rise: Vec::new(),
            post_rise: Vec::new(),
            once: Vec::new(),
            clock_high: false,
        }
    }

    pub fn add_pre_rise(&mut self, task: Box<dyn Task>, period: u64) {
        self.pre_rise.push(ScheduledTask {
            task,
            kind: TaskKind::Periodic { period, counter: 0 },
        });
    }

    pub fn add_post_rise(&mut self, task: Box<dyn Task>, period: u64) {
        self.post_rise.push(ScheduledTask {
            task,
            kind: TaskKind::Periodic { period, counter: 0 },
        });
    }

    pub fn add_once(&mut self, task: Box<dyn Task>) {
        self.once.push(ScheduledTask {
            task,
            kind: TaskKind::Once,
        });
    }

    /// Asserts reset, drains once-tasks, clocks ten half-cycles with reset
    /// asserted, then deasserts reset and transitions to `Running`.
    pub fn reset(&mut self, sim: &mut SimState) {
        sim.run_state = RunState::Running;
        sim.dut.set_reset(true);

        for task in &mut self.once {
            task.dispatch(sim);
        }

        for _ in 0..10 {
            self.clock_high = !self.clock_high;
            sim.dut.set_clock(self.clock_high);
            sim.dut.eval();
        }

        sim.dut.set_reset(false);
    }

    /// Flips the clock, evaluates the DUT, and dispatches the task list
    /// for whichever edge just occurred.
    pub fn step(&mut self, sim: &mut SimState) {
        self.clock_high = !self.clock_high;
        sim.dut.set_clock(self.clock_high);
        sim.dut.eval();

        if self.clock_high {
            sim.cycle_num += 1;
            let dt = sim.dut.difftest_signals();
            if dt.valid {
                sim.commit_num += dt.committed_num;
                sim.not_commit_num = 0;
            } else {
                sim.not_commit_num += 1;
            }
            Self::dispatch(&mut self.post_rise, sim);
        } else {
            Self::dispatch(&mut self.pre_rise, sim);
        }
    }

    fn dispatch(tasks: &mut [ScheduledTask], sim: &mut SimState) {
        for task in tasks.iter_mut() {
            task.dispatch(sim);
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dut::{BusSignals, DifftestSignals, PerfSample};

    struct NullDut;
    impl DutPort for NullDut {
        fn set_clock(&mut self, _high: bool) {}
        fn set_reset(&mut self, _asserted: bool) {}
        fn eval(&mut self) {}
        fn bus_signals(&self) -> BusSignals {
            BusSignals::default()
        }
        fn set_read_data(&mut self, _data: u64) {}
        fn difftest_signals(&self) -> DifftestSignals {
            DifftestSignals::default()
        }
        fn is_halted(&self) -> bool {
            false
        }
        fn pc(&self) -> u64 {
            0
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

    struct CountingTask {
        fires: std::rc::Rc<std::cell::Cell<u64>>,
    }
    impl Task for CountingTask {
        fn name(&self) -> &str {
            "counting"
        }
        fn run(&mut self, _sim: &mut SimState) {
            self.fires.set(self.fires.get() + 1);
        }
    }

    #[test]
    fn periodic_task_fires_every_period_dispatches() {
        let mut sim = SimState::new(Box::new(NullDut), DeviceManager::new());
        let mut scheduler = Scheduler::new();
        let fires = std::rc::Rc::new(std::cell::Cell::new(0u64));
        scheduler.add_post_rise(
            Box::new(CountingTask {
                fires: fires.clone(),
            }),
            4,
        );

        for _ in 0..16 {
            scheduler.step(&mut sim); // falling edge, no post-rise dispatch
            scheduler.step(&mut sim); // rising edge, post-rise dispatch
        }

        assert_eq!(fires.get(), 4);
    }

    #[test]
    fn zero_period_fires_every_dispatch() {
        let mut sim = SimState::new(Box::new(NullDut), DeviceManager::new());
        let mut scheduler = Scheduler::new();
        let fires = std::rc::Rc::new(std::cell::Cell::new(0u64));
        scheduler.add_post_rise(
            Box::new(CountingTask {
                fires: fires.clone(),
            }),
            0,
        );

        for _ in 0..5 {
            scheduler.step(&mut sim);
            scheduler.step(&mut sim);
        }

        assert_eq!(fires.get(), 5);
    }
}
