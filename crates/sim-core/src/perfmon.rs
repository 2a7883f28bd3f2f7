//! Performance counter monitor (C14, §10.4): periodically samples named
//! hit/total counter pairs the DUT exposes and dumps them to a log target.

use crate::scheduler::{SimState, Task};

/// Default dump cadence, matching the source's `PerfMonitor` sample period.
pub const PERIOD: u64 = 10_000;

/// Periodic task that samples every counter named in `names` from the DUT
/// and logs `{name, hit, total, hit_rate}` once per period.
pub struct PerfMonitor {
    names: Vec<&'static str>,
    to_perf_trace: bool,
}

impl PerfMonitor {
    /// `to_perf_trace` selects the `perf_trace` log target (when
    /// `--perf-trace` is set) over plain `console` output.
    pub fn new(names: Vec<&'static str>, to_perf_trace: bool) -> Self {
        Self {
            names,
            to_perf_trace,
        }
    }
}

impl Task for PerfMonitor {
    fn name(&self) -> &str {
        "perf_monitor"
    }

    fn run(&mut self, sim: &mut SimState) {
        for &name in &self.names {
            let Some(sample) = sim.dut.perf_counter(name) else {
                continue;
            };
            let rate = if sample.total == 0 {
                0.0
            } else {
                sample.hit as f64 / sample.total as f64
            };
            if self.to_perf_trace {
                tracing::info!(
                    target: "perf_trace",
                    "{name:<10} hit_count:{:<8} total_count:{:<8} hit_rate:{rate:<10.4}",
                    sample.hit,
                    sample.total,
                );
            } else {
                tracing::info!(
                    target: "console",
                    "{name:<10} hit_count:{:<8} total_count:{:<8} hit_rate:{rate:<10.4}",
                    sample.hit,
                    sample.total,
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device_manager::DeviceManager;
    use crate::dut::{BusSignals, DifftestSignals, DutPort, PerfSample};

    struct CountingDut;
    impl DutPort for CountingDut {
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
        fn perf_counter(&self, name: &str) -> Option<PerfSample> {
            (name == "branch_predictor").then_some(PerfSample {
                hit: 80,
                total: 100,
            })
        }
        fn set_jtag_pins(&mut self, _tck: bool, _tms: bool, _tdi: bool) {}
        fn jtag_tdo(&self) -> bool {
            false
        }
    }

    #[test]
    fn unknown_counter_names_are_skipped() {
        let mut sim = SimState::new(Box::new(CountingDut), DeviceManager::new());
        let mut mon = PerfMonitor::new(vec!["branch_predictor", "icache"], false);
        mon.run(&mut sim); // must not panic on the missing "icache" counter
    }
}
