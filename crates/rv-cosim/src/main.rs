//! `rv-cosim`: cycle-driven RISC-V DUT co-simulation harness.

mod cli;
mod driver;
mod dut_ffi;
mod logging;

use clap::Parser;
use sim_core::SimConfig;

fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();
    let log_enabled = cli.log;
    let diff_log = cli.diff_log;
    let itrace = cli.itrace;
    let perf_trace = cli.perf_trace;

    let _guards = logging::init(log_enabled, diff_log, itrace, perf_trace);

    let config = SimConfig::try_from(cli)?;
    let exit_code = driver::run(&config)?;
    std::process::exit(exit_code);
}
