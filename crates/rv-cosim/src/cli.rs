//! Command-line parsing (C11, §10.1): a `clap::Parser`-derived `Cli` that
//! maps 1:1 to §6's flag table, validated into a [`sim_core::SimConfig`].

use std::path::PathBuf;

use clap::Parser;
use sim_core::error::SimError;
use sim_core::SimConfig;

#[derive(Debug, Parser)]
#[command(name = "rv-cosim", about = "Cycle-driven RISC-V DUT co-simulation harness")]
pub struct Cli {
    /// Image (ELF or raw) to load at memory base.
    #[arg(short = 'f', long = "file")]
    pub file: PathBuf,

    /// Write riscof signature to PATH.
    #[arg(short = 's', long = "signature")]
    pub signature: Option<PathBuf>,

    /// Maximum cycles.
    #[arg(long = "clk", default_value_t = 50_000)]
    pub clk: u64,

    /// Enable AM-mode ebreak termination and a0-based exit code.
    #[arg(long = "am", default_value_t = false)]
    pub am: bool,

    /// Enable waveform dump.
    #[arg(short = 'w', long = "wave", default_value_t = false)]
    pub wave: bool,

    /// Suppress wave output until simulator time > 2N.
    #[arg(long = "wave_stime", default_value_t = 0)]
    pub wave_stime: u64,

    /// Enable differential checker.
    #[arg(short = 'd', long = "difftest", default_value_t = false)]
    pub difftest: bool,

    /// Enable diff-trace log sink.
    #[arg(long = "diff-log", default_value_t = false)]
    pub diff_log: bool,

    /// Enable instruction disassembly trace.
    #[arg(long = "itrace", default_value_t = false)]
    pub itrace: bool,

    /// Enable periodic perf-counter dump.
    #[arg(long = "perf-trace", default_value_t = false)]
    pub perf_trace: bool,

    /// Instantiate VGA+keyboard.
    #[arg(long = "vga", default_value_t = false)]
    pub vga: bool,

    /// Enable remote-bitbang JTAG TCP server.
    #[arg(long = "rbb", default_value_t = false)]
    pub rbb: bool,

    /// TCP port for remote bitbang.
    #[arg(long = "rbb-port", default_value_t = 23456)]
    pub rbb_port: u16,

    /// Enable tohost termination protocol.
    #[arg(long = "tohost-check", default_value_t = false)]
    pub tohost_check: bool,

    /// Enable file log sinks (trace, ipc).
    #[arg(long = "log", default_value_t = false)]
    pub log: bool,
}

impl TryFrom<Cli> for SimConfig {
    type Error = SimError;

    fn try_from(cli: Cli) -> Result<Self, Self::Error> {
        let config = SimConfig {
            image: cli.file,
            signature: cli.signature,
            max_cycles: cli.clk,
            am_enabled: cli.am,
            wave_enabled: cli.wave,
            wave_start_time: cli.wave_stime,
            difftest_enabled: cli.difftest,
            diff_log_enabled: cli.diff_log,
            itrace_enabled: cli.itrace,
            perf_trace_enabled: cli.perf_trace,
            vga_enabled: cli.vga,
            rbb_enabled: cli.rbb,
            rbb_port: cli.rbb_port,
            tohost_check_enabled: cli.tohost_check,
            log_enabled: cli.log,
        };
        config.validate()?;
        Ok(config)
    }
}
