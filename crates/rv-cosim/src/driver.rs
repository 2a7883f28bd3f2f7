//! Top-level driver (C10): wires the address map, devices, scheduler,
//! watchers, optional differential checker, and remote-bitbang transport,
//! then owns the run loop and lifecycle.

use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::thread;

use anyhow::{Context, Result};
use sim_core::config::default_map;
use sim_core::device_manager::DeviceManager;
use sim_core::devices::keyboard::KeyboardDevice;
use sim_core::devices::memory::MemoryDevice;
use sim_core::devices::rtc::RtcDevice;
use sim_core::devices::uart::UartDevice;
use sim_core::devices::vga::{NullSink, VgaDevice};
use sim_core::difftest::DiffChecker;
use sim_core::golden::GoldenModel;
use sim_core::itrace::InstructionTrace;
use sim_core::perfmon::PerfMonitor;
use sim_core::rbb::{RemoteBitbang, RemoteBitbangTask};
use sim_core::scheduler::{RunState, Scheduler, SimState, Task};
use sim_core::watchers::{AmEbreakWatch, DeadlockWatch, TohostWatch};
use sim_core::SimConfig;

use crate::dut_ffi::VerilatedDut;

/// Bus-routing task: drains the DUT's bus signals into the device queues
/// each post-rise dispatch and writes the resolved read value back.
struct BusRouteTask;

impl Task for BusRouteTask {
    fn name(&self) -> &str {
        "bus_route"
    }

    fn run(&mut self, sim: &mut SimState) {
        let signals = sim.dut.bus_signals();
        let read_addr = signals.read_en.then_some(signals.read_addr);
        let write_req = signals.write_en.then_some(sim_core::WriteRequest {
            waddr: signals.write_addr,
            wdata: signals.write_data,
            wstrb: signals.write_strb,
        });

        match sim.bus.route(read_addr, write_req) {
            Ok(()) => {
                let value = sim.bus.tick();
                sim.dut.set_read_data(value);
            }
            Err(e) => {
                tracing::error!(target: "console", "{e}");
                sim.run_state = RunState::Aborted;
            }
        }
    }
}

/// Differential-checker task: advances and compares the golden model on
/// every DUT commit.
struct DiffCheckTask {
    checker: DiffChecker,
}

impl Task for DiffCheckTask {
    fn name(&self) -> &str {
        "diff_check"
    }

    fn run(&mut self, sim: &mut SimState) {
        let dt = sim.dut.difftest_signals();
        if !dt.valid {
            return;
        }
        if let Err(msg) = self.checker.check_commit(sim.dut.as_ref(), dt) {
            tracing::error!(target: "console", "{msg}");
            sim.run_state = RunState::Aborted;
        }
    }
}

/// Spawns the background stdin-reader thread feeding the UART's RX lane
/// (§4.3, §5): blocks on `stdin` one byte at a time and forwards each byte
/// over an `mpsc` channel, which the UART device polls non-blockingly via
/// `try_recv` once per cycle. A closed or dropped receiver simply ends the
/// thread on the next failed send.
fn spawn_uart_rx_reader() -> Receiver<u8> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut stdin = std::io::stdin();
        let mut byte = [0u8; 1];
        loop {
            match stdin.read(&mut byte) {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    if tx.send(byte[0]).is_err() {
                        break;
                    }
                }
            }
        }
    });
    rx
}

/// Signature-dump one-shot task, registered as a once-task so it fires
/// during reset drain -- deferred to shutdown instead via explicit call,
/// since the signature is only meaningful once the program has finished.
fn dump_signature_if_configured(bus: &mut DeviceManager, path: &std::path::Path) {
    if let Some(mem) = bus.device_downcast_mut::<MemoryDevice>("memory") {
        if let Err(e) = mem.dump_signature(path) {
            tracing::error!(target: "console", "signature dump failed: {e}");
        }
    }
}

/// Runs the simulator end to end for the given configuration. Returns the
/// process exit code per §6 ("0 iff the final run state is not Aborted and,
/// if AM mode, a0 == 0; 1 otherwise").
pub fn run(config: &SimConfig) -> Result<i32> {
    let mut bus = DeviceManager::new();

    let mut memory = MemoryDevice::new(default_map::MEM_BASE, default_map::MEM_SIZE);
    memory
        .load_file(&config.image)
        .with_context(|| format!("loading image {}", config.image.display()))?;
    bus.register(Box::new(memory))
        .map_err(anyhow::Error::from)?;

    bus.register(Box::new(UartDevice::with_rx(
        default_map::SERIAL_BASE,
        spawn_uart_rx_reader(),
    )))
    .map_err(anyhow::Error::from)?;
    bus.register(Box::new(RtcDevice::new(default_map::RTC_BASE)))
        .map_err(anyhow::Error::from)?;

    if config.vga_enabled {
        // The producer side (a thread polling a windowing toolkit for
        // scancode/ASCII events) is the SDL-equivalent plumbing this crate
        // treats as an external collaborator (§1); only the consumer half
        // of the device is wired here. An unconnected producer reads
        // identically to an empty queue (§9).
        let (keyboard, _producer) = KeyboardDevice::new(default_map::KEYBOARD_BASE);
        bus.register(Box::new(keyboard))
            .map_err(anyhow::Error::from)?;
        bus.register(Box::new(VgaDevice::new(
            default_map::VGA_FB_BASE,
            default_map::VGA_CTRL_BASE,
            Box::new(NullSink),
        )))
        .map_err(anyhow::Error::from)?;
    }

    bus.print_device_info();

    let dut: Box<dyn sim_core::DutPort> = Box::new(VerilatedDut::new());
    let mut sim = SimState::new(dut, bus);

    let mut scheduler = Scheduler::new();
    scheduler.add_post_rise(Box::new(BusRouteTask), 0);
    scheduler.add_post_rise(Box::new(sim_core::difftest::CommitTrace), 0);

    if config.difftest_enabled {
        let mut golden = GoldenModel::new(
            "rv64imafdc",
            0, // Sv39, matching the source's default MMU mode
            default_map::BOOT_PC,
            default_map::MEM_SIZE,
            default_map::MEM_BASE,
            0,
            true,
            true,
        )
        .map_err(anyhow::Error::from)?;
        let image_path = config
            .image
            .to_str()
            .ok_or_else(|| anyhow::anyhow!("image path is not valid UTF-8"))?;
        golden
            .load_file(image_path)
            .map_err(anyhow::Error::from)
            .with_context(|| format!("loading golden model image {image_path}"))?;
        scheduler.add_post_rise(
            Box::new(DiffCheckTask {
                checker: DiffChecker::new(golden),
            }),
            0,
        );
    }

    if config.tohost_check_enabled {
        scheduler.add_post_rise(Box::new(TohostWatch::new()), TohostWatch::PERIOD);
    }
    scheduler.add_post_rise(Box::new(DeadlockWatch::new()), DeadlockWatch::PERIOD);
    scheduler.add_post_rise(Box::new(AmEbreakWatch::new(config.am_enabled)), 0);

    if config.itrace_enabled {
        let itrace = InstructionTrace::new().map_err(|e| anyhow::anyhow!("{e}"))?;
        scheduler.add_post_rise(Box::new(itrace), 0);
    }

    if config.perf_trace_enabled {
        let perf = PerfMonitor::new(
            vec!["branch_predictor", "icache"],
            config.perf_trace_enabled,
        );
        scheduler.add_post_rise(Box::new(perf), sim_core::perfmon::PERIOD);
    }

    if config.rbb_enabled {
        let rbb = RemoteBitbang::bind(config.rbb_port).context("binding remote-bitbang port")?;
        scheduler.add_post_rise(Box::new(RemoteBitbangTask::new(rbb)), sim_core::rbb::PERIOD);
    }

    let interrupted = Arc::new(AtomicBool::new(false));
    let handler_flag = interrupted.clone();
    ctrlc::set_handler(move || handler_flag.store(true, Ordering::SeqCst))
        .context("installing SIGINT handler")?;

    scheduler.reset(&mut sim);

    while sim.run_state == RunState::Running
        && !interrupted.load(Ordering::SeqCst)
        && sim.cycle_num < config.max_cycles
    {
        scheduler.step(&mut sim);
    }

    if let Some(path) = &config.signature {
        dump_signature_if_configured(&mut sim.bus, path);
    }

    let exit_ok = sim.run_state != RunState::Aborted
        && (!config.am_enabled || sim.exit_code.unwrap_or(0) == 0);

    Ok(if exit_ok { 0 } else { 1 })
}
