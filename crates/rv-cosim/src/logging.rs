//! Structured logging setup (C12, §10.2). Built on `tracing` +
//! `tracing-subscriber`, replacing the source's spdlog setup
//! (`console`/`trace`/`ipc` async loggers) with named targets on a single
//! subscriber: a colored stdout layer always active for `console`, and
//! rotating file layers for `trace`/`ipc`/`diff_trace`/`itrace`/`perf_trace`,
//! each gated by its own CLI flag.

use tracing_subscriber::fmt::layer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

/// Keeps the rotating file-appender worker guards alive for the process
/// lifetime; dropping them flushes and stops the background writer thread.
pub struct LoggingGuards {
    _guards: Vec<tracing_appender::non_blocking::WorkerGuard>,
}

/// Installs the global subscriber. `log_enabled` gates the `trace`/`ipc`
/// file targets (mirrors the source's blanket `log_en`); `diff_log`,
/// `itrace`, `perf_trace` gate their own targets independently, since the
/// source gates those independently too.
pub fn init(log_enabled: bool, diff_log: bool, itrace: bool, perf_trace: bool) -> LoggingGuards {
    let mut guards = Vec::new();

    let console_layer = layer()
        .with_target(false)
        .with_ansi(true)
        .with_filter(EnvFilter::new("off,console=info"));

    let mut file_filter =
        String::from("off,trace=off,ipc=off,diff_trace=off,itrace=off,perf_trace=off");
    if log_enabled {
        file_filter = file_filter.replace("trace=off", "trace=info");
        file_filter = file_filter.replace("ipc=off", "ipc=info");
    }
    if diff_log {
        file_filter = file_filter.replace("diff_trace=off", "diff_trace=info");
    }
    if itrace {
        file_filter = file_filter.replace("itrace=off", "itrace=info");
    }
    if perf_trace {
        file_filter = file_filter.replace("perf_trace=off", "perf_trace=info");
    }

    let file_appender = tracing_appender::rolling::never("logs", "rv-cosim.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    guards.push(guard);

    let file_layer = layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_filter(EnvFilter::new(file_filter));

    Registry::default()
        .with(console_layer)
        .with(file_layer)
        .init();

    LoggingGuards { _guards: guards }
}
