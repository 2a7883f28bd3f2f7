use thiserror::Error;

/// Errors surfaced by the simulation core.
///
/// Bus-level failures (`UnmappedRead`/`UnmappedWrite`) are not fatal on their
/// own — the top-level driver logs them and transitions the run state to
/// `Aborted` rather than unwinding. Everything else here indicates a
/// misconfigured simulator and is fatal at construction time.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("device {device} address conflict: [{start:#x}, {end:#x})")]
    RegionConflict {
        device: String,
        start: u64,
        end: u64,
    },

    #[error("read address out of range: {addr:#018x}")]
    UnmappedRead { addr: u64 },

    #[error("write address out of range: {addr:#018x}")]
    UnmappedWrite { addr: u64 },

    #[error("failed to load image {path}: {source}")]
    ImageLoad {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("golden model error: {0}")]
    GoldenModel(String),
}
