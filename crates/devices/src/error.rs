use std::io;

use thiserror::Error;

use tether_memory::TargetMemoryError;

pub type Result<T> = std::result::Result<T, DeviceError>;

/// Fatal device-layer errors.
///
/// Everything here terminates the emulation session. The cooperative
/// non-blocking protocol never surfaces would-block, peer closure or
/// "no connection" through this type; those are encoded in the protocol's own
/// zero-progress vocabulary and the command still gets its response.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("target memory access failed: {0}")]
    Memory(#[from] TargetMemoryError),

    #[error("could not open {path}: {source}")]
    BackingFile { path: String, source: io::Error },

    #[error("could not read {id} @ {offset}: {source}")]
    DiskRead {
        id: String,
        offset: u64,
        source: io::Error,
    },

    #[error("could not write {id} @ {offset}: {source}")]
    DiskWrite {
        id: String,
        offset: u64,
        source: io::Error,
    },

    #[error("{op} failed on rendezvous socket {path}: {source}")]
    Rendezvous {
        op: &'static str,
        path: String,
        source: io::Error,
    },

    #[error("{op}() failed: {source}")]
    Syscall { op: &'static str, source: io::Error },

    #[error("poll() returned unexpected value {0}")]
    PollInvariant(i32),

    #[error("identify address {addr:#x} not aligned to {align}")]
    MisalignedIdentity { addr: u64, align: usize },

    #[error("device registry full ({capacity} slots)")]
    RegistryFull { capacity: usize },
}
