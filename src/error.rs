//! Error types for the measurement engine
//!
//! Every I/O failure in this tool is fatal. The variants exist so the driver
//! can name the failing operation and pick an exit code, not so callers can
//! recover.

use crate::sync::BarrierError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while opening the device, probing it, or emitting samples
#[derive(Error, Debug)]
pub enum BenchError {
    #[error("open failed: {}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("lseek failed: offset={offset}")]
    Seek {
        offset: u64,
        #[source]
        source: io::Error,
    },

    #[error("read failed: offset={offset}, length={length}")]
    Read {
        offset: u64,
        length: usize,
        #[source]
        source: io::Error,
    },

    #[error("short read: offset={offset}, expected {expected} bytes, got {got}")]
    ShortRead {
        offset: u64,
        expected: usize,
        got: usize,
    },

    #[error("close failed: {}", .path.display())]
    Close {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("aligned buffer allocation failed: size={size}, alignment={alignment}")]
    Alloc { size: usize, alignment: usize },

    #[error("failed to write sample")]
    Output(#[source] io::Error),

    #[error("failed to spawn actor thread")]
    Spawn(#[source] io::Error),

    #[error("barrier wait failed")]
    Barrier(#[from] BarrierError),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl BenchError {
    /// Name of the operation that failed, as reported to the user
    pub fn operation(&self) -> &'static str {
        match self {
            BenchError::Open { .. } => "open",
            BenchError::Seek { .. } => "lseek",
            BenchError::Read { .. } | BenchError::ShortRead { .. } => "read",
            BenchError::Close { .. } => "close",
            BenchError::Alloc { .. } => "alloc",
            BenchError::Output(_) => "write",
            BenchError::Spawn(_) => "pthread_create",
            BenchError::Barrier(_) => "barrier_wait",
            BenchError::InvalidConfig(_) => "configure",
        }
    }

    /// The OS error code behind this failure, if there is one
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            BenchError::Open { source, .. }
            | BenchError::Seek { source, .. }
            | BenchError::Read { source, .. }
            | BenchError::Close { source, .. }
            | BenchError::Output(source)
            | BenchError::Spawn(source) => source.raw_os_error(),
            _ => None,
        }
    }

    /// True when this error only reports that the partner actor gave up
    pub fn is_broken_barrier(&self) -> bool {
        matches!(self, BenchError::Barrier(BarrierError::Broken))
    }
}
