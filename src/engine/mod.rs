//! Measurement engines
//!
//! Two scan strategies share the [`probe::Probe`] primitive:
//!
//! - [`sequential::SequentialScan`]: one actor, one handle, every sector of
//!   the range probed `num_trials` times in ascending order.
//! - [`sweep::SweepScan`]: two actors on two threads in barrier lockstep, one
//!   pinned to a center sector, one sweeping the range.
//!
//! [`run`] picks the engine from the configuration and streams samples into
//! a [`SampleSink`] as they are measured.
//!
//! # Example
//!
//! ```no_run
//! use sectorprobe::config::BenchConfig;
//! use sectorprobe::engine;
//! use sectorprobe::output::SampleWriter;
//!
//! let config = BenchConfig::new("/dev/sdb", 0, 1024, 10);
//! let mut out = SampleWriter::stdout();
//! let summary = engine::run(&config, &mut out)?;
//! eprintln!("{} samples", summary.samples);
//! # Ok::<(), sectorprobe::error::BenchError>(())
//! ```

pub mod probe;
pub mod sequential;
pub mod sweep;

use crate::config::validator::validate_config;
use crate::config::{BenchConfig, ScanMode};
use crate::error::BenchError;
use crate::output::SampleSink;
use crate::util::fast_time::FastInstant;
use std::time::Duration;

pub use sequential::SequentialScan;
pub use sweep::{SweepReport, SweepScan};

/// One timed probe: the sector it is labelled with and the read latency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample {
    pub sector: u64,
    pub elapsed_ns: u64,
}

/// Result of a completed sequential scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanReport {
    pub samples: u64,
}

/// Outcome of [`run`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub mode: ScanMode,
    pub samples: u64,
    pub elapsed: Duration,
}

/// Run the engine selected by `config` to completion
pub fn run<S: SampleSink + Send>(config: &BenchConfig, sink: &mut S) -> Result<RunSummary, BenchError> {
    validate_config(config)?;

    let mode = config.mode();
    let started = FastInstant::now();

    let samples = match mode {
        ScanMode::Sequential => {
            tracing::info!(
                start = config.min_sector,
                end = config.max_sector,
                trials = config.num_trials,
                "Running sequential test..."
            );
            SequentialScan::new(config)?.run(sink)?.samples
        }
        ScanMode::Sweep { center_sector } => {
            tracing::info!(
                start = config.min_sector,
                end = config.max_sector,
                trials = config.num_trials,
                center_sector,
                "Running sweep test..."
            );
            SweepScan::new(config)?.run(sink)?.samples
        }
    };

    Ok(RunSummary {
        mode,
        samples,
        elapsed: started.elapsed(),
    })
}
