//! sectorprobe - raw block device read latency at sector granularity
//!
//! sectorprobe times individual uncached reads against a block device to
//! show how the operating system schedules, and possibly merges, concurrent
//! requests.
//!
//! # Architecture
//!
//! - **Probe**: one aligned, uncached, timed read (`engine::probe`)
//! - **Sequential scan**: one actor probing each sector of a range in turn
//! - **Sweep scan**: two actors in barrier lockstep, one pinned to a center
//!   sector and one sweeping the range
//! - **Barrier**: reusable, breakable rendezvous (`sync::barrier`)
//!
//! Output is one `sector,elapsed_ns` line per probe; no aggregation is done.

pub mod config;
pub mod device;
pub mod engine;
pub mod error;
pub mod output;
pub mod sync;
pub mod util;

// Re-export commonly used types
pub use config::BenchConfig;
pub use engine::Sample;
pub use error::BenchError;

/// Result type used by the binary and top-level helpers
pub type Result<T> = anyhow::Result<T>;
