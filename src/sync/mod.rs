//! Synchronization primitives shared by the scan actors

pub mod barrier;

pub use barrier::{Barrier, BarrierError, BarrierWaitResult};
