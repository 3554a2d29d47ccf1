//! Low-level helpers: aligned buffers and timing

pub mod buffer;
pub mod fast_time;
pub mod time;
