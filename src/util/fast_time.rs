//! Fast timing utilities using direct clock_gettime calls
//!
//! The probe reads the clock immediately before and after each read, so the
//! clock call itself sits inside every measurement. Calling clock_gettime
//! directly keeps that overhead small and predictable.
//!
//! # Clock source
//!
//! `CLOCK_MONOTONIC` is used whenever it can be read. If it cannot, the
//! instant falls back to `CLOCK_REALTIME` and a warning is logged once.
//! Realtime can jump backwards (NTP, manual changes), so in that mode a
//! single probe may be distorted; [`FastInstant::nanos_since`] saturates at
//! zero so such a jump shows up as a 0ns sample rather than a wrapped value.
//! This is a known limitation of the degraded mode, not an error.

use std::sync::Once;
use std::time::Duration;

static REALTIME_FALLBACK: Once = Once::new();

/// Fast timestamp using direct clock_gettime
///
/// Resolution: nanosecond
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct FastInstant {
    nanos: u64,
}

impl FastInstant {
    /// Get the current time, preferring CLOCK_MONOTONIC
    #[inline(always)]
    pub fn now() -> Self {
        if let Some(nanos) = read_clock(libc::CLOCK_MONOTONIC) {
            return Self { nanos };
        }

        REALTIME_FALLBACK.call_once(|| {
            tracing::warn!("CLOCK_MONOTONIC unavailable, timing with CLOCK_REALTIME");
        });
        Self {
            nanos: read_clock(libc::CLOCK_REALTIME).unwrap_or(0),
        }
    }

    /// Nanoseconds elapsed from `earlier` to `self`, zero if the clock went backwards
    #[inline(always)]
    pub fn nanos_since(&self, earlier: FastInstant) -> u64 {
        self.nanos.saturating_sub(earlier.nanos)
    }

    /// Calculate duration since another FastInstant
    #[inline(always)]
    pub fn duration_since(&self, earlier: FastInstant) -> Duration {
        Duration::from_nanos(self.nanos_since(earlier))
    }

    /// Get elapsed time since this instant
    #[inline(always)]
    pub fn elapsed(&self) -> Duration {
        Self::now().duration_since(*self)
    }
}

#[inline(always)]
fn read_clock(clock: libc::clockid_t) -> Option<u64> {
    let mut ts = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };

    let rc = unsafe { libc::clock_gettime(clock, &mut ts) };
    if rc != 0 {
        return None;
    }

    Some((ts.tv_sec as u64) * 1_000_000_000 + (ts.tv_nsec as u64))
}
