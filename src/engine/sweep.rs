//! Concurrent sweep engine
//!
//! Two actors, each on its own OS thread with its own device handle, issue
//! reads in lockstep:
//!
//! - the **pinned** actor re-reads the center sector every round, untimed;
//! - the **sweeping** actor walks the sector range (sectors outer, trials
//!   inner) and times its read.
//!
//! Each round both actors seek first, then meet at the barrier so the two
//! reads reach the kernel back to back, and meet again after reading so the
//! sweeping actor's timed window is bounded by two requests that were in
//! flight together.
//!
//! ```text
//!   pinned:   seek(center) | wait | read        | wait | ...
//!   sweeper:  seek(target) | wait | t0 read t1  | wait | emit(s, t1 - t0)
//! ```
//!
//! # Round accounting
//!
//! Both actors run exactly `(max_sector - min_sector) * num_trials` rounds.
//! If either ran more, its extra `wait()` could never complete.
//!
//! # Failure
//!
//! An actor that fails (or panics) breaks the barrier on its way out. Its
//! partner's pending or next `wait()` then returns `Broken` instead of
//! blocking forever, and the engine reports the original failure.

use super::probe::Probe;
use super::Sample;
use crate::config::validator::validate_config;
use crate::config::BenchConfig;
use crate::error::BenchError;
use crate::output::SampleSink;
use crate::sync::Barrier;
use std::thread;

/// Both actors meet at every barrier
const PARTIES: usize = 2;

/// Result of a completed sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    /// Samples emitted by the sweeping actor
    pub samples: u64,
    /// Rounds completed by the pinned actor
    pub pinned_rounds: u64,
    /// Rounds completed by the sweeping actor
    pub sweep_rounds: u64,
}

/// Two-actor lockstep scan
pub struct SweepScan<'a> {
    config: &'a BenchConfig,
    center_sector: u64,
    total_rounds: u64,
}

impl<'a> SweepScan<'a> {
    pub fn new(config: &'a BenchConfig) -> Result<Self, BenchError> {
        validate_config(config)?;

        let center_sector = config
            .center_sector
            .ok_or_else(|| BenchError::InvalidConfig("sweep mode requires a center sector".into()))?;
        let total_rounds = config
            .total_rounds()
            .ok_or_else(|| BenchError::InvalidConfig("round count overflows".into()))?;

        Ok(Self {
            config,
            center_sector,
            total_rounds,
        })
    }

    /// Rounds each actor will run
    pub fn total_rounds(&self) -> u64 {
        self.total_rounds
    }

    /// Run both actors to completion
    ///
    /// Only the sweeping actor emits samples, so `sink` is handed to that
    /// thread alone.
    pub fn run<S: SampleSink + Send>(&self, sink: &mut S) -> Result<SweepReport, BenchError> {
        let barrier = Barrier::new(PARTIES)?;
        let barrier = &barrier;

        tracing::debug!(
            center_sector = self.center_sector,
            total_rounds = self.total_rounds,
            sweep_seek = ?self.config.sweep_seek,
            "starting sweep actors"
        );

        thread::scope(|scope| {
            let pinned = thread::Builder::new()
                .name("pinned".into())
                .spawn_scoped(scope, move || guarded(barrier, || self.pinned_actor(barrier)))
                .map_err(|e| spawn_failed(barrier, e))?;

            let sweeper = thread::Builder::new()
                .name("sweeper".into())
                .spawn_scoped(scope, move || guarded(barrier, || self.sweeping_actor(barrier, sink)))
                .map_err(|e| spawn_failed(barrier, e))?;

            let pinned = join_actor(pinned);
            let sweeper = join_actor(sweeper);

            match (pinned, sweeper) {
                (Ok(pinned_rounds), Ok(sweep_rounds)) => Ok(SweepReport {
                    samples: sweep_rounds,
                    pinned_rounds,
                    sweep_rounds,
                }),
                (Err(e), Ok(_)) | (Ok(_), Err(e)) => Err(e),
                (Err(pinned), Err(sweeper)) => Err(primary_error(pinned, sweeper)),
            }
        })
    }

    /// Re-read the center sector once per round, untimed
    fn pinned_actor(&self, barrier: &Barrier) -> Result<u64, BenchError> {
        let mut probe = Probe::open(self.config)?;
        let offset = self.config.sector_offset(self.center_sector);
        let mut rounds = 0u64;

        while rounds < self.total_rounds {
            probe.seek_to(offset)?;
            barrier.wait()?;
            probe.read_block()?;
            barrier.wait()?;
            rounds += 1;
        }

        probe.close()?;
        tracing::debug!(rounds, "pinned actor finished");
        Ok(rounds)
    }

    /// Walk the range, timing one read per round, and emit a sample per round
    fn sweeping_actor<S: SampleSink>(&self, barrier: &Barrier, sink: &mut S) -> Result<u64, BenchError> {
        let config = self.config;
        let mut probe = Probe::open(config)?;
        let mut rounds = 0u64;

        for sector in config.min_sector..config.max_sector {
            let target = config.sweep_seek.target_sector(config, sector);
            let offset = config.sector_offset(target);

            for _trial in 0..config.num_trials {
                probe.seek_to(offset)?;
                barrier.wait()?;
                let elapsed_ns = probe.timed_read()?;
                barrier.wait()?;

                sink.emit(Sample { sector, elapsed_ns })?;
                rounds += 1;
            }
        }

        debug_assert_eq!(rounds, self.total_rounds);
        probe.close()?;
        tracing::debug!(rounds, "sweeping actor finished");
        Ok(rounds)
    }
}

/// Breaks the barrier when dropped while still armed
struct BreakOnDrop<'b> {
    barrier: &'b Barrier,
    armed: bool,
}

impl BreakOnDrop<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for BreakOnDrop<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.barrier.break_barrier();
        }
    }
}

/// Run an actor body, breaking the barrier if it fails or panics
fn guarded<T>(barrier: &Barrier, actor: impl FnOnce() -> Result<T, BenchError>) -> Result<T, BenchError> {
    let guard = BreakOnDrop { barrier, armed: true };
    let result = actor();

    match &result {
        Ok(_) => guard.disarm(),
        Err(e) if !e.is_broken_barrier() => {
            let current = thread::current();
            tracing::debug!(
                actor = current.name().unwrap_or("?"),
                operation = e.operation(),
                "actor failed, releasing partner"
            );
        }
        Err(_) => {}
    }

    result
}

fn spawn_failed(barrier: &Barrier, error: std::io::Error) -> BenchError {
    barrier.break_barrier();
    BenchError::Spawn(error)
}

fn join_actor<T>(handle: thread::ScopedJoinHandle<'_, Result<T, BenchError>>) -> Result<T, BenchError> {
    match handle.join() {
        Ok(result) => result,
        Err(panic) => std::panic::resume_unwind(panic),
    }
}

/// Prefer the failure that caused the abort over the partner's `Broken`
fn primary_error(pinned: BenchError, sweeper: BenchError) -> BenchError {
    if pinned.is_broken_barrier() {
        sweeper
    } else {
        pinned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SweepSeek;
    use crate::sync::BarrierError;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn scratch_device(sectors: usize) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&vec![0u8; sectors * 512]).unwrap();
        file.flush().unwrap();
        file
    }

    fn sweep_config(dev: &NamedTempFile, min: u64, max: u64, trials: u64) -> BenchConfig {
        let mut config = BenchConfig::new(dev.path(), min, max, trials).with_midpoint_center();
        config.direct = false;
        config
    }

    #[test]
    fn test_sweep_ten_to_fifteen() {
        let dev = scratch_device(16);
        let config = sweep_config(&dev, 10, 15, 1);
        let mut samples = Vec::new();

        let report = SweepScan::new(&config).unwrap().run(&mut samples).unwrap();

        let sectors: Vec<u64> = samples.iter().map(|s| s.sector).collect();
        assert_eq!(sectors, vec![10, 11, 12, 13, 14]);
        assert_eq!(report.samples, 5);
        assert_eq!(report.pinned_rounds, 5);
        assert_eq!(report.sweep_rounds, 5);
    }

    #[test]
    fn test_rounds_match_with_multiple_trials() {
        let dev = scratch_device(16);
        let config = sweep_config(&dev, 2, 9, 3);
        let mut samples = Vec::new();

        let scan = SweepScan::new(&config).unwrap();
        assert_eq!(scan.total_rounds(), 21);
        let report = scan.run(&mut samples).unwrap();

        assert_eq!(report.pinned_rounds, report.sweep_rounds);
        assert_eq!(report.samples, 21);
        assert_eq!(samples.len(), 21);
        for (i, sample) in samples.iter().enumerate() {
            assert_eq!(sample.sector, 2 + i as u64 / 3);
        }
    }

    #[test]
    fn test_sector_seek_mode() {
        let dev = scratch_device(8);
        let mut config = sweep_config(&dev, 0, 8, 2);
        config.sweep_seek = SweepSeek::Sector;
        let mut samples = Vec::new();

        let report = SweepScan::new(&config).unwrap().run(&mut samples).unwrap();
        assert_eq!(report.samples, 16);
    }

    #[test]
    fn test_empty_range_runs_no_rounds() {
        let dev = scratch_device(4);
        let config = sweep_config(&dev, 3, 3, 4);
        let mut samples = Vec::new();

        let report = SweepScan::new(&config).unwrap().run(&mut samples).unwrap();
        assert_eq!(report, SweepReport { samples: 0, pinned_rounds: 0, sweep_rounds: 0 });
        assert!(samples.is_empty());
    }

    #[test]
    fn test_requires_center_sector() {
        let config = BenchConfig::new("/dev/null", 0, 4, 1);
        assert!(matches!(SweepScan::new(&config), Err(BenchError::InvalidConfig(_))));
    }

    #[test]
    fn test_missing_device_does_not_deadlock() {
        let mut config = BenchConfig::new("/nonexistent/sectorprobe-dev", 0, 4, 2).with_midpoint_center();
        config.direct = false;
        let mut samples = Vec::new();

        let err = SweepScan::new(&config).unwrap().run(&mut samples).unwrap_err();
        assert_eq!(err.operation(), "open");
        assert!(samples.is_empty());
    }

    #[test]
    fn test_pinned_short_read_releases_sweeper() {
        // Center lies past the end of the device: the pinned actor's first read is short
        let dev = scratch_device(4);
        let mut config = BenchConfig::new(dev.path(), 0, 4, 2).with_center(100);
        config.direct = false;
        let mut samples = Vec::new();

        let err = SweepScan::new(&config).unwrap().run(&mut samples).unwrap_err();
        assert!(matches!(err, BenchError::ShortRead { offset: 51_200, .. }));
        assert!(samples.is_empty());
    }

    #[test]
    fn test_sweeper_short_read_releases_pinned() {
        // Sweep runs off the end of the device after four sectors
        let dev = scratch_device(4);
        let mut config = BenchConfig::new(dev.path(), 0, 8, 1).with_center(0);
        config.direct = false;
        config.sweep_seek = SweepSeek::Sector;
        let mut samples = Vec::new();

        let err = SweepScan::new(&config).unwrap().run(&mut samples).unwrap_err();
        assert!(matches!(err, BenchError::ShortRead { offset: 2048, .. }));
        assert_eq!(samples.len(), 4);
    }

    struct FailingSink {
        accepted: usize,
        limit: usize,
    }

    impl SampleSink for FailingSink {
        fn emit(&mut self, _sample: Sample) -> Result<(), BenchError> {
            if self.accepted == self.limit {
                return Err(BenchError::Output(std::io::Error::from_raw_os_error(libc::EPIPE)));
            }
            self.accepted += 1;
            Ok(())
        }
    }

    #[test]
    fn test_sink_failure_releases_pinned() {
        let dev = scratch_device(16);
        let config = sweep_config(&dev, 0, 16, 4);
        let mut sink = FailingSink { accepted: 0, limit: 5 };

        let err = SweepScan::new(&config).unwrap().run(&mut sink).unwrap_err();
        assert_eq!(err.operation(), "write");
        assert_eq!(sink.accepted, 5);
    }

    #[test]
    fn test_primary_error_prefers_cause() {
        let broken = || BenchError::Barrier(BarrierError::Broken);
        let cause = || BenchError::ShortRead { offset: 0, expected: 512, got: 0 };

        assert!(matches!(primary_error(broken(), cause()), BenchError::ShortRead { .. }));
        assert!(matches!(primary_error(cause(), broken()), BenchError::ShortRead { .. }));
    }

    #[test]
    fn test_guard_breaks_barrier_on_error() {
        let barrier = Barrier::new(2).unwrap();
        let result: Result<(), BenchError> =
            guarded(&barrier, || Err(BenchError::InvalidConfig("boom".into())));

        assert!(result.is_err());
        assert!(barrier.is_broken());
    }

    #[test]
    fn test_guard_leaves_barrier_on_success() {
        let barrier = Barrier::new(2).unwrap();
        assert_eq!(guarded(&barrier, || Ok(7)).unwrap(), 7);
        assert!(!barrier.is_broken());
    }
}
