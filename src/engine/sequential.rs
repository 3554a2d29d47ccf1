//! Sequential scan engine
//!
//! A single actor walks `[min_sector, max_sector)` in ascending order and
//! probes every sector `num_trials` times before moving on. Each trial seeks
//! independently, so the trials of one sector all read the same bytes instead
//! of running on from the previous read's cursor.

use super::probe::Probe;
use super::{Sample, ScanReport};
use crate::config::validator::validate_config;
use crate::config::BenchConfig;
use crate::error::BenchError;
use crate::output::SampleSink;

/// Single-actor scan over a sector range
pub struct SequentialScan<'a> {
    config: &'a BenchConfig,
}

impl<'a> SequentialScan<'a> {
    pub fn new(config: &'a BenchConfig) -> Result<Self, BenchError> {
        validate_config(config)?;
        Ok(Self { config })
    }

    /// Probe every sector of the range, emitting each sample as it is taken
    ///
    /// The first error aborts the scan; samples already emitted stay emitted.
    pub fn run<S: SampleSink>(&self, sink: &mut S) -> Result<ScanReport, BenchError> {
        let config = self.config;
        let mut probe = Probe::open(config)?;
        let mut samples = 0u64;

        for sector in config.min_sector..config.max_sector {
            let offset = config.sector_offset(sector);
            for _trial in 0..config.num_trials {
                let elapsed_ns = probe.probe(offset)?;
                sink.emit(Sample { sector, elapsed_ns })?;
                samples += 1;
            }
        }

        probe.close()?;
        tracing::debug!(samples, "sequential scan complete");

        Ok(ScanReport { samples })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn scratch_device(sectors: usize) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&vec![0u8; sectors * 512]).unwrap();
        file.flush().unwrap();
        file
    }

    fn buffered(dev: &NamedTempFile, min: u64, max: u64, trials: u64) -> BenchConfig {
        let mut config = BenchConfig::new(dev.path(), min, max, trials);
        config.direct = false;
        config
    }

    #[test]
    fn test_three_sectors_two_trials() {
        let dev = scratch_device(3);
        let config = buffered(&dev, 0, 3, 2);
        let mut samples = Vec::new();

        let report = SequentialScan::new(&config).unwrap().run(&mut samples).unwrap();

        assert_eq!(report.samples, 6);
        let sectors: Vec<u64> = samples.iter().map(|s| s.sector).collect();
        assert_eq!(sectors, vec![0, 0, 1, 1, 2, 2]);
    }

    #[test]
    fn test_empty_range_emits_nothing() {
        let dev = scratch_device(1);
        let config = buffered(&dev, 1, 1, 5);
        let mut samples = Vec::new();

        let report = SequentialScan::new(&config).unwrap().run(&mut samples).unwrap();
        assert_eq!(report.samples, 0);
        assert!(samples.is_empty());
    }

    #[test]
    fn test_missing_device_emits_nothing() {
        let mut config = BenchConfig::new("/nonexistent/sectorprobe-dev", 0, 3, 2);
        config.direct = false;
        let mut samples = Vec::new();

        let err = SequentialScan::new(&config).unwrap().run(&mut samples).unwrap_err();
        assert_eq!(err.operation(), "open");
        assert!(samples.is_empty());
    }

    #[test]
    fn test_read_past_end_aborts_scan() {
        let dev = scratch_device(2);
        let config = buffered(&dev, 0, 4, 1);
        let mut samples = Vec::new();

        let err = SequentialScan::new(&config).unwrap().run(&mut samples).unwrap_err();
        assert!(matches!(err, BenchError::ShortRead { offset: 1024, .. }));
        assert_eq!(samples.len(), 2);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = BenchConfig::new("/dev/null", 4, 2, 1);
        assert!(matches!(
            SequentialScan::new(&config),
            Err(BenchError::InvalidConfig(_))
        ));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn prop_every_sector_sampled_num_trials_times(
            min in 0u64..8,
            len in 0u64..6,
            trials in 1u64..4,
        ) {
            let dev = scratch_device(16);
            let config = buffered(&dev, min, min + len, trials);
            let mut samples = Vec::new();

            let report = SequentialScan::new(&config).unwrap().run(&mut samples).unwrap();

            prop_assert_eq!(report.samples, len * trials);
            prop_assert_eq!(samples.len() as u64, len * trials);
            prop_assert!(samples.windows(2).all(|w| w[0].sector <= w[1].sector));
            for sector in min..min + len {
                let count = samples.iter().filter(|s| s.sector == sector).count() as u64;
                prop_assert_eq!(count, trials);
            }
        }
    }
}
