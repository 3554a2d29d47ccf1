//! Configuration module
//!
//! Handles CLI argument parsing and validation. The resolved configuration
//! is a single immutable [`BenchConfig`] owned by the driver and shared
//! read-only with the engines.

pub mod cli;
pub mod validator;

use crate::device::OpenFlags;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Default sector size in bytes
pub const DEFAULT_BLOCK_SIZE: u64 = 512;

/// Default number of probes per sector
pub const DEFAULT_NUM_TRIALS: u64 = 10;

/// Complete benchmark configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenchConfig {
    /// Device (or image file) under test
    pub device: PathBuf,
    /// First sector probed
    pub min_sector: u64,
    /// One past the last sector probed
    pub max_sector: u64,
    /// Probes per sector
    #[serde(default = "default_num_trials")]
    pub num_trials: u64,
    /// Fixed sector re-read by the pinned actor; enables sweep mode
    pub center_sector: Option<u64>,
    /// Sector size in bytes, also the buffer and offset alignment
    #[serde(default = "default_block_size")]
    pub block_size: u64,
    /// Read length as a multiple of the sector size
    #[serde(default = "default_blocks_per_read")]
    pub blocks_per_read: u64,
    /// Bypass the page cache
    #[serde(default = "default_direct")]
    pub direct: bool,
    /// Where the sweeping actor seeks before each timed read
    #[serde(default)]
    pub sweep_seek: SweepSeek,
}

fn default_num_trials() -> u64 {
    DEFAULT_NUM_TRIALS
}

fn default_block_size() -> u64 {
    DEFAULT_BLOCK_SIZE
}

fn default_blocks_per_read() -> u64 {
    1
}

fn default_direct() -> bool {
    true
}

impl BenchConfig {
    /// Sequential configuration with default geometry and direct IO
    pub fn new(device: impl Into<PathBuf>, min_sector: u64, max_sector: u64, num_trials: u64) -> Self {
        Self {
            device: device.into(),
            min_sector,
            max_sector,
            num_trials,
            center_sector: None,
            block_size: DEFAULT_BLOCK_SIZE,
            blocks_per_read: default_blocks_per_read(),
            direct: default_direct(),
            sweep_seek: SweepSeek::default(),
        }
    }

    /// Switch to sweep mode around `center_sector`
    pub fn with_center(mut self, center_sector: u64) -> Self {
        self.center_sector = Some(center_sector);
        self
    }

    /// Switch to sweep mode centered on the midpoint of the range
    pub fn with_midpoint_center(self) -> Self {
        let center = self.midpoint();
        self.with_center(center)
    }

    pub fn mode(&self) -> ScanMode {
        match self.center_sector {
            Some(center_sector) => ScanMode::Sweep { center_sector },
            None => ScanMode::Sequential,
        }
    }

    /// Midpoint of `[min_sector, max_sector)`
    pub fn midpoint(&self) -> u64 {
        self.min_sector + (self.max_sector.saturating_sub(self.min_sector)) / 2
    }

    /// Number of sectors in the range
    pub fn sector_count(&self) -> u64 {
        self.max_sector.saturating_sub(self.min_sector)
    }

    /// Probes in a full run (`sector_count * num_trials`), `None` on overflow
    pub fn total_rounds(&self) -> Option<u64> {
        self.sector_count().checked_mul(self.num_trials)
    }

    /// Bytes transferred by one probe
    pub fn read_len(&self) -> usize {
        (self.block_size * self.blocks_per_read) as usize
    }

    /// Byte offset of a sector
    ///
    /// The validator guarantees this does not overflow for any sector the
    /// engines visit.
    pub fn sector_offset(&self, sector: u64) -> u64 {
        sector * self.block_size
    }

    pub fn open_flags(&self) -> OpenFlags {
        OpenFlags {
            direct: self.direct,
        }
    }
}

/// Exclusive end sector covering `bytes` of addressable space
///
/// The last sector included is the last one whose whole read of `read_len`
/// bytes ends at or before `bytes`.
pub fn end_sector_within(bytes: u64, block_size: u64, read_len: u64) -> u64 {
    if block_size == 0 || bytes < read_len {
        return 0;
    }
    (bytes - read_len) / block_size + 1
}

/// Largest exclusive end sector whose reads fit in a signed 64-bit offset
pub fn max_representable_sector(block_size: u64, read_len: u64) -> u64 {
    end_sector_within(i64::MAX as u64, block_size, read_len)
}

/// Which engine a configuration runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    Sequential,
    Sweep { center_sector: u64 },
}

impl fmt::Display for ScanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanMode::Sequential => write!(f, "sequential"),
            ScanMode::Sweep { center_sector } => write!(f, "sweep (center sector {})", center_sector),
        }
    }
}

/// Seek target of the sweeping actor
///
/// `RangeStart` re-reads the first sector of the range every round while
/// labelling the sample with the current sweep sector. It is the default
/// because existing data sets were collected that way. `Sector` reads the
/// labelled sector itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum SweepSeek {
    #[default]
    RangeStart,
    Sector,
}

impl SweepSeek {
    /// Sector the sweeping actor actually reads for the round labelled `sector`
    pub fn target_sector(self, config: &BenchConfig, sector: u64) -> u64 {
        match self {
            SweepSeek::RangeStart => config.min_sector,
            SweepSeek::Sector => sector,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BenchConfig::new("/dev/sdb", 0, 3, 2);
        assert_eq!(config.block_size, 512);
        assert_eq!(config.read_len(), 512);
        assert!(config.direct);
        assert_eq!(config.mode(), ScanMode::Sequential);
        assert_eq!(config.total_rounds(), Some(6));
    }

    #[test]
    fn test_midpoint_center() {
        let config = BenchConfig::new("/dev/sdb", 10, 15, 1).with_midpoint_center();
        assert_eq!(config.mode(), ScanMode::Sweep { center_sector: 12 });

        let empty = BenchConfig::new("/dev/sdb", 7, 7, 1).with_midpoint_center();
        assert_eq!(empty.center_sector, Some(7));
    }

    #[test]
    fn test_total_rounds_overflow() {
        let config = BenchConfig::new("/dev/sdb", 0, u64::MAX, 2);
        assert_eq!(config.total_rounds(), None);
    }

    #[test]
    fn test_end_sector_within() {
        assert_eq!(end_sector_within(3 * 512, 512, 512), 3);
        assert_eq!(end_sector_within(3 * 512 + 100, 512, 512), 3);
        // Two-block reads cannot start at the last sector
        assert_eq!(end_sector_within(3 * 512, 512, 1024), 2);
        assert_eq!(end_sector_within(100, 512, 512), 0);
    }

    #[test]
    fn test_max_representable_sector_fits_off_t() {
        let end = max_representable_sector(512, 512);
        let last_offset = (end - 1) * 512;
        assert!(last_offset + 512 <= i64::MAX as u64);
        assert!(end * 512 + 512 > i64::MAX as u64);
    }

    #[test]
    fn test_sweep_seek_target() {
        let config = BenchConfig::new("/dev/sdb", 10, 15, 1);
        assert_eq!(SweepSeek::RangeStart.target_sector(&config, 13), 10);
        assert_eq!(SweepSeek::Sector.target_sector(&config, 13), 13);
    }

    #[test]
    fn test_config_json_roundtrip_uses_defaults() {
        let json = r#"{"device":"/dev/sdb","min_sector":0,"max_sector":4,"center_sector":null}"#;
        let config: BenchConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config, BenchConfig::new("/dev/sdb", 0, 4, DEFAULT_NUM_TRIALS));
    }
}
