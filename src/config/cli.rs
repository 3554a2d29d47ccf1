//! CLI argument parsing using clap

use super::{end_sector_within, max_representable_sector, BenchConfig, SweepSeek};
use clap::Parser;
use std::path::PathBuf;

/// sectorprobe - raw block device read latency at sector granularity
///
/// Prints one "sector,elapsed_ns" line per probe on stdout.
#[derive(Parser, Debug)]
#[command(name = "sectorprobe")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Device or image file to probe
    #[arg(value_name = "DEVICE")]
    pub device: PathBuf,

    /// First sector to probe
    #[arg(short = 's', long = "start", value_name = "SECTOR", default_value = "0")]
    pub min_sector: u64,

    /// Sector to stop before (exclusive); defaults to the end of the device
    #[arg(short = 'e', long = "end", value_name = "SECTOR")]
    pub max_sector: Option<u64>,

    /// Probes per sector
    #[arg(short = 'n', long = "trials", default_value = "10",
          value_parser = clap::value_parser!(u64).range(1..))]
    pub num_trials: u64,

    /// Sweep mode: re-read the midpoint of the range concurrently with each probe
    #[arg(short = 'c', long, conflicts_with = "center_sector")]
    pub center: bool,

    /// Sweep mode with an explicit pinned sector
    #[arg(long, value_name = "SECTOR")]
    pub center_sector: Option<u64>,

    /// Sector size in bytes (power of 2, at least 512)
    #[arg(short = 'b', long, default_value = "512")]
    pub block_size: u64,

    /// Read length in sectors
    #[arg(long, default_value = "1", value_parser = clap::value_parser!(u64).range(1..))]
    pub blocks_per_read: u64,

    /// Sector the sweeping actor reads each round
    #[arg(long, value_enum, default_value = "range-start")]
    pub sweep_seek: SweepSeek,

    /// Go through the page cache instead of bypassing it
    #[arg(long)]
    pub buffered: bool,

    /// Validate and print the resolved configuration without probing
    #[arg(long)]
    pub dry_run: bool,

    /// More diagnostics on stderr (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Build the benchmark configuration
    ///
    /// `capacity` is the device size in bytes when known; it bounds the
    /// default end sector so an open-ended run stops at the end of the device.
    pub fn to_config(&self, capacity: Option<u64>) -> BenchConfig {
        let read_len = self.block_size.saturating_mul(self.blocks_per_read);

        let max_sector = self.max_sector.unwrap_or_else(|| {
            let representable = max_representable_sector(self.block_size, read_len);
            match capacity {
                Some(bytes) => representable.min(end_sector_within(bytes, self.block_size, read_len)),
                None => representable,
            }
        });

        let mut config = BenchConfig::new(self.device.clone(), self.min_sector, max_sector, self.num_trials);
        config.block_size = self.block_size;
        config.blocks_per_read = self.blocks_per_read;
        config.direct = !self.buffered;
        config.sweep_seek = self.sweep_seek;

        if let Some(center) = self.center_sector {
            config = config.with_center(center);
        } else if self.center {
            config = config.with_midpoint_center();
        }

        config
    }

    /// Default log filter derived from `-v`
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}
