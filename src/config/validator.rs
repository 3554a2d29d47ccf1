//! Configuration validation
//!
//! Runs before any engine opens the device. Everything the engines later
//! assume without checking (offsets fit in `off_t`, round counts fit in a
//! `u64`, alignment is a power of two) is established here.

use super::*;
use crate::error::BenchError;

/// Smallest sector size accepted for direct IO
pub const MIN_BLOCK_SIZE: u64 = 512;

/// Validate complete configuration
pub fn validate_config(config: &BenchConfig) -> Result<(), BenchError> {
    validate_geometry(config)?;
    validate_range(config)?;

    if let Some(center) = config.center_sector {
        validate_sector_addressable(config, center, "center sector")?;
    }

    Ok(())
}

/// Validate sector size and read length
fn validate_geometry(config: &BenchConfig) -> Result<(), BenchError> {
    if config.block_size < MIN_BLOCK_SIZE || !config.block_size.is_power_of_two() {
        return Err(invalid(format!(
            "block_size must be a power of 2 and at least {}, got {}",
            MIN_BLOCK_SIZE, config.block_size
        )));
    }

    if config.blocks_per_read == 0 {
        return Err(invalid("blocks_per_read must be at least 1"));
    }

    let read_len = config
        .block_size
        .checked_mul(config.blocks_per_read)
        .filter(|&len| usize::try_from(len).is_ok() && len <= i64::MAX as u64)
        .ok_or_else(|| {
            invalid(format!(
                "read length {} x {} is too large",
                config.block_size, config.blocks_per_read
            ))
        })?;

    tracing::trace!(read_len, "geometry validated");
    Ok(())
}

/// Validate the sector range and trial count
fn validate_range(config: &BenchConfig) -> Result<(), BenchError> {
    if config.min_sector > config.max_sector {
        return Err(invalid(format!(
            "start sector ({}) must not exceed end sector ({})",
            config.min_sector, config.max_sector
        )));
    }

    if config.num_trials == 0 {
        return Err(invalid("num_trials must be at least 1"));
    }

    if config.total_rounds().is_none() {
        return Err(invalid(format!(
            "{} sectors x {} trials overflows the probe counter",
            config.sector_count(),
            config.num_trials
        )));
    }

    // Only the last visited sector matters; offsets grow with the sector
    if config.max_sector > config.min_sector {
        validate_sector_addressable(config, config.max_sector - 1, "end sector")?;
    }

    Ok(())
}

/// Validate that a full read starting at `sector` fits in a signed file offset
fn validate_sector_addressable(config: &BenchConfig, sector: u64, what: &str) -> Result<(), BenchError> {
    let limit = max_representable_sector(config.block_size, config.read_len() as u64);
    if sector >= limit {
        return Err(invalid(format!(
            "{} {} is beyond the largest addressable sector {}",
            what,
            sector,
            limit.saturating_sub(1)
        )));
    }
    Ok(())
}

fn invalid(message: impl Into<String>) -> BenchError {
    BenchError::InvalidConfig(message.into())
}
