//! sectorprobe CLI entry point

use anyhow::Context;
use clap::CommandFactory;
use sectorprobe::config::cli::Cli;
use sectorprobe::config::validator::{validate_config, MIN_BLOCK_SIZE};
use sectorprobe::device::{DeviceHandle, OpenFlags};
use sectorprobe::engine;
use sectorprobe::error::BenchError;
use sectorprobe::output::SampleWriter;
use sectorprobe::util::time::{format_duration, probe_rate};
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse_args();
    init_logging(&cli);

    if let Err(err) = run(&cli) {
        report_fatal(&err);
    }
}

/// Diagnostics go to stderr; stdout carries samples only
fn init_logging(cli: &Cli) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_level()));

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn run(cli: &Cli) -> sectorprobe::Result<()> {
    let geometry = DeviceGeometry::query(cli)?;
    let config = cli.to_config(geometry.capacity);

    if let Err(err) = validate_config(&config) {
        Cli::command()
            .error(clap::error::ErrorKind::ValueValidation, err)
            .exit();
    }

    if let Some(logical) = geometry.logical_block_size {
        if config.direct && config.block_size < u64::from(logical) {
            tracing::warn!(
                block_size = config.block_size,
                logical_block_size = logical,
                "block size is smaller than the device's logical sector size, direct reads will likely fail (try -b {})",
                logical.max(MIN_BLOCK_SIZE as u32)
            );
        }
    }

    tracing::debug!(?config, capacity = ?geometry.capacity, "resolved configuration");

    if cli.dry_run {
        let json = serde_json::to_string_pretty(&config).context("Failed to serialize configuration")?;
        eprintln!("{}", json);
        eprintln!("Dry run mode - configuration validated successfully");
        return Ok(());
    }

    let mut out = SampleWriter::stdout();
    let summary = engine::run(&config, &mut out)
        .with_context(|| format!("{} test on {} failed", config.mode(), config.device.display()))?;

    tracing::info!(
        samples = summary.samples,
        elapsed = %format_duration(summary.elapsed),
        probes_per_sec = probe_rate(summary.samples, summary.elapsed),
        "Test complete"
    );

    Ok(())
}

/// What the driver learns about the device before any engine runs
struct DeviceGeometry {
    capacity: Option<u64>,
    logical_block_size: Option<u32>,
}

impl DeviceGeometry {
    /// Open the device once with the run's flags
    ///
    /// An unopenable device fails here, before any sample is written.
    fn query(cli: &Cli) -> sectorprobe::Result<Self> {
        let handle = DeviceHandle::open(&cli.device, OpenFlags { direct: !cli.buffered })
            .context("Failed to open device")?;

        let geometry = Self {
            capacity: handle.capacity(),
            logical_block_size: handle.logical_block_size(),
        };
        handle.close().context("Failed to close device after size query")?;

        Ok(geometry)
    }
}

/// Print the failure naming the failing operation and exit non-zero
///
/// The exit code is the failing syscall's errno when it fits in an exit
/// status, 1 otherwise.
fn report_fatal(err: &anyhow::Error) -> ! {
    let bench = err.chain().find_map(|cause| cause.downcast_ref::<BenchError>());

    match bench {
        Some(bench) => eprintln!("sectorprobe: {}: {:#}", bench.operation(), err),
        None => eprintln!("sectorprobe: {:#}", err),
    }

    let code = bench
        .and_then(BenchError::raw_os_error)
        .filter(|code| (1..=255).contains(code))
        .unwrap_or(1);

    std::process::exit(code)
}
