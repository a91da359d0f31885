//! Command-line front end
//!
//! Runs the filter over a measurement log and writes one estimate per
//! measurement.

use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use clap::Parser;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use ukf_fusion::prelude::*;
use ukf_fusion::utils::{load_records, rmse, write_rows, NisTracker, OutputRow};

/// Lidar/radar fusion with an Unscented Kalman Filter
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Measurement log to read
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// File to write estimates to
    #[arg(value_name = "OUTPUT")]
    output: PathBuf,

    /// TOML file overriding the default filter parameters
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Ignore lidar measurements
    #[arg(long, default_value_t = false)]
    no_lidar: bool,

    /// Ignore radar measurements
    #[arg(long, default_value_t = false)]
    no_radar: bool,

    /// Verbose logging (DEBUG level)
    #[arg(long, short, default_value_t = false)]
    verbose: bool,
}

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = match &cli.config {
        Some(path) => {
            info!("Loading configuration from {}", path.display());
            UkfConfig::<f64>::load(path)?
        }
        None => UkfConfig::default(),
    };
    if cli.no_lidar {
        config.use_lidar = false;
    }
    if cli.no_radar {
        config.use_radar = false;
    }

    let mut filter = UnscentedKalmanFilter::new(config)?;

    let records = load_records(&cli.input)?;
    info!("Read {} measurements from {}", records.len(), cli.input.display());

    let mut rows = Vec::with_capacity(records.len());
    let mut estimates = Vec::new();
    let mut ground_truth = Vec::new();
    let mut nis = NisTracker::new();
    let mut rejected = 0usize;

    for record in &records {
        let package = &record.package;
        match filter.process_measurement(package) {
            Ok(StepOutcome::Skipped { .. }) => continue,
            Ok(StepOutcome::Initialized) => {}
            Ok(StepOutcome::Corrected { sensor, nis: value }) => nis.record(sensor, value),
            Err(e) => {
                // the filter keeps its last belief; carry on with the next record
                warn!("Skipping measurement at {}us: {}", package.timestamp_us, e);
                rejected += 1;
                continue;
            }
        }

        let Some(estimate) = filter.estimate() else {
            continue;
        };
        if let Some(gt) = record.ground_truth {
            estimates.push(estimate.kinematics());
            ground_truth.push(gt);
        }
        rows.push(OutputRow::new(
            estimate,
            package,
            filter.nis(package.sensor()),
            record.ground_truth,
        ));
    }

    let writer = BufWriter::new(File::create(&cli.output)?);
    write_rows(writer, &rows)?;
    info!("Wrote {} estimates to {}", rows.len(), cli.output.display());
    if rejected > 0 {
        warn!("{} measurements rejected", rejected);
    }

    if estimates.is_empty() {
        debug!("No ground truth in input, skipping RMSE");
    } else {
        let r = rmse(&estimates, &ground_truth)?;
        info!(
            "RMSE px={:.4} py={:.4} vx={:.4} vy={:.4}",
            r.px, r.py, r.vx, r.vy
        );
    }

    for sensor in [SensorKind::Lidar, SensorKind::Radar] {
        let summary = nis.summary(sensor);
        if summary.samples > 0 {
            info!(
                "NIS {}: {}/{} above {:.3} ({:.1}%)",
                sensor,
                summary.exceeded,
                summary.samples,
                summary.threshold,
                100.0 * summary.fraction_exceeded()
            );
        }
    }

    Ok(())
}

/// Initialize logging subsystem
///
/// `RUST_LOG` wins when set; otherwise INFO, or DEBUG with `--verbose`.
fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_level(true)
        .init();

    if verbose {
        debug!("Verbose logging enabled (DEBUG level)");
    }
}
