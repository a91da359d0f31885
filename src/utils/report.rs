//! Tab-separated result rows

use core::fmt;
use std::io::Write;

use crate::types::belief::{Estimate, Kinematics};
use crate::types::measurement::{MeasurementPackage, SensorKind};
use crate::Result;

/// Column names, matching [`OutputRow`]'s `Display` output.
pub const HEADER: &str = "timestamp_us\tsensor\tpx\tpy\tv\tyaw\tyaw_rate\t\
meas_px\tmeas_py\tnis\tgt_px\tgt_py\tgt_vx\tgt_vy";

/// Placeholder for absent values.
const MISSING: &str = "NA";

/// One line of filter output.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputRow {
    pub estimate: Estimate<f64>,
    pub sensor: SensorKind,
    /// Measurement position in Cartesian form
    pub measured: (f64, f64),
    /// Latest NIS of `sensor`; absent right after initialization
    pub nis: Option<f64>,
    pub ground_truth: Option<Kinematics<f64>>,
}

impl OutputRow {
    pub fn new(
        estimate: Estimate<f64>,
        package: &MeasurementPackage<f64>,
        nis: Option<f64>,
        ground_truth: Option<Kinematics<f64>>,
    ) -> Self {
        Self {
            estimate,
            sensor: package.sensor(),
            measured: package.reading.position(),
            nis,
            ground_truth,
        }
    }
}

impl fmt::Display for OutputRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let e = &self.estimate;
        write!(
            f,
            "{}\t{}\t{:.6}\t{:.6}\t{:.6}\t{:.6}\t{:.6}\t{:.6}\t{:.6}",
            e.timestamp_us,
            self.sensor,
            e.px,
            e.py,
            e.v,
            e.yaw,
            e.yaw_rate,
            self.measured.0,
            self.measured.1
        )?;

        match self.nis {
            Some(nis) => write!(f, "\t{:.6}", nis)?,
            None => write!(f, "\t{}", MISSING)?,
        }

        match &self.ground_truth {
            Some(gt) => {
                for v in gt.to_array() {
                    write!(f, "\t{:.6}", v)?;
                }
            }
            None => {
                for _ in 0..4 {
                    write!(f, "\t{}", MISSING)?;
                }
            }
        }
        Ok(())
    }
}

/// Writes the header followed by one line per row.
pub fn write_rows<W: Write>(mut writer: W, rows: &[OutputRow]) -> Result<()> {
    writeln!(writer, "{}", HEADER)?;
    for row in rows {
        writeln!(writer, "{}", row)?;
    }
    writer.flush()?;
    Ok(())
}
