//! Measurement log ingestion
//!
//! One measurement per line, whitespace separated:
//!
//! ```text
//! L  px  py  timestamp_us  [gt_px gt_py gt_vx gt_vy]
//! R  rho phi rho_dot timestamp_us  [gt_px gt_py gt_vx gt_vy]
//! ```
//!
//! Blank lines and lines starting with `#` are ignored.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::types::belief::Kinematics;
use crate::types::measurement::MeasurementPackage;
use crate::{FusionError, Result};

/// A parsed log line: the measurement and, if present, the ground truth.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub package: MeasurementPackage<f64>,
    pub ground_truth: Option<Kinematics<f64>>,
}

/// Parses one line. `line_no` is 1-based and only used in errors.
///
/// Returns `Ok(None)` for blank and comment lines.
pub fn parse_line(line: &str, line_no: usize) -> Result<Option<Record>> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }

    let malformed = |reason: String| FusionError::MalformedRecord {
        line: line_no,
        reason,
    };

    let mut fields = trimmed.split_whitespace();
    let tag = fields.next().unwrap_or_default();
    let rest: Vec<&str> = fields.collect();

    let values = match tag {
        "L" => 2,
        "R" => 3,
        other => return Err(malformed(format!("unknown sensor tag '{}'", other))),
    };

    // values, timestamp, optional 4 ground truth fields
    let bare = values + 1;
    if rest.len() != bare && rest.len() != bare + 4 {
        return Err(malformed(format!(
            "expected {} or {} fields after '{}', found {}",
            bare,
            bare + 4,
            tag,
            rest.len()
        )));
    }

    let number = |s: &str| -> Result<f64> {
        let v: f64 = s
            .parse()
            .map_err(|_| malformed(format!("invalid number '{}'", s)))?;
        if v.is_finite() {
            Ok(v)
        } else {
            Err(malformed(format!("non-finite value '{}'", s)))
        }
    };

    let raw = rest[..values]
        .iter()
        .map(|s| number(*s))
        .collect::<Result<Vec<_>>>()?;
    let timestamp_us: i64 = rest[values]
        .parse()
        .map_err(|_| malformed(format!("invalid timestamp '{}'", rest[values])))?;

    let package = if tag == "L" {
        MeasurementPackage::lidar(timestamp_us, raw[0], raw[1])
    } else {
        MeasurementPackage::radar(timestamp_us, raw[0], raw[1], raw[2])
    };

    let ground_truth = if rest.len() == bare + 4 {
        let gt = rest[bare..]
            .iter()
            .map(|s| number(*s))
            .collect::<Result<Vec<_>>>()?;
        Some(Kinematics {
            px: gt[0],
            py: gt[1],
            vx: gt[2],
            vy: gt[3],
        })
    } else {
        None
    };

    Ok(Some(Record {
        package,
        ground_truth,
    }))
}

/// Reads every record from `reader`, stopping at the first malformed line.
pub fn read_records<R: BufRead>(reader: R) -> Result<Vec<Record>> {
    let mut records = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        if let Some(record) = parse_line(&line?, i + 1)? {
            records.push(record);
        }
    }
    Ok(records)
}

/// Opens and reads a measurement log file.
pub fn load_records(path: impl AsRef<Path>) -> Result<Vec<Record>> {
    let file = File::open(path)?;
    read_records(BufReader::new(file))
}
