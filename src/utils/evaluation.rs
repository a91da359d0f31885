//! Accuracy and consistency metrics
//!
//! RMSE against ground truth and the χ² check on NIS samples.

use nalgebra::RealField;
use num_traits::Float;

use crate::types::belief::Kinematics;
use crate::types::measurement::SensorKind;
use crate::{FusionError, Result};

/// Root mean squared error of `(px, py, vx, vy)`.
///
/// # Errors
/// [`FusionError::Evaluation`] if the sequences are empty or differ in length.
pub fn rmse<T: RealField + Float + Copy>(
    estimates: &[Kinematics<T>],
    ground_truth: &[Kinematics<T>],
) -> Result<Kinematics<T>> {
    if estimates.is_empty() {
        return Err(FusionError::Evaluation("no estimates to evaluate".into()));
    }
    if estimates.len() != ground_truth.len() {
        return Err(FusionError::Evaluation(format!(
            "{} estimates but {} ground truth samples",
            estimates.len(),
            ground_truth.len()
        )));
    }

    let mut sum = [T::zero(); 4];
    for (est, gt) in estimates.iter().zip(ground_truth) {
        let e = est.to_array();
        let g = gt.to_array();
        for i in 0..4 {
            let d = e[i] - g[i];
            sum[i] = sum[i] + d * d;
        }
    }

    let n: T = nalgebra::convert(estimates.len() as f64);
    let r = sum.map(|s| Float::sqrt(s / n));
    Ok(Kinematics {
        px: r[0],
        py: r[1],
        vx: r[2],
        vy: r[3],
    })
}

/// 95% quantile of the χ² distribution with `dof` degrees of freedom.
///
/// Only the dimensions a measurement model can have are tabulated.
pub fn chi_square_95(dof: usize) -> Option<f64> {
    match dof {
        1 => Some(3.841),
        2 => Some(5.991),
        3 => Some(7.815),
        4 => Some(9.488),
        5 => Some(11.070),
        _ => None,
    }
}

/// NIS consistency of one sensor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NisSummary {
    pub sensor: SensorKind,
    pub samples: usize,
    /// Samples above the 95% threshold
    pub exceeded: usize,
    pub threshold: f64,
}

impl NisSummary {
    /// Fraction of samples above the threshold, 0 when there are none.
    ///
    /// A consistent filter sits near 0.05.
    pub fn fraction_exceeded(&self) -> f64 {
        if self.samples == 0 {
            0.0
        } else {
            self.exceeded as f64 / self.samples as f64
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct NisCounter {
    samples: usize,
    exceeded: usize,
}

/// Accumulates NIS samples per sensor.
#[derive(Debug, Clone, Default)]
pub struct NisTracker {
    lidar: NisCounter,
    radar: NisCounter,
}

impl NisTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn threshold(sensor: SensorKind) -> f64 {
        // measurement dims are 2 and 3, both tabulated
        chi_square_95(sensor.measurement_dim()).unwrap_or(f64::INFINITY)
    }

    pub fn record(&mut self, sensor: SensorKind, nis: f64) {
        let exceeded = nis > Self::threshold(sensor);
        let counter = match sensor {
            SensorKind::Lidar => &mut self.lidar,
            SensorKind::Radar => &mut self.radar,
        };
        counter.samples += 1;
        if exceeded {
            counter.exceeded += 1;
        }
    }

    pub fn summary(&self, sensor: SensorKind) -> NisSummary {
        let counter = match sensor {
            SensorKind::Lidar => self.lidar,
            SensorKind::Radar => self.radar,
        };
        NisSummary {
            sensor,
            samples: counter.samples,
            exceeded: counter.exceeded,
            threshold: Self::threshold(sensor),
        }
    }
}
