//! The filter's belief and reporting snapshots

use nalgebra::RealField;
use num_traits::Float;

use super::spaces::{index, StateCovariance, StateVector, N_X};

/// Gaussian belief over the CTRV state at a point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct Belief<T: RealField> {
    /// State mean `[px, py, v, yaw, yaw_rate]`
    pub mean: StateVector<T, N_X>,
    /// State covariance
    pub covariance: StateCovariance<T, N_X>,
    /// Time the belief refers to, in microseconds
    pub timestamp_us: i64,
}

impl<T: RealField + Float + Copy> Belief<T> {
    #[inline]
    pub fn new(mean: StateVector<T, N_X>, covariance: StateCovariance<T, N_X>, timestamp_us: i64) -> Self {
        Self {
            mean,
            covariance,
            timestamp_us,
        }
    }

    /// Returns true if mean and covariance contain only finite values.
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.mean.is_finite() && self.covariance.is_finite()
    }

    /// Returns the trace of the covariance matrix (sum of variances).
    #[inline]
    pub fn uncertainty(&self) -> T {
        self.covariance.trace()
    }

    /// Flattens the belief into a reporting snapshot.
    pub fn estimate(&self) -> Estimate<T> {
        let m = &self.mean;
        let v = *m.index(index::V);
        let yaw = *m.index(index::YAW);
        Estimate {
            timestamp_us: self.timestamp_us,
            px: *m.index(index::PX),
            py: *m.index(index::PY),
            v,
            yaw,
            yaw_rate: *m.index(index::YAW_RATE),
            vx: v * Float::cos(yaw),
            vy: v * Float::sin(yaw),
        }
    }
}

/// A plain copy of the current estimate, for logging and evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Estimate<T> {
    pub timestamp_us: i64,
    pub px: T,
    pub py: T,
    pub v: T,
    pub yaw: T,
    pub yaw_rate: T,
    /// `v·cos(yaw)`
    pub vx: T,
    /// `v·sin(yaw)`
    pub vy: T,
}

impl<T: Copy> Estimate<T> {
    /// Position and Cartesian velocity, comparable with ground truth.
    #[inline]
    pub fn kinematics(&self) -> Kinematics<T> {
        Kinematics {
            px: self.px,
            py: self.py,
            vx: self.vx,
            vy: self.vy,
        }
    }
}

/// Position and Cartesian velocity of an object.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Kinematics<T> {
    pub px: T,
    pub py: T,
    pub vx: T,
    pub vy: T,
}

impl<T: Copy> Kinematics<T> {
    #[inline]
    pub fn to_array(&self) -> [T; 4] {
        [self.px, self.py, self.vx, self.vy]
    }
}
