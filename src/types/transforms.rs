//! Typed transformation matrices
//!
//! Matrices that map vectors between spaces, with type-level encoding of
//! source and target spaces. The UKF only needs the Kalman gain, which maps
//! an innovation back into a state correction.

use ::core::marker::PhantomData;
use nalgebra::{RealField, SMatrix, Scalar};

use super::spaces::{
    Covariance, Innovation, InnovationSpace, MeasurementCovariance, StateCovariance, StateSpace,
    StateVector, Vector,
};

// ============================================================================
// Transform Matrix
// ============================================================================

/// A transformation matrix that maps vectors from one space to another.
///
/// # Type Parameters
///
/// - `T`: Scalar type
/// - `ROWS`: Number of rows (dimension of target space)
/// - `COLS`: Number of columns (dimension of source space)
/// - `To`: Target space marker
/// - `From`: Source space marker
#[repr(transparent)]
#[derive(Debug, Clone, PartialEq)]
pub struct Transform<T: Scalar, const ROWS: usize, const COLS: usize, To, From> {
    inner: SMatrix<T, ROWS, COLS>,
    _marker: PhantomData<(To, From)>,
}

impl<T: Scalar, const ROWS: usize, const COLS: usize, To, From> Transform<T, ROWS, COLS, To, From> {
    /// Creates a transform from a raw matrix.
    #[inline]
    pub fn from_matrix(inner: SMatrix<T, ROWS, COLS>) -> Self {
        Self {
            inner,
            _marker: PhantomData,
        }
    }

    /// Returns a reference to the underlying matrix.
    #[inline]
    pub fn as_matrix(&self) -> &SMatrix<T, ROWS, COLS> {
        &self.inner
    }
}

impl<T: RealField + Copy, const ROWS: usize, const COLS: usize, To, From>
    Transform<T, ROWS, COLS, To, From>
{
    /// Applies the transform to a vector of the source space.
    #[inline]
    pub fn apply(&self, v: &Vector<T, COLS, From>) -> Vector<T, ROWS, To> {
        Vector::from_svector(self.inner * v.as_svector())
    }

    /// Computes `A · C · Aᵀ` for a covariance `C` of the source space.
    #[inline]
    pub fn project<CovSpace>(
        &self,
        cov: &Covariance<T, COLS, CovSpace>,
    ) -> Covariance<T, ROWS, To> {
        Covariance::from_matrix(self.inner * cov.as_matrix() * self.inner.transpose())
    }
}

// ============================================================================
// Type Aliases
// ============================================================================

/// Kalman gain: InnovationSpace -> StateSpace
pub type KalmanGain<T, const N: usize, const M: usize> =
    Transform<T, N, M, StateSpace, InnovationSpace>;

impl<T: RealField + Copy, const N: usize, const M: usize> KalmanGain<T, N, M> {
    /// Computes the unscented Kalman gain `K = T_c · S⁻¹` from the state/measurement
    /// cross-covariance and the inverted innovation covariance.
    #[inline]
    pub fn from_cross_covariance(
        cross_covariance: &SMatrix<T, N, M>,
        innovation_cov_inv: &MeasurementCovariance<T, M>,
    ) -> Self {
        Self::from_matrix(cross_covariance * innovation_cov_inv.as_matrix())
    }

    /// State correction `K · y` for an innovation `y`.
    #[inline]
    pub fn correct(&self, innovation: &Innovation<T, M>) -> StateVector<T, N> {
        self.apply(innovation)
    }

    /// Covariance reduction `K · S · Kᵀ` for the innovation covariance `S`.
    #[inline]
    pub fn covariance_reduction(
        &self,
        innovation_cov: &MeasurementCovariance<T, M>,
    ) -> StateCovariance<T, N> {
        self.project(innovation_cov)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kalman_gain_application() {
        let gain: KalmanGain<f64, 3, 2> = KalmanGain::from_matrix(nalgebra::matrix![
            0.5, 0.0;
            0.0, 0.25;
            1.0, 1.0
        ]);
        let innovation: Innovation<f64, 2> = Innovation::from_array([2.0, 4.0]);
        let correction = gain.correct(&innovation);

        assert!((correction.index(0) - 1.0).abs() < 1e-12);
        assert!((correction.index(1) - 1.0).abs() < 1e-12);
        assert!((correction.index(2) - 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_gain_from_cross_covariance() {
        let tc = nalgebra::matrix![2.0, 0.0; 0.0, 3.0];
        let s_inv: MeasurementCovariance<f64, 2> =
            MeasurementCovariance::from_matrix(nalgebra::matrix![0.5, 0.0; 0.0, 0.25]);
        let gain: KalmanGain<f64, 2, 2> = KalmanGain::from_cross_covariance(&tc, &s_inv);

        assert!((gain.as_matrix()[(0, 0)] - 1.0).abs() < 1e-12);
        assert!((gain.as_matrix()[(1, 1)] - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_covariance_reduction_is_symmetric() {
        let gain: KalmanGain<f64, 3, 2> = KalmanGain::from_matrix(nalgebra::matrix![
            0.3, 0.1;
            0.2, 0.4;
            0.0, 0.5
        ]);
        let s: MeasurementCovariance<f64, 2> =
            MeasurementCovariance::from_matrix(nalgebra::matrix![2.0, 0.3; 0.3, 1.0]);
        let reduction = gain.covariance_reduction(&s);
        let m = reduction.as_matrix();

        for i in 0..3 {
            for j in 0..3 {
                assert!((m[(i, j)] - m[(j, i)]).abs() < 1e-12);
            }
        }
    }
}
