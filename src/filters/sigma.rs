//! Sigma points and the unscented transform
//!
//! The filter always works with the augmented state (CTRV state plus the two
//! process-noise accelerations), so every sigma-point set has
//! `2 * N_AUG + 1` columns regardless of the dimension it lives in.
//!
//! # Sigma Point Selection
//!
//! Columns are laid out as:
//! - χ₀ = μ
//! - χᵢ = μ + √(λ + n_aug) · Lᵢ for i = 1...n_aug
//! - χᵢ₊ₙ = μ - √(λ + n_aug) · Lᵢ for i = 1...n_aug
//!
//! where L is the lower Cholesky factor of the augmented covariance. The
//! weights are w₀ = λ / (λ + n_aug) and wᵢ = 1 / (2(λ + n_aug)), used for both
//! the mean and the covariance.

use nalgebra::{RealField, SMatrix, SVector};
use num_traits::Float;

use crate::types::angle::normalize_angle;
use crate::types::spaces::{
    index, AugmentedCovariance, StateCovariance, StateVector, N_AUG, N_SIGMA, N_X,
};
use crate::{FusionError, Result};

// ============================================================================
// Weights
// ============================================================================

/// Fixed sigma-point weights, derived once from λ.
#[derive(Debug, Clone, PartialEq)]
pub struct SigmaWeights<T: RealField> {
    lambda: T,
    weights: SVector<T, N_SIGMA>,
}

impl<T: RealField + Float + Copy> SigmaWeights<T> {
    /// Creates the weight vector for spreading parameter `lambda`.
    ///
    /// Fails if `lambda + n_aug` is not strictly positive, since the spread
    /// `√(λ + n_aug)` would be undefined.
    pub fn new(lambda: T) -> Result<Self> {
        let n_aug: T = nalgebra::convert(N_AUG as f64);
        let denom = lambda + n_aug;
        if !Float::is_finite(lambda) || denom <= T::zero() {
            return Err(FusionError::InvalidConfig(format!(
                "lambda + n_aug must be positive, got lambda = {:?}",
                lambda
            )));
        }

        Ok(Self::from_valid_lambda(lambda))
    }

    /// Weights for the conventional choice λ = 3 - n_aug.
    pub fn standard() -> Self {
        let n_aug: T = nalgebra::convert(N_AUG as f64);
        let three: T = nalgebra::convert(3.0);
        Self::from_valid_lambda(three - n_aug)
    }

    /// `lambda + n_aug` must already be known to be positive.
    fn from_valid_lambda(lambda: T) -> Self {
        let n_aug: T = nalgebra::convert(N_AUG as f64);
        let denom = lambda + n_aug;
        let half: T = nalgebra::convert(0.5);
        let mut weights = SVector::from_element(half / denom);
        weights[0] = lambda / denom;
        Self { lambda, weights }
    }

    #[inline]
    pub fn lambda(&self) -> T {
        self.lambda
    }

    /// Scale applied to the covariance square root, `√(λ + n_aug)`.
    #[inline]
    pub fn spread(&self) -> T {
        let n_aug: T = nalgebra::convert(N_AUG as f64);
        Float::sqrt(self.lambda + n_aug)
    }

    #[inline]
    pub fn as_vector(&self) -> &SVector<T, N_SIGMA> {
        &self.weights
    }

    /// Weight of sigma point `i`.
    ///
    /// # Panics
    /// Panics if `i >= N_SIGMA`.
    #[inline]
    pub fn get(&self, i: usize) -> T {
        self.weights[i]
    }

    #[inline]
    pub fn sum(&self) -> T {
        self.weights.sum()
    }
}

// ============================================================================
// Residual normalization
// ============================================================================

/// Wraps the heading component of a state-like residual into `(-π, π]`.
///
/// Works for both the plain and the augmented state, which share the
/// leading component layout.
#[inline]
pub fn normalize_yaw_residual<T: RealField + Float + Copy, const D: usize>(
    mut residual: SVector<T, D>,
) -> SVector<T, D> {
    residual[index::YAW] = normalize_angle(residual[index::YAW]);
    residual
}

// ============================================================================
// Sigma Points
// ============================================================================

/// A full set of `N_SIGMA` sigma points of dimension `D`, one per column.
#[derive(Debug, Clone, PartialEq)]
pub struct SigmaPoints<T: RealField, const D: usize> {
    points: SMatrix<T, D, N_SIGMA>,
}

impl<T: RealField + Float + Copy> SigmaPoints<T, N_AUG> {
    /// Generates the augmented sigma points for a state estimate.
    ///
    /// The augmented mean is the state mean followed by two zeros; the
    /// augmented covariance is block diagonal with `P` in the top-left and
    /// `diag(std_a², std_yawdd²)` in the bottom-right.
    ///
    /// # Errors
    /// [`FusionError::NotPositiveDefinite`] if the augmented covariance has no
    /// Cholesky factor.
    pub fn augmented(
        mean: &StateVector<T, N_X>,
        covariance: &StateCovariance<T, N_X>,
        noise_variances: (T, T),
        weights: &SigmaWeights<T>,
    ) -> Result<Self> {
        let mut x_aug = SVector::<T, N_AUG>::zeros();
        x_aug.fixed_rows_mut::<N_X>(0).copy_from(mean.as_svector());

        let mut p_aug = SMatrix::<T, N_AUG, N_AUG>::zeros();
        p_aug
            .fixed_view_mut::<N_X, N_X>(0, 0)
            .copy_from(covariance.as_matrix());
        p_aug[(index::NU_A, index::NU_A)] = noise_variances.0;
        p_aug[(index::NU_YAWDD, index::NU_YAWDD)] = noise_variances.1;

        let sqrt_p = AugmentedCovariance::from_matrix(p_aug)
            .cholesky()
            .ok_or(FusionError::NotPositiveDefinite)?;
        let scaled = sqrt_p * weights.spread();

        let mut points = SMatrix::<T, N_AUG, N_SIGMA>::zeros();
        points.set_column(0, &x_aug);
        for i in 0..N_AUG {
            points.set_column(i + 1, &(x_aug + scaled.column(i)));
            points.set_column(i + 1 + N_AUG, &(x_aug - scaled.column(i)));
        }

        Ok(Self { points })
    }
}

impl<T: RealField + Float + Copy, const D: usize> SigmaPoints<T, D> {
    #[inline]
    pub fn from_matrix(points: SMatrix<T, D, N_SIGMA>) -> Self {
        Self { points }
    }

    #[inline]
    pub fn as_matrix(&self) -> &SMatrix<T, D, N_SIGMA> {
        &self.points
    }

    /// Sigma point `i` as an owned vector.
    ///
    /// # Panics
    /// Panics if `i >= N_SIGMA`.
    #[inline]
    pub fn point(&self, i: usize) -> SVector<T, D> {
        self.points.column(i).into_owned()
    }

    /// Pushes every point through `transform`, keeping the column order.
    pub fn map<const E: usize, F>(&self, transform: F) -> SigmaPoints<T, E>
    where
        F: Fn(&SVector<T, D>) -> SVector<T, E>,
    {
        let mut out = SMatrix::<T, E, N_SIGMA>::zeros();
        for i in 0..N_SIGMA {
            out.set_column(i, &transform(&self.point(i)));
        }
        SigmaPoints { points: out }
    }

    /// Weighted mean of the points.
    #[inline]
    pub fn weighted_mean(&self, weights: &SigmaWeights<T>) -> SVector<T, D> {
        self.points * weights.as_vector()
    }

    /// Recovers mean and covariance from the points.
    ///
    /// `normalize` is applied to every `point - mean` deviation before the
    /// outer product, so angular components can be wrapped.
    pub fn mean_and_covariance<F>(
        &self,
        weights: &SigmaWeights<T>,
        normalize: F,
    ) -> (SVector<T, D>, SMatrix<T, D, D>)
    where
        F: Fn(SVector<T, D>) -> SVector<T, D>,
    {
        let mean = self.weighted_mean(weights);
        let cov = self.covariance_about(&mean, weights, normalize);
        (mean, cov)
    }

    /// Weighted covariance of the points about a given `mean`.
    ///
    /// For callers whose mean is not the plain weighted sum, e.g. a circular
    /// mean over an angular component.
    pub fn covariance_about<F>(
        &self,
        mean: &SVector<T, D>,
        weights: &SigmaWeights<T>,
        normalize: F,
    ) -> SMatrix<T, D, D>
    where
        F: Fn(SVector<T, D>) -> SVector<T, D>,
    {
        let mut cov = SMatrix::<T, D, D>::zeros();
        for i in 0..N_SIGMA {
            let diff = normalize(self.point(i) - mean);
            cov += diff * diff.transpose() * weights.get(i);
        }
        cov
    }

    /// Cross-covariance between these points and a mapped set of points.
    pub fn cross_covariance<const E: usize, F, G>(
        &self,
        mean: &SVector<T, D>,
        other: &SigmaPoints<T, E>,
        other_mean: &SVector<T, E>,
        weights: &SigmaWeights<T>,
        normalize: F,
        normalize_other: G,
    ) -> SMatrix<T, D, E>
    where
        F: Fn(SVector<T, D>) -> SVector<T, D>,
        G: Fn(SVector<T, E>) -> SVector<T, E>,
    {
        let mut cross = SMatrix::<T, D, E>::zeros();
        for i in 0..N_SIGMA {
            let diff = normalize(self.point(i) - mean);
            let other_diff = normalize_other(other.point(i) - other_mean);
            cross += diff * other_diff.transpose() * weights.get(i);
        }
        cross
    }

    /// Returns true if every coordinate of every point is finite.
    pub fn is_finite(&self) -> bool {
        self.points.iter().all(|v| Float::is_finite(*v))
    }
}
