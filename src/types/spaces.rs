//! Vector space markers, dimensions and typed vectors
//!
//! This module provides type-safe vectors that cannot be accidentally mixed
//! across the spaces the filter works in (state, augmented state,
//! measurement, innovation).

use ::core::marker::PhantomData;
use ::core::ops::{Add, Sub};
use nalgebra::{RealField, SMatrix, SVector, Scalar};
use num_traits::Float;

use super::angle::normalize_angle;

// ============================================================================
// Dimensions
// ============================================================================

/// State dimension: `[px, py, v, yaw, yaw_rate]`.
pub const N_X: usize = 5;

/// Augmented dimension: state plus longitudinal and yaw acceleration noise.
pub const N_AUG: usize = 7;

/// Number of sigma points in every set the filter builds.
pub const N_SIGMA: usize = 2 * N_AUG + 1;

/// Component indices of the CTRV state vector.
pub mod index {
    /// Position x (m)
    pub const PX: usize = 0;
    /// Position y (m)
    pub const PY: usize = 1;
    /// Speed magnitude (m/s)
    pub const V: usize = 2;
    /// Heading (rad)
    pub const YAW: usize = 3;
    /// Heading rate (rad/s)
    pub const YAW_RATE: usize = 4;
    /// Longitudinal acceleration noise (augmented only)
    pub const NU_A: usize = 5;
    /// Yaw acceleration noise (augmented only)
    pub const NU_YAWDD: usize = 6;
}

// ============================================================================
// Vector Space Markers
// ============================================================================

/// Marker type for state space vectors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateSpace;

/// Marker type for the noise-augmented state space
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AugmentedSpace;

/// Marker type for measurement space vectors (sensor observations)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeasurementSpace;

/// Marker type for innovation vectors (measurement - predicted measurement)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InnovationSpace;

// ============================================================================
// Typed Vector
// ============================================================================

/// A vector parameterized by scalar type, dimension, and mathematical space.
///
/// The `Space` parameter ensures that vectors from different spaces cannot
/// be accidentally mixed in operations.
#[repr(transparent)]
#[derive(Debug, Clone, PartialEq)]
pub struct Vector<T: Scalar, const N: usize, Space> {
    inner: SVector<T, N>,
    _marker: PhantomData<Space>,
}

impl<T: Scalar, const N: usize, Space> Vector<T, N, Space> {
    /// Creates a new vector from raw components.
    #[inline]
    pub fn from_array(data: [T; N]) -> Self {
        Self {
            inner: SVector::from(data),
            _marker: PhantomData,
        }
    }

    /// Creates a new vector from an nalgebra SVector.
    #[inline]
    pub fn from_svector(inner: SVector<T, N>) -> Self {
        Self {
            inner,
            _marker: PhantomData,
        }
    }

    /// Returns a reference to the underlying nalgebra vector.
    #[inline]
    pub fn as_svector(&self) -> &SVector<T, N> {
        &self.inner
    }

    /// Consumes self and returns the underlying nalgebra vector.
    #[inline]
    pub fn into_svector(self) -> SVector<T, N> {
        self.inner
    }

    /// Returns the components as a slice.
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        self.inner.as_slice()
    }

    /// Access element at index.
    ///
    /// # Panics
    /// Panics if index is out of bounds.
    #[inline]
    #[allow(clippy::should_implement_trait)]
    pub fn index(&self, index: usize) -> &T {
        &self.inner[index]
    }
}

impl<T: Scalar + Copy, const N: usize, Space: Clone> Copy for Vector<T, N, Space> {}

impl<T: RealField + Float + Copy, const N: usize, Space> Vector<T, N, Space> {
    /// Returns true if every component is finite.
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.inner.iter().all(|v| Float::is_finite(*v))
    }
}

// ============================================================================
// Type Aliases
// ============================================================================

/// A CTRV state vector.
pub type StateVector<T, const N: usize> = Vector<T, N, StateSpace>;

/// A state vector extended with process-noise components.
pub type AugmentedVector<T, const N: usize> = Vector<T, N, AugmentedSpace>;

/// A measurement vector in measurement space.
pub type Measurement<T, const M: usize> = Vector<T, M, MeasurementSpace>;

/// An innovation vector (measurement residual) in innovation space.
pub type Innovation<T, const M: usize> = Vector<T, M, InnovationSpace>;

impl<T: RealField + Float + Copy> StateVector<T, N_X> {
    /// Returns a copy with the heading wrapped into `(-π, π]`.
    #[inline]
    pub fn with_normalized_yaw(mut self) -> Self {
        self.inner[index::YAW] = normalize_angle(self.inner[index::YAW]);
        self
    }
}

// ============================================================================
// Operations: Same-Space Addition/Subtraction
// ============================================================================

impl<T: RealField + Copy, const N: usize, Space> Add for Vector<T, N, Space> {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self::Output {
        Self::from_svector(self.inner + rhs.inner)
    }
}

impl<T: RealField + Copy, const N: usize, Space> Sub for Vector<T, N, Space> {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self::Output {
        Self::from_svector(self.inner - rhs.inner)
    }
}

// ============================================================================
// Special Operation: Measurement - Measurement = Innovation
// ============================================================================

/// Trait for computing innovation (residual) from measurements.
///
/// This is a separate trait because subtracting two measurements
/// produces an innovation vector, not another measurement.
pub trait ComputeInnovation<T: RealField, const M: usize> {
    /// Computes the innovation between this measurement and a predicted measurement.
    fn innovation(self, predicted: Measurement<T, M>) -> Innovation<T, M>;
}

impl<T: RealField + Copy, const M: usize> ComputeInnovation<T, M> for Measurement<T, M> {
    #[inline]
    fn innovation(self, predicted: Measurement<T, M>) -> Innovation<T, M> {
        Innovation::from_svector(self.inner - predicted.inner)
    }
}

// ============================================================================
// Covariance Matrix
// ============================================================================

/// A covariance matrix bound to a specific vector space.
///
/// Covariance matrices are symmetric positive semi-definite matrices
/// that describe the uncertainty in a vector estimate.
#[repr(transparent)]
#[derive(Debug, Clone, PartialEq)]
pub struct Covariance<T: Scalar, const N: usize, Space> {
    inner: SMatrix<T, N, N>,
    _marker: PhantomData<Space>,
}

impl<T: Scalar, const N: usize, Space> Covariance<T, N, Space> {
    /// Creates a covariance matrix from a raw matrix.
    ///
    /// The caller should ensure the matrix is symmetric and positive semi-definite.
    #[inline]
    pub fn from_matrix(inner: SMatrix<T, N, N>) -> Self {
        Self {
            inner,
            _marker: PhantomData,
        }
    }

    /// Returns a reference to the underlying matrix.
    #[inline]
    pub fn as_matrix(&self) -> &SMatrix<T, N, N> {
        &self.inner
    }
}

impl<T: Scalar + Copy, const N: usize, Space: Clone> Copy for Covariance<T, N, Space> where
    SMatrix<T, N, N>: Copy
{
}

impl<T: RealField + Float + Copy, const N: usize, Space> Covariance<T, N, Space> {
    /// Creates an identity covariance matrix.
    #[inline]
    pub fn identity() -> Self {
        Self::from_matrix(SMatrix::identity())
    }

    /// Creates a diagonal covariance matrix.
    #[inline]
    pub fn from_diagonal(diag: &SVector<T, N>) -> Self {
        Self::from_matrix(SMatrix::from_diagonal(diag))
    }

    /// Computes the trace of the covariance matrix.
    #[inline]
    pub fn trace(&self) -> T {
        self.inner.trace()
    }

    /// Returns true if every entry is finite.
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.inner.iter().all(|v| Float::is_finite(*v))
    }

    /// Returns `(P + Pᵀ) / 2`.
    #[inline]
    pub fn symmetrized(&self) -> Self {
        let half: T = nalgebra::convert(0.5);
        Self::from_matrix((self.inner + self.inner.transpose()) * half)
    }

    /// Largest absolute difference between the matrix and its transpose.
    pub fn asymmetry(&self) -> T {
        let mut worst = T::zero();
        for i in 0..N {
            for j in (i + 1)..N {
                worst = Float::max(worst, Float::abs(self.inner[(i, j)] - self.inner[(j, i)]));
            }
        }
        worst
    }

    /// Computes the lower-triangular Cholesky factor.
    ///
    /// Returns `None` if the matrix is not positive definite.
    #[inline]
    pub fn cholesky(&self) -> Option<SMatrix<T, N, N>> {
        nalgebra::Cholesky::new(self.inner).map(|c| c.l())
    }

    /// Attempts to compute the inverse of the covariance matrix.
    #[inline]
    pub fn try_inverse(&self) -> Option<Self> {
        self.inner.try_inverse().map(Self::from_matrix)
    }
}

impl<T: RealField + Copy, const N: usize, Space> Add for Covariance<T, N, Space> {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self::Output {
        Self::from_matrix(self.inner + rhs.inner)
    }
}

impl<T: RealField + Copy, const N: usize, Space> Sub for Covariance<T, N, Space> {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self::Output {
        Self::from_matrix(self.inner - rhs.inner)
    }
}

impl<T: RealField + Float + Copy> StateCovariance<T, N_X> {
    /// Smallest eigenvalue of the symmetric part of the matrix.
    pub fn min_eigenvalue(&self) -> T {
        let eigen = nalgebra::SymmetricEigen::new(self.symmetrized().inner);
        eigen
            .eigenvalues
            .iter()
            .copied()
            .fold(<T as Float>::infinity(), Float::min)
    }
}

// ============================================================================
// Type Aliases for Covariance
// ============================================================================

/// Covariance matrix in state space.
pub type StateCovariance<T, const N: usize> = Covariance<T, N, StateSpace>;

/// Covariance matrix in the augmented state space.
pub type AugmentedCovariance<T, const N: usize> = Covariance<T, N, AugmentedSpace>;

/// Covariance matrix in measurement space.
///
/// The innovation covariance S is stored with this type as well, matching the
/// Kalman filter literature where S is considered to be in measurement space.
pub type MeasurementCovariance<T, const M: usize> = Covariance<T, M, MeasurementSpace>;
