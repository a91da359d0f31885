//! Transition (motion) model for target dynamics
//!
//! Constant turn rate and velocity (CTRV), driven by two white-noise
//! accelerations that enter through the augmented state.

use nalgebra::RealField;
use num_traits::Float;

use crate::types::spaces::{index, AugmentedVector, StateVector, N_AUG, N_X};

/// Below this magnitude (rad/s) the yaw rate is treated as zero and the
/// straight-line kinematics are used.
pub const YAW_RATE_EPSILON: f64 = 1e-3;

/// Constant turn rate and velocity model.
///
/// State: `[px, py, v, yaw, yaw_rate]`. Augmented state appends the
/// longitudinal acceleration noise `nu_a` and the yaw acceleration noise
/// `nu_yawdd`.
///
/// The deterministic part of the dynamics over `Δt` is:
/// - px' = px + (v/ω)[sin(ψ + ωΔt) - sin(ψ)]
/// - py' = py + (v/ω)[cos(ψ) - cos(ψ + ωΔt)]
/// - v' = v, ψ' = ψ + ωΔt, ω' = ω
///
/// with the straight-line limit `px' = px + vΔt·cos ψ`, `py' = py + vΔt·sin ψ`
/// when `|ω|` is below [`YAW_RATE_EPSILON`].
#[derive(Debug, Clone)]
pub struct CtrvModel<T: RealField> {
    /// Longitudinal acceleration noise standard deviation (m/s²)
    pub std_a: T,
    /// Yaw acceleration noise standard deviation (rad/s²)
    pub std_yawdd: T,
}

impl<T: RealField + Float + Copy> CtrvModel<T> {
    /// Creates a new CTRV model.
    ///
    /// # Panics
    /// Panics if either standard deviation is not strictly positive.
    pub fn new(std_a: T, std_yawdd: T) -> Self {
        assert!(std_a > T::zero(), "Process noise std_a must be positive");
        assert!(std_yawdd > T::zero(), "Process noise std_yawdd must be positive");
        Self { std_a, std_yawdd }
    }

    /// Variances of the two augmented noise components `(std_a², std_yawdd²)`.
    #[inline]
    pub fn noise_variances(&self) -> (T, T) {
        (self.std_a * self.std_a, self.std_yawdd * self.std_yawdd)
    }

    /// Propagates one augmented sigma point by `dt` seconds.
    ///
    /// # Panics
    /// Panics if `dt < 0`.
    pub fn propagate(&self, point: &AugmentedVector<T, N_AUG>, dt: T) -> StateVector<T, N_X> {
        assert!(dt >= T::zero(), "Time step dt must be non-negative");

        let px = *point.index(index::PX);
        let py = *point.index(index::PY);
        let v = *point.index(index::V);
        let yaw = *point.index(index::YAW);
        let yawd = *point.index(index::YAW_RATE);
        let nu_a = *point.index(index::NU_A);
        let nu_yawdd = *point.index(index::NU_YAWDD);

        let (sin_yaw, cos_yaw) = Float::sin_cos(yaw);
        let eps: T = nalgebra::convert(YAW_RATE_EPSILON);

        let (mut px_p, mut py_p) = if Float::abs(yawd) > eps {
            let yaw_end = yaw + yawd * dt;
            (
                px + v / yawd * (Float::sin(yaw_end) - sin_yaw),
                py + v / yawd * (cos_yaw - Float::cos(yaw_end)),
            )
        } else {
            (px + v * dt * cos_yaw, py + v * dt * sin_yaw)
        };

        let mut v_p = v;
        let mut yaw_p = yaw + yawd * dt;
        let mut yawd_p = yawd;

        let half: T = nalgebra::convert(0.5);
        let half_dt2 = half * dt * dt;

        px_p = px_p + half_dt2 * cos_yaw * nu_a;
        py_p = py_p + half_dt2 * sin_yaw * nu_a;
        v_p = v_p + dt * nu_a;

        yaw_p = yaw_p + half_dt2 * nu_yawdd;
        yawd_p = yawd_p + dt * nu_yawdd;

        StateVector::from_array([px_p, py_p, v_p, yaw_p, yawd_p])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    fn augmented(state: [f64; 5], nu_a: f64, nu_yawdd: f64) -> AugmentedVector<f64, N_AUG> {
        AugmentedVector::from_array([
            state[0], state[1], state[2], state[3], state[4], nu_a, nu_yawdd,
        ])
    }

    #[test]
    fn test_straight_line() {
        let model = CtrvModel::new(1.0_f64, 0.5);
        let point = augmented([0.0, 0.0, 2.0, 0.0, 0.0], 0.0, 0.0);

        let predicted = model.propagate(&point, 0.5);

        assert!((predicted.index(0) - 1.0).abs() < 1e-12);
        assert!(predicted.index(1).abs() < 1e-12);
        assert!((predicted.index(2) - 2.0).abs() < 1e-12);
        assert!(predicted.index(3).abs() < 1e-12);
    }

    #[test]
    fn test_straight_line_along_heading() {
        let model = CtrvModel::new(1.0_f64, 0.5);
        let point = augmented([1.0, 1.0, 3.0, FRAC_PI_2, 0.0], 0.0, 0.0);

        let predicted = model.propagate(&point, 2.0);

        assert!((predicted.index(0) - 1.0).abs() < 1e-12);
        assert!((predicted.index(1) - 7.0).abs() < 1e-12);
    }

    #[test]
    fn test_quarter_turn() {
        // v = 10, ω = π/2: a quarter circle of radius 10/(π/2)
        let model = CtrvModel::new(1.0_f64, 0.5);
        let point = augmented([0.0, 0.0, 10.0, 0.0, FRAC_PI_2], 0.0, 0.0);

        let predicted = model.propagate(&point, 1.0);
        let r = 10.0 / FRAC_PI_2;

        assert!((predicted.index(0) - r).abs() < 1e-9, "x: {}", predicted.index(0));
        assert!((predicted.index(1) - r).abs() < 1e-9, "y: {}", predicted.index(1));
        assert!((predicted.index(3) - FRAC_PI_2).abs() < 1e-12);
        assert!((predicted.index(4) - FRAC_PI_2).abs() < 1e-12);
    }

    #[test]
    fn test_turn_limit_is_continuous() {
        // Just above and just below the threshold should agree closely
        let model = CtrvModel::new(1.0_f64, 0.5);
        let above = model.propagate(&augmented([0.0, 0.0, 5.0, 0.3, 1.01e-3], 0.0, 0.0), 0.1);
        let below = model.propagate(&augmented([0.0, 0.0, 5.0, 0.3, 0.99e-3], 0.0, 0.0), 0.1);

        assert!((above.index(0) - below.index(0)).abs() < 1e-4);
        assert!((above.index(1) - below.index(1)).abs() < 1e-4);
    }

    #[test]
    fn test_noise_contributions() {
        let model = CtrvModel::new(1.0_f64, 0.5);
        let dt = 0.2;
        let point = augmented([0.0, 0.0, 0.0, 0.0, 0.0], 2.0, 3.0);

        let predicted = model.propagate(&point, dt);

        assert!((predicted.index(0) - 0.5 * dt * dt * 2.0).abs() < 1e-12);
        assert!(predicted.index(1).abs() < 1e-12);
        assert!((predicted.index(2) - dt * 2.0).abs() < 1e-12);
        assert!((predicted.index(3) - 0.5 * dt * dt * 3.0).abs() < 1e-12);
        assert!((predicted.index(4) - dt * 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_zero_dt_is_identity() {
        let model = CtrvModel::new(1.0_f64, 0.5);
        let point = augmented([3.0, -1.0, 4.0, 1.0, 0.7], 0.4, -0.2);

        let predicted = model.propagate(&point, 0.0);

        for i in 0..N_X {
            assert!((predicted.index(i) - point.index(i)).abs() < 1e-12);
        }
    }

    #[test]
    fn test_noise_variances() {
        let model = CtrvModel::new(2.0_f64, 0.5);
        assert_eq!(model.noise_variances(), (4.0, 0.25));
    }

    #[test]
    #[should_panic(expected = "std_a must be positive")]
    fn test_rejects_non_positive_noise() {
        let _ = CtrvModel::new(0.0_f64, 0.5);
    }
}
