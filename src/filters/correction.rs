//! Unscented measurement correction
//!
//! Shared by every sensor: the predicted sigma points are mapped into the
//! sensor's measurement space, the predicted measurement and its innovation
//! covariance are recovered, and the state is corrected through the
//! cross-covariance gain. Nothing here mutates filter state; the caller
//! decides whether to commit the result.

use nalgebra::RealField;
use num_traits::Float;

use super::sigma::{normalize_yaw_residual, SigmaPoints, SigmaWeights};
use crate::models::MeasurementModel;
use crate::types::spaces::{
    ComputeInnovation, Innovation, Measurement, MeasurementCovariance, StateCovariance,
    StateVector, N_X,
};
use crate::types::transforms::KalmanGain;
use crate::{FusionError, Result};

/// Predicted measurement statistics for one sensor.
#[derive(Debug, Clone)]
pub struct MeasurementPrediction<T: RealField, const M: usize> {
    /// Predicted sigma points mapped into measurement space
    pub sigma_points: SigmaPoints<T, M>,
    /// Predicted measurement mean
    pub mean: Measurement<T, M>,
    /// Innovation covariance S, including the sensor noise R
    pub innovation_covariance: MeasurementCovariance<T, M>,
}

impl<T: RealField + Float + Copy, const M: usize> MeasurementPrediction<T, M> {
    /// Maps the predicted state sigma points through `sensor`.
    pub fn new<S: MeasurementModel<T, M>>(
        sensor: &S,
        predicted: &SigmaPoints<T, N_X>,
        weights: &SigmaWeights<T>,
    ) -> Self {
        let sigma_points =
            predicted.map(|x| sensor.observe(&StateVector::from_svector(*x)).into_svector());
        let mean = sensor.predicted_mean(&sigma_points, weights);
        let cov = sigma_points.covariance_about(&mean, weights, |d| sensor.normalize_residual(d));

        Self {
            sigma_points,
            mean: Measurement::from_svector(mean),
            innovation_covariance: MeasurementCovariance::from_matrix(cov)
                + sensor.measurement_noise(),
        }
    }
}

/// Candidate posterior produced by a correction.
#[derive(Debug, Clone)]
pub struct Correction<T: RealField, const M: usize> {
    /// Corrected mean, heading wrapped into `(-π, π]`
    pub mean: StateVector<T, N_X>,
    /// Corrected covariance, symmetrized
    pub covariance: StateCovariance<T, N_X>,
    /// Innovation `z - ẑ` with angular components wrapped
    pub innovation: Innovation<T, M>,
    /// Normalized innovation squared `yᵀ S⁻¹ y`
    pub nis: T,
}

/// Corrects a predicted belief with one measurement.
///
/// `predicted` must be the sigma points the prior `mean`/`covariance` were
/// recovered from.
///
/// # Errors
/// - [`FusionError::SingularMatrix`] if S cannot be inverted
/// - [`FusionError::NumericalInstability`] if the candidate posterior or NIS is not finite
pub fn correct<T, S, const M: usize>(
    mean: &StateVector<T, N_X>,
    covariance: &StateCovariance<T, N_X>,
    predicted: &SigmaPoints<T, N_X>,
    weights: &SigmaWeights<T>,
    sensor: &S,
    measurement: &Measurement<T, M>,
) -> Result<Correction<T, M>>
where
    T: RealField + Float + Copy,
    S: MeasurementModel<T, M>,
{
    let prediction = MeasurementPrediction::new(sensor, predicted, weights);
    let s = &prediction.innovation_covariance;
    let s_inv = s.try_inverse().ok_or(FusionError::SingularMatrix)?;

    let cross = predicted.cross_covariance(
        mean.as_svector(),
        &prediction.sigma_points,
        prediction.mean.as_svector(),
        weights,
        normalize_yaw_residual,
        |d| sensor.normalize_residual(d),
    );
    let gain = KalmanGain::from_cross_covariance(&cross, &s_inv);

    let raw = (*measurement).innovation(prediction.mean);
    let innovation = Innovation::from_svector(sensor.normalize_residual(raw.into_svector()));

    let updated_mean = (*mean + gain.correct(&innovation)).with_normalized_yaw();
    let updated_cov = (covariance.clone() - gain.covariance_reduction(s)).symmetrized();

    let y = innovation.as_svector();
    let nis = (y.transpose() * s_inv.as_matrix() * y)[(0, 0)];

    if !updated_mean.is_finite() || !updated_cov.is_finite() || !Float::is_finite(nis) {
        return Err(FusionError::NumericalInstability);
    }

    Ok(Correction {
        mean: updated_mean,
        covariance: updated_cov,
        innovation,
        nis,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LidarSensor, RadarSensor};
    use crate::types::spaces::index;
    use std::f64::consts::PI;

    fn predicted_set(
        mean: &StateVector<f64, N_X>,
        cov: &StateCovariance<f64, N_X>,
        weights: &SigmaWeights<f64>,
    ) -> SigmaPoints<f64, N_X> {
        // Zero process noise: the state part of the augmented set is the
        // unscented sampling of (mean, cov) itself
        SigmaPoints::augmented(mean, cov, (1e-12, 1e-12), weights)
            .unwrap()
            .map(|p| p.fixed_rows::<N_X>(0).into_owned())
    }

    #[test]
    fn test_lidar_prediction_matches_linear_projection() {
        let weights = SigmaWeights::standard();
        let mean = StateVector::from_array([1.0, 2.0, 3.0, 0.5, 0.1]);
        let cov = StateCovariance::from_diagonal(&nalgebra::vector![0.4, 0.3, 1.0, 0.2, 0.1]);
        let sensor = LidarSensor::new(0.15, 0.15);

        let prediction = MeasurementPrediction::new(&sensor, &predicted_set(&mean, &cov, &weights), &weights);

        assert!((prediction.mean.index(0) - 1.0).abs() < 1e-10);
        assert!((prediction.mean.index(1) - 2.0).abs() < 1e-10);
        let s = prediction.innovation_covariance.as_matrix();
        assert!((s[(0, 0)] - (0.4 + 0.0225)).abs() < 1e-9);
        assert!((s[(1, 1)] - (0.3 + 0.0225)).abs() < 1e-9);
        assert!(s[(0, 1)].abs() < 1e-9);
    }

    #[test]
    fn test_lidar_correction_is_linear_kalman_update() {
        // Lidar is linear, so the unscented correction equals the classic one
        let weights = SigmaWeights::standard();
        let mean = StateVector::from_array([0.0, 0.0, 1.0, 0.0, 0.0]);
        let cov = StateCovariance::identity();
        let sensor = LidarSensor::new(0.5, 0.5);
        let z = Measurement::from_array([1.0, -1.0]);

        let sigma = predicted_set(&mean, &cov, &weights);
        let result = correct(&mean, &cov, &sigma, &weights, &sensor, &z).unwrap();

        // K = P Hᵀ (H P Hᵀ + R)⁻¹ = 1 / 1.25 on the position block
        let k = 1.0 / 1.25;
        assert!((result.mean.index(index::PX) - k).abs() < 1e-9);
        assert!((result.mean.index(index::PY) + k).abs() < 1e-9);
        assert!((result.mean.index(index::V) - 1.0).abs() < 1e-9);
        assert!((result.covariance.as_matrix()[(0, 0)] - (1.0 - k)).abs() < 1e-9);
        assert!((result.covariance.as_matrix()[(2, 2)] - 1.0).abs() < 1e-9);

        // NIS = yᵀ S⁻¹ y = 2 / 1.25
        assert!((result.nis - 2.0 / 1.25).abs() < 1e-9);
        assert!(result.covariance.asymmetry() == 0.0);
    }

    #[test]
    fn test_radar_bearing_innovation_wrapped() {
        // Object just across the ±π boundary from the measurement
        let weights = SigmaWeights::standard();
        let mean = StateVector::from_array([-10.0, -0.5, 0.0, 0.0, 0.0]);
        let cov = StateCovariance::from_diagonal(&nalgebra::vector![0.01, 0.01, 0.01, 0.01, 0.01]);
        let sensor = RadarSensor::new(0.3, 0.03, 0.3, 1e-4);
        let z = Measurement::from_array([10.0, PI - 0.02, 0.0]);

        let sigma = predicted_set(&mean, &cov, &weights);
        let result = correct(&mean, &cov, &sigma, &weights, &sensor, &z).unwrap();

        assert!(result.innovation.index(1).abs() < 0.1);
        assert!(result.nis < 20.0, "nis {}", result.nis);
        assert!((result.mean.index(index::PX) + 10.0).abs() < 0.5);
    }

    #[test]
    fn test_radar_prediction_straddling_pi() {
        // Bearings of the sigma points fall on both sides of ±π
        let weights = SigmaWeights::standard();
        let mean = StateVector::from_array([-10.0, 0.0, 0.0, 0.0, 0.0]);
        let cov = StateCovariance::from_diagonal(&nalgebra::vector![0.01, 0.01, 0.01, 0.01, 0.01]);
        let sensor = RadarSensor::new(0.3, 0.03, 0.3, 1e-4);

        let prediction = MeasurementPrediction::new(&sensor, &predicted_set(&mean, &cov, &weights), &weights);

        let bearing = *prediction.mean.index(1);
        assert!((bearing.abs() - PI).abs() < 1e-6, "bearing {}", bearing);
        // Bearing spread is std_py / range = 0.01, plus radar noise 0.0009
        let s_bearing = prediction.innovation_covariance.as_matrix()[(1, 1)];
        assert!((s_bearing - 0.0010).abs() < 1e-5, "S bearing {}", s_bearing);
    }

    #[test]
    fn test_radar_correction_behind_sensor_mirrors_front() {
        // A static object on the negative x-axis must be corrected the same
        // way as its mirror image on the positive x-axis
        let weights = SigmaWeights::standard();
        let cov = StateCovariance::from_diagonal(&nalgebra::vector![0.01, 0.01, 0.01, 0.01, 0.01]);
        let sensor = RadarSensor::new(0.3, 0.03, 0.3, 1e-4);

        let behind = StateVector::from_array([-5.0, 0.0, 0.0, 0.0, 0.0]);
        let front = StateVector::from_array([5.0, 0.0, 0.0, PI, 0.0]);

        let behind_result = correct(
            &behind,
            &cov,
            &predicted_set(&behind, &cov, &weights),
            &weights,
            &sensor,
            &Measurement::from_array([5.0, PI, 0.0]),
        )
        .unwrap();
        let front_result = correct(
            &front,
            &cov,
            &predicted_set(&front, &cov, &weights),
            &weights,
            &sensor,
            &Measurement::from_array([5.0, 0.0, 0.0]),
        )
        .unwrap();

        assert!(behind_result.nis < 1e-3, "nis {}", behind_result.nis);
        assert!((behind_result.nis - front_result.nis).abs() < 1e-9);
        assert!((behind_result.mean.index(index::PX) + 5.0).abs() < 1e-3);
        assert!(behind_result.mean.index(index::PY).abs() < 1e-6);
        assert!(
            (behind_result.covariance.as_matrix()[(1, 1)] - front_result.covariance.as_matrix()[(1, 1)]).abs()
                < 1e-9
        );
    }

    #[test]
    fn test_singular_innovation_covariance() {
        struct Degenerate;
        impl MeasurementModel<f64, 1> for Degenerate {
            const SENSOR: crate::types::measurement::SensorKind =
                crate::types::measurement::SensorKind::Lidar;
            fn observe(&self, _state: &StateVector<f64, N_X>) -> Measurement<f64, 1> {
                Measurement::from_array([0.0])
            }
            fn measurement_noise(&self) -> MeasurementCovariance<f64, 1> {
                MeasurementCovariance::from_matrix(nalgebra::matrix![0.0])
            }
        }

        let weights = SigmaWeights::standard();
        let mean = StateVector::from_array([0.0; N_X]);
        let cov = StateCovariance::identity();
        let sigma = predicted_set(&mean, &cov, &weights);

        let result = correct(&mean, &cov, &sigma, &weights, &Degenerate, &Measurement::from_array([1.0]));
        assert!(matches!(result, Err(FusionError::SingularMatrix)));
    }
}
