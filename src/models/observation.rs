//! Observation (sensor) models
//!
//! Describes how sensor measurements relate to the CTRV state.

use nalgebra::{RealField, SVector};
use num_traits::Float;

use crate::filters::sigma::{SigmaPoints, SigmaWeights};
use crate::types::angle::{circular_mean, normalize_angle};
use crate::types::measurement::SensorKind;
use crate::types::spaces::{index, Measurement, MeasurementCovariance, StateVector, N_X};

/// Trait for (possibly nonlinear) measurement models with additive noise.
///
/// Describes the measurement process:
/// z = h(x) + v
///
/// where v is zero-mean Gaussian measurement noise with covariance R.
pub trait MeasurementModel<T: RealField + Float + Copy, const M: usize> {
    /// Sensor this model describes.
    const SENSOR: SensorKind;

    /// Maps a state into measurement space.
    fn observe(&self, state: &StateVector<T, N_X>) -> Measurement<T, M>;

    /// Returns the measurement noise covariance R.
    fn measurement_noise(&self) -> MeasurementCovariance<T, M>;

    /// Wraps the angular components of a measurement-space difference.
    ///
    /// Applied to every deviation and to the innovation. The default is a
    /// no-op for models without angular components.
    #[inline]
    fn normalize_residual(&self, residual: SVector<T, M>) -> SVector<T, M> {
        residual
    }

    /// Weighted mean of sigma points mapped into measurement space.
    ///
    /// Models with angular components override this so the mean does not
    /// collapse when the points straddle the ±π boundary.
    #[inline]
    fn predicted_mean(&self, points: &SigmaPoints<T, M>, weights: &SigmaWeights<T>) -> SVector<T, M> {
        points.weighted_mean(weights)
    }
}

// ============================================================================
// Lidar
// ============================================================================

/// Cartesian position sensor.
///
/// Observes `[px, py]` directly from the state.
#[derive(Debug, Clone)]
pub struct LidarSensor<T: RealField> {
    /// Position x noise standard deviation (m)
    pub std_px: T,
    /// Position y noise standard deviation (m)
    pub std_py: T,
}

impl<T: RealField + Float + Copy> LidarSensor<T> {
    /// Creates a new lidar sensor.
    ///
    /// # Panics
    /// Panics if either standard deviation is not strictly positive.
    pub fn new(std_px: T, std_py: T) -> Self {
        assert!(std_px > T::zero(), "Measurement noise std_px must be positive");
        assert!(std_py > T::zero(), "Measurement noise std_py must be positive");
        Self { std_px, std_py }
    }
}

impl<T: RealField + Float + Copy> MeasurementModel<T, 2> for LidarSensor<T> {
    const SENSOR: SensorKind = SensorKind::Lidar;

    fn observe(&self, state: &StateVector<T, N_X>) -> Measurement<T, 2> {
        Measurement::from_array([*state.index(index::PX), *state.index(index::PY)])
    }

    fn measurement_noise(&self) -> MeasurementCovariance<T, 2> {
        MeasurementCovariance::from_diagonal(&nalgebra::vector![
            self.std_px * self.std_px,
            self.std_py * self.std_py
        ])
    }
}

// ============================================================================
// Radar
// ============================================================================

/// Polar sensor at the origin measuring `[range, bearing, range_rate]`.
///
/// Range rate divides by the range; ranges below `min_range` are clamped to
/// `min_range` before the division. Near the origin the numerator vanishes
/// as well, so the clamped range rate goes smoothly to zero.
#[derive(Debug, Clone)]
pub struct RadarSensor<T: RealField> {
    /// Range noise standard deviation (m)
    pub std_range: T,
    /// Bearing noise standard deviation (rad)
    pub std_bearing: T,
    /// Range rate noise standard deviation (m/s)
    pub std_range_rate: T,
    /// Floor applied to the range before computing range rate (m)
    pub min_range: T,
}

impl<T: RealField + Float + Copy> RadarSensor<T> {
    /// Creates a new radar sensor.
    ///
    /// # Panics
    /// Panics if any standard deviation or `min_range` is not strictly positive.
    pub fn new(std_range: T, std_bearing: T, std_range_rate: T, min_range: T) -> Self {
        assert!(std_range > T::zero(), "Range noise std_range must be positive");
        assert!(std_bearing > T::zero(), "Bearing noise std_bearing must be positive");
        assert!(
            std_range_rate > T::zero(),
            "Range rate noise std_range_rate must be positive"
        );
        assert!(min_range > T::zero(), "min_range must be positive");
        Self {
            std_range,
            std_bearing,
            std_range_rate,
            min_range,
        }
    }
}

impl<T: RealField + Float + Copy> MeasurementModel<T, 3> for RadarSensor<T> {
    const SENSOR: SensorKind = SensorKind::Radar;

    fn observe(&self, state: &StateVector<T, N_X>) -> Measurement<T, 3> {
        let px = *state.index(index::PX);
        let py = *state.index(index::PY);
        let v = *state.index(index::V);
        let yaw = *state.index(index::YAW);

        let vx = v * Float::cos(yaw);
        let vy = v * Float::sin(yaw);

        let range = Float::sqrt(px * px + py * py);
        let bearing = Float::atan2(py, px);
        let range_rate = (px * vx + py * vy) / Float::max(range, self.min_range);

        Measurement::from_array([range, bearing, range_rate])
    }

    fn measurement_noise(&self) -> MeasurementCovariance<T, 3> {
        MeasurementCovariance::from_diagonal(&nalgebra::vector![
            self.std_range * self.std_range,
            self.std_bearing * self.std_bearing,
            self.std_range_rate * self.std_range_rate
        ])
    }

    #[inline]
    fn normalize_residual(&self, mut residual: SVector<T, 3>) -> SVector<T, 3> {
        residual[1] = normalize_angle(residual[1]);
        residual
    }

    fn predicted_mean(&self, points: &SigmaPoints<T, 3>, weights: &SigmaWeights<T>) -> SVector<T, 3> {
        let mut mean = points.weighted_mean(weights);
        let bearings = points.as_matrix().row(1);
        mean[1] = circular_mean(
            bearings
                .iter()
                .zip(weights.as_vector().iter())
                .map(|(&phi, &w)| (phi, w)),
        );
        mean
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::spaces::N_SIGMA;
    use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};

    #[test]
    fn test_lidar_projects_position() {
        let sensor = LidarSensor::new(0.15_f64, 0.15);
        let state = StateVector::from_array([3.0, -4.0, 2.0, 1.0, 0.1]);

        let z = sensor.observe(&state);
        assert_eq!(z.as_slice(), &[3.0, -4.0]);

        let r = sensor.measurement_noise();
        assert!((r.as_matrix()[(0, 0)] - 0.0225).abs() < 1e-12);
        assert!(r.as_matrix()[(0, 1)].abs() < 1e-12);
    }

    #[test]
    fn test_lidar_residual_untouched() {
        let sensor = LidarSensor::new(0.15_f64, 0.15);
        let residual = nalgebra::vector![10.0, -10.0];
        assert_eq!(sensor.normalize_residual(residual), residual);
    }

    #[test]
    fn test_radar_observation() {
        let sensor = RadarSensor::new(0.3_f64, 0.03, 0.3, 1e-4);
        // At (3, 4) moving radially outward at 5 m/s
        let heading = (4.0_f64).atan2(3.0);
        let state = StateVector::from_array([3.0, 4.0, 5.0, heading, 0.0]);

        let z = sensor.observe(&state);
        assert!((z.index(0) - 5.0).abs() < 1e-12);
        assert!((z.index(1) - heading).abs() < 1e-12);
        assert!((z.index(2) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_radar_tangential_motion_has_zero_range_rate() {
        let sensor = RadarSensor::new(0.3_f64, 0.03, 0.3, 1e-4);
        let state = StateVector::from_array([0.0, 2.0, 3.0, 0.0, 0.0]);

        let z = sensor.observe(&state);
        assert!((z.index(1) - FRAC_PI_2).abs() < 1e-12);
        assert!(z.index(2).abs() < 1e-12);
    }

    #[test]
    fn test_radar_zero_range_is_finite() {
        let sensor = RadarSensor::new(0.3_f64, 0.03, 0.3, 1e-4);
        let state = StateVector::from_array([0.0, 0.0, 3.0, FRAC_PI_4, 0.0]);

        let z = sensor.observe(&state);
        assert!(z.is_finite());
        assert!(z.index(0).abs() < 1e-12);
        assert!(z.index(2).abs() < 1e-12);
    }

    #[test]
    fn test_radar_residual_bearing_wrapped() {
        let sensor = RadarSensor::new(0.3_f64, 0.03, 0.3, 1e-4);
        let residual = sensor.normalize_residual(nalgebra::vector![1.0, 2.0 * PI - 0.1, 7.0]);

        assert!((residual[0] - 1.0).abs() < 1e-12);
        assert!((residual[1] + 0.1).abs() < 1e-12);
        assert!((residual[2] - 7.0).abs() < 1e-12);
    }

    #[test]
    fn test_radar_noise_diagonal() {
        let sensor = RadarSensor::new(0.3_f64, 0.03, 0.3, 1e-4);
        let r = sensor.measurement_noise();
        assert!((r.as_matrix()[(1, 1)] - 0.0009).abs() < 1e-12);
        assert!((r.trace() - (0.09 + 0.0009 + 0.09)).abs() < 1e-12);
        assert_eq!(<RadarSensor<f64> as MeasurementModel<f64, 3>>::SENSOR, SensorKind::Radar);
    }

    #[test]
    fn test_radar_mean_bearing_straddling_pi() {
        let sensor = RadarSensor::new(0.3_f64, 0.03, 0.3, 1e-4);
        let weights = SigmaWeights::<f64>::standard();

        // Object on the negative x-axis, half the points just above the
        // axis, half just below
        let mut points = nalgebra::SMatrix::<f64, 3, N_SIGMA>::zeros();
        for i in 0..N_SIGMA {
            let offset = match i {
                0 => 0.0,
                i if i % 2 == 0 => 0.01,
                _ => -0.01,
            };
            let state = StateVector::from_array([-10.0, 10.0 * offset, 0.0, 0.0, 0.0]);
            points.set_column(i, sensor.observe(&state).as_svector());
        }
        let points = SigmaPoints::from_matrix(points);

        let naive = points.weighted_mean(&weights);
        let mean = sensor.predicted_mean(&points, &weights);

        assert!((mean[1].abs() - PI).abs() < 0.01, "bearing {}", mean[1]);
        assert!((naive[1].abs() - PI).abs() > 0.5, "naive bearing {}", naive[1]);
        assert!((mean[0] - naive[0]).abs() < 1e-12);
    }

    #[test]
    fn test_lidar_mean_is_weighted_sum() {
        let sensor = LidarSensor::new(0.15_f64, 0.15);
        let weights = SigmaWeights::<f64>::standard();
        let points =
            SigmaPoints::from_matrix(nalgebra::SMatrix::<f64, 2, N_SIGMA>::from_fn(|r, c| (r + c) as f64));
        assert_eq!(sensor.predicted_mean(&points, &weights), points.weighted_mean(&weights));
    }
}
