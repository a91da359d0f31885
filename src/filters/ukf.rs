//! Unscented Kalman Filter for lidar/radar fusion over a CTRV model
//!
//! The filter owns a single track. Each measurement runs one full cycle:
//! predict from the last belief to the measurement time through augmented
//! sigma points, then correct with the sensor that produced the reading.
//!
//! # Cycle
//!
//! 1. First usable measurement initializes the belief, no prediction
//! 2. Augment the belief with the process noise and draw sigma points
//! 3. Propagate every point through the CTRV model, recover the prior
//! 4. Map the predicted points into the sensor's space, recover ẑ and S
//! 5. Correct through the cross-covariance gain, record NIS
//!
//! Candidate results are computed into locals and only committed once the
//! whole cycle has succeeded, so an error never leaves a half-updated belief.
//!
//! # Example
//!
//! ```
//! use ukf_fusion::prelude::*;
//!
//! let mut filter = UnscentedKalmanFilter::<f64>::new(UkfConfig::default()).unwrap();
//!
//! let outcome = filter.process_measurement(&MeasurementPackage::lidar(0, 1.0, 1.0)).unwrap();
//! assert_eq!(outcome, StepOutcome::Initialized);
//!
//! let outcome = filter
//!     .process_measurement(&MeasurementPackage::radar(50_000, 1.45, 0.78, 0.5))
//!     .unwrap();
//! assert!(matches!(outcome, StepOutcome::Corrected { sensor: SensorKind::Radar, .. }));
//! ```

use nalgebra::RealField;
use num_traits::Float;
use tracing::{debug, trace, warn};

use super::correction::{correct, Correction};
use super::sigma::{normalize_yaw_residual, SigmaPoints, SigmaWeights};
use crate::config::UkfConfig;
use crate::models::{CtrvModel, LidarSensor, MeasurementModel, RadarSensor};
use crate::types::belief::{Belief, Estimate};
use crate::types::measurement::{MeasurementPackage, SensorKind, SensorReading};
use crate::types::spaces::{
    AugmentedVector, Measurement, StateCovariance, StateVector, N_X,
};
use crate::{FusionError, Result};

/// Upper bound on prediction sub-steps per cycle; longer gaps use
/// proportionally longer steps.
pub const MAX_PREDICTION_SUBSTEPS: usize = 1_000;

/// What a call to [`UnscentedKalmanFilter::process_measurement`] did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StepOutcome<T> {
    /// The measurement seeded the belief
    Initialized,
    /// Predict and correct ran; carries the measurement's NIS
    Corrected { sensor: SensorKind, nis: T },
    /// The sensor is disabled; nothing changed
    Skipped { sensor: SensorKind },
}

/// Prior produced by the prediction step.
#[derive(Debug, Clone)]
struct Prediction<T: RealField> {
    mean: StateVector<T, N_X>,
    covariance: StateCovariance<T, N_X>,
    sigma_points: SigmaPoints<T, N_X>,
}

/// Single-track Unscented Kalman Filter.
#[derive(Debug, Clone)]
pub struct UnscentedKalmanFilter<T: RealField> {
    config: UkfConfig<T>,
    motion: CtrvModel<T>,
    lidar: LidarSensor<T>,
    radar: RadarSensor<T>,
    weights: SigmaWeights<T>,
    belief: Option<Belief<T>>,
    /// Sigma points of the most recent prediction
    predicted: Option<SigmaPoints<T, N_X>>,
    /// Set by [`Self::predict`], cleared once a correction consumes it
    prediction_pending: bool,
    nis_lidar: Option<T>,
    nis_radar: Option<T>,
}

impl<T: RealField + Float + Copy> UnscentedKalmanFilter<T> {
    /// Creates an uninitialized filter.
    ///
    /// # Errors
    /// [`FusionError::InvalidConfig`] if the configuration fails validation.
    pub fn new(config: UkfConfig<T>) -> Result<Self> {
        config.validate()?;
        let weights = SigmaWeights::new(config.lambda)?;

        Ok(Self {
            motion: config.motion_model(),
            lidar: config.lidar_sensor(),
            radar: config.radar_sensor(),
            weights,
            config,
            belief: None,
            predicted: None,
            prediction_pending: false,
            nis_lidar: None,
            nis_radar: None,
        })
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    #[inline]
    pub fn config(&self) -> &UkfConfig<T> {
        &self.config
    }

    #[inline]
    pub fn weights(&self) -> &SigmaWeights<T> {
        &self.weights
    }

    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.belief.is_some()
    }

    /// Current belief, `None` until the first usable measurement.
    #[inline]
    pub fn belief(&self) -> Option<&Belief<T>> {
        self.belief.as_ref()
    }

    #[inline]
    pub fn state(&self) -> Option<&StateVector<T, N_X>> {
        self.belief.as_ref().map(|b| &b.mean)
    }

    #[inline]
    pub fn covariance(&self) -> Option<&StateCovariance<T, N_X>> {
        self.belief.as_ref().map(|b| &b.covariance)
    }

    /// Timestamp of the last committed belief, in microseconds.
    #[inline]
    pub fn last_update_us(&self) -> Option<i64> {
        self.belief.as_ref().map(|b| b.timestamp_us)
    }

    /// Snapshot of the current estimate.
    #[inline]
    pub fn estimate(&self) -> Option<Estimate<T>> {
        self.belief.as_ref().map(Belief::estimate)
    }

    /// Sigma points of the most recent prediction.
    #[inline]
    pub fn predicted_sigma_points(&self) -> Option<&SigmaPoints<T, N_X>> {
        self.predicted.as_ref()
    }

    /// NIS of the last correction made with `sensor`.
    #[inline]
    pub fn nis(&self, sensor: SensorKind) -> Option<T> {
        match sensor {
            SensorKind::Lidar => self.nis_lidar,
            SensorKind::Radar => self.nis_radar,
        }
    }

    #[inline]
    pub fn nis_lidar(&self) -> Option<T> {
        self.nis_lidar
    }

    #[inline]
    pub fn nis_radar(&self) -> Option<T> {
        self.nis_radar
    }

    /// Whether measurements from `sensor` are processed.
    #[inline]
    pub fn sensor_enabled(&self, sensor: SensorKind) -> bool {
        match sensor {
            SensorKind::Lidar => self.config.use_lidar,
            SensorKind::Radar => self.config.use_radar,
        }
    }

    /// Drops the track; the next usable measurement re-initializes.
    pub fn reset(&mut self) {
        debug!("filter reset");
        self.belief = None;
        self.predicted = None;
        self.prediction_pending = false;
        self.nis_lidar = None;
        self.nis_radar = None;
    }

    // ------------------------------------------------------------------
    // Full cycle
    // ------------------------------------------------------------------

    /// Runs one predict/correct cycle for a measurement.
    ///
    /// # Errors
    /// - [`FusionError::InvalidMeasurement`] if the reading is not finite
    /// - [`FusionError::OutOfOrder`] if the timestamp precedes the belief
    /// - [`FusionError::TimeGapOverflow`] if the gap overflows an `i64`
    /// - [`FusionError::NotPositiveDefinite`], [`FusionError::SingularMatrix`]
    ///   or [`FusionError::NumericalInstability`] if the numerics break down
    ///
    /// On error the belief, NIS values and timestamp are left untouched.
    pub fn process_measurement(&mut self, package: &MeasurementPackage<T>) -> Result<StepOutcome<T>> {
        let sensor = package.sensor();

        if !self.sensor_enabled(sensor) {
            trace!(%sensor, timestamp_us = package.timestamp_us, "sensor disabled, skipping");
            return Ok(StepOutcome::Skipped { sensor });
        }

        if !package.reading.is_finite() {
            warn!(%sensor, timestamp_us = package.timestamp_us, "rejecting non-finite measurement");
            return Err(FusionError::InvalidMeasurement {
                sensor,
                timestamp_us: package.timestamp_us,
            });
        }

        if self.belief.is_none() {
            self.initialize(package);
            return Ok(StepOutcome::Initialized);
        }

        let (prediction, correction) = match self.run_cycle(package) {
            Ok(result) => result,
            Err(e) => {
                warn!(%sensor, timestamp_us = package.timestamp_us, error = %e, "cycle failed, belief unchanged");
                return Err(e);
            }
        };

        let nis = correction.nis;
        let belief = Belief::new(correction.mean, correction.covariance, package.timestamp_us);
        trace!(
            %sensor,
            timestamp_us = package.timestamp_us,
            nis = ?nis,
            uncertainty = ?belief.uncertainty(),
            "measurement fused"
        );

        self.belief = Some(belief);
        self.predicted = Some(prediction.sigma_points);
        self.prediction_pending = false;
        self.record_nis(sensor, nis);

        Ok(StepOutcome::Corrected { sensor, nis })
    }

    /// Predict then correct, without touching `self`.
    fn run_cycle(&self, package: &MeasurementPackage<T>) -> Result<(Prediction<T>, CycleCorrection<T>)> {
        let belief = self.belief.as_ref().ok_or(FusionError::NotInitialized)?;
        let dt = self.elapsed(belief, package.timestamp_us)?;
        trace!(sensor = %package.sensor(), delta_t = ?dt, "predicting");
        let prediction = self.predict_belief(belief, dt)?;

        let correction = match package.reading {
            SensorReading::Lidar { px, py } => CycleCorrection::from(self.correct_prediction(
                &prediction,
                &self.lidar,
                &Measurement::from_array([px, py]),
            )?),
            SensorReading::Radar {
                range,
                bearing,
                range_rate,
            } => CycleCorrection::from(self.correct_prediction(
                &prediction,
                &self.radar,
                &Measurement::from_array([range, bearing, range_rate]),
            )?),
        };

        Ok((prediction, correction))
    }

    /// Seeds the belief from a single measurement.
    ///
    /// Lidar gives position only; radar gives the position implied by range
    /// and bearing. Speed, heading and turn rate start at zero with the
    /// configured initial covariance.
    fn initialize(&mut self, package: &MeasurementPackage<T>) {
        let (px, py) = package.reading.position();
        let mean = StateVector::from_array([px, py, T::zero(), T::zero(), T::zero()]);
        let covariance = self.config.initial_covariance_matrix();

        debug!(
            sensor = %package.sensor(),
            timestamp_us = package.timestamp_us,
            px = ?px,
            py = ?py,
            "track initialized"
        );

        self.belief = Some(Belief::new(mean, covariance, package.timestamp_us));
        self.predicted = None;
        self.prediction_pending = false;
    }

    // ------------------------------------------------------------------
    // Step-level operations
    // ------------------------------------------------------------------

    /// Predicts the belief forward to `timestamp_us`.
    ///
    /// The predicted sigma points are kept for one subsequent
    /// [`Self::update_lidar`] or [`Self::update_radar`].
    pub fn predict(&mut self, timestamp_us: i64) -> Result<()> {
        let belief = self.belief.as_ref().ok_or(FusionError::NotInitialized)?;
        let dt = self.elapsed(belief, timestamp_us)?;
        let prediction = self.predict_belief(belief, dt)?;

        self.belief = Some(Belief::new(prediction.mean, prediction.covariance, timestamp_us));
        self.predicted = Some(prediction.sigma_points);
        self.prediction_pending = true;
        Ok(())
    }

    /// Corrects the predicted belief with a lidar measurement `[px, py]`.
    ///
    /// Returns the measurement's NIS.
    pub fn update_lidar(&mut self, measurement: &Measurement<T, 2>) -> Result<T> {
        let correction = self.correct_pending(&self.lidar, measurement)?;
        Ok(self.commit_correction(SensorKind::Lidar, correction.mean, correction.covariance, correction.nis))
    }

    /// Corrects the predicted belief with a radar measurement
    /// `[range, bearing, range_rate]`.
    ///
    /// Returns the measurement's NIS.
    pub fn update_radar(&mut self, measurement: &Measurement<T, 3>) -> Result<T> {
        let correction = self.correct_pending(&self.radar, measurement)?;
        Ok(self.commit_correction(SensorKind::Radar, correction.mean, correction.covariance, correction.nis))
    }

    fn correct_pending<S, const M: usize>(
        &self,
        sensor: &S,
        measurement: &Measurement<T, M>,
    ) -> Result<Correction<T, M>>
    where
        S: MeasurementModel<T, M>,
    {
        let belief = self.belief.as_ref().ok_or(FusionError::NotInitialized)?;
        let predicted = match (&self.predicted, self.prediction_pending) {
            (Some(points), true) => points,
            _ => return Err(FusionError::MissingPrediction),
        };
        if !measurement.is_finite() {
            return Err(FusionError::InvalidMeasurement {
                sensor: S::SENSOR,
                timestamp_us: belief.timestamp_us,
            });
        }

        correct(
            &belief.mean,
            &belief.covariance,
            predicted,
            &self.weights,
            sensor,
            measurement,
        )
    }

    fn commit_correction(
        &mut self,
        sensor: SensorKind,
        mean: StateVector<T, N_X>,
        covariance: StateCovariance<T, N_X>,
        nis: T,
    ) -> T {
        if let Some(belief) = self.belief.as_mut() {
            belief.mean = mean;
            belief.covariance = covariance;
        }
        self.prediction_pending = false;
        self.record_nis(sensor, nis);
        nis
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// Seconds from the belief to `timestamp_us`.
    fn elapsed(&self, belief: &Belief<T>, timestamp_us: i64) -> Result<T> {
        if timestamp_us < belief.timestamp_us {
            return Err(FusionError::OutOfOrder {
                timestamp_us,
                last_update_us: belief.timestamp_us,
            });
        }
        let micros = timestamp_us
            .checked_sub(belief.timestamp_us)
            .ok_or(FusionError::TimeGapOverflow {
                timestamp_us,
                last_update_us: belief.timestamp_us,
            })?;
        Ok(nalgebra::convert(micros as f64 * 1e-6))
    }

    /// Longest sub-step used to predict across `dt`.
    ///
    /// `max_prediction_step`, stretched so that no gap needs more than
    /// [`MAX_PREDICTION_SUBSTEPS`] steps.
    fn substep_length(&self, dt: T) -> T {
        let cap: T = nalgebra::convert(MAX_PREDICTION_SUBSTEPS as f64);
        Float::max(self.config.max_prediction_step, dt / cap)
    }

    /// Predicts `belief` forward by `dt` in sub-steps of at most
    /// [`Self::substep_length`].
    fn predict_belief(&self, belief: &Belief<T>, dt: T) -> Result<Prediction<T>> {
        let max_step = self.substep_length(dt);

        let mut step = Float::min(dt, max_step);
        let mut remaining = dt - step;
        let mut prediction = self.unscented_step(&belief.mean, &belief.covariance, step)?;
        let mut steps = 1usize;

        while remaining > T::zero() {
            // rounding may leave a sliver past the cap; fold it into the last step
            step = if steps + 1 >= MAX_PREDICTION_SUBSTEPS {
                remaining
            } else {
                Float::min(remaining, max_step)
            };
            remaining = remaining - step;
            prediction = self.unscented_step(&prediction.mean, &prediction.covariance, step)?;
            steps += 1;
        }

        if steps > 1 {
            trace!(dt = ?dt, steps, "prediction split into sub-steps");
        }
        Ok(prediction)
    }

    /// One unscented prediction through the CTRV model.
    fn unscented_step(
        &self,
        mean: &StateVector<T, N_X>,
        covariance: &StateCovariance<T, N_X>,
        dt: T,
    ) -> Result<Prediction<T>> {
        let augmented =
            SigmaPoints::augmented(mean, covariance, self.motion.noise_variances(), &self.weights)?;

        let sigma_points = augmented.map(|point| {
            self.motion
                .propagate(&AugmentedVector::from_svector(*point), dt)
                .into_svector()
        });
        let (mean, cov) = sigma_points.mean_and_covariance(&self.weights, normalize_yaw_residual);

        let mean = StateVector::from_svector(mean).with_normalized_yaw();
        let covariance = StateCovariance::from_matrix(cov);
        if !mean.is_finite() || !covariance.is_finite() {
            return Err(FusionError::NumericalInstability);
        }

        Ok(Prediction {
            mean,
            covariance,
            sigma_points,
        })
    }

    fn correct_prediction<S, const M: usize>(
        &self,
        prediction: &Prediction<T>,
        sensor: &S,
        measurement: &Measurement<T, M>,
    ) -> Result<Correction<T, M>>
    where
        S: MeasurementModel<T, M>,
    {
        correct(
            &prediction.mean,
            &prediction.covariance,
            &prediction.sigma_points,
            &self.weights,
            sensor,
            measurement,
        )
    }

    fn record_nis(&mut self, sensor: SensorKind, nis: T) {
        match sensor {
            SensorKind::Lidar => self.nis_lidar = Some(nis),
            SensorKind::Radar => self.nis_radar = Some(nis),
        }
    }
}

/// Dimension-erased part of a [`Correction`] the filter commits.
#[derive(Debug, Clone)]
struct CycleCorrection<T: RealField> {
    mean: StateVector<T, N_X>,
    covariance: StateCovariance<T, N_X>,
    nis: T,
}

impl<T: RealField, const M: usize> From<Correction<T, M>> for CycleCorrection<T> {
    fn from(c: Correction<T, M>) -> Self {
        Self {
            mean: c.mean,
            covariance: c.covariance,
            nis: c.nis,
        }
    }
}
