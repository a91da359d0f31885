//! Filter configuration
//!
//! All tunables of the filter live in [`UkfConfig`]. Every field has a
//! default, so a TOML file only needs to list the values it overrides.

use std::path::Path;

use nalgebra::RealField;
use num_traits::Float;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::models::{CtrvModel, LidarSensor, RadarSensor};
use crate::types::spaces::{StateCovariance, N_AUG, N_X};
use crate::{FusionError, Result};

/// Noise parameters, sensor switches and numerical knobs of the filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    default,
    deny_unknown_fields,
    bound(
        deserialize = "T: Deserialize<'de> + RealField + Float + Copy",
        serialize = "T: Serialize"
    )
)]
pub struct UkfConfig<T> {
    /// Process lidar measurements; when false they are skipped entirely
    pub use_lidar: bool,
    /// Process radar measurements; when false they are skipped entirely
    pub use_radar: bool,

    /// Longitudinal acceleration noise standard deviation (m/s²)
    pub std_a: T,
    /// Yaw acceleration noise standard deviation (rad/s²)
    pub std_yawdd: T,

    /// Lidar x noise standard deviation (m)
    pub std_laspx: T,
    /// Lidar y noise standard deviation (m)
    pub std_laspy: T,

    /// Radar range noise standard deviation (m)
    pub std_radr: T,
    /// Radar bearing noise standard deviation (rad)
    pub std_radphi: T,
    /// Radar range rate noise standard deviation (m/s)
    pub std_radrd: T,

    /// Sigma-point spreading parameter λ
    pub lambda: T,

    /// Diagonal of the covariance installed at initialization
    pub initial_covariance: [T; N_X],

    /// Floor on the range when computing radar range rate (m)
    pub min_range: T,

    /// Longest single prediction step (s); longer gaps are split
    pub max_prediction_step: T,
}

impl<T: RealField + Float + Copy> Default for UkfConfig<T> {
    fn default() -> Self {
        let c = |v: f64| -> T { nalgebra::convert(v) };
        Self {
            use_lidar: true,
            use_radar: true,
            std_a: c(1.5),
            std_yawdd: c(0.57),
            std_laspx: c(0.15),
            std_laspy: c(0.15),
            std_radr: c(0.3),
            std_radphi: c(0.03),
            std_radrd: c(0.3),
            lambda: c(3.0 - N_AUG as f64),
            initial_covariance: [T::one(); N_X],
            min_range: c(1e-4),
            max_prediction_step: c(0.1),
        }
    }
}

impl<T: RealField + Float + Copy> UkfConfig<T> {
    /// Checks that every parameter is usable.
    ///
    /// At least one sensor must be enabled.
    /// Standard deviations, the initial covariance diagonal, `min_range`
    /// and `max_prediction_step` must be finite and strictly positive, and
    /// `lambda + n_aug` must be strictly positive.
    pub fn validate(&self) -> Result<()> {
        if !self.use_lidar && !self.use_radar {
            return Err(FusionError::InvalidConfig(
                "at least one of use_lidar and use_radar must be enabled".into(),
            ));
        }

        let positive = [
            ("std_a", self.std_a),
            ("std_yawdd", self.std_yawdd),
            ("std_laspx", self.std_laspx),
            ("std_laspy", self.std_laspy),
            ("std_radr", self.std_radr),
            ("std_radphi", self.std_radphi),
            ("std_radrd", self.std_radrd),
            ("min_range", self.min_range),
            ("max_prediction_step", self.max_prediction_step),
        ];
        for (name, value) in positive {
            check_positive(name, value)?;
        }

        for (i, value) in self.initial_covariance.iter().enumerate() {
            check_positive(&format!("initial_covariance[{}]", i), *value)?;
        }

        let n_aug: T = nalgebra::convert(N_AUG as f64);
        if !Float::is_finite(self.lambda) || self.lambda + n_aug <= T::zero() {
            return Err(FusionError::InvalidConfig(format!(
                "lambda must be finite and greater than -{}, got {:?}",
                N_AUG, self.lambda
            )));
        }

        Ok(())
    }

    /// CTRV motion model with this configuration's process noise.
    pub fn motion_model(&self) -> CtrvModel<T> {
        CtrvModel::new(self.std_a, self.std_yawdd)
    }

    /// Lidar measurement model with this configuration's noise.
    pub fn lidar_sensor(&self) -> LidarSensor<T> {
        LidarSensor::new(self.std_laspx, self.std_laspy)
    }

    /// Radar measurement model with this configuration's noise.
    pub fn radar_sensor(&self) -> RadarSensor<T> {
        RadarSensor::new(self.std_radr, self.std_radphi, self.std_radrd, self.min_range)
    }

    /// Covariance installed when a track is initialized.
    pub fn initial_covariance_matrix(&self) -> StateCovariance<T, N_X> {
        StateCovariance::from_diagonal(&self.initial_covariance.into())
    }
}

impl<T: RealField + Float + Copy + DeserializeOwned> UkfConfig<T> {
    /// Parses and validates a configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }
}

fn check_positive<T: RealField + Float + Copy>(name: &str, value: T) -> Result<()> {
    if Float::is_finite(value) && value > T::zero() {
        Ok(())
    } else {
        Err(FusionError::InvalidConfig(format!(
            "{} must be finite and positive, got {:?}",
            name, value
        )))
    }
}
