//! Common test helpers for filter integration tests

#![allow(dead_code)]

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

use ukf_fusion::prelude::*;

/// Ground truth of an object following the CTRV model exactly.
#[derive(Debug, Clone, Copy)]
pub struct CtrvTruth {
    pub px: f64,
    pub py: f64,
    pub v: f64,
    pub yaw: f64,
    pub yaw_rate: f64,
}

impl CtrvTruth {
    /// State at time `t` seconds after this one.
    pub fn at(&self, t: f64) -> CtrvTruth {
        let yaw = self.yaw + self.yaw_rate * t;
        let (px, py) = if self.yaw_rate.abs() > 1e-9 {
            let r = self.v / self.yaw_rate;
            (
                self.px + r * (yaw.sin() - self.yaw.sin()),
                self.py + r * (self.yaw.cos() - yaw.cos()),
            )
        } else {
            (
                self.px + self.v * t * self.yaw.cos(),
                self.py + self.v * t * self.yaw.sin(),
            )
        };
        CtrvTruth {
            px,
            py,
            v: self.v,
            yaw,
            yaw_rate: self.yaw_rate,
        }
    }

    pub fn kinematics(&self) -> Kinematics<f64> {
        Kinematics {
            px: self.px,
            py: self.py,
            vx: self.v * self.yaw.cos(),
            vy: self.v * self.yaw.sin(),
        }
    }

    /// Noise-free lidar reading.
    pub fn lidar(&self, timestamp_us: i64) -> MeasurementPackage<f64> {
        MeasurementPackage::lidar(timestamp_us, self.px, self.py)
    }

    /// Noise-free radar reading.
    pub fn radar(&self, timestamp_us: i64) -> MeasurementPackage<f64> {
        let range = self.px.hypot(self.py);
        let bearing = self.py.atan2(self.px);
        let k = self.kinematics();
        let range_rate = (self.px * k.vx + self.py * k.vy) / range;
        MeasurementPackage::radar(timestamp_us, range, bearing, range_rate)
    }
}

/// Seconds to microseconds, rounded.
pub fn micros(t: f64) -> i64 {
    (t * 1e6).round() as i64
}

/// Adds zero-mean Gaussian noise to measurement readings.
pub struct SensorNoise {
    rng: StdRng,
    lidar: Normal<f64>,
    range: Normal<f64>,
    bearing: Normal<f64>,
    range_rate: Normal<f64>,
}

impl SensorNoise {
    /// Noise matching `config`'s sensor standard deviations.
    pub fn new(config: &UkfConfig<f64>, seed: u64) -> Self {
        Self::with_stds(
            config.std_laspx,
            config.std_radr,
            config.std_radphi,
            config.std_radrd,
            seed,
        )
    }

    pub fn with_stds(lidar: f64, range: f64, bearing: f64, range_rate: f64, seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            lidar: Normal::new(0.0, lidar).unwrap(),
            range: Normal::new(0.0, range).unwrap(),
            bearing: Normal::new(0.0, bearing).unwrap(),
            range_rate: Normal::new(0.0, range_rate).unwrap(),
        }
    }

    pub fn corrupt(&mut self, package: MeasurementPackage<f64>) -> MeasurementPackage<f64> {
        let reading = match package.reading {
            SensorReading::Lidar { px, py } => SensorReading::Lidar {
                px: px + self.lidar.sample(&mut self.rng),
                py: py + self.lidar.sample(&mut self.rng),
            },
            SensorReading::Radar {
                range,
                bearing,
                range_rate,
            } => SensorReading::Radar {
                range: range + self.range.sample(&mut self.rng),
                bearing: normalize_angle(bearing + self.bearing.sample(&mut self.rng)),
                range_rate: range_rate + self.range_rate.sample(&mut self.rng),
            },
        };
        MeasurementPackage {
            timestamp_us: package.timestamp_us,
            reading,
        }
    }
}

/// Asserts the covariance is symmetric and has no significantly negative eigenvalue.
pub fn assert_valid_covariance(cov: &StateCovariance<f64, N_X>) {
    assert!(cov.is_finite(), "covariance not finite: {:?}", cov);
    assert!(
        cov.asymmetry() < 1e-12,
        "covariance not symmetric, asymmetry {}",
        cov.asymmetry()
    );
    let min = cov.min_eigenvalue();
    assert!(min > -1e-9, "covariance has negative eigenvalue {}", min);
}

pub fn default_filter() -> UnscentedKalmanFilter<f64> {
    UnscentedKalmanFilter::new(UkfConfig::default()).unwrap()
}
