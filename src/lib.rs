//! UKF-Fusion: lidar/radar sensor fusion with an Unscented Kalman Filter
//!
//! Tracks a single object's position, speed, heading and turn rate by fusing
//! asynchronous Cartesian (lidar) and polar (radar) measurements through a
//! constant turn rate and velocity (CTRV) motion model.
//!
//! # Features
//!
//! - **Type Safety**: State, augmented, measurement and innovation vectors live in
//!   distinct vector spaces encoded in the type system
//! - **Compile-Time Dimensions**: Sigma-point sets and measurement models use const generics
//! - **Transactional Updates**: A failed cycle never leaves a partially updated belief behind
//!
//! # Example
//!
//! ```
//! use ukf_fusion::prelude::*;
//!
//! let mut filter = UnscentedKalmanFilter::<f64>::new(UkfConfig::default()).unwrap();
//!
//! filter.process_measurement(&MeasurementPackage::lidar(0, 0.0, 0.0)).unwrap();
//! filter.process_measurement(&MeasurementPackage::lidar(100_000, 0.2, 0.0)).unwrap();
//! filter.process_measurement(&MeasurementPackage::radar(200_000, 0.4, 0.0, 2.0)).unwrap();
//!
//! let estimate = filter.estimate().unwrap();
//! assert!(estimate.px > 0.0);
//! ```

pub mod config;
pub mod filters;
pub mod models;
pub mod types;
pub mod utils;

pub mod prelude {
    pub use crate::config::UkfConfig;
    pub use crate::filters::sigma::{SigmaPoints, SigmaWeights};
    pub use crate::filters::ukf::{StepOutcome, UnscentedKalmanFilter};
    pub use crate::models::*;
    pub use crate::types::angle::normalize_angle;
    pub use crate::types::belief::*;
    pub use crate::types::measurement::*;
    pub use crate::types::spaces::*;
    pub use crate::{FusionError, Result};
}

use thiserror::Error;

/// Error types for the library
#[derive(Debug, Error)]
pub enum FusionError {
    /// Configuration rejected at construction time
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Covariance square root could not be computed
    #[error("Covariance is not positive definite")]
    NotPositiveDefinite,

    /// Innovation covariance could not be inverted
    #[error("Matrix is singular")]
    SingularMatrix,

    /// A candidate belief contained NaN or infinite values
    #[error("Numerical instability detected")]
    NumericalInstability,

    /// Measurement timestamp precedes the belief's timestamp
    #[error("Measurement at {timestamp_us}us precedes last update at {last_update_us}us")]
    OutOfOrder {
        timestamp_us: i64,
        last_update_us: i64,
    },

    /// Time since the last update does not fit in an `i64` microsecond count
    #[error("Time gap from {last_update_us}us to {timestamp_us}us overflows")]
    TimeGapOverflow {
        timestamp_us: i64,
        last_update_us: i64,
    },

    /// Measurement carried NaN or infinite values
    #[error("Invalid {sensor} measurement at {timestamp_us}us: non-finite value")]
    InvalidMeasurement {
        sensor: types::measurement::SensorKind,
        timestamp_us: i64,
    },

    /// Operation needs an initialized track
    #[error("Filter has not been initialized")]
    NotInitialized,

    /// Correction requested without a fresh prediction
    #[error("No predicted sigma points available, run a prediction first")]
    MissingPrediction,

    /// Measurement record could not be parsed
    #[error("Malformed record on line {line}: {reason}")]
    MalformedRecord { line: usize, reason: String },

    /// Estimate/ground-truth sequences cannot be compared
    #[error("Evaluation error: {0}")]
    Evaluation(String),

    /// I/O errors from record ingestion
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file parsing errors
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = ::core::result::Result<T, FusionError>;
