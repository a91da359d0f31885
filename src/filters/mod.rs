//! Unscented Kalman filtering
//!
//! - [`sigma`]: sigma-point weights, augmented sigma points and moment recovery
//! - [`correction`]: the sensor-agnostic unscented correction
//! - [`ukf::UnscentedKalmanFilter`]: the stateful single-track filter

pub mod correction;
pub mod sigma;
pub mod ukf;
