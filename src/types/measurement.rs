//! Sensor measurements as delivered to the filter

use core::fmt;

use nalgebra::RealField;
use num_traits::Float;

/// The two sensor modalities the filter fuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorKind {
    /// Cartesian position sensor: `[px, py]`
    Lidar,
    /// Polar sensor: `[range, bearing, range_rate]`
    Radar,
}

impl SensorKind {
    /// Dimension of this sensor's measurement space.
    #[inline]
    pub fn measurement_dim(self) -> usize {
        match self {
            SensorKind::Lidar => 2,
            SensorKind::Radar => 3,
        }
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorKind::Lidar => write!(f, "lidar"),
            SensorKind::Radar => write!(f, "radar"),
        }
    }
}

/// Raw values of a single sensor reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SensorReading<T> {
    /// Position in meters.
    Lidar { px: T, py: T },
    /// Range (m), bearing (rad, counter-clockwise from +x) and range rate (m/s).
    Radar { range: T, bearing: T, range_rate: T },
}

impl<T: RealField + Float + Copy> SensorReading<T> {
    /// Sensor that produced this reading.
    #[inline]
    pub fn kind(&self) -> SensorKind {
        match self {
            SensorReading::Lidar { .. } => SensorKind::Lidar,
            SensorReading::Radar { .. } => SensorKind::Radar,
        }
    }

    /// Cartesian position implied by the reading.
    pub fn position(&self) -> (T, T) {
        match *self {
            SensorReading::Lidar { px, py } => (px, py),
            SensorReading::Radar { range, bearing, .. } => {
                (range * Float::cos(bearing), range * Float::sin(bearing))
            }
        }
    }

    /// Returns true if every raw value is finite.
    pub fn is_finite(&self) -> bool {
        match *self {
            SensorReading::Lidar { px, py } => Float::is_finite(px) && Float::is_finite(py),
            SensorReading::Radar {
                range,
                bearing,
                range_rate,
            } => Float::is_finite(range) && Float::is_finite(bearing) && Float::is_finite(range_rate),
        }
    }
}

/// A timestamped measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeasurementPackage<T> {
    /// Acquisition time in microseconds
    pub timestamp_us: i64,
    /// Raw sensor values
    pub reading: SensorReading<T>,
}

impl<T: RealField + Float + Copy> MeasurementPackage<T> {
    /// Creates a lidar measurement.
    #[inline]
    pub fn lidar(timestamp_us: i64, px: T, py: T) -> Self {
        Self {
            timestamp_us,
            reading: SensorReading::Lidar { px, py },
        }
    }

    /// Creates a radar measurement.
    #[inline]
    pub fn radar(timestamp_us: i64, range: T, bearing: T, range_rate: T) -> Self {
        Self {
            timestamp_us,
            reading: SensorReading::Radar {
                range,
                bearing,
                range_rate,
            },
        }
    }

    #[inline]
    pub fn sensor(&self) -> SensorKind {
        self.reading.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_radar_position_conversion() {
        let m = MeasurementPackage::radar(0, 2.0_f64, FRAC_PI_2, 0.0);
        let (px, py) = m.reading.position();
        assert!(px.abs() < 1e-12);
        assert!((py - 2.0).abs() < 1e-12);
        assert_eq!(m.sensor(), SensorKind::Radar);
    }

    #[test]
    fn test_lidar_position_is_direct() {
        let m = MeasurementPackage::lidar(42, 1.5_f64, -0.5);
        assert_eq!(m.reading.position(), (1.5, -0.5));
        assert_eq!(m.sensor(), SensorKind::Lidar);
        assert_eq!(m.sensor().measurement_dim(), 2);
    }

    #[test]
    fn test_non_finite_reading() {
        let m = MeasurementPackage::radar(0, 1.0_f64, f64::NAN, 0.0);
        assert!(!m.reading.is_finite());
    }
}
