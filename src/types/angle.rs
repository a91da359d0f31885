//! Angle wrapping
//!
//! Every place the filter differences an angle (state heading, radar
//! bearing) goes through [`normalize_angle`]. Bearings that may straddle the
//! ±π boundary are averaged with [`circular_mean`].

use nalgebra::RealField;
use num_traits::Float;

/// Wraps an angle into `(-π, π]`.
///
/// Non-finite inputs are returned unchanged so that the caller's finiteness
/// checks still see them.
pub fn normalize_angle<T: RealField + Float + Copy>(angle: T) -> T {
    if !Float::is_finite(angle) {
        return angle;
    }

    let pi = T::pi();
    let two_pi = T::two_pi();

    // `%` keeps the sign of the dividend, so the remainder lies in (-2π, 2π)
    let mut wrapped = angle % two_pi;
    if wrapped > pi {
        wrapped = wrapped - two_pi;
    } else if wrapped <= -pi {
        wrapped = wrapped + two_pi;
    }

    // rounding in the subtraction above can land exactly on -π
    if wrapped <= -pi {
        pi
    } else {
        wrapped
    }
}

/// Weighted mean direction `atan2(Σ wᵢ sin φᵢ, Σ wᵢ cos φᵢ)`.
///
/// Takes `(angle, weight)` pairs. Weights may be negative, as the central
/// sigma-point weight is for small λ; the result lies in `(-π, π]`.
pub fn circular_mean<T, I>(weighted: I) -> T
where
    T: RealField + Float + Copy,
    I: IntoIterator<Item = (T, T)>,
{
    let (sin_sum, cos_sum) = weighted
        .into_iter()
        .fold((T::zero(), T::zero()), |(s, c), (angle, weight)| {
            (s + weight * Float::sin(angle), c + weight * Float::cos(angle))
        });
    normalize_angle(Float::atan2(sin_sum, cos_sum))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_normalized_angles_are_fixed_points() {
        for &angle in &[0.0, 0.5, -0.5, 3.0, -3.0, PI, -PI + 1e-9] {
            let once = normalize_angle(angle);
            assert!(
                (once - angle).abs() < 1e-12,
                "angle {} changed to {}",
                angle,
                once
            );
            assert_eq!(normalize_angle(once), once);
        }
    }

    #[test]
    fn test_just_past_pi_wraps_to_negative() {
        let eps = 1e-3;
        let wrapped = normalize_angle(PI + eps);
        assert!((wrapped - (-PI + eps)).abs() < 1e-12, "got {}", wrapped);
    }

    #[test]
    fn test_negative_pi_maps_to_pi() {
        assert!((normalize_angle(-PI) - PI).abs() < 1e-12);
    }

    #[test]
    fn test_multiple_turns() {
        let wrapped = normalize_angle(0.25 + 6.0 * PI);
        assert!((wrapped - 0.25).abs() < 1e-9, "got {}", wrapped);

        let wrapped = normalize_angle(-0.25 - 10.0 * PI);
        assert!((wrapped + 0.25).abs() < 1e-9, "got {}", wrapped);
    }

    #[test]
    fn test_f32_support() {
        let wrapped = normalize_angle(4.0_f32);
        assert!((wrapped - (4.0 - 2.0 * core::f32::consts::PI)).abs() < 1e-5);
    }

    #[test]
    fn test_non_finite_passthrough() {
        assert!(normalize_angle(f64::NAN).is_nan());
        assert!(normalize_angle(f64::INFINITY).is_infinite());
    }

    #[test]
    fn test_circular_mean_across_boundary() {
        // Two bearings just either side of ±π average to π, not to zero
        let mean = circular_mean([(PI - 0.1, 0.5), (-PI + 0.1, 0.5)]);
        assert!((mean.abs() - PI).abs() < 1e-12, "got {}", mean);

        // Unwrapped, the weighted mean of π - 0.1 and π + 0.2 is π - 0.025
        let mean = circular_mean([(PI - 0.1, 0.75), (-PI + 0.2, 0.25)]);
        assert!((mean - (PI - 0.025)).abs() < 1e-3, "got {}", mean);
    }

    #[test]
    fn test_circular_mean_matches_arithmetic_away_from_boundary() {
        let mean = circular_mean([(0.4, -1.0), (0.41, 1.0), (0.39, 1.0)]);
        assert!((mean - 0.4).abs() < 1e-6, "got {}", mean);
    }
}
