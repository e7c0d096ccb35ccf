//! Outlier-robust statistics for pose samples
//!
//! Positions: per-axis IQR filtering then arithmetic mean.
//! Orientations: hemisphere-aligned quaternion summation then renormalization.

use nalgebra::{Quaternion, UnitQuaternion, Vector3};

use crate::types::{Orientation, Position, MIN_QUATERNION_NORM};
use crate::MIN_SAMPLES_FOR_IQR;

/// Plain arithmetic mean, None for an empty slice
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// First and third quartile at indices floor(0.25n) and floor(0.75n) of the sorted values
pub fn quartiles(sorted: &[f64]) -> Option<(f64, f64)> {
    if sorted.is_empty() {
        return None;
    }
    let n = sorted.len();
    let q1 = sorted[n / 4];
    let q3 = sorted[(3 * n) / 4];
    Some((q1, q3))
}

/// IQR-filtered mean of one axis
///
/// - fewer than 3 values → plain mean
/// - values outside `[Q1 - k·IQR, Q3 + k·IQR]` are discarded
/// - nothing left → mean of all values
pub fn robust_mean_axis(values: &[f64], k: f64) -> Option<f64> {
    if values.len() < MIN_SAMPLES_FOR_IQR {
        return mean(values);
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let (q1, q3) = quartiles(&sorted)?;
    let iqr = q3 - q1;
    let lower = q1 - k * iqr;
    let upper = q3 + k * iqr;

    let kept: Vec<f64> = sorted
        .iter()
        .copied()
        .filter(|v| *v >= lower && *v <= upper)
        .collect();

    if kept.is_empty() {
        return mean(values);
    }
    mean(&kept)
}

/// Per-axis robust mean of a set of positions
pub fn robust_position(positions: &[Position], k: f64) -> Option<Position> {
    if positions.is_empty() {
        return None;
    }
    let axis = |i: usize| -> Option<f64> {
        let values: Vec<f64> = positions.iter().map(|p| p[i]).collect();
        robust_mean_axis(&values, k)
    };
    Some(Vector3::new(axis(0)?, axis(1)?, axis(2)?))
}

/// Uniform-weight mean orientation
pub fn average_orientation(orientations: &[Orientation]) -> Option<Orientation> {
    let weighted: Vec<(Orientation, f64)> = orientations.iter().map(|q| (*q, 1.0)).collect();
    weighted_average_orientation(&weighted)
}

/// Weighted quaternion summation
///
/// Every sample is flipped into the hemisphere of the first one before
/// summing, since `q` and `-q` describe the same rotation. Non-positive or
/// non-finite weights are ignored. A sum too short to normalize falls back
/// to the first sample.
pub fn weighted_average_orientation(samples: &[(Orientation, f64)]) -> Option<Orientation> {
    let (reference, _) = samples.first()?;
    let reference_coords = reference.coords;

    let mut sum = Quaternion::new(0.0, 0.0, 0.0, 0.0);
    for (q, weight) in samples {
        if !weight.is_finite() || *weight <= 0.0 {
            continue;
        }
        let mut coords = q.coords;
        if coords.dot(&reference_coords) < 0.0 {
            coords = -coords;
        }
        sum.coords += coords * *weight;
    }

    Some(UnitQuaternion::try_new(sum, MIN_QUATERNION_NORM).unwrap_or(*reference))
}

/// Slerp that tolerates antipodal inputs by returning `to`
pub fn blend_orientation(from: &Orientation, to: &Orientation, t: f64) -> Orientation {
    from.try_slerp(to, t, MIN_QUATERNION_NORM).unwrap_or(*to)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_mean_empty_is_none() {
        assert_eq!(mean(&[]), None);
        assert_eq!(robust_mean_axis(&[], 1.5), None);
        assert_eq!(robust_position(&[], 1.5), None);
        assert_eq!(average_orientation(&[]), None);
    }

    #[test]
    fn test_small_sets_use_plain_mean() {
        // an outlier survives: no filtering below three samples
        assert_relative_eq!(robust_mean_axis(&[1.0, 101.0], 1.5).unwrap(), 51.0);
        assert_relative_eq!(robust_mean_axis(&[4.0], 1.5).unwrap(), 4.0);
    }

    #[test]
    fn test_quartile_indices() {
        let sorted = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];
        // floor(0.25*8)=2, floor(0.75*8)=6
        assert_eq!(quartiles(&sorted), Some((3.0, 7.0)));
    }

    #[test]
    fn test_outliers_discarded() {
        let mut values = vec![1.0, 1.1, 0.9, 1.05, 0.95, 1.0, 1.02, 0.98];
        let clean = mean(&values).unwrap();
        values.push(50.0);
        values.push(-40.0);

        let robust = robust_mean_axis(&values, 1.5).unwrap();
        assert_relative_eq!(robust, clean, epsilon = 1e-9);
    }

    #[test]
    fn test_constant_data() {
        let values = vec![2.5; 10];
        assert_relative_eq!(robust_mean_axis(&values, 1.5).unwrap(), 2.5);
    }

    #[test]
    fn test_zero_k_keeps_interquartile_values_only() {
        let values = [0.0, 1.0, 2.0, 3.0, 100.0];
        // sorted q1 = v[1] = 1, q3 = v[3] = 3 → keeps 1, 2, 3
        assert_relative_eq!(robust_mean_axis(&values, 0.0).unwrap(), 2.0);
    }

    #[test]
    fn test_robust_position_per_axis() {
        let mut positions: Vec<Position> = (0..8)
            .map(|i| Vector3::new(1.0 + i as f64 * 0.001, 0.0, -2.0))
            .collect();
        positions.push(Vector3::new(1.0, 30.0, -2.0));
        positions.push(Vector3::new(1.0, 0.0, 80.0));

        let p = robust_position(&positions, 1.5).unwrap();
        assert_relative_eq!(p.y, 0.0, epsilon = 1e-9);
        assert_relative_eq!(p.z, -2.0, epsilon = 1e-9);
    }

    #[test]
    fn test_average_orientation_handles_sign_flip() {
        let q = UnitQuaternion::from_euler_angles(0.0, 0.5, 0.0);
        let flipped = UnitQuaternion::new_unchecked(-q.into_inner());
        let avg = average_orientation(&[q, flipped, q]).unwrap();
        assert_relative_eq!(avg.angle_to(&q), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_average_orientation_between_two() {
        let a = UnitQuaternion::from_euler_angles(0.0, 0.0, 0.0);
        let b = UnitQuaternion::from_euler_angles(0.0, 0.4, 0.0);
        let avg = average_orientation(&[a, b]).unwrap();
        assert_relative_eq!(avg.angle_to(&a), 0.2, epsilon = 1e-6);
    }

    #[test]
    fn test_weighted_orientation_respects_weights() {
        let a = UnitQuaternion::identity();
        let b = UnitQuaternion::from_euler_angles(0.0, 1.0, 0.0);
        let avg = weighted_average_orientation(&[(a, 1.0), (b, 0.0)]).unwrap();
        assert_relative_eq!(avg.angle_to(&a), 0.0, epsilon = 1e-9);

        let leaning = weighted_average_orientation(&[(a, 1.0), (b, 3.0)]).unwrap();
        assert!(leaning.angle_to(&b) < leaning.angle_to(&a));
    }

    #[test]
    fn test_weighted_orientation_degenerate_falls_back() {
        let a = UnitQuaternion::from_euler_angles(0.1, 0.0, 0.0);
        let avg = weighted_average_orientation(&[(a, 0.0)]).unwrap();
        assert_eq!(avg, a);
    }

    #[test]
    fn test_blend_orientation() {
        let a = UnitQuaternion::identity();
        let b = UnitQuaternion::from_euler_angles(0.0, 1.0, 0.0);
        let blended = blend_orientation(&a, &b, 0.2);
        assert_relative_eq!(blended.angle_to(&a), 0.2, epsilon = 1e-9);
        assert!(blend_orientation(&a, &b, 1.0).angle_to(&b) < 1e-9);
    }
}
