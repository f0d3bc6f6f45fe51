//! Distance metrics and distance-to-similarity normalization.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Distance used to rank nearest neighbors.
///
/// Both metrics are non-negative, which is what [`distance_to_similarity`]
/// relies on to stay within `(0, 1]`. There is no dot-product variant, it
/// can go negative.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// Squared Euclidean distance, `[0, inf)`
    #[default]
    L2,
    /// `1 - cosine(a, b)`, `[0, 2]`
    Cosine,
}

impl DistanceMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            DistanceMetric::L2 => "l2",
            DistanceMetric::Cosine => "cosine",
        }
    }

    /// Computes the distance between two vectors of equal length.
    ///
    /// Mismatched lengths are treated as maximally distant.
    pub fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        if a.len() != b.len() {
            return f32::INFINITY;
        }
        match self {
            DistanceMetric::L2 => squared_l2(a, b),
            DistanceMetric::Cosine => cosine_distance(a, b),
        }
    }
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Converts a raw distance into a similarity score in `(0, 1]`.
///
/// `1 / (1 + d)`: equals 1 only at zero distance, strictly decreasing, never
/// divides by zero. Negative input only arises from floating-point noise and
/// is clamped to zero; NaN maps to the lowest score an infinite distance gets.
pub fn distance_to_similarity(distance: f32) -> f32 {
    if distance.is_nan() {
        return f32::MIN_POSITIVE;
    }
    let distance = distance.max(0.0);
    let similarity = 1.0 / (1.0 + distance);
    // Keep the lower bound open even for huge distances
    similarity.max(f32::MIN_POSITIVE)
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Returns 1.0 (orthogonal) when either vector has zero magnitude.
fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let dot_product: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let magnitude_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let magnitude_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return 1.0;
    }

    (1.0 - dot_product / (magnitude_a * magnitude_b)).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_similarity_at_zero_distance() {
        assert_eq!(distance_to_similarity(0.0), 1.0);
    }

    #[test]
    fn test_similarity_bounds_and_monotonicity() {
        let distances = [0.0, 0.01, 0.5, 1.0, 2.0, 4.0, 100.0, 1e30, f32::INFINITY];
        let scores: Vec<f32> = distances.iter().map(|d| distance_to_similarity(*d)).collect();

        for score in &scores {
            assert!(*score > 0.0 && *score <= 1.0, "score out of range: {}", score);
        }
        for pair in scores.windows(2).take(distances.len() - 2) {
            assert!(pair[0] > pair[1]);
        }
    }

    #[test]
    fn test_similarity_clamps_noise() {
        assert_eq!(distance_to_similarity(-1e-7), 1.0);
        assert!(distance_to_similarity(f32::NAN) > 0.0);
    }

    #[test]
    fn test_squared_l2() {
        assert_eq!(DistanceMetric::L2.distance(&[1.0, 0.0], &[0.0, 1.0]), 2.0);
        assert_eq!(DistanceMetric::L2.distance(&[1.0, 2.0], &[1.0, 2.0]), 0.0);
    }

    #[test]
    fn test_cosine_distance() {
        assert_eq!(DistanceMetric::Cosine.distance(&[1.0, 0.0], &[2.0, 0.0]), 0.0);
        assert_eq!(DistanceMetric::Cosine.distance(&[1.0, 0.0], &[0.0, 1.0]), 1.0);
        assert_eq!(DistanceMetric::Cosine.distance(&[0.0, 0.0], &[0.0, 1.0]), 1.0);
    }

    #[test]
    fn test_mismatched_lengths() {
        assert_eq!(DistanceMetric::L2.distance(&[1.0], &[1.0, 0.0]), f32::INFINITY);
    }
}
