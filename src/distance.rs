//! Distance and similarity measures between frame payloads.

use dyn_clone::DynClone;

/// A measure between two equally long sample slices.
///
/// Implementations are cloneable trait objects so that analytical nodes
/// can share one configured measure.
pub trait Distance: DynClone {
    fn measure(&self, a: &[f32], b: &[f32]) -> f32;
}

dyn_clone::clone_trait_object!(Distance);

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn norm(a: &[f32]) -> f32 {
    dot(a, a).sqrt()
}

/// Cosine of the angle between the two slices; 0 when either is a zero
/// vector.
#[derive(Clone, Copy, Debug, Default)]
pub struct CosineSimilarity;

impl Distance for CosineSimilarity {
    fn measure(&self, a: &[f32], b: &[f32]) -> f32 {
        let scale = norm(a) * norm(b);
        if scale == 0.0 {
            0.0
        } else {
            dot(a, b) / scale
        }
    }
}

/// One minus the cosine similarity.
#[derive(Clone, Copy, Debug, Default)]
pub struct CosineDistance;

impl Distance for CosineDistance {
    fn measure(&self, a: &[f32], b: &[f32]) -> f32 {
        1.0 - CosineSimilarity.measure(a, b)
    }
}

/// Euclidean distance.
#[derive(Clone, Copy, Debug, Default)]
pub struct EuclideanDistance;

impl Distance for EuclideanDistance {
    fn measure(&self, a: &[f32], b: &[f32]) -> f32 {
        a.iter()
            .zip(b)
            .map(|(x, y)| (x - y) * (x - y))
            .sum::<f32>()
            .sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_of_parallel_vectors_is_one() {
        let a = [1.0, 2.0, 3.0];
        let b = [2.0, 4.0, 6.0];
        assert!((CosineSimilarity.measure(&a, &b) - 1.0).abs() < 1e-6);
        assert!(CosineDistance.measure(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn zero_vector_has_zero_similarity() {
        assert_eq!(CosineSimilarity.measure(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
    }

    #[test]
    fn euclidean() {
        assert!((EuclideanDistance.measure(&[0.0, 0.0], &[3.0, 4.0]) - 5.0).abs() < 1e-6);
    }
}
