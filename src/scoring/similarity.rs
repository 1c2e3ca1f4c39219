use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum SimilarityError {
    #[error("cannot compare empty vectors")]
    Empty,

    #[error("vector dimensions differ: {left} vs {right}")]
    DimensionMismatch { left: usize, right: usize },

    #[error("cosine is undefined for a zero-magnitude vector")]
    ZeroMagnitude,
}

/// Cosine of the angle between two equal-length vectors.
///
/// Accumulates in `f64` so the canonical unit-vector cases come out exact.
/// Fails instead of returning a placeholder when either vector has zero
/// magnitude, because any number returned there would be a made-up score.
pub fn cosine(a: &[f32], b: &[f32]) -> Result<f64, SimilarityError> {
    if a.is_empty() || b.is_empty() {
        return Err(SimilarityError::Empty);
    }
    if a.len() != b.len() {
        return Err(SimilarityError::DimensionMismatch {
            left: a.len(),
            right: b.len(),
        });
    }

    let (mut dot, mut norm_a, mut norm_b) = (0.0f64, 0.0f64, 0.0f64);
    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (x as f64, y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return Err(SimilarityError::ZeroMagnitude);
    }

    Ok((dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-6;

    #[test]
    fn identical_vectors_have_similarity_one() {
        let u = [0.3f32, -1.2, 4.0, 0.5];
        assert!((cosine(&u, &u).unwrap() - 1.0).abs() < EPS);
    }

    #[test]
    fn opposite_vectors_have_similarity_minus_one() {
        let u = [1.0f32, 0.0, 0.0, 0.0];
        let neg = [-1.0f32, 0.0, 0.0, 0.0];
        assert!((cosine(&u, &neg).unwrap() + 1.0).abs() < EPS);

        let v = [0.25f32, 2.0, -3.5];
        let neg_v: Vec<f32> = v.iter().map(|x| -x).collect();
        assert!((cosine(&v, &neg_v).unwrap() + 1.0).abs() < EPS);
    }

    #[test]
    fn orthogonal_vectors_have_similarity_zero() {
        assert!(cosine(&[1.0, 0.0], &[0.0, 1.0]).unwrap().abs() < EPS);
        assert!(cosine(&[1.0, 0.0, 0.0, 0.0], &[0.0, 1.0, 0.0, 0.0])
            .unwrap()
            .abs()
            < EPS);
    }

    #[test]
    fn is_symmetric() {
        let a = [0.2f32, 0.7, -0.1];
        let b = [0.9f32, -0.3, 0.4];
        assert_eq!(cosine(&a, &b).unwrap(), cosine(&b, &a).unwrap());
    }

    #[test]
    fn ignores_magnitude() {
        let a = [1.0f32, 2.0, 3.0];
        let scaled = [10.0f32, 20.0, 30.0];
        assert!((cosine(&a, &scaled).unwrap() - 1.0).abs() < EPS);
    }

    #[test]
    fn zero_vector_is_an_error() {
        assert_eq!(
            cosine(&[0.0, 0.0], &[1.0, 0.0]),
            Err(SimilarityError::ZeroMagnitude)
        );
        assert_eq!(
            cosine(&[1.0, 0.0], &[0.0, 0.0]),
            Err(SimilarityError::ZeroMagnitude)
        );
    }

    #[test]
    fn mismatched_lengths_are_an_error() {
        assert_eq!(
            cosine(&[1.0, 0.0], &[1.0, 0.0, 0.0]),
            Err(SimilarityError::DimensionMismatch { left: 2, right: 3 })
        );
    }

    #[test]
    fn empty_vectors_are_an_error() {
        assert_eq!(cosine(&[], &[]), Err(SimilarityError::Empty));
    }
}
