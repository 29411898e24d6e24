//! Decomposition of gradients into path-parallel and path-orthogonal parts.
//!
//! The orthogonal component is the driving force of the relaxation; the
//! parallel magnitude is kept for diagnostics. Tangents are assumed to be
//! unit vectors, which the tangent estimators guarantee.

use nalgebra::DVector;

/// Split one gradient against one unit tangent.
///
/// Returns `(parallel, orthogonal)` with `parallel = t·g` and
/// `orthogonal = g - parallel * t`. Pure function.
pub fn project(gradient: &DVector<f64>, tangent: &DVector<f64>) -> (f64, DVector<f64>) {
    let parallel = tangent.dot(gradient);
    let orthogonal = gradient - tangent * parallel;
    (parallel, orthogonal)
}

/// Split every interior bead's gradient against its tangent.
pub fn project_all(
    gradients: &[DVector<f64>],
    tangents: &[DVector<f64>],
) -> (Vec<f64>, Vec<DVector<f64>>) {
    debug_assert_eq!(gradients.len(), tangents.len());
    let mut parallel = Vec::with_capacity(gradients.len());
    let mut orthogonal = Vec::with_capacity(gradients.len());
    for (g, t) in gradients.iter().zip(tangents) {
        let (p, o) = project(g, t);
        parallel.push(p);
        orthogonal.push(o);
    }
    (parallel, orthogonal)
}

/// Largest absolute coordinate over a list of per-bead vectors.
///
/// Convergence and step-length checks use this max-norm over the whole
/// chain.
pub fn max_abs(vectors: &[DVector<f64>]) -> f64 {
    vectors
        .iter()
        .flat_map(|v| v.iter())
        .fold(0.0, |acc, &x| acc.max(x.abs()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_projection_splits_exactly() {
        let t = DVector::from_vec(vec![1.0, 0.0]);
        let g = DVector::from_vec(vec![3.0, 4.0]);
        let (parallel, orthogonal) = project(&g, &t);
        assert!((parallel - 3.0).abs() < 1e-14);
        assert!((orthogonal - DVector::from_vec(vec![0.0, 4.0])).norm() < 1e-14);
    }

    #[test]
    fn test_orthogonal_part_is_orthogonal() {
        let t = DVector::from_vec(vec![0.6, 0.8]);
        let g = DVector::from_vec(vec![-1.3, 2.7]);
        let (parallel, orthogonal) = project(&g, &t);
        assert!(t.dot(&orthogonal).abs() < 1e-14);
        // Recomposition gives back the input.
        assert!((&t * parallel + &orthogonal - &g).norm() < 1e-14);
    }

    #[test]
    fn test_max_abs_over_chain() {
        let vs = vec![
            DVector::from_vec(vec![0.1, -0.9]),
            DVector::from_vec(vec![0.5, 0.2]),
        ];
        assert!((max_abs(&vs) - 0.9).abs() < 1e-14);
    }
}
