//! Tangent estimation along the chain.
//!
//! The relaxation decomposes forces into components parallel and orthogonal
//! to the path, so every interior bead needs a local unit tangent. Three
//! estimates are supported, selectable at configuration time:
//!
//! - **Forward/backward average**: mean of the normalized displacement to
//!   each neighbor, then renormalized. Robust default; weights both sides
//!   equally regardless of bead spacing.
//! - **Central difference**: normalized `x[i+1] - x[i-1]`. Cheapest; skips
//!   the bead itself, so it smooths over kinks.
//! - **Spline derivative**: natural cubic spline through all beads over
//!   chord-length abscissas, differentiated at each interior abscissa.
//!   Smoothest estimate, sensitive to the global bead distribution.
//!
//! All estimates return unit vectors pointing from earlier to later beads.
//!
//! # References
//!
//! - Henkelman, G.; Jónsson, H. *J. Chem. Phys.* **2000**, 113, 9978-9985.

use crate::error::{OptError, Result};
use nalgebra::DVector;
use serde::{Deserialize, Serialize};

/// Norm below which a displacement between neighbors counts as degenerate.
const DEGENERATE_NORM: f64 = 1e-12;

/// Tangent estimation strategy, selected once at configuration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TangentStrategy {
    /// Average of normalized forward and backward differences.
    #[default]
    ForwardBackwardAverage,
    /// Normalized central difference `x[i+1] - x[i-1]`.
    CentralDifference,
    /// Derivative of a natural cubic spline fit through all beads.
    Spline,
}

impl TangentStrategy {
    /// Compute one unit tangent per interior bead of `positions`.
    ///
    /// `positions` must contain the full chain, endpoints included, so
    /// `positions.len() - 2` tangents are returned. Coincident neighboring
    /// beads make the tangent undefined and yield
    /// [`OptError::DegenerateGeometry`].
    pub fn tangents(&self, positions: &[DVector<f64>]) -> Result<Vec<DVector<f64>>> {
        debug_assert!(positions.len() >= 3);
        match self {
            TangentStrategy::ForwardBackwardAverage => forward_backward_average(positions),
            TangentStrategy::CentralDifference => central_difference(positions),
            TangentStrategy::Spline => spline_derivative(positions),
        }
    }
}

fn normalized_difference(
    positions: &[DVector<f64>],
    from: usize,
    to: usize,
) -> Result<DVector<f64>> {
    let diff = &positions[to] - &positions[from];
    let norm = diff.norm();
    if norm < DEGENERATE_NORM {
        return Err(OptError::DegenerateGeometry(from, to));
    }
    Ok(diff / norm)
}

fn forward_backward_average(positions: &[DVector<f64>]) -> Result<Vec<DVector<f64>>> {
    let mut tangents = Vec::with_capacity(positions.len() - 2);
    for i in 1..positions.len() - 1 {
        let backward = normalized_difference(positions, i - 1, i)?;
        let forward = normalized_difference(positions, i, i + 1)?;
        let sum = backward + forward;
        let norm = sum.norm();
        if norm < DEGENERATE_NORM {
            // backward and forward cancel only when the chain folds back
            // onto itself exactly; treat like coincident beads.
            return Err(OptError::DegenerateGeometry(i - 1, i + 1));
        }
        tangents.push(sum / norm);
    }
    Ok(tangents)
}

fn central_difference(positions: &[DVector<f64>]) -> Result<Vec<DVector<f64>>> {
    let mut tangents = Vec::with_capacity(positions.len() - 2);
    for i in 1..positions.len() - 1 {
        // A coincident neighbor pair leaves the tangent undefined even
        // when the outer chord itself is fine.
        normalized_difference(positions, i - 1, i)?;
        normalized_difference(positions, i, i + 1)?;
        tangents.push(normalized_difference(positions, i - 1, i + 1)?);
    }
    Ok(tangents)
}

/// Spline tangents: chord-length parameterization, natural cubic spline per
/// coordinate, analytic derivative at the interior knots.
fn spline_derivative(positions: &[DVector<f64>]) -> Result<Vec<DVector<f64>>> {
    let n = positions.len();
    let dim = positions[0].len();

    // Chord-length abscissas; zero-length chords are degenerate geometry.
    let mut s = vec![0.0; n];
    for i in 1..n {
        let h = (&positions[i] - &positions[i - 1]).norm();
        if h < DEGENERATE_NORM {
            return Err(OptError::DegenerateGeometry(i - 1, i));
        }
        s[i] = s[i - 1] + h;
    }

    // One spline per coordinate; collect derivatives at interior knots.
    let mut tangents = vec![DVector::zeros(dim); n - 2];
    let mut values = vec![0.0; n];
    for k in 0..dim {
        for (i, p) in positions.iter().enumerate() {
            values[i] = p[k];
        }
        let m = natural_spline_second_derivatives(&s, &values);
        for i in 1..n - 1 {
            // Derivative at the left end of interval [s[i], s[i+1]].
            let h = s[i + 1] - s[i];
            let d = (values[i + 1] - values[i]) / h - h * (2.0 * m[i] + m[i + 1]) / 6.0;
            tangents[i - 1][k] = d;
        }
    }

    for (i, t) in tangents.iter_mut().enumerate() {
        let norm = t.norm();
        if norm < DEGENERATE_NORM {
            return Err(OptError::DegenerateGeometry(i, i + 2));
        }
        *t /= norm;
    }
    Ok(tangents)
}

/// Second derivatives of the natural cubic spline through `(s[i], y[i])`,
/// solved with the Thomas algorithm. Endpoints get zero curvature.
fn natural_spline_second_derivatives(s: &[f64], y: &[f64]) -> Vec<f64> {
    let n = s.len();
    let mut m = vec![0.0; n];
    if n < 3 {
        return m;
    }

    // Tridiagonal system for the n-2 interior second derivatives.
    let mut diag = vec![0.0; n - 2];
    let mut upper = vec![0.0; n - 2];
    let mut rhs = vec![0.0; n - 2];
    for i in 1..n - 1 {
        let h0 = s[i] - s[i - 1];
        let h1 = s[i + 1] - s[i];
        diag[i - 1] = 2.0 * (h0 + h1);
        upper[i - 1] = h1;
        rhs[i - 1] = 6.0 * ((y[i + 1] - y[i]) / h1 - (y[i] - y[i - 1]) / h0);
    }

    // Forward sweep; the sub-diagonal entry for row i is h0 = upper of row i-1.
    for i in 1..n - 2 {
        let lower = upper[i - 1];
        let w = lower / diag[i - 1];
        diag[i] -= w * upper[i - 1];
        rhs[i] -= w * rhs[i - 1];
    }

    // Back substitution.
    m[n - 2] = rhs[n - 3] / diag[n - 3];
    for i in (1..n - 2).rev() {
        m[i] = (rhs[i - 1] - upper[i - 1] * m[i + 1]) / diag[i - 1];
    }
    m
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v2(x: f64, y: f64) -> DVector<f64> {
        DVector::from_vec(vec![x, y])
    }

    fn straight_chain() -> Vec<DVector<f64>> {
        (0..5).map(|i| v2(i as f64, i as f64)).collect()
    }

    #[test]
    fn test_all_strategies_unit_norm_and_forward() {
        let positions = straight_chain();
        for strategy in [
            TangentStrategy::ForwardBackwardAverage,
            TangentStrategy::CentralDifference,
            TangentStrategy::Spline,
        ] {
            let tangents = strategy.tangents(&positions).unwrap();
            assert_eq!(tangents.len(), 3);
            for (i, t) in tangents.iter().enumerate() {
                assert!((t.norm() - 1.0).abs() < 1e-10, "{strategy:?} tangent not unit");
                // Points from earlier to later beads.
                let forward = &positions[i + 2] - &positions[i];
                assert!(t.dot(&forward) > 0.0, "{strategy:?} tangent points backward");
            }
        }
    }

    #[test]
    fn test_straight_chain_tangent_is_diagonal() {
        let positions = straight_chain();
        let expected = v2(1.0, 1.0) / 2.0_f64.sqrt();
        for strategy in [
            TangentStrategy::ForwardBackwardAverage,
            TangentStrategy::CentralDifference,
            TangentStrategy::Spline,
        ] {
            for t in strategy.tangents(&positions).unwrap() {
                assert!((t - &expected).norm() < 1e-9, "{strategy:?} off-diagonal");
            }
        }
    }

    #[test]
    fn test_forward_backward_differs_from_central_on_kink() {
        // Uneven spacing around a corner: the two estimates disagree.
        let positions = vec![v2(0.0, 0.0), v2(1.0, 0.0), v2(1.0, 3.0), v2(2.0, 3.0)];
        let avg = TangentStrategy::ForwardBackwardAverage
            .tangents(&positions)
            .unwrap();
        let central = TangentStrategy::CentralDifference
            .tangents(&positions)
            .unwrap();
        assert!((&avg[0] - &central[0]).norm() > 1e-3);
    }

    #[test]
    fn test_coincident_beads_are_degenerate() {
        let positions = vec![v2(0.0, 0.0), v2(1.0, 1.0), v2(1.0, 1.0), v2(2.0, 2.0)];
        for strategy in [
            TangentStrategy::ForwardBackwardAverage,
            TangentStrategy::CentralDifference,
            TangentStrategy::Spline,
        ] {
            let result = strategy.tangents(&positions);
            assert!(
                matches!(result, Err(OptError::DegenerateGeometry(_, _))),
                "{strategy:?} accepted coincident beads"
            );
        }
    }

    #[test]
    fn test_spline_tangent_on_parabola() {
        // y = x^2 sampled densely; spline derivative should track 2x.
        let positions: Vec<_> = (0..9)
            .map(|i| {
                let x = i as f64 * 0.25;
                v2(x, x * x)
            })
            .collect();
        let tangents = TangentStrategy::Spline.tangents(&positions).unwrap();
        for (i, t) in tangents.iter().enumerate() {
            let x = (i + 1) as f64 * 0.25;
            let slope = 2.0 * x;
            let expected = v2(1.0, slope) / (1.0 + slope * slope).sqrt();
            // The natural (zero-curvature) boundary condition biases the
            // derivative at the knots next to the endpoints.
            let tol = if i == 0 || i == tangents.len() - 1 { 0.1 } else { 0.05 };
            assert!((t - &expected).norm() < tol, "bead {i}: {t} vs {expected}");
        }
    }
}
