//! Potential-energy evaluator contract and built-in analytic surfaces.
//!
//! The optimizer only ever sees the [`PotentialSurface`] trait: one call
//! per bead position, returning the energy and its gradient. Real
//! evaluators typically wrap an external simulation program and may block
//! for a long time; implementations must therefore be safe to call
//! concurrently for different positions (`Send + Sync`), because the
//! driver fans the per-bead evaluations out across a thread pool.
//!
//! Two analytic 2-D surfaces ship with the crate for tests and the demo
//! binary:
//!
//! - [`MuellerBrown`], the standard four-Gaussian benchmark for path
//!   methods (Müller, K.; Brown, L. D. *Theor. Chim. Acta* **1979**, 53,
//!   75-93);
//! - [`DoubleWell`], a symmetric double well between two configurable
//!   minima with a saddle at their midpoint and an optionally curved
//!   valley floor.

use crate::error::EvalError;
use nalgebra::DVector;

/// Energy and gradient at one position.
#[derive(Debug, Clone)]
pub struct Evaluation {
    /// Potential energy.
    pub energy: f64,
    /// Gradient of the energy with respect to the position (the force is
    /// its negative).
    pub gradient: DVector<f64>,
}

/// An external energy/gradient evaluator.
///
/// Calls may be slow and blocking; they must be independent for different
/// positions so the driver can dispatch them concurrently. Failures are
/// reported, never papered over with zero forces.
pub trait PotentialSurface: Send + Sync {
    /// Energy and gradient at one position.
    fn evaluate(&self, position: &DVector<f64>) -> Result<Evaluation, EvalError>;
}

fn require_dim(position: &DVector<f64>, dim: usize) -> Result<(), EvalError> {
    if position.len() != dim {
        return Err(EvalError::new(format!(
            "expected dimension {dim}, got {}",
            position.len()
        )));
    }
    Ok(())
}

/// The Müller-Brown surface: a sum of four anisotropic Gaussians with
/// three minima and two saddle points, the classic benchmark for
/// minimum-energy-path algorithms.
#[derive(Debug, Clone, Copy, Default)]
pub struct MuellerBrown;

impl MuellerBrown {
    const A: [f64; 4] = [-200.0, -100.0, -170.0, 15.0];
    const AX: [f64; 4] = [-1.0, -1.0, -6.5, 0.7];
    const B: [f64; 4] = [0.0, 0.0, 11.0, 0.6];
    const C: [f64; 4] = [-10.0, -10.0, -6.5, 0.7];
    const X0: [f64; 4] = [1.0, 0.0, -0.5, -1.0];
    const Y0: [f64; 4] = [0.0, 0.5, 1.5, 1.0];

    /// The deep reactant-side minimum, to 3 decimals.
    pub fn minimum_a() -> DVector<f64> {
        DVector::from_vec(vec![-0.558, 1.442])
    }

    /// The product-side minimum, to 3 decimals.
    pub fn minimum_b() -> DVector<f64> {
        DVector::from_vec(vec![0.623, 0.028])
    }
}

impl PotentialSurface for MuellerBrown {
    fn evaluate(&self, position: &DVector<f64>) -> Result<Evaluation, EvalError> {
        require_dim(position, 2)?;
        let (x, y) = (position[0], position[1]);
        let mut energy = 0.0;
        let mut gx = 0.0;
        let mut gy = 0.0;
        for k in 0..4 {
            let dx = x - Self::X0[k];
            let dy = y - Self::Y0[k];
            let term = Self::A[k]
                * (Self::AX[k] * dx * dx + Self::B[k] * dx * dy + Self::C[k] * dy * dy).exp();
            energy += term;
            gx += term * (2.0 * Self::AX[k] * dx + Self::B[k] * dy);
            gy += term * (Self::B[k] * dx + 2.0 * Self::C[k] * dy);
        }
        Ok(Evaluation {
            energy,
            gradient: DVector::from_vec(vec![gx, gy]),
        })
    }
}

/// Symmetric 2-D double well with minima at two given points, a saddle at
/// their midpoint, and a transverse valley that may bend away from the
/// straight connecting line.
///
/// In coordinates `u` (along the line between the minima, zero at the
/// midpoint, `±h` at the minima) and `v` (transverse):
///
/// ```text
/// V(u, v) = barrier * ((u² - h²) / h²)² + transverse * (v - c(u))²
/// c(u)    = bend * u * (h² - u²) / h²
/// ```
///
/// The valley floor `v = c(u)` passes through both minima and the saddle;
/// with `bend = 0` it degenerates to the straight line.
#[derive(Debug, Clone)]
pub struct DoubleWell {
    midpoint: DVector<f64>,
    /// Unit vector from minimum `a` toward minimum `b`.
    axis: DVector<f64>,
    /// Transverse unit vector.
    normal: DVector<f64>,
    /// Half distance between the minima.
    half: f64,
    barrier: f64,
    transverse: f64,
    bend: f64,
}

impl DoubleWell {
    /// Build a double well with minima at `a` and `b` (both 2-D).
    ///
    /// `barrier` is the saddle height above the minima, `transverse` the
    /// stiffness across the valley, `bend` the dimensionless bowing of the
    /// valley floor away from the straight line.
    ///
    /// # Panics
    ///
    /// Panics if `a` and `b` are not 2-D or coincide.
    pub fn new(a: DVector<f64>, b: DVector<f64>, barrier: f64, transverse: f64, bend: f64) -> Self {
        assert_eq!(a.len(), 2);
        assert_eq!(b.len(), 2);
        let span = &b - &a;
        let length = span.norm();
        assert!(length > 0.0, "minima coincide");
        let axis = span / length;
        let normal = DVector::from_vec(vec![-axis[1], axis[0]]);
        Self {
            midpoint: (&a + &b) * 0.5,
            axis,
            normal,
            half: length * 0.5,
            barrier,
            transverse,
            bend,
        }
    }

    /// Valley-floor offset `c(u)` at position `u` along the axis.
    pub fn valley_offset(&self, u: f64) -> f64 {
        self.bend * u * (self.half * self.half - u * u) / (self.half * self.half)
    }

    /// The saddle point (the midpoint between the minima).
    pub fn saddle(&self) -> DVector<f64> {
        self.midpoint.clone()
    }
}

impl PotentialSurface for DoubleWell {
    fn evaluate(&self, position: &DVector<f64>) -> Result<Evaluation, EvalError> {
        require_dim(position, 2)?;
        let rel = position - &self.midpoint;
        let u = rel.dot(&self.axis);
        let v = rel.dot(&self.normal);

        let h2 = self.half * self.half;
        let well = (u * u - h2) / h2;
        let offset = v - self.valley_offset(u);
        let energy = self.barrier * well * well + self.transverse * offset * offset;

        // dc/du = bend * (h² - 3u²) / h²
        let c_prime = self.bend * (h2 - 3.0 * u * u) / h2;
        let de_du = 4.0 * self.barrier * well * u / h2 - 2.0 * self.transverse * offset * c_prime;
        let de_dv = 2.0 * self.transverse * offset;

        Ok(Evaluation {
            energy,
            gradient: &self.axis * de_du + &self.normal * de_dv,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Central-difference check of an analytic gradient.
    fn check_gradient(surface: &dyn PotentialSurface, at: DVector<f64>) {
        let eps = 1e-6;
        let grad = surface.evaluate(&at).unwrap().gradient;
        for k in 0..at.len() {
            let mut plus = at.clone();
            plus[k] += eps;
            let mut minus = at.clone();
            minus[k] -= eps;
            let fd = (surface.evaluate(&plus).unwrap().energy
                - surface.evaluate(&minus).unwrap().energy)
                / (2.0 * eps);
            assert!(
                (grad[k] - fd).abs() < 1e-4 * (1.0 + fd.abs()),
                "component {k}: analytic {} vs finite difference {fd}",
                grad[k]
            );
        }
    }

    #[test]
    fn test_mueller_brown_gradient_matches_finite_difference() {
        check_gradient(&MuellerBrown, DVector::from_vec(vec![-0.2, 0.8]));
        check_gradient(&MuellerBrown, DVector::from_vec(vec![0.5, 0.2]));
    }

    #[test]
    fn test_mueller_brown_minima_have_small_gradient() {
        for m in [MuellerBrown::minimum_a(), MuellerBrown::minimum_b()] {
            let grad = MuellerBrown.evaluate(&m).unwrap().gradient;
            assert!(grad.norm() < 1.0, "gradient at tabulated minimum: {grad}");
        }
    }

    #[test]
    fn test_double_well_stationary_points() {
        let a = DVector::from_vec(vec![0.0, 0.0]);
        let b = DVector::from_vec(vec![10.0, 10.0]);
        let well = DoubleWell::new(a.clone(), b.clone(), 1.0, 0.5, 0.2);
        for p in [&a, &b, &well.saddle()] {
            let grad = well.evaluate(p).unwrap().gradient;
            assert!(grad.norm() < 1e-12, "gradient at {p}: {grad}");
        }
        // The saddle sits above the minima.
        let e_saddle = well.evaluate(&well.saddle()).unwrap().energy;
        let e_min = well.evaluate(&a).unwrap().energy;
        assert!(e_saddle > e_min);
    }

    #[test]
    fn test_double_well_gradient_matches_finite_difference() {
        let well = DoubleWell::new(
            DVector::from_vec(vec![0.0, 0.0]),
            DVector::from_vec(vec![10.0, 10.0]),
            1.0,
            0.5,
            0.2,
        );
        check_gradient(&well, DVector::from_vec(vec![3.0, 2.0]));
        check_gradient(&well, DVector::from_vec(vec![7.5, 8.0]));
    }

    #[test]
    fn test_dimension_mismatch_is_an_error() {
        let bad = DVector::from_vec(vec![1.0, 2.0, 3.0]);
        assert!(MuellerBrown.evaluate(&bad).is_err());
    }
}
