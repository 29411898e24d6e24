//! Path constraints and the Lagrange multiplier solve.
//!
//! A constraint restricts how the chain may move during one step. It is
//! supplied as a differentiable function of the full chain: per interior
//! bead one scalar value (optional, some constraints are derivative-only)
//! and one Jacobian block per (constraint, bead) pair.
//!
//! The solver computes one multiplier per interior bead such that adding
//! `-lambda[i] * tangent[i]` to the orthogonal gradient cancels, to first
//! order, the constraint drift an unconstrained Hessian-scaled step would
//! cause:
//!
//! ```text
//! rate[i] = sum_j A[i][j] · H_j^-1 · (-g_j)      (unconstrained drift)
//! C[i][j] = A[i][j] · H_j^-1 · t[j]              (sensitivity to unit
//!                                                 tangent force at bead j)
//! C · lambda = -rate
//! ```
//!
//! A singular sensitivity matrix means the multipliers cannot compensate
//! the drift; this is surfaced as an error, never as silent NaNs.

use crate::error::{OptError, Result};
use crate::hessian::HessianSet;
use crate::tangent::TangentStrategy;
use nalgebra::{DMatrix, DVector};

/// Jacobian blocks `A[i][j]` = d(constraint i)/d(bead j), one `DVector`
/// per (interior constraint, interior bead) pair.
pub type Jacobian = Vec<Vec<DVector<f64>>>;

/// Constraint function output: one optional scalar per interior bead plus
/// the Jacobian blocks.
#[derive(Debug, Clone)]
pub struct ConstraintEval {
    /// Constraint values. `None` for derivative-only constraints whose
    /// value has no meaning, only a rate of change.
    pub values: Vec<Option<f64>>,
    /// Jacobian blocks, indexed `[constraint][bead]`.
    pub jacobian: Jacobian,
}

/// A differentiable constraint on the chain, evaluated at the full
/// position list (endpoints included).
pub trait ConstraintFn: Sync {
    /// Evaluate the constraint values and Jacobian at the given chain.
    fn evaluate(&self, positions: &[DVector<f64>]) -> Result<ConstraintEval>;
}

/// Restrict bead motion to the hyperplanes orthogonal to the current
/// tangents.
///
/// Derivative-only: the Jacobian is diagonal with `A[i][i] = t[i]`, and
/// the values carry no meaning. This is the default constraint of the
/// relaxation; it suppresses sliding of beads along the path.
#[derive(Debug, Clone, Copy)]
pub struct TangentOrthogonality {
    strategy: TangentStrategy,
}

impl TangentOrthogonality {
    /// Constrain motion against the tangents of the given strategy.
    pub fn new(strategy: TangentStrategy) -> Self {
        Self { strategy }
    }
}

impl ConstraintFn for TangentOrthogonality {
    fn evaluate(&self, positions: &[DVector<f64>]) -> Result<ConstraintEval> {
        let tangents = self.strategy.tangents(positions)?;
        let n = tangents.len();
        let dim = positions[0].len();
        let mut jacobian: Jacobian = vec![vec![DVector::zeros(dim); n]; n];
        for (i, t) in tangents.into_iter().enumerate() {
            jacobian[i][i] = t;
        }
        Ok(ConstraintEval {
            values: vec![None; n],
            jacobian,
        })
    }
}

/// Solve for the Lagrange multipliers that keep a step consistent with the
/// constraint to first order.
///
/// `g_ortho` is the orthogonal gradient per bead, `tangents` the unit
/// tangents, `hessians` the per-bead curvature models whose inverse maps
/// force-space probes to position-space displacements.
pub fn solve_multipliers(
    g_ortho: &[DVector<f64>],
    hessians: &HessianSet,
    tangents: &[DVector<f64>],
    jacobian: &Jacobian,
) -> Result<Vec<f64>> {
    let n = jacobian.len();
    debug_assert_eq!(g_ortho.len(), n);
    debug_assert_eq!(tangents.len(), n);
    debug_assert_eq!(hessians.len(), n);

    // Position-space displacement of the unconstrained descent direction.
    let neg_g: Vec<DVector<f64>> = g_ortho.iter().map(|g| -g).collect();
    let xh = hessians.apply_inverse_all(&neg_g);

    // Constraint drift rate under that displacement.
    let mut rate = DVector::zeros(n);
    for i in 0..n {
        for j in 0..n {
            rate[i] += jacobian[i][j].dot(&xh[j]);
        }
    }

    // Sensitivity of constraint i to a unit Lagrange force along tangent j.
    let xt = hessians.apply_inverse_all(tangents);
    let mut sensitivity = DMatrix::zeros(n, n);
    for i in 0..n {
        for j in 0..n {
            sensitivity[(i, j)] = jacobian[i][j].dot(&xt[j]);
        }
    }

    let lambdas = sensitivity
        .lu()
        .solve(&rate)
        .ok_or(OptError::ConstraintUnsatisfiable)?;
    if !lambdas.iter().all(|l| l.is_finite()) {
        return Err(OptError::ConstraintUnsatisfiable);
    }
    Ok((-lambdas).iter().copied().collect())
}
