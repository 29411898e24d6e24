//! Driver for the chain relaxation loop.
//!
//! One iteration: fan out the per-bead gradient evaluations, project the
//! fresh gradients against the current tangents, feed the secant pair into
//! the curvature models, compute a governed flow step, apply it, and hand
//! the updated chain to the caller's callback. The loop terminates when
//! either the orthogonal gradient or the applied step drops below its
//! tolerance, or when the iteration budget runs out — the latter is a
//! normal result reported through [`Relaxation::converged`], not an error.

use crate::chain::Chain;
use crate::config::OptConfig;
use crate::constraint::{ConstraintFn, TangentOrthogonality};
use crate::error::{OptError, Result};
use crate::hessian::HessianSet;
use crate::projection::{max_abs, project_all};
use crate::step::{governed_step, FlowContext};
use crate::surface::PotentialSurface;
use log::{debug, info, warn};
use nalgebra::DVector;
use rayon::prelude::*;

/// Outcome of a relaxation run.
#[derive(Debug, Clone)]
pub struct Relaxation {
    /// The relaxed chain (best found, whether or not converged).
    pub chain: Chain,
    /// Whether a convergence criterion was met within the budget.
    pub converged: bool,
    /// Number of completed iterations.
    pub iterations: usize,
    /// Largest orthogonal gradient component at the last iteration.
    pub ortho_norm: f64,
    /// Largest component of the last applied step.
    pub step_norm: f64,
}

/// Evaluate the surface at every interior bead concurrently.
///
/// The evaluations are independent by construction (each depends only on
/// its own bead's position), so they fan out across the rayon pool; the
/// collect is the fan-in barrier. An evaluator failure aborts the
/// iteration with the offending chain index attached.
fn evaluate_gradients(
    surface: &dyn PotentialSurface,
    interior: &[DVector<f64>],
) -> Result<(Vec<f64>, Vec<DVector<f64>>)> {
    let evals: Vec<_> = interior
        .par_iter()
        .enumerate()
        .map(|(i, x)| {
            surface.evaluate(x).map_err(|source| OptError::EvaluationFailed {
                bead: i + 1,
                source,
            })
        })
        .collect::<Result<_>>()?;
    Ok(evals.into_iter().map(|e| (e.energy, e.gradient)).unzip())
}

/// Relax a chain on a surface.
///
/// `constraint` restricts the step direction (pass
/// [`TangentOrthogonality`] for the standard string relaxation, or `None`
/// for unconstrained orthogonal descent). The callback, if supplied, runs
/// once per completed iteration with the updated chain; it sits on the
/// critical path and should not block for long.
pub fn relax(
    surface: &dyn PotentialSurface,
    mut chain: Chain,
    config: &OptConfig,
    constraint: Option<&dyn ConstraintFn>,
    mut callback: Option<&mut dyn FnMut(&Chain)>,
) -> Result<Relaxation> {
    let mut hessians = HessianSet::new(chain.n_interior(), chain.dim(), config.stiffness);

    // Snapshot of the previous iteration, for the secant update.
    let mut prev_positions: Option<Vec<DVector<f64>>> = None;
    let mut prev_gradients: Option<Vec<DVector<f64>>> = None;

    let mut converged = false;
    let mut iterations = 0;
    let mut ortho_norm = f64::INFINITY;
    let mut step_norm = f64::INFINITY;

    for iteration in 1..=config.max_iter {
        let positions = chain.interior_owned();
        let (energies, gradients) = evaluate_gradients(surface, &positions)?;
        debug!(
            "iteration {iteration}: energies = {:?}",
            energies.iter().map(|e| format!("{e:.6}")).collect::<Vec<_>>()
        );

        let tangents = config.tangent.tangents(chain.positions())?;
        let (parallel, ortho) = project_all(&gradients, &tangents);
        ortho_norm = max_abs(&ortho);
        debug!("iteration {iteration}: g(parallel) = {parallel:?}");
        if ortho_norm < config.grad_tol {
            info!("converged by force: max|g_ortho| = {ortho_norm:.3e} < {:.3e}", config.grad_tol);
            converged = true;
        }

        // Secant data only exists from the second iteration on.
        if let (Some(px), Some(pg)) = (&prev_positions, &prev_gradients) {
            let dx: Vec<_> = positions.iter().zip(px).map(|(x, p)| x - p).collect();
            let dg: Vec<_> = gradients.iter().zip(pg).map(|(g, p)| g - p).collect();
            hessians.update_all(&dx, &dg);
        }

        let ctx = FlowContext {
            hessians: &hessians,
            x0: &positions,
            g0: &gradients,
            first: chain.first(),
            last: chain.last(),
            tangent: config.tangent,
            constraint,
        };
        let governed = governed_step(&ctx, config.max_step, config.ode_tol)?;
        step_norm = governed.longest;
        if step_norm < config.step_tol {
            info!("converged by step: max|dx| = {step_norm:.3e} < {:.3e}", config.step_tol);
            converged = true;
        }

        chain.displace_interior(&governed.steps);
        info!(
            "iteration {iteration}: max|g_ortho| = {ortho_norm:.3e}, \
             max|dx| = {step_norm:.3e}, h = {:.4}",
            governed.fraction
        );

        if let Some(cb) = callback.as_mut() {
            cb(&chain);
        }

        prev_positions = Some(positions);
        prev_gradients = Some(gradients);
        iterations = iteration;

        if converged {
            break;
        }
    }

    if !converged {
        warn!("iteration budget of {} exhausted without convergence", config.max_iter);
    }

    Ok(Relaxation {
        chain,
        converged,
        iterations,
        ortho_norm,
        step_norm,
    })
}

/// Relax the path between two endpoints from a straight-line initial
/// guess, with the standard tangent-orthogonality constraint.
pub fn relax_path(
    surface: &dyn PotentialSurface,
    a: DVector<f64>,
    b: DVector<f64>,
    n_beads: usize,
    config: &OptConfig,
) -> Result<Relaxation> {
    let chain = Chain::linear(a, b, n_beads)?;
    let constraint = TangentOrthogonality::new(config.tangent);
    relax(surface, chain, config, Some(&constraint), None)
}
