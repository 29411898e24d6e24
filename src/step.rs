//! Conversion of orthogonal gradients into position-space steps.
//!
//! The relaxation does not follow the steepest-descent flow in position
//! space. Instead it integrates the flow in *force space*,
//!
//! ```text
//! dg/dt = -(1 - t(g) t(g)^T) g  [+ t(g) * lambda(g)]
//! ```
//!
//! using the one-to-one relation `x = x0 + H^-1 (g - g0)` provided by the
//! per-bead curvature models to recover positions (and hence tangents)
//! from any force-space state. The optional Lagrange term keeps the step
//! consistent with a supplied constraint to first order.
//!
//! Two step modes exist. The one-shot step takes a single Newton-like step
//! along the flow direction and is used to estimate the step scale. The
//! ODE step integrates the flow with adaptive Runge-Kutta: for a step
//! fraction `h < 1` up to `T = -ln(1 - h)`, which matches the flow's
//! asymptotic `exp(-t)` decay, and for `h >= 1` all the way to the flow's
//! fixed point. The accumulated force-space change maps back to positions
//! through the same `H^-1`.
//!
//! Step length is governed by rescaling the *fraction* `h` and
//! reintegrating, never by clipping the result: clipping would break the
//! one-to-one force/position relation the integrator relies on.

use crate::constraint::{solve_multipliers, ConstraintFn};
use crate::error::Result;
use crate::hessian::HessianSet;
use crate::projection::{max_abs, project_all};
use crate::tangent::TangentStrategy;
use crate::chain::with_endpoints;
use log::{debug, warn};
use nalgebra::DVector;

/// Everything the force-space flow needs to be evaluated at an arbitrary
/// force-space state: the iteration-start snapshot, the curvature models,
/// the tangent strategy, and the optional constraint.
pub struct FlowContext<'a> {
    /// Per-bead curvature models.
    pub hessians: &'a HessianSet,
    /// Interior positions at the start of the iteration.
    pub x0: &'a [DVector<f64>],
    /// Interior gradients at the start of the iteration.
    pub g0: &'a [DVector<f64>],
    /// Fixed first bead.
    pub first: &'a DVector<f64>,
    /// Fixed last bead.
    pub last: &'a DVector<f64>,
    /// Tangent estimate used during the flow.
    pub tangent: TangentStrategy,
    /// Optional constraint contributing Lagrange forces.
    pub constraint: Option<&'a dyn ConstraintFn>,
}

impl FlowContext<'_> {
    fn n_beads(&self) -> usize {
        self.x0.len()
    }

    fn dim(&self) -> usize {
        self.first.len()
    }

    /// Flow derivative at the force-space state `g` (per-bead form).
    ///
    /// Reconstructs positions from `g`, recomputes tangents there, projects
    /// out the tangential component and applies the Lagrange correction if
    /// a constraint is present. Returns `-g_ortho` per bead.
    pub fn derivative(&self, g: &[DVector<f64>]) -> Result<Vec<DVector<f64>>> {
        // x = x0 + H^-1 (g - g0), bead by bead.
        let dg: Vec<DVector<f64>> = g.iter().zip(self.g0).map(|(gi, g0i)| gi - g0i).collect();
        let dx = self.hessians.apply_inverse_all(&dg);
        let x: Vec<DVector<f64>> = self.x0.iter().zip(&dx).map(|(x0i, dxi)| x0i + dxi).collect();

        let full = with_endpoints(self.first, &x, self.last);
        let tangents = self.tangent.tangents(&full)?;
        let (_parallel, mut ortho) = project_all(g, &tangents);

        if let Some(constraint) = self.constraint {
            let eval = constraint.evaluate(&full)?;
            let lambdas = solve_multipliers(&ortho, self.hessians, &tangents, &eval.jacobian)?;
            for ((o, t), lambda) in ortho.iter_mut().zip(&tangents).zip(&lambdas) {
                *o -= t * *lambda;
            }
        }

        for o in ortho.iter_mut() {
            o.neg_mut();
        }
        Ok(ortho)
    }

    /// Flow derivative on the flattened state, for the ODE integrator.
    /// The flow is autonomous, so there is no time argument.
    fn derivative_flat(&self, g_flat: &DVector<f64>) -> Result<DVector<f64>> {
        let g = unflatten(g_flat, self.n_beads(), self.dim());
        Ok(flatten(&self.derivative(&g)?))
    }
}

fn flatten(beads: &[DVector<f64>]) -> DVector<f64> {
    let dim = beads[0].len();
    let mut flat = DVector::zeros(beads.len() * dim);
    for (i, b) in beads.iter().enumerate() {
        flat.rows_mut(i * dim, dim).copy_from(b);
    }
    flat
}

fn unflatten(flat: &DVector<f64>, n_beads: usize, dim: usize) -> Vec<DVector<f64>> {
    (0..n_beads).map(|i| flat.rows(i * dim, dim).into_owned()).collect()
}

/// One Newton-like step of fraction `h` along the flow direction, mapped
/// to position space. Used to estimate the step scale before the full
/// integration.
pub fn one_shot_step(h: f64, ctx: &FlowContext<'_>) -> Result<Vec<DVector<f64>>> {
    let mut dg = ctx.derivative(ctx.g0)?;
    for d in dg.iter_mut() {
        *d *= h;
    }
    Ok(ctx.hessians.apply_inverse_all(&dg))
}

/// Integrate the force-space flow over the step fraction `h` and map the
/// accumulated gradient change back to a position step.
///
/// `h < 1` integrates to `T = -ln(1 - h)`; `h >= 1` integrates to the
/// flow's fixed point.
pub fn ode_step(h: f64, ctx: &FlowContext<'_>, tol: f64) -> Result<Vec<DVector<f64>>> {
    let g_start = flatten(ctx.g0);
    let f = |_t: f64, g: &DVector<f64>| ctx.derivative_flat(g);

    let g_end = if h < 1.0 {
        let t_end = -(1.0 - h).ln();
        debug!("ode step: h = {h:.4}, horizon T = {t_end:.4}");
        crate::ode::integrate(0.0, &g_start, &f, t_end, tol)?
    } else {
        debug!("ode step: h = {h:.4}, integrating to the fixed point");
        crate::ode::integrate_to_limit(&g_start, &f, tol)?
    };

    let delta = unflatten(&(g_end - &g_start), ctx.n_beads(), ctx.dim());
    Ok(ctx.hessians.apply_inverse_all(&delta))
}

/// Outcome of one governed step computation.
pub struct GovernedStep {
    /// Position-space step per interior bead.
    pub steps: Vec<DVector<f64>>,
    /// Step fraction actually integrated.
    pub fraction: f64,
    /// Largest absolute step coordinate.
    pub longest: f64,
}

/// Compute a full step with length governance.
///
/// A one-shot estimate at `h = 1` sets the scale; if its largest component
/// exceeds `max_step` the fraction is rescaled to `0.9 * max_step /
/// longest` and the step is recomputed by flow integration. If even the
/// recomputed step exceeds the ceiling this is logged as a warning and the
/// step is used as-is; a single rescale pass is deliberate (see the flow
/// notes above on why results are never clipped).
pub fn governed_step(ctx: &FlowContext<'_>, max_step: f64, tol: f64) -> Result<GovernedStep> {
    let estimate = one_shot_step(1.0, ctx)?;
    let longest_estimate = max_abs(&estimate);

    let mut fraction = 1.0;
    if longest_estimate > max_step {
        fraction = 0.9 * max_step / longest_estimate;
    }

    let steps = ode_step(fraction, ctx, tol)?;
    let longest = max_abs(&steps);
    if longest > max_step {
        warn!(
            "step too long by factor {:.2} even after rescaling to h = {:.4}",
            longest / max_step,
            fraction
        );
    }

    Ok(GovernedStep {
        steps,
        fraction,
        longest,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::TangentOrthogonality;

    fn v2(x: f64, y: f64) -> DVector<f64> {
        DVector::from_vec(vec![x, y])
    }

    /// Straight horizontal chain with gradients pointing off-path.
    struct Setup {
        first: DVector<f64>,
        last: DVector<f64>,
        x0: Vec<DVector<f64>>,
        g0: Vec<DVector<f64>>,
        hessians: HessianSet,
    }

    impl Setup {
        fn new(stiffness: f64, g0: Vec<DVector<f64>>) -> Self {
            Self {
                first: v2(0.0, 0.0),
                last: v2(3.0, 0.0),
                x0: vec![v2(1.0, 0.0), v2(2.0, 0.0)],
                hessians: HessianSet::new(2, 2, stiffness),
                g0,
            }
        }

        fn ctx<'a>(&'a self, constraint: Option<&'a dyn ConstraintFn>) -> FlowContext<'a> {
            FlowContext {
                hessians: &self.hessians,
                x0: &self.x0,
                g0: &self.g0,
                first: &self.first,
                last: &self.last,
                tangent: TangentStrategy::ForwardBackwardAverage,
                constraint,
            }
        }
    }

    #[test]
    fn test_one_shot_step_is_scaled_orthogonal_descent() {
        // Isotropic model of stiffness a: dx = -h/a * g_ortho.
        let setup = Setup::new(10.0, vec![v2(0.5, 2.0), v2(-0.5, -1.0)]);
        let ctx = setup.ctx(None);
        let steps = one_shot_step(1.0, &ctx).unwrap();
        // Tangent is (1, 0): the x component is tangential and projected
        // away, the y component descends scaled by 1/stiffness.
        assert!((&steps[0] - v2(0.0, -0.2)).norm() < 1e-12);
        assert!((&steps[1] - v2(0.0, 0.1)).norm() < 1e-12);
    }

    #[test]
    fn test_orthogonality_constraint_leaves_orthogonal_flow_unchanged() {
        let setup = Setup::new(10.0, vec![v2(0.0, 2.0), v2(0.0, -1.0)]);
        let constraint = TangentOrthogonality::new(TangentStrategy::ForwardBackwardAverage);
        let free = one_shot_step(1.0, &setup.ctx(None)).unwrap();
        let constrained = one_shot_step(1.0, &setup.ctx(Some(&constraint))).unwrap();
        for (a, b) in free.iter().zip(&constrained) {
            assert!((a - b).norm() < 1e-10);
        }
    }

    #[test]
    fn test_small_fraction_ode_step_matches_one_shot() {
        // For h -> 0 the integrated step approaches the linear one.
        let setup = Setup::new(10.0, vec![v2(0.0, 1.0), v2(0.0, -1.0)]);
        let ctx = setup.ctx(None);
        let h = 1e-4;
        let linear = one_shot_step(h, &ctx).unwrap();
        let integrated = ode_step(h, &ctx, 1e-10).unwrap();
        for (a, b) in linear.iter().zip(&integrated) {
            assert!((a - b).norm() < 1e-7, "{a} vs {b}");
        }
    }

    #[test]
    fn test_full_ode_step_reaches_fixed_point() {
        // With a frozen straight-line tangent geometry the flow decays the
        // orthogonal gradient to zero, so the full step is -g_ortho / a.
        let setup = Setup::new(10.0, vec![v2(0.0, 1.0), v2(0.0, -1.0)]);
        let ctx = setup.ctx(None);
        // Tangents rotate slightly as the beads move, so the prediction
        // from a frozen tangent is only approximate.
        let steps = ode_step(1.0, &ctx, 1e-9).unwrap();
        assert!((&steps[0] - v2(0.0, -0.1)).norm() < 0.02, "step {}", steps[0]);
        assert!((&steps[1] - v2(0.0, 0.1)).norm() < 0.02, "step {}", steps[1]);
    }

    #[test]
    fn test_governed_step_respects_ceiling() {
        // Large gradients make the raw one-shot step far exceed the
        // ceiling; the governed step must come back rescaled below it.
        let setup = Setup::new(1.0, vec![v2(0.0, 10.0), v2(0.0, -10.0)]);
        let ctx = setup.ctx(None);
        let max_step = 0.05;
        let governed = governed_step(&ctx, max_step, 1e-8).unwrap();
        assert!(governed.fraction < 1.0);
        assert!(
            governed.longest <= max_step,
            "longest = {} exceeds ceiling",
            governed.longest
        );
    }
}
