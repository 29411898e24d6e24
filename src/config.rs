//! Optimizer configuration.
//!
//! All knobs of the relaxation live in [`OptConfig`]; the defaults are the
//! long-standing production values of the string optimizer. The struct is
//! serde-serializable so callers can embed it in their own configuration
//! files; parsing such files is the caller's concern.

use crate::tangent::TangentStrategy;
use serde::{Deserialize, Serialize};

/// Configuration for one chain relaxation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptConfig {
    /// Iteration budget. Exhausting it is a normal terminal state, not an
    /// error.
    pub max_iter: usize,
    /// Ceiling on the largest per-coordinate step component. Steps are
    /// governed by rescaling the integrated step fraction, not by
    /// clipping.
    pub max_step: f64,
    /// Convergence threshold on the largest orthogonal gradient
    /// component.
    pub grad_tol: f64,
    /// Convergence threshold on the largest step component.
    pub step_tol: f64,
    /// Initial isotropic curvature of every per-bead model. Large values
    /// make the first steps conservative.
    pub stiffness: f64,
    /// Absolute tolerance of the adaptive flow integration.
    pub ode_tol: f64,
    /// Tangent estimate used for projection and the default constraint.
    pub tangent: TangentStrategy,
}

impl Default for OptConfig {
    fn default() -> Self {
        Self {
            max_iter: 50,
            max_step: 0.05,
            grad_tol: 1.0e-5,
            step_tol: 1.0e-6,
            stiffness: 70.0,
            ode_tol: crate::ode::DEFAULT_TOL,
            tangent: TangentStrategy::default(),
        }
    }
}
