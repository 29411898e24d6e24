#![deny(missing_docs)]

//! stringopt - Chain-of-States Relaxation of Minimum-Energy Pathways
//!
//! stringopt relaxes a discretized pathway (a "chain" of bead
//! configurations between two fixed endpoints) toward the minimum-energy
//! path on a potential-energy surface. Only the force component orthogonal
//! to the path moves the beads; motion along the path is suppressed, so the
//! distribution of beads over the pathway is preserved during relaxation.
//!
//! # Algorithm
//!
//! Each iteration evaluates the gradient at every interior bead (fanned out
//! concurrently, since real evaluators are slow external programs),
//! estimates unit tangents along the chain, and splits each gradient into
//! parallel and orthogonal parts:
//!
//! ```text
//! g_par   = (t · g) t
//! g_ortho = g - g_par
//! ```
//!
//! The step does not follow plain steepest descent. Per bead a BFGS
//! curvature model `H` turns the descent into a quasi-Newton flow, and the
//! flow is integrated in *force space* with an adaptive Runge-Kutta scheme,
//! using `x = x0 + H⁻¹ (g - g0)` to recover positions (and hence fresh
//! tangents) along the way. An optional constraint contributes Lagrange
//! multiplier forces along the tangents so the step stays consistent with
//! the constraint to first order. Step length is governed by rescaling the
//! integrated step fraction against a per-coordinate ceiling.
//!
//! # Quick Start
//!
//! ```no_run
//! use stringopt::{relax_path, MuellerBrown, OptConfig};
//! use nalgebra::DVector;
//!
//! fn main() -> Result<(), stringopt::OptError> {
//!     let result = relax_path(
//!         &MuellerBrown,
//!         MuellerBrown::minimum_a(),
//!         MuellerBrown::minimum_b(),
//!         11,
//!         &OptConfig::default(),
//!     )?;
//!     for bead in result.chain.positions() {
//!         println!("{:.6} {:.6}", bead[0], bead[1]);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! Custom surfaces implement [`PotentialSurface`]; custom constraints
//! implement [`constraint::ConstraintFn`].
//!
//! # References
//!
//! - E, W.; Ren, W.; Vanden-Eijnden, E. *Phys. Rev. B* **2002**, 66, 052301
//!   (the string method).
//! - Henkelman, G.; Jónsson, H. *J. Chem. Phys.* **2000**, 113, 9978-9985
//!   (tangent estimates for chain-of-states methods).

pub mod chain;
pub mod config;
pub mod constraint;
pub mod error;
pub mod hessian;
pub mod ode;
pub mod optimizer;
pub mod projection;
pub mod step;
pub mod surface;
pub mod tangent;

pub use chain::Chain;
pub use config::OptConfig;
pub use error::{EvalError, OptError, Result};
pub use optimizer::{relax, relax_path, Relaxation};
pub use surface::{DoubleWell, Evaluation, MuellerBrown, PotentialSurface};
pub use tangent::TangentStrategy;
