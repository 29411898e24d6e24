//! Error types for chain relaxation.
//!
//! Only conditions that abort a run are modeled as errors. A step that
//! remains too long after rescaling is logged as a warning and the run
//! continues; exhausting the iteration budget is a normal terminal result
//! reported through [`Relaxation::converged`](crate::optimizer::Relaxation).

use thiserror::Error;

/// Failure reported by an external potential evaluator.
///
/// Wraps whatever diagnostic the evaluator produced (nonzero exit status,
/// malformed output, ...) so it can be carried up with the bead index
/// attached.
#[derive(Error, Debug, Clone)]
#[error("{0}")]
pub struct EvalError(pub String);

impl EvalError {
    /// Wrap an evaluator diagnostic message.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Error type for chain relaxation operations.
#[derive(Error, Debug)]
pub enum OptError {
    /// Two neighboring beads coincide, so no tangent direction exists.
    #[error("degenerate geometry: beads {0} and {1} coincide, tangent is undefined")]
    DegenerateGeometry(usize, usize),

    /// The constraint sensitivity matrix is singular; Lagrange multipliers
    /// cannot compensate the constraint drift.
    #[error("constraint sensitivity matrix is singular or non-finite")]
    ConstraintUnsatisfiable,

    /// The external evaluator failed for one bead.
    #[error("potential evaluation failed for bead {bead}: {source}")]
    EvaluationFailed {
        /// Chain index of the bead whose evaluation failed.
        bead: usize,
        /// Diagnostic reported by the evaluator.
        #[source]
        source: EvalError,
    },

    /// A chain was built from inconsistent input.
    #[error("invalid chain: {0}")]
    InvalidChain(String),
}

/// Type alias for relaxation results.
pub type Result<T> = std::result::Result<T, OptError>;
