//! Chain data model: an ordered sequence of beads between two fixed endpoints.
//!
//! A [`Chain`] stores bead positions as flat `DVector<f64>` coordinates, the
//! same representation used throughout the optimizer for direct use with
//! nalgebra. The first and last bead are the fixed terminal configurations;
//! only interior beads may move during relaxation, and the API enforces this
//! by exposing mutation through [`Chain::displace_interior`] only.

use crate::error::{OptError, Result};
use nalgebra::DVector;

/// Ordered sequence of bead positions with immutable endpoints.
///
/// Invariants maintained by construction:
/// - at least three beads (one movable interior bead);
/// - every bead has the same dimension.
#[derive(Debug, Clone)]
pub struct Chain {
    beads: Vec<DVector<f64>>,
    dim: usize,
}

impl Chain {
    /// Build a chain from an explicit list of bead positions.
    ///
    /// The first and last entries become the fixed endpoints.
    pub fn new(beads: Vec<DVector<f64>>) -> Result<Self> {
        if beads.len() < 3 {
            return Err(OptError::InvalidChain(format!(
                "need at least 3 beads, got {}",
                beads.len()
            )));
        }
        let dim = beads[0].len();
        if dim == 0 {
            return Err(OptError::InvalidChain("beads have zero dimension".into()));
        }
        if let Some(i) = beads.iter().position(|b| b.len() != dim) {
            return Err(OptError::InvalidChain(format!(
                "bead {} has dimension {}, expected {}",
                i,
                beads[i].len(),
                dim
            )));
        }
        Ok(Self { beads, dim })
    }

    /// Build a chain by linear interpolation between two endpoints.
    ///
    /// `n_beads` counts the endpoints, so `n_beads - 2` interior beads are
    /// placed on the straight segment from `a` to `b`.
    pub fn linear(a: DVector<f64>, b: DVector<f64>, n_beads: usize) -> Result<Self> {
        if n_beads < 3 {
            return Err(OptError::InvalidChain(format!(
                "need at least 3 beads, got {n_beads}"
            )));
        }
        if a.len() != b.len() {
            return Err(OptError::InvalidChain(format!(
                "endpoint dimensions differ: {} vs {}",
                a.len(),
                b.len()
            )));
        }
        let beads = (0..n_beads)
            .map(|i| {
                let s = i as f64 / (n_beads - 1) as f64;
                &a * (1.0 - s) + &b * s
            })
            .collect();
        Self::new(beads)
    }

    /// Dimension shared by every bead.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Total number of beads, endpoints included.
    pub fn len(&self) -> usize {
        self.beads.len()
    }

    /// Number of movable interior beads.
    pub fn n_interior(&self) -> usize {
        self.beads.len() - 2
    }

    /// Always false; a chain has at least 3 beads by construction.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// All bead positions in order, endpoints included.
    pub fn positions(&self) -> &[DVector<f64>] {
        &self.beads
    }

    /// Position of one bead by chain index.
    pub fn bead(&self, i: usize) -> &DVector<f64> {
        &self.beads[i]
    }

    /// First (fixed) bead.
    pub fn first(&self) -> &DVector<f64> {
        &self.beads[0]
    }

    /// Last (fixed) bead.
    pub fn last(&self) -> &DVector<f64> {
        &self.beads[self.beads.len() - 1]
    }

    /// Interior bead positions, in order.
    pub fn interior(&self) -> &[DVector<f64>] {
        &self.beads[1..self.beads.len() - 1]
    }

    /// Cloned interior positions, for iteration-local working copies.
    pub fn interior_owned(&self) -> Vec<DVector<f64>> {
        self.interior().to_vec()
    }

    /// Apply per-bead displacements to the interior beads.
    ///
    /// `steps[i]` moves interior bead `i` (chain index `i + 1`); the
    /// endpoints are untouched. Panics if `steps` has the wrong length,
    /// which would indicate a bookkeeping bug in the driver.
    pub fn displace_interior(&mut self, steps: &[DVector<f64>]) {
        assert_eq!(steps.len(), self.n_interior());
        for (bead, step) in self.beads[1..].iter_mut().zip(steps) {
            *bead += step;
        }
    }

    /// Replace the interior bead positions wholesale.
    pub fn set_interior(&mut self, positions: &[DVector<f64>]) {
        assert_eq!(positions.len(), self.n_interior());
        for (bead, pos) in self.beads[1..].iter_mut().zip(positions) {
            bead.copy_from(pos);
        }
    }
}

/// Assemble a full position list from fixed endpoints and interior beads.
///
/// Counterpart of stacking terminal images back around the moving ones;
/// used wherever tangents or constraints need the whole chain while the
/// step machinery works on interior beads only.
pub fn with_endpoints(
    first: &DVector<f64>,
    interior: &[DVector<f64>],
    last: &DVector<f64>,
) -> Vec<DVector<f64>> {
    let mut full = Vec::with_capacity(interior.len() + 2);
    full.push(first.clone());
    full.extend_from_slice(interior);
    full.push(last.clone());
    full
}
