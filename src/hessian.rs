//! Per-bead quasi-Newton curvature models.
//!
//! Each interior bead owns a [`BfgsHessian`], a dense symmetric approximation
//! of the local curvature together with its inverse. Both matrices are kept
//! in sync through the paired BFGS update formulas, so `apply` and
//! `apply_inverse` remain exact inverses of each other at every iteration:
//!
//! ```text
//! H'    = H + (Δg·Δg^T)/(Δx·Δg) - (H·Δx)(H·Δx)^T/(Δx^T·H·Δx)
//! H'^-1 = H^-1 + fac·Δx·Δx^T - fad·(H^-1·Δg)(H^-1·Δg)^T + fae·w·w^T
//!         fac = 1/(Δg·Δx),  fad = 1/(Δg·H^-1·Δg),  fae = Δg·H^-1·Δg,
//!         w = fac·Δx - fad·H^-1·Δg
//! ```
//!
//! The update is applied only under the curvature condition `Δx·Δg > 0`,
//! which preserves positive definiteness; a violating pair is skipped and
//! logged, never raised.
//!
//! [`HessianSet`] composes one model per interior bead and broadcasts
//! updates and inverse applications across the whole chain without the
//! beads interacting.
//!
//! # References
//!
//! - Nocedal, J.; Wright, S. J. *Numerical Optimization*, 2nd ed., ch. 6.

use log::debug;
use nalgebra::{DMatrix, DVector};

/// Numerical thresholds for the secant update.
const SMALL: f64 = 1e-14;

/// Dense BFGS curvature model for a single bead.
#[derive(Debug, Clone)]
pub struct BfgsHessian {
    h: DMatrix<f64>,
    h_inv: DMatrix<f64>,
}

impl BfgsHessian {
    /// Isotropic initial model `stiffness * I`.
    ///
    /// The stiffness sets the scale of the very first steps, before any
    /// secant information exists: `apply_inverse` divides by it, so a large
    /// value makes the initial steps conservative.
    ///
    /// # Panics
    ///
    /// Panics if `stiffness` is not strictly positive.
    pub fn new(dim: usize, stiffness: f64) -> Self {
        assert!(stiffness > 0.0, "stiffness must be positive");
        Self {
            h: DMatrix::identity(dim, dim) * stiffness,
            h_inv: DMatrix::identity(dim, dim) / stiffness,
        }
    }

    /// Secant update from a position difference and gradient difference.
    ///
    /// Skipped (with a debug log) when the data is non-finite, when the
    /// curvature condition fails, or when a denominator underflows. After
    /// an applied update, `self.apply(delta_x)` reproduces `delta_g`.
    pub fn update(&mut self, delta_x: &DVector<f64>, delta_g: &DVector<f64>) {
        if !delta_x.iter().all(|v| v.is_finite()) || !delta_g.iter().all(|v| v.is_finite()) {
            debug!("bfgs: skipping update with non-finite secant data");
            return;
        }

        let dx_dg = delta_x.dot(delta_g);
        if dx_dg <= SMALL {
            debug!("bfgs: skipping update, curvature condition failed (dx.dg = {dx_dg:.3e})");
            return;
        }

        let h_dx = &self.h * delta_x;
        let dx_h_dx = delta_x.dot(&h_dx);
        let hinv_dg = &self.h_inv * delta_g;
        let dg_hinv_dg = delta_g.dot(&hinv_dg);
        if dx_h_dx.abs() <= SMALL || dg_hinv_dg.abs() <= SMALL {
            debug!("bfgs: skipping update, vanishing denominator");
            return;
        }

        // Forward update.
        self.h += delta_g * delta_g.transpose() / dx_dg - &h_dx * h_dx.transpose() / dx_h_dx;

        // Matching inverse update.
        let fac = 1.0 / dx_dg;
        let fad = 1.0 / dg_hinv_dg;
        let w = delta_x * fac - &hinv_dg * fad;
        self.h_inv += delta_x * delta_x.transpose() * fac
            - &hinv_dg * hinv_dg.transpose() * fad
            + &w * w.transpose() * dg_hinv_dg;

        // Symmetrize against floating-point drift.
        self.h = (&self.h + self.h.transpose()) * 0.5;
        self.h_inv = (&self.h_inv + self.h_inv.transpose()) * 0.5;
    }

    /// Map a position-space vector to force space: `H · v`.
    pub fn apply(&self, v: &DVector<f64>) -> DVector<f64> {
        &self.h * v
    }

    /// Map a force-space vector to position space: `H^-1 · v`.
    pub fn apply_inverse(&self, v: &DVector<f64>) -> DVector<f64> {
        &self.h_inv * v
    }
}

/// One curvature model per interior bead, with chain-wide broadcasts.
#[derive(Debug, Clone)]
pub struct HessianSet {
    models: Vec<BfgsHessian>,
}

impl HessianSet {
    /// One fresh isotropic model for each of `n_beads` interior beads.
    pub fn new(n_beads: usize, dim: usize, stiffness: f64) -> Self {
        Self {
            models: (0..n_beads).map(|_| BfgsHessian::new(dim, stiffness)).collect(),
        }
    }

    /// Number of models in the set.
    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// Whether the set holds no models.
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Model of one bead, by interior index.
    pub fn model(&self, i: usize) -> &BfgsHessian {
        &self.models[i]
    }

    /// Secant-update every model from per-bead differences.
    pub fn update_all(&mut self, delta_x: &[DVector<f64>], delta_g: &[DVector<f64>]) {
        debug_assert_eq!(self.models.len(), delta_x.len());
        debug_assert_eq!(self.models.len(), delta_g.len());
        for ((model, dx), dg) in self.models.iter_mut().zip(delta_x).zip(delta_g) {
            model.update(dx, dg);
        }
    }

    /// Apply each bead's inverse model to the matching vector.
    pub fn apply_inverse_all(&self, vectors: &[DVector<f64>]) -> Vec<DVector<f64>> {
        debug_assert_eq!(self.models.len(), vectors.len());
        self.models
            .iter()
            .zip(vectors)
            .map(|(model, v)| model.apply_inverse(v))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vec3(a: f64, b: f64, c: f64) -> DVector<f64> {
        DVector::from_vec(vec![a, b, c])
    }

    #[test]
    fn test_fresh_model_round_trip() {
        let model = BfgsHessian::new(3, 70.0);
        let v = vec3(0.3, -1.2, 2.5);
        let round = model.apply_inverse(&model.apply(&v));
        assert!((&round - &v).norm() < 1e-12);
        let round = model.apply(&model.apply_inverse(&v));
        assert!((&round - &v).norm() < 1e-12);
    }

    #[test]
    fn test_fresh_model_is_isotropic() {
        let model = BfgsHessian::new(3, 70.0);
        let v = vec3(1.0, 2.0, 3.0);
        assert!((model.apply(&v) - &v * 70.0).norm() < 1e-12);
        assert!((model.apply_inverse(&v) - &v / 70.0).norm() < 1e-12);
    }

    #[test]
    fn test_secant_equation_after_update() {
        let mut model = BfgsHessian::new(3, 70.0);
        let dx = vec3(0.1, 0.2, -0.05);
        let dg = vec3(0.4, 0.1, 0.02);
        model.update(&dx, &dg);
        let residual = model.apply(&dx) - &dg;
        assert!(residual.norm() < 1e-10 * dg.norm().max(1.0), "secant violated: {residual}");
    }

    #[test]
    fn test_round_trip_survives_updates() {
        let mut model = BfgsHessian::new(3, 70.0);
        model.update(&vec3(0.1, 0.2, -0.05), &vec3(0.4, 0.1, 0.02));
        model.update(&vec3(-0.03, 0.07, 0.11), &vec3(-0.1, 0.3, 0.25));
        let v = vec3(0.7, -0.4, 1.9);
        let round = model.apply_inverse(&model.apply(&v));
        assert!((&round - &v).norm() < 1e-8);
    }

    #[test]
    fn test_negative_curvature_skipped() {
        let mut model = BfgsHessian::new(2, 10.0);
        let before = model.clone();
        let dx = DVector::from_vec(vec![0.1, 0.2]);
        let dg = DVector::from_vec(vec![-0.1, -0.2]);
        model.update(&dx, &dg);
        let v = DVector::from_vec(vec![1.0, -1.0]);
        assert!((model.apply(&v) - before.apply(&v)).norm() < 1e-14);
    }

    #[test]
    fn test_set_updates_are_independent() {
        let mut set = HessianSet::new(2, 2, 10.0);
        let dx = vec![
            DVector::from_vec(vec![0.1, 0.0]),
            DVector::from_vec(vec![0.0, 0.0]),
        ];
        let dg = vec![
            DVector::from_vec(vec![0.5, 0.0]),
            DVector::from_vec(vec![0.0, 0.0]),
        ];
        set.update_all(&dx, &dg);
        let probe = DVector::from_vec(vec![1.0, 1.0]);
        // Bead 0 absorbed the secant pair, bead 1 saw a zero pair and kept
        // its isotropic model.
        assert!((set.model(1).apply(&probe) - &probe * 10.0).norm() < 1e-14);
        assert!((set.model(0).apply(&probe) - &probe * 10.0).norm() > 1e-3);
    }
}
