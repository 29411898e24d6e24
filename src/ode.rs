//! Adaptive Runge-Kutta integration of gradient flows.
//!
//! The step machinery treats relaxation as the continuous flow
//! `dy/dt = f(t, y)` in force space and needs two operations: integrate to
//! a finite upper limit, and integrate "to infinity", i.e. to the flow's
//! fixed point. Both are free functions independent of the driver, so they
//! can be validated against closed-form flows such as exponential decay.
//!
//! The single-step kernel is the classic Runge-Kutta-Fehlberg embedded
//! 4(5) pair; the difference between its two estimates drives the step
//! size control. The derivative callback is fallible because evaluating
//! the flow requires tangents and (optionally) a constraint solve.

use crate::error::Result;
use log::warn;
use nalgebra::DVector;

/// Default absolute tolerance on the integrated state.
pub const DEFAULT_TOL: f64 = 1.0e-7;

/// Step-count budget for one finite-horizon integration.
const MAX_STEPS: usize = 10_000;

/// Horizon-extension budget when integrating toward the fixed point.
const LIMIT_MAX_EXTENSIONS: usize = 12;

/// One Runge-Kutta-Fehlberg step of size `h` from `(t, y)`.
///
/// Returns the fourth- and fifth-order increments `(step4, step5)`; their
/// difference estimates the local truncation error.
pub fn rkf45_step<F>(t: f64, y: &DVector<f64>, f: &F, h: f64) -> Result<(DVector<f64>, DVector<f64>)>
where
    F: Fn(f64, &DVector<f64>) -> Result<DVector<f64>>,
{
    let k1 = f(t, y)? * h;
    let k2 = f(t + h / 4.0, &(y + &k1 * (1.0 / 4.0)))? * h;
    let k3 = f(
        t + 3.0 / 8.0 * h,
        &(y + &k1 * (3.0 / 32.0) + &k2 * (9.0 / 32.0)),
    )? * h;
    let k4 = f(
        t + 12.0 / 13.0 * h,
        &(y + &k1 * (1932.0 / 2197.0) - &k2 * (7200.0 / 2197.0) + &k3 * (7296.0 / 2197.0)),
    )? * h;
    let k5 = f(
        t + h,
        &(y + &k1 * (439.0 / 216.0) - &k2 * 8.0 + &k3 * (3680.0 / 513.0) - &k4 * (845.0 / 4104.0)),
    )? * h;
    let k6 = f(
        t + h / 2.0,
        &(y - &k1 * (8.0 / 27.0) + &k2 * 2.0 - &k3 * (3544.0 / 2565.0) + &k4 * (1859.0 / 4104.0)
            - &k5 * (11.0 / 40.0)),
    )? * h;

    let step4 =
        &k1 * (25.0 / 216.0) + &k3 * (1408.0 / 2565.0) + &k4 * (2197.0 / 4104.0) - &k5 * (1.0 / 5.0);
    let step5 = &k1 * (16.0 / 135.0) + &k3 * (6656.0 / 12825.0) + &k4 * (28561.0 / 56430.0)
        - &k5 * (9.0 / 50.0)
        + &k6 * (2.0 / 55.0);

    Ok((step4, step5))
}

/// Integrate `dy/dt = f(t, y)` from `(t0, y0)` to `t_end` with adaptive
/// step-size control against an absolute tolerance.
pub fn integrate<F>(t0: f64, y0: &DVector<f64>, f: &F, t_end: f64, tol: f64) -> Result<DVector<f64>>
where
    F: Fn(f64, &DVector<f64>) -> Result<DVector<f64>>,
{
    debug_assert!(t_end >= t0);
    let mut t = t0;
    let mut y = y0.clone();
    let mut h = t_end - t0;
    if h == 0.0 {
        return Ok(y);
    }

    for _ in 0..MAX_STEPS {
        if t >= t_end {
            return Ok(y);
        }
        h = h.min(t_end - t);
        let (step4, step5) = rkf45_step(t, &y, f, h)?;
        let err = (&step5 - &step4).amax();
        let scale = tol * (1.0 + y.amax());

        if err <= scale {
            t += h;
            y += step5;
        }

        // Standard fifth-order step adjustment, kept within [1/5, 5].
        let factor = if err > 0.0 {
            (0.9 * (scale / err).powf(0.2)).clamp(0.2, 5.0)
        } else {
            5.0
        };
        h *= factor;
    }
    warn!("ode: step budget exhausted at t = {t:.3e} of {t_end:.3e}");
    Ok(y)
}

/// Integrate `dy/dt = f(t, y)` from `(0, y0)` toward the flow's fixed
/// point.
///
/// The horizon is repeatedly extended (each extension twice as long as the
/// previous one) until two successive states agree within `tol`. If the
/// extension budget runs out the best state so far is returned with a
/// warning; for the exponentially decaying flows integrated here that
/// indicates a tolerance far tighter than the flow supports.
pub fn integrate_to_limit<F>(y0: &DVector<f64>, f: &F, tol: f64) -> Result<DVector<f64>>
where
    F: Fn(f64, &DVector<f64>) -> Result<DVector<f64>>,
{
    let mut t0 = 0.0;
    let mut t1 = 1.0;
    let mut y1 = y0.clone();
    let mut y2 = integrate(t0, &y1, f, t1, tol)?;

    for _ in 0..LIMIT_MAX_EXTENSIONS {
        if (&y2 - &y1).amax() <= tol {
            return Ok(y2);
        }
        let span = t1 - t0;
        t0 = t1;
        t1 += 2.0 * span;
        y1 = y2.clone();
        y2 = integrate(t0, &y1, f, t1, tol)?;
    }
    warn!("ode: fixed-point extension budget exhausted at t = {t1:.3e}");
    Ok(y2)
}
