//! Levenberg-Marquardt damping parameter search.
//!
//! ## Purpose
//!
//! Given the QR factors of the scaled Jacobian and the trust radius
//! `delta`, this module finds the damping parameter `par` and the step `x`
//! solving
//!
//! ```text
//!     (J^T J + par * D^T D) x = -J^T f,   with |D x| close to delta
//! ```
//!
//! ## Design notes
//!
//! * **Safeguarded 1D search**: `par` is bracketed between `parl` (from the
//!   Gauss-Newton step) and `paru` (from the gradient step) and refined by
//!   Newton corrections on `phi(par) = |D x(par)| - delta`.
//! * **Early Gauss-Newton exit**: When the undamped step already lies
//!   within the trust region, `par = 0` is accepted without any search.
//! * **Rank deficiency**: A zero diagonal in `R` truncates the triangular
//!   solve; the deficient directions contribute nothing to the step.
//!
//! ## Invariants
//!
//! * On a successful search `|D x|` lands within `STEP_BAND * delta` of
//!   `delta`, unless the function is flat below the radius (`parl == 0`
//!   case) or the iteration cap fires.
//! * `par >= 0` always.
//!
//! ## Non-goals
//!
//! * No bound handling; steps are clamped by the constraint manager
//!   afterwards.

// External dependencies
use num_traits::Float;

// Internal dependencies
use crate::math::norm::{dwarf, enorm};
use crate::math::qr::qrsolv;

// Acceptance band around the trust radius, as a fraction of it.
const STEP_BAND: f64 = 0.1;

// Cap on the number of search iterations.
const MAX_SEARCH_ITER: usize = 10;

// Fraction of the upper bound used to restart a collapsed parameter.
const PAR_FLOOR_FRACTION: f64 = 0.001;

/// Compute the damped step for the current trust radius.
///
/// `r` holds the QR factorization from `qrfac` (leading dimension `ldr`)
/// with the `R` diagonal already placed on its diagonal; `ipvt` is the
/// pivot order, `ifree` the free index map, `diag` the full-length scaling
/// vector, and `qtb` the first `n` components of `Q^T b`. `par` carries the
/// damping parameter between calls. On return `x` holds the step and
/// `sdiag` the diagonal of the damped factor; `wa1`/`wa2` are `n`-length
/// scratch.
#[allow(clippy::too_many_arguments)]
pub fn lmpar<T: Float>(
    n: usize,
    r: &mut [T],
    ldr: usize,
    ipvt: &[usize],
    ifree: &[usize],
    diag: &[T],
    qtb: &[T],
    delta: T,
    par: &mut T,
    x: &mut [T],
    sdiag: &mut [T],
    wa1: &mut [T],
    wa2: &mut [T],
) {
    let zero = T::zero();
    let p1 = T::from(STEP_BAND).unwrap();
    let p001 = T::from(PAR_FLOOR_FRACTION).unwrap();

    // Compute and store in x the Gauss-Newton direction. If the Jacobian
    // is rank-deficient, obtain a least squares solution.
    let mut nsing = n;
    for j in 0..n {
        wa1[j] = qtb[j];
        if r[j + ldr * j] == zero && nsing == n {
            nsing = j;
        }
        if nsing < n {
            wa1[j] = zero;
        }
    }
    for k in 0..nsing {
        let j = nsing - k - 1;
        wa1[j] = wa1[j] / r[j + ldr * j];
        let temp = wa1[j];
        for i in 0..j {
            wa1[i] = wa1[i] - r[i + ldr * j] * temp;
        }
    }
    for j in 0..n {
        x[ipvt[j]] = wa1[j];
    }

    // Evaluate the function at the origin, and test for acceptance of the
    // Gauss-Newton direction.
    for j in 0..n {
        wa2[j] = diag[ifree[j]] * x[j];
    }
    let mut dxnorm = enorm(&wa2[..n]);
    let mut fp = dxnorm - delta;
    if fp <= p1 * delta {
        *par = zero;
        return;
    }

    // If the Jacobian is not rank deficient, the Newton step provides a
    // lower bound, parl, for the zero of the function. Otherwise set this
    // bound to zero.
    let mut parl = zero;
    if nsing >= n {
        for j in 0..n {
            let l = ipvt[j];
            wa1[j] = diag[ifree[l]] * (wa2[l] / dxnorm);
        }
        for j in 0..n {
            let mut sum = zero;
            for i in 0..j {
                sum = sum + r[i + ldr * j] * wa1[i];
            }
            wa1[j] = (wa1[j] - sum) / r[j + ldr * j];
        }
        let temp = enorm(&wa1[..n]);
        parl = ((fp / delta) / temp) / temp;
    }

    // Calculate an upper bound, paru, for the zero of the function.
    for j in 0..n {
        let mut sum = zero;
        for i in 0..=j {
            sum = sum + r[i + ldr * j] * qtb[i];
        }
        wa1[j] = sum / diag[ifree[ipvt[j]]];
    }
    let gnorm = enorm(&wa1[..n]);
    let mut paru = gnorm / delta;
    if paru == zero {
        paru = dwarf::<T>() / delta.min(p1);
    }

    // If the input par lies outside of the interval (parl, paru), set par
    // to the closer endpoint.
    *par = (*par).max(parl);
    *par = (*par).min(paru);
    if *par == zero {
        *par = gnorm / dxnorm;
    }

    let mut iter = 0;
    loop {
        iter += 1;

        // Evaluate the function at the current value of par.
        if *par == zero {
            *par = dwarf::<T>().max(p001 * paru);
        }
        let temp = par.sqrt();
        for j in 0..n {
            wa1[j] = temp * diag[ifree[j]];
        }
        qrsolv(n, r, ldr, ipvt, &wa1[..n], qtb, x, sdiag, wa2);
        for j in 0..n {
            wa2[j] = diag[ifree[j]] * x[j];
        }
        dxnorm = enorm(&wa2[..n]);
        let prev_fp = fp;
        fp = dxnorm - delta;

        // If the function is small enough, accept the current value of
        // par. Also test for the exceptional cases where parl is zero or
        // the number of iterations has reached its cap.
        if fp.abs() <= p1 * delta
            || (parl == zero && fp <= prev_fp && prev_fp < zero)
            || iter == MAX_SEARCH_ITER
        {
            return;
        }

        // Compute the Newton correction.
        for j in 0..n {
            let l = ipvt[j];
            wa1[j] = diag[ifree[l]] * (wa2[l] / dxnorm);
        }
        for j in 0..n {
            wa1[j] = wa1[j] / sdiag[j];
            let temp = wa1[j];
            for i in (j + 1)..n {
                wa1[i] = wa1[i] - r[i + ldr * j] * temp;
            }
        }
        let temp = enorm(&wa1[..n]);
        let parc = ((fp / delta) / temp) / temp;

        // Depending on the sign of the function, update parl or paru.
        if fp > zero {
            parl = parl.max(*par);
        }
        if fp < zero {
            paru = paru.min(*par);
        }

        // Compute an improved estimate for par.
        *par = parl.max(*par + parc);
    }
}
