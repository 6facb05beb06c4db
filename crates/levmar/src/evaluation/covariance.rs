//! Parameter covariance from the final QR factors.
//!
//! ## Purpose
//!
//! After the iteration loop terminates, the triangular factor `R` and the
//! pivot order from the last QR factorization describe the local curvature
//! of the objective. This module turns them into the covariance matrix
//! `(J^T J)^-1` of the free parameters and the 1-sigma uncertainties on
//! its diagonal.
//!
//! ## Design notes
//!
//! * **Back-substitution, not inversion**: `R` is inverted column by
//!   column in place; the product `R^-1 R^-T` is then accumulated in the
//!   same storage. No general matrix inverse is formed.
//! * **Rank awareness**: diagonal entries of `R` smaller than
//!   `tol * |R[0,0]|` truncate the inversion; everything past the cutoff
//!   gets zero variance and zero cross-covariance.
//! * **Full-length outputs**: the public matrix is `npar x npar` over all
//!   parameters. Rows and columns of fixed, tied, and bound-pegged
//!   parameters are zero.
//!
//! ## Invariants
//!
//! * The scattered covariance matrix is symmetric.
//! * Uncertainties are non-negative; excluded parameters report zero.
//!
//! ## Non-goals
//!
//! * No confidence intervals or correlation matrices; callers can derive
//!   them from the covariance matrix.

// External dependencies
use num_traits::Float;

// ============================================================================
// Free-parameter covariance
// ============================================================================

/// Transform the triangular factor into the covariance of the free
/// parameters, in place.
///
/// `r` holds the `n x n` factor `R` (column-major, leading dimension
/// `ldr`) in its upper triangle and `ipvt` the pivot order that produced
/// it. On return the leading `n x n` block of `r` holds the symmetric
/// covariance matrix in the original (unpivoted) free-parameter order.
/// `wa` is `n`-length scratch.
pub fn covar<T: Float>(n: usize, r: &mut [T], ldr: usize, ipvt: &[usize], tol: T, wa: &mut [T]) {
    let zero = T::zero();
    let one = T::one();

    // Form the inverse of R in the full upper triangle of r. Stop at the
    // first diagonal entry below the relative tolerance; l marks the last
    // well-conditioned column.
    let tolr = tol * r[0].abs();
    let mut l: isize = -1;
    for k in 0..n {
        let kk = k + ldr * k;
        if r[kk].abs() <= tolr {
            break;
        }
        r[kk] = one / r[kk];
        for j in 0..k {
            let kj = j + ldr * k;
            let temp = r[kk] * r[kj];
            r[kj] = zero;
            for i in 0..=j {
                r[i + ldr * k] = r[i + ldr * k] - temp * r[i + ldr * j];
            }
        }
        l = k as isize;
    }

    // Form the full upper triangle of the inverse of R^T R in r.
    if l >= 0 {
        let l = l as usize;
        for k in 0..=l {
            for j in 0..k {
                let temp = r[j + ldr * k];
                for i in 0..=j {
                    r[i + ldr * j] = r[i + ldr * j] + temp * r[i + ldr * k];
                }
            }
            let temp = r[k + ldr * k];
            for i in 0..=k {
                r[i + ldr * k] = r[i + ldr * k] * temp;
            }
        }
    }

    // Undo the pivoting, building the full lower triangle in r and the
    // diagonal in wa. Columns past the rank cutoff are zeroed.
    for j in 0..n {
        let jj = ipvt[j];
        let sing = (j as isize) > l;
        for i in 0..=j {
            if sing {
                r[i + ldr * j] = zero;
            }
            let ii = ipvt[i];
            if ii > jj {
                r[ii + ldr * jj] = r[i + ldr * j];
            }
            if ii < jj {
                r[jj + ldr * ii] = r[i + ldr * j];
            }
        }
        wa[jj] = r[j + ldr * j];
    }

    // Symmetrize.
    for j in 0..n {
        for i in 0..=j {
            r[i + ldr * j] = r[j + ldr * i];
        }
        r[j + ldr * j] = wa[j];
    }
}

// ============================================================================
// Scattering to full parameter space
// ============================================================================

/// Scatter the free-parameter covariance block into the full
/// `npar x npar` matrix.
///
/// `r` holds the output of [`covar`]; `ifree` maps free indices to full
/// indices and `excluded[j]` marks free parameters (pegged at a bound)
/// whose rows and columns must stay zero. Fixed and tied parameters are
/// never in `ifree`, so their rows and columns are zero as well.
pub fn scatter_covar<T: Float>(
    npar: usize,
    ifree: &[usize],
    excluded: &[bool],
    r: &[T],
    ldr: usize,
    out: &mut [T],
) {
    for value in out.iter_mut() {
        *value = T::zero();
    }
    for (j, &full_j) in ifree.iter().enumerate() {
        if excluded[j] {
            continue;
        }
        for (i, &full_i) in ifree.iter().enumerate() {
            if excluded[i] {
                continue;
            }
            out[full_i * npar + full_j] = r[i + ldr * j];
        }
    }
}

/// Extract 1-sigma uncertainties from the covariance diagonal.
///
/// Writes `sqrt(var)` for each included free parameter into the
/// full-length `out` vector; everything else reports zero. Non-positive
/// variances (rank deficiency) also report zero.
pub fn extract_uncertainties<T: Float>(
    ifree: &[usize],
    excluded: &[bool],
    r: &[T],
    ldr: usize,
    out: &mut [T],
) {
    for value in out.iter_mut() {
        *value = T::zero();
    }
    for (j, &full) in ifree.iter().enumerate() {
        if excluded[j] {
            continue;
        }
        let var = r[j + ldr * j];
        if var > T::zero() {
            out[full] = var.sqrt();
        }
    }
}
