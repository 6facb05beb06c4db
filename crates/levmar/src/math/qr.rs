//! QR factorization with column pivoting and the damped triangular solve.
//!
//! ## Purpose
//!
//! This module provides the two dense linear-algebra kernels of the trust
//! region step: `qrfac`, a Householder QR factorization with column
//! pivoting, and `qrsolv`, which solves the damped least-squares system
//! `(A^T A + D^T D) x = A^T b` given those factors.
//!
//! ## Design notes
//!
//! * **Column-major, in place**: Matrices are flat slices with an explicit
//!   leading dimension; `qrfac` overwrites the input with the Householder
//!   vectors below the diagonal and the strict upper triangle of `R`.
//! * **Running norm downdates**: Column norms are downdated incrementally
//!   during pivoting and recomputed from scratch when cancellation exceeds
//!   a 5% relative threshold.
//! * **Rank tolerance by structure**: Zero diagonals are handled by the
//!   least-squares fallback in `qrsolv`, never by failing.
//!
//! ## Key concepts
//!
//! * **Pivot order**: `ipvt[j]` names the original column sitting in
//!   factored position `j`.
//! * **Negated diagonal**: `rdiag[j]` carries `R[j][j]` with the sign the
//!   Householder reflection produced (negative for a positive leading
//!   entry), exactly as the downstream step solver expects.
//!
//! ## Invariants
//!
//! * `qrsolv` leaves the strict upper triangle of `r` holding `R` (with the
//!   permuted damping folded in below the diagonal and in `sdiag`).
//!
//! ## Non-goals
//!
//! * No blocked or parallel factorization; problem sizes are small.
//! * No general linear algebra beyond what the step solver needs.

// External dependencies
use num_traits::Float;

// Internal dependencies
use crate::math::norm::{enorm, machep};

// ============================================================================
// QR Factorization with Column Pivoting
// ============================================================================

/// Householder QR factorization with column pivoting of the `m x n` matrix
/// `a` (column-major, leading dimension `m`).
///
/// On return `a` holds the Householder vectors below the diagonal and the
/// strict upper triangle of `R`; `rdiag` holds the (signed) diagonal of `R`,
/// `acnorm` the original column norms, and `ipvt` the pivot permutation.
/// `wa` is `n`-length scratch.
pub fn qrfac<T: Float>(
    m: usize,
    n: usize,
    a: &mut [T],
    ipvt: &mut [usize],
    rdiag: &mut [T],
    acnorm: &mut [T],
    wa: &mut [T],
) {
    let zero = T::zero();
    let one = T::one();
    let p05 = T::from(0.05).unwrap();

    // Compute the initial column norms and initialize several arrays.
    for j in 0..n {
        acnorm[j] = enorm(&a[(m * j)..(m * j + m)]);
        rdiag[j] = acnorm[j];
        wa[j] = rdiag[j];
        ipvt[j] = j;
    }

    // Reduce a to r with Householder transformations.
    let minmn = m.min(n);
    for j in 0..minmn {
        // Bring the column of largest norm into the pivot position.
        let mut kmax = j;
        for k in j..n {
            if rdiag[k] > rdiag[kmax] {
                kmax = k;
            }
        }
        if kmax != j {
            for i in 0..m {
                a.swap(i + m * j, i + m * kmax);
            }
            rdiag[kmax] = rdiag[j];
            wa[kmax] = wa[j];
            ipvt.swap(j, kmax);
        }

        // Compute the Householder transformation to reduce the j-th column
        // of a to a multiple of the j-th unit vector.
        let mut ajnorm = enorm(&a[(j + m * j)..(m * j + m)]);
        if ajnorm != zero {
            if a[j + m * j] < zero {
                ajnorm = -ajnorm;
            }
            for i in j..m {
                a[i + m * j] = a[i + m * j] / ajnorm;
            }
            a[j + m * j] = a[j + m * j] + one;

            // Apply the transformation to the remaining columns and update
            // the norms.
            for k in (j + 1)..n {
                let mut sum = zero;
                for i in j..m {
                    sum = sum + a[i + m * j] * a[i + m * k];
                }
                let temp = sum / a[j + m * j];
                for i in j..m {
                    a[i + m * k] = a[i + m * k] - temp * a[i + m * j];
                }
                if rdiag[k] != zero {
                    let temp = a[j + m * k] / rdiag[k];
                    rdiag[k] = rdiag[k] * zero.max(one - temp * temp).sqrt();
                    let ratio = rdiag[k] / wa[k];
                    if p05 * ratio * ratio <= machep::<T>() {
                        rdiag[k] = enorm(&a[(j + 1 + m * k)..(m * k + m)]);
                        wa[k] = rdiag[k];
                    }
                }
            }
        }
        rdiag[j] = -ajnorm;
    }
}

// ============================================================================
// Damped Triangular Solve
// ============================================================================

/// Solve `(A^T A + D^T D) x = A^T b` given the QR factors of `A`.
///
/// `r` holds the factorization from [`qrfac`] (leading dimension `ldr`),
/// `ipvt` its pivot order, `diag` the damping diagonal `D` indexed by
/// pre-permutation free position, and `qtb` the first `n` components of
/// `Q^T b`. On return `x` holds the solution, `sdiag` the diagonal of the
/// modified triangular factor `S`, and the strict lower triangle of `r`
/// holds `S^T` (the upper triangle is preserved). `wa` is `n`-length
/// scratch.
pub fn qrsolv<T: Float>(
    n: usize,
    r: &mut [T],
    ldr: usize,
    ipvt: &[usize],
    diag: &[T],
    qtb: &[T],
    x: &mut [T],
    sdiag: &mut [T],
    wa: &mut [T],
) {
    let zero = T::zero();
    let p5 = T::from(0.5).unwrap();
    let p25 = T::from(0.25).unwrap();

    // Copy r and (q transpose)*b to preserve input and initialize s. In
    // particular, save the diagonal elements of r in x.
    for j in 0..n {
        for i in j..n {
            r[i + ldr * j] = r[j + ldr * i];
        }
        x[j] = r[j + ldr * j];
        wa[j] = qtb[j];
    }

    // Eliminate the diagonal matrix d using a Givens rotation.
    for j in 0..n {
        // Prepare the row of d to be eliminated, locating the diagonal
        // element using p from the QR factorization.
        let l = ipvt[j];
        if diag[l] != zero {
            for k in j..n {
                sdiag[k] = zero;
            }
            sdiag[j] = diag[l];

            // The transformations to eliminate the row of d modify only a
            // single element of (q transpose)*b beyond the first n, which
            // is initially zero.
            let mut qtbpj = zero;
            for k in j..n {
                if sdiag[k] == zero {
                    continue;
                }

                // Determine a Givens rotation which eliminates the
                // appropriate element in the current row of d.
                let (cos, sin) = if r[k + ldr * k].abs() < sdiag[k].abs() {
                    let cotan = r[k + ldr * k] / sdiag[k];
                    let sin = p5 / (p25 + p25 * cotan * cotan).sqrt();
                    (sin * cotan, sin)
                } else {
                    let tan = sdiag[k] / r[k + ldr * k];
                    let cos = p5 / (p25 + p25 * tan * tan).sqrt();
                    (cos, cos * tan)
                };

                // Compute the modified diagonal element of r and the
                // modified element of ((q transpose)*b, 0).
                r[k + ldr * k] = cos * r[k + ldr * k] + sin * sdiag[k];
                let temp = cos * wa[k] + sin * qtbpj;
                qtbpj = -sin * wa[k] + cos * qtbpj;
                wa[k] = temp;

                // Accumulate the transformation in the row of s.
                for i in (k + 1)..n {
                    let temp = cos * r[i + ldr * k] + sin * sdiag[i];
                    sdiag[i] = -sin * r[i + ldr * k] + cos * sdiag[i];
                    r[i + ldr * k] = temp;
                }
            }
        }

        // Store the diagonal element of s and restore the corresponding
        // diagonal element of r.
        sdiag[j] = r[j + ldr * j];
        r[j + ldr * j] = x[j];
    }

    // Solve the triangular system for z. If the system is singular, then
    // obtain a least squares solution.
    let mut nsing = n;
    for j in 0..n {
        if sdiag[j] == zero && nsing == n {
            nsing = j;
        }
        if nsing < n {
            wa[j] = zero;
        }
    }
    for k in 0..nsing {
        let j = nsing - k - 1;
        let mut sum = zero;
        for i in (j + 1)..nsing {
            sum = sum + r[i + ldr * j] * wa[i];
        }
        wa[j] = (wa[j] - sum) / sdiag[j];
    }

    // Permute the components of z back to components of x.
    for j in 0..n {
        x[ipvt[j]] = wa[j];
    }
}
