#![cfg(feature = "dev")]
//! Tests for covariance and uncertainty extraction.
//!
//! These tests verify the post-fit uncertainty machinery:
//! - In-place inversion of `R^T R` from the triangular factor
//! - Rank-deficiency truncation at the relative tolerance
//! - Scattering into the full parameter space with exclusions
//! - 1-sigma extraction from the covariance diagonal
//!
//! ## Test Organization
//!
//! 1. **Free-Parameter Covariance** - Known inverses, pivoting, symmetry
//! 2. **Rank Deficiency** - Zeroed deficient directions
//! 3. **Scattering** - Full-matrix layout and exclusions
//! 4. **Uncertainties** - Diagonal extraction rules

use approx::assert_relative_eq;

use levmar::internals::evaluation::covariance::{covar, extract_uncertainties, scatter_covar};

// ============================================================================
// Free-Parameter Covariance
// ============================================================================

/// Test the covariance of an upper-triangular factor with a known inverse.
///
/// For `R = [[2, 1], [0, 1]]`, `(R^T R)^-1 = [[0.5, -0.5], [-0.5, 1.0]]`.
#[test]
fn test_covar_known_inverse() {
    let n = 2;
    let ldr = 2;
    // Column-major: column 0 = [2, *], column 1 = [1, 1].
    let mut r = vec![2.0, 0.0, 1.0, 1.0];
    let ipvt = [0usize, 1];
    let mut wa = [0.0; 2];

    covar(n, &mut r, ldr, &ipvt, 1e-14, &mut wa);

    assert_relative_eq!(r[0], 0.5, epsilon = 1e-14);
    assert_relative_eq!(r[2], -0.5, epsilon = 1e-14);
    assert_relative_eq!(r[1], -0.5, epsilon = 1e-14);
    assert_relative_eq!(r[3], 1.0, epsilon = 1e-14);
}

/// Test that the identity factor yields the identity covariance.
#[test]
fn test_covar_identity() {
    let n = 3;
    let ldr = 3;
    let mut r = vec![0.0; 9];
    for j in 0..n {
        r[j + ldr * j] = 1.0;
    }
    let ipvt = [0usize, 1, 2];
    let mut wa = [0.0; 3];

    covar(n, &mut r, ldr, &ipvt, 1e-14, &mut wa);

    for j in 0..n {
        for i in 0..n {
            let expect = if i == j { 1.0 } else { 0.0 };
            assert_relative_eq!(r[i + ldr * j], expect, epsilon = 1e-14);
        }
    }
}

/// Test that pivoting is undone: the output is in original column order.
#[test]
fn test_covar_unpivots() {
    // Diagonal factor diag(2, 1), but with the columns swapped by the
    // pivot: factored position 0 holds original column 1.
    let n = 2;
    let ldr = 2;
    let mut r = vec![2.0, 0.0, 0.0, 1.0];
    let ipvt = [1usize, 0];
    let mut wa = [0.0; 2];

    covar(n, &mut r, ldr, &ipvt, 1e-14, &mut wa);

    // Variances: original parameter 1 has factor 2 -> variance 1/4;
    // original parameter 0 has factor 1 -> variance 1.
    assert_relative_eq!(r[0], 1.0, epsilon = 1e-14);
    assert_relative_eq!(r[3], 0.25, epsilon = 1e-14);
    assert_relative_eq!(r[1], 0.0, epsilon = 1e-14);
    assert_relative_eq!(r[2], 0.0, epsilon = 1e-14);
}

/// Test that the covariance matrix comes out symmetric.
#[test]
fn test_covar_symmetry() {
    let n = 3;
    let ldr = 3;
    // Upper-triangular factor with mixed magnitudes.
    let mut r = vec![0.0; 9];
    r[0] = 3.0;
    r[3] = 1.0;
    r[4] = 2.0;
    r[6] = -1.0;
    r[7] = 0.5;
    r[8] = 1.5;
    let ipvt = [0usize, 1, 2];
    let mut wa = [0.0; 3];

    covar(n, &mut r, ldr, &ipvt, 1e-14, &mut wa);

    for j in 0..n {
        for i in 0..n {
            assert_relative_eq!(r[i + ldr * j], r[j + ldr * i], epsilon = 1e-12);
        }
    }
}

// ============================================================================
// Rank Deficiency
// ============================================================================

/// Test that a diagonal entry below the tolerance zeroes its direction.
#[test]
fn test_covar_rank_deficient() {
    let n = 2;
    let ldr = 2;
    // Second diagonal entry far below tol * |R[0,0]|.
    let mut r = vec![1.0, 0.0, 0.0, 1e-20];
    let ipvt = [0usize, 1];
    let mut wa = [0.0; 2];

    covar(n, &mut r, ldr, &ipvt, 1e-14, &mut wa);

    assert_relative_eq!(r[0], 1.0, epsilon = 1e-14);
    assert_eq!(r[3], 0.0);
    assert_eq!(r[1], 0.0);
    assert_eq!(r[2], 0.0);
}

// ============================================================================
// Scattering
// ============================================================================

/// Test scattering the free block into the full matrix with a fixed
/// parameter in the middle.
#[test]
fn test_scatter_covar_layout() {
    // Free parameters map to full indices 0 and 2; parameter 1 is fixed.
    let npar = 3;
    let ifree = [0usize, 2];
    let excluded = [false, false];
    let ldr = 2;
    let r = vec![0.5, -0.5, -0.5, 1.0];
    let mut out = vec![9.0; npar * npar];

    scatter_covar(npar, &ifree, &excluded, &r, ldr, &mut out);

    // Row-major full matrix; the fixed row and column are zero.
    assert_relative_eq!(out[0 * npar + 0], 0.5, epsilon = 1e-14);
    assert_relative_eq!(out[0 * npar + 2], -0.5, epsilon = 1e-14);
    assert_relative_eq!(out[2 * npar + 0], -0.5, epsilon = 1e-14);
    assert_relative_eq!(out[2 * npar + 2], 1.0, epsilon = 1e-14);
    for k in 0..npar {
        assert_eq!(out[1 * npar + k], 0.0);
        assert_eq!(out[k * npar + 1], 0.0);
    }
}

/// Test that excluded (pegged) free parameters stay zero in the full
/// matrix.
#[test]
fn test_scatter_covar_excludes_pegged() {
    let npar = 2;
    let ifree = [0usize, 1];
    let excluded = [true, false];
    let ldr = 2;
    let r = vec![0.5, -0.5, -0.5, 1.0];
    let mut out = vec![0.0; npar * npar];

    scatter_covar(npar, &ifree, &excluded, &r, ldr, &mut out);

    assert_eq!(out[0], 0.0);
    assert_eq!(out[1], 0.0);
    assert_eq!(out[2], 0.0);
    assert_relative_eq!(out[3], 1.0, epsilon = 1e-14);
}

// ============================================================================
// Uncertainties
// ============================================================================

/// Test 1-sigma extraction with exclusions and a fixed parameter.
#[test]
fn test_extract_uncertainties() {
    let ifree = [0usize, 2];
    let excluded = [false, true];
    let ldr = 2;
    // Covariance diagonal 4.0 and 9.0; the second free parameter is
    // pegged and must report zero despite its variance.
    let r = vec![4.0, 0.0, 0.0, 9.0];
    let mut out = vec![7.0; 3];

    extract_uncertainties(&ifree, &excluded, &r, ldr, &mut out);

    assert_relative_eq!(out[0], 2.0, epsilon = 1e-14);
    assert_eq!(out[1], 0.0);
    assert_eq!(out[2], 0.0);
}

/// Test that non-positive variances report zero uncertainty.
#[test]
fn test_extract_uncertainties_non_positive_variance() {
    let ifree = [0usize, 1];
    let excluded = [false, false];
    let ldr = 2;
    let r = vec![0.0, 0.0, 0.0, -1.0];
    let mut out = vec![7.0; 2];

    extract_uncertainties(&ifree, &excluded, &r, ldr, &mut out);

    assert_eq!(out, vec![0.0, 0.0]);
}
