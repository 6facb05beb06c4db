#![cfg(feature = "dev")]
//! Tests for free-parameter mapping, bounds, and tie resolution.
//!
//! These tests verify the constraint manager used by the fitting engine for:
//! - Free index map construction from constraint descriptors
//! - Structural validation (inverted bounds, tie cycles, out-of-box starts)
//! - Gather/scatter between the full and free parameter spaces
//! - Step clamping, bound snapping, and pegged-parameter bookkeeping
//!
//! ## Test Organization
//!
//! 1. **Free Set Construction** - Index maps, counts, analytic columns
//! 2. **Validation** - Error paths for malformed descriptors
//! 3. **Ties** - Resolution order and cycle detection
//! 4. **Step Clamping** - Feasibility, snapping, pegging

use approx::assert_relative_eq;

use levmar::internals::algorithms::constraints::FreeSet;
use levmar::internals::primitives::errors::LevmarError;
use levmar::internals::primitives::parameter::{DerivSide, ParamConstraint};

// ============================================================================
// Free Set Construction
// ============================================================================

/// Test that an empty constraint slice leaves every parameter free.
#[test]
fn test_empty_constraints_all_free() {
    let params = [1.0, 2.0, 3.0];
    let free = FreeSet::build(&params, &[]).unwrap();

    assert_eq!(free.npar, 3);
    assert_eq!(free.nfree(), 3);
    assert_eq!(free.ifree, vec![0, 1, 2]);
    assert!(!free.any_limits);
    assert!(free.ties.is_empty());
}

/// Test that fixed and tied parameters drop out of the free set.
#[test]
fn test_fixed_and_tied_excluded() {
    let params = [1.0, 2.0, 3.0, 4.0];
    let constraints = [
        ParamConstraint::new(),
        ParamConstraint::fixed(),
        ParamConstraint::tied_to(0, |v: f64| 2.0 * v),
        ParamConstraint::new(),
    ];
    let free = FreeSet::build(&params, &constraints).unwrap();

    assert_eq!(free.nfree(), 2);
    assert_eq!(free.ifree, vec![0, 3]);
    assert_eq!(free.ties.len(), 1);
}

/// Test that analytic parameters are counted for the derivative pass.
#[test]
fn test_analytic_count() {
    let params = [1.0, 2.0, 3.0];
    let constraints = [
        ParamConstraint::new().with_side(DerivSide::Analytic),
        ParamConstraint::new(),
        ParamConstraint::new().with_side(DerivSide::Analytic),
    ];
    let free = FreeSet::build(&params, &constraints).unwrap();

    assert_eq!(free.analytic_count(), 2);
}

/// Test gather and scatter round-trip between full and free spaces.
#[test]
fn test_gather_scatter() {
    let params = [1.0, 2.0, 3.0];
    let constraints = [
        ParamConstraint::new(),
        ParamConstraint::fixed(),
        ParamConstraint::new(),
    ];
    let free = FreeSet::build(&params, &constraints).unwrap();

    let mut x = [0.0; 2];
    free.gather(&params, &mut x);
    assert_eq!(x, [1.0, 3.0]);

    let mut full = params;
    free.scatter(&[10.0, 30.0], &mut full);
    assert_eq!(full, [10.0, 2.0, 30.0]);
}

// ============================================================================
// Validation
// ============================================================================

/// Test that a non-empty constraint slice must match the parameter count.
#[test]
fn test_constraint_count_mismatch() {
    let params = [1.0, 2.0];
    let constraints = [ParamConstraint::<f64>::new()];
    let err = FreeSet::build(&params, &constraints).unwrap_err();

    assert!(matches!(
        err,
        LevmarError::ConstraintCountMismatch { expected: 2, got: 1 }
    ));
}

/// Test that inverted bounds are rejected.
#[test]
fn test_inverted_bounds_rejected() {
    let params = [0.5];
    let constraints = [ParamConstraint::new().with_lower(1.0).with_upper(-1.0)];
    let err = FreeSet::build(&params, &constraints).unwrap_err();

    assert!(matches!(err, LevmarError::InvalidConstraint { param: 0, .. }));
}

/// Test that equal bounds are legal and pin the parameter to one value.
#[test]
fn test_equal_bounds_accepted() {
    let params = [1.0];
    let constraints = [ParamConstraint::new().with_lower(1.0).with_upper(1.0)];
    assert!(FreeSet::build(&params, &constraints).is_ok());
}

/// Test that a starting value outside its box is rejected.
#[test]
fn test_start_outside_box_rejected() {
    let params = [5.0];
    let constraints = [ParamConstraint::new().with_upper(2.0)];
    let err = FreeSet::build(&params, &constraints).unwrap_err();

    assert!(matches!(err, LevmarError::InvalidConstraint { param: 0, .. }));
}

/// Test that bounds on a tied parameter are ignored entirely.
#[test]
fn test_tied_bounds_ignored() {
    let params = [1.0, 99.0];
    let mut tied = ParamConstraint::tied_to(0, |v: f64| v + 1.0);
    tied.lower = Some(0.0);
    tied.upper = Some(1.0);
    let constraints = [ParamConstraint::new(), tied];

    // Starting value 99 violates the tied parameter's bounds, which must
    // not matter: ties override bounds.
    assert!(FreeSet::build(&params, &constraints).is_ok());
}

// ============================================================================
// Ties
// ============================================================================

/// Test that tie resolution follows the chain sources-first.
#[test]
fn test_tie_chain_resolution() {
    let params = [2.0, 0.0, 0.0];
    let constraints = [
        ParamConstraint::new(),
        // p2 depends on p1, which depends on p0; declared out of order.
        ParamConstraint::tied_to(2, |v: f64| v + 1.0),
        ParamConstraint::tied_to(0, |v: f64| 3.0 * v),
    ];
    let free = FreeSet::build(&params, &constraints).unwrap();

    let mut full = params;
    free.resolve_ties(&mut full);
    assert_relative_eq!(full[2], 6.0, epsilon = 1e-14);
    assert_relative_eq!(full[1], 7.0, epsilon = 1e-14);
}

/// Test that a tie cycle is rejected.
#[test]
fn test_tie_cycle_rejected() {
    let params = [1.0, 2.0];
    let constraints = [
        ParamConstraint::tied_to(1, |v: f64| v),
        ParamConstraint::tied_to(0, |v: f64| v),
    ];
    let err = FreeSet::build(&params, &constraints).unwrap_err();

    assert!(matches!(err, LevmarError::InvalidConstraint { .. }));
}

/// Test that a self-tie is rejected.
#[test]
fn test_self_tie_rejected() {
    let params = [1.0];
    let constraints = [ParamConstraint::tied_to(0, |v: f64| v)];
    let err = FreeSet::build(&params, &constraints).unwrap_err();

    assert!(matches!(err, LevmarError::InvalidConstraint { param: 0, .. }));
}

/// Test that an out-of-range tie source is rejected.
#[test]
fn test_tie_source_out_of_range() {
    let params = [1.0];
    let constraints = [ParamConstraint::tied_to(5, |v: f64| v)];
    let err = FreeSet::build(&params, &constraints).unwrap_err();

    assert!(matches!(err, LevmarError::InvalidConstraint { param: 0, .. }));
}

// ============================================================================
// Step Clamping
// ============================================================================

/// Test that an unconstrained step passes through at full length.
#[test]
fn test_clamp_step_unbounded() {
    let params = [1.0, 2.0];
    let free = FreeSet::build(&params, &[]).unwrap();

    let x = [1.0, 2.0];
    let mut step = [0.5, -0.5];
    let mut trial = [0.0; 2];
    let alpha = free.clamp_step(&x, &mut step, &mut trial);

    assert_eq!(alpha, 1.0);
    assert_eq!(trial, [1.5, 1.5]);
}

/// Test that a step crossing a bound is scaled back onto the bound.
#[test]
fn test_clamp_step_scales_to_bound() {
    let params = [1.0];
    let constraints = [ParamConstraint::new().with_upper(2.0)];
    let free = FreeSet::build(&params, &constraints).unwrap();

    let x = [1.0];
    let mut step = [4.0];
    let mut trial = [0.0];
    let alpha = free.clamp_step(&x, &mut step, &mut trial);

    assert_relative_eq!(alpha, 0.25, epsilon = 1e-14);
    // Snapping lands the trial exactly on the bound.
    assert_eq!(trial[0], 2.0);
}

/// Test that an outward step component on a pegged parameter is zeroed.
#[test]
fn test_clamp_step_pegged_component_zeroed() {
    let params = [0.0, 1.0];
    let constraints = [
        ParamConstraint::new().with_lower(0.0),
        ParamConstraint::new(),
    ];
    let free = FreeSet::build(&params, &constraints).unwrap();

    // First parameter sits on its lower bound; a negative component must
    // be dropped while the rest of the step survives.
    let x = [0.0, 1.0];
    let mut step = [-0.5, 0.25];
    let mut trial = [0.0; 2];
    let alpha = free.clamp_step(&x, &mut step, &mut trial);

    assert_eq!(alpha, 1.0);
    assert_eq!(trial[0], 0.0);
    assert_relative_eq!(trial[1], 1.25, epsilon = 1e-14);
}

/// Test pegged detection and counting against the full vector.
#[test]
fn test_pegged_counting() {
    let params = [0.0, 1.0, 5.0];
    let constraints = [
        ParamConstraint::new().with_lower(0.0),
        ParamConstraint::fixed(),
        ParamConstraint::new().with_upper(5.0),
    ];
    let free = FreeSet::build(&params, &constraints).unwrap();

    // Both free parameters sit on a bound; the fixed one never counts.
    assert_eq!(free.nfree(), 2);
    assert_eq!(free.count_pegged(&params), 2);
    assert!(free.is_pegged(0, 0.0));
    assert!(!free.is_pegged(0, 0.5));
}

/// Test that pegged columns with an outward gradient are zeroed.
#[test]
fn test_mask_pegged_columns() {
    let params = [0.0, 1.0];
    let constraints = [
        ParamConstraint::new().with_lower(0.0),
        ParamConstraint::new(),
    ];
    let free = FreeSet::build(&params, &constraints).unwrap();

    let m = 2;
    let x = [0.0, 1.0];
    let fvec = [1.0, 1.0];
    // Column 0 has positive inner product with the residuals (gradient
    // pushing below the lower bound); column 1 must survive.
    let mut fjac = [1.0, 1.0, 0.5, -0.5];
    free.mask_pegged_columns(&x, &fvec, &mut fjac, m);

    assert_eq!(&fjac[..2], &[0.0, 0.0]);
    assert_eq!(&fjac[2..], &[0.5, -0.5]);
}
