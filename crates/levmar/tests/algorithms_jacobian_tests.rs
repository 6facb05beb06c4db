#![cfg(feature = "dev")]
//! Tests for Jacobian assembly.
//!
//! These tests verify the Jacobian builder used by the fitting engine for:
//! - One-sided and two-sided finite-difference columns
//! - Analytic columns delivered through the derivative view
//! - Per-parameter step overrides and bound-aware step direction
//! - Evaluation counting and non-finite screening
//!
//! ## Test Organization
//!
//! 1. **Finite Differences** - Accuracy against known derivatives
//! 2. **Analytic Columns** - Exact columns from the user function
//! 3. **Step Control** - Overrides and bound-aware direction
//! 4. **Screening** - Non-finite derivative detection

use std::cell::RefCell;

use approx::assert_relative_eq;

use levmar::internals::algorithms::constraints::FreeSet;
use levmar::internals::algorithms::jacobian::JacobianContext;
use levmar::internals::primitives::parameter::{DerivSide, ParamConstraint};
use levmar::internals::primitives::problem::{AnalyticDerivs, EvalStatus, FitProblem};

// ============================================================================
// Fixtures
// ============================================================================

/// Smooth two-parameter model with known derivatives:
/// `r_i = p0^2 * x_i + exp(p1 * x_i)`.
struct Smooth {
    x: Vec<f64>,
    /// Parameter values seen by every evaluation, for probe inspection.
    probes: RefCell<Vec<Vec<f64>>>,
    analytic: bool,
}

impl Smooth {
    fn new(x: Vec<f64>) -> Self {
        Self {
            x,
            probes: RefCell::new(Vec::new()),
            analytic: false,
        }
    }
}

impl FitProblem<f64> for Smooth {
    fn residual_count(&self) -> usize {
        self.x.len()
    }

    fn evaluate(
        &self,
        p: &[f64],
        residuals: &mut [f64],
        mut derivs: Option<&mut AnalyticDerivs<'_, f64>>,
    ) -> EvalStatus {
        self.probes.borrow_mut().push(p.to_vec());
        for (i, &x) in self.x.iter().enumerate() {
            residuals[i] = p[0] * p[0] * x + (p[1] * x).exp();
            if self.analytic {
                if let Some(d) = derivs.as_deref_mut() {
                    if let Some(col) = d.column_mut(0) {
                        col[i] = 2.0 * p[0] * x;
                    }
                    if let Some(col) = d.column_mut(1) {
                        col[i] = x * (p[1] * x).exp();
                    }
                }
            }
        }
        EvalStatus::Ok
    }
}

// Run a Jacobian pass at `params` and return (fjac, nfev).
fn build_jacobian(
    problem: &Smooth,
    params: &[f64],
    constraints: &[ParamConstraint<f64>],
) -> (Vec<f64>, usize) {
    let free = FreeSet::build(params, constraints).unwrap();
    let m = problem.residual_count();
    let nfree = free.nfree();

    let mut xall = params.to_vec();
    free.resolve_ties(&mut xall);

    let mut fvec = vec![0.0; m];
    assert_eq!(problem.evaluate(&xall, &mut fvec, None), EvalStatus::Ok);

    let mut fjac = vec![0.0; m * nfree];
    let mut offsets = vec![None; params.len()];
    let mut probe = vec![0.0; m];
    let mut stash = vec![0.0; m];
    let mut nfev = 0;

    let ctx = JacobianContext {
        problem,
        free: &free,
        epsfcn: 0.0,
        finite_check: true,
    };
    ctx.fill(
        &mut xall, &fvec, &mut fjac, &mut offsets, &mut probe, &mut stash, &mut nfev, None,
    )
    .unwrap();

    // The parameter vector is restored after every probe.
    assert_eq!(&xall, params);

    (fjac, nfev)
}

fn expected_column(x: &[f64], p: &[f64], j: usize) -> Vec<f64> {
    x.iter()
        .map(|&xi| match j {
            0 => 2.0 * p[0] * xi,
            _ => xi * (p[1] * xi).exp(),
        })
        .collect()
}

// ============================================================================
// Finite Differences
// ============================================================================

/// Test forward-difference columns against the analytic derivatives.
#[test]
fn test_forward_difference_accuracy() {
    let x = vec![-1.0, -0.25, 0.5, 1.0, 2.0];
    let p = [1.5, 0.3];
    let problem = Smooth::new(x.clone());

    let (fjac, nfev) = build_jacobian(&problem, &p, &[]);

    // One probe per free parameter.
    assert_eq!(nfev, 2);
    let m = x.len();
    for j in 0..2 {
        let expect = expected_column(&x, &p, j);
        for i in 0..m {
            assert_relative_eq!(fjac[i + m * j], expect[i], epsilon = 1e-5, max_relative = 1e-5);
        }
    }
}

/// Test that two-sided differences are more accurate and cost one extra
/// evaluation per column.
#[test]
fn test_centered_difference() {
    let x = vec![-1.0, -0.25, 0.5, 1.0, 2.0];
    let p = [1.5, 0.3];
    let problem = Smooth::new(x.clone());
    let constraints = [
        ParamConstraint::new().with_side(DerivSide::Centered),
        ParamConstraint::new().with_side(DerivSide::Centered),
    ];

    let (fjac, nfev) = build_jacobian(&problem, &p, &constraints);

    assert_eq!(nfev, 4);
    let m = x.len();
    for j in 0..2 {
        let expect = expected_column(&x, &p, j);
        for i in 0..m {
            assert_relative_eq!(fjac[i + m * j], expect[i], epsilon = 1e-6, max_relative = 1e-6);
        }
    }
}

/// Test that fixed parameters get no column and no probes.
#[test]
fn test_fixed_parameter_skipped() {
    let x = vec![0.5, 1.0, 2.0];
    let p = [1.5, 0.3];
    let problem = Smooth::new(x.clone());
    let constraints = [ParamConstraint::fixed(), ParamConstraint::new()];

    let (fjac, nfev) = build_jacobian(&problem, &p, &constraints);

    // One free parameter, one probe, one column (for p1).
    assert_eq!(nfev, 1);
    assert_eq!(fjac.len(), x.len());
    let expect = expected_column(&x, &p, 1);
    for i in 0..x.len() {
        assert_relative_eq!(fjac[i], expect[i], epsilon = 1e-5, max_relative = 1e-5);
    }
}

// ============================================================================
// Analytic Columns
// ============================================================================

/// Test that analytic columns are exact and cost a single evaluation.
#[test]
fn test_analytic_columns() {
    let x = vec![-1.0, -0.25, 0.5, 1.0, 2.0];
    let p = [1.5, 0.3];
    let mut problem = Smooth::new(x.clone());
    problem.analytic = true;
    let constraints = [
        ParamConstraint::new().with_side(DerivSide::Analytic),
        ParamConstraint::new().with_side(DerivSide::Analytic),
    ];

    let (fjac, nfev) = build_jacobian(&problem, &p, &constraints);

    // One combined pass covers both columns.
    assert_eq!(nfev, 1);
    let m = x.len();
    for j in 0..2 {
        let expect = expected_column(&x, &p, j);
        for i in 0..m {
            assert_relative_eq!(fjac[i + m * j], expect[i], epsilon = 1e-14);
        }
    }
}

/// Test a mixed Jacobian: one analytic column, one finite-difference
/// column.
#[test]
fn test_mixed_analytic_and_numeric() {
    let x = vec![-1.0, 0.5, 1.0, 2.0];
    let p = [1.5, 0.3];
    let mut problem = Smooth::new(x.clone());
    problem.analytic = true;
    let constraints = [
        ParamConstraint::new().with_side(DerivSide::Analytic),
        ParamConstraint::new(),
    ];

    let (fjac, nfev) = build_jacobian(&problem, &p, &constraints);

    // One analytic pass plus one probe for the numeric column.
    assert_eq!(nfev, 2);
    let m = x.len();
    let expect0 = expected_column(&x, &p, 0);
    let expect1 = expected_column(&x, &p, 1);
    for i in 0..m {
        assert_relative_eq!(fjac[i], expect0[i], epsilon = 1e-14);
        assert_relative_eq!(fjac[i + m], expect1[i], epsilon = 1e-5, max_relative = 1e-5);
    }
}

/// Test the derivative check: the comparison table reaches the sink and
/// the analytic column survives untouched.
#[test]
fn test_deriv_debug_table() {
    let x = vec![-1.0, 0.5, 1.0];
    let p = [1.5, 0.3];
    let mut problem = Smooth::new(x.clone());
    problem.analytic = true;
    let constraints = [
        ParamConstraint::new().with_side(DerivSide::Analytic).with_deriv_debug(),
        ParamConstraint::fixed(),
    ];

    let free = FreeSet::build(&p, &constraints).unwrap();
    let m = x.len();
    let mut xall = p.to_vec();
    let mut fvec = vec![0.0; m];
    assert_eq!(problem.evaluate(&xall, &mut fvec, None), EvalStatus::Ok);

    let mut fjac = vec![0.0; m];
    let mut offsets = vec![None; p.len()];
    let mut probe = vec![0.0; m];
    let mut stash = vec![0.0; m];
    let mut nfev = 0;
    let mut trace = String::new();

    let ctx = JacobianContext {
        problem: &problem,
        free: &free,
        epsfcn: 0.0,
        finite_check: true,
    };
    ctx.fill(
        &mut xall,
        &fvec,
        &mut fjac,
        &mut offsets,
        &mut probe,
        &mut stash,
        &mut nfev,
        Some(&mut trace),
    )
    .unwrap();

    // One analytic pass plus one comparison probe.
    assert_eq!(nfev, 2);
    assert!(trace.contains("derivative check: parameter 0"));
    assert!(trace.contains("numeric"));

    // The column stays analytic; the numeric estimate is report-only.
    let expect = expected_column(&x, &p, 0);
    for i in 0..m {
        assert_relative_eq!(fjac[i], expect[i], epsilon = 1e-14);
    }
}

// ============================================================================
// Step Control
// ============================================================================

/// Test that a relative step override controls the probe offset.
#[test]
fn test_relative_step_override() {
    let x = vec![0.5, 1.0];
    let p = [2.0, 0.3];
    let problem = Smooth::new(x);
    let constraints = [
        ParamConstraint::new().with_relative_step(1e-3),
        ParamConstraint::fixed(),
    ];

    let _ = build_jacobian(&problem, &p, &constraints);

    // Base evaluation plus one probe; the probe offset is relstep * |p0|.
    let probes = problem.probes.borrow();
    assert_eq!(probes.len(), 2);
    let offset = probes[1][0] - p[0];
    assert_relative_eq!(offset, 2e-3, epsilon = 1e-12);
}

/// Test that an absolute step override controls the probe offset.
#[test]
fn test_absolute_step_override() {
    let x = vec![0.5, 1.0];
    let p = [2.0, 0.3];
    let problem = Smooth::new(x);
    let constraints = [
        ParamConstraint::new().with_step(0.125),
        ParamConstraint::fixed(),
    ];

    let _ = build_jacobian(&problem, &p, &constraints);

    let probes = problem.probes.borrow();
    let offset = probes[1][0] - p[0];
    assert_relative_eq!(offset, 0.125, epsilon = 1e-12);
}

/// Test that an automatic step flips backward at an upper bound.
#[test]
fn test_auto_step_respects_upper_bound() {
    let x = vec![0.5, 1.0];
    let p = [2.0, 0.3];
    let problem = Smooth::new(x);
    let constraints = [
        ParamConstraint::new().with_upper(2.0),
        ParamConstraint::fixed(),
    ];

    let _ = build_jacobian(&problem, &p, &constraints);

    // The parameter sits on its upper bound; every probe must stay at or
    // below it.
    let probes = problem.probes.borrow();
    assert!(probes.len() > 1);
    for probe in probes.iter().skip(1) {
        assert!(probe[0] <= 2.0);
    }
}

/// Test that an explicit backward side probes below the current value.
#[test]
fn test_backward_side() {
    let x = vec![0.5, 1.0];
    let p = [2.0, 0.3];
    let problem = Smooth::new(x);
    let constraints = [
        ParamConstraint::new().with_side(DerivSide::Backward),
        ParamConstraint::fixed(),
    ];

    let (fjac, _) = build_jacobian(&problem, &p, &constraints);

    let probes = problem.probes.borrow();
    assert!(probes[1][0] < p[0]);

    // The quotient still approximates the true derivative.
    let expect = expected_column(&[0.5, 1.0], &p, 0);
    for i in 0..2 {
        assert_relative_eq!(fjac[i], expect[i], epsilon = 1e-5, max_relative = 1e-5);
    }
}

// ============================================================================
// Screening
// ============================================================================

/// Test that a non-finite derivative is reported as an error.
#[test]
fn test_non_finite_derivative_detected() {
    struct Bad;
    impl FitProblem<f64> for Bad {
        fn residual_count(&self) -> usize {
            2
        }
        fn evaluate(
            &self,
            p: &[f64],
            residuals: &mut [f64],
            _derivs: Option<&mut AnalyticDerivs<'_, f64>>,
        ) -> EvalStatus {
            // The residual blows up away from the base point, poisoning
            // the difference quotient.
            residuals[0] = if p[0] == 1.0 { 0.0 } else { f64::NAN };
            residuals[1] = p[0];
            EvalStatus::Ok
        }
    }

    let problem = Bad;
    let params = [1.0];
    let free = FreeSet::build(&params, &[]).unwrap();
    let mut xall = params.to_vec();
    let fvec = [0.0, 1.0];
    let mut fjac = vec![0.0; 2];
    let mut offsets = vec![None; 1];
    let mut probe = vec![0.0; 2];
    let mut stash = vec![0.0; 2];
    let mut nfev = 0;

    let ctx = JacobianContext {
        problem: &problem,
        free: &free,
        epsfcn: 0.0,
        finite_check: true,
    };
    let halt = ctx.fill(
        &mut xall, &fvec, &mut fjac, &mut offsets, &mut probe, &mut stash, &mut nfev, None,
    );

    assert!(halt.is_err());
}
