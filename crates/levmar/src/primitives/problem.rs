//! The user-side fitting problem contract.
//!
//! ## Purpose
//!
//! This module defines the trait a caller implements to describe a
//! least-squares problem: how many residuals there are and how to evaluate
//! them (and, optionally, their analytic derivatives) at a parameter vector.
//!
//! ## Design notes
//!
//! * **Single entry point**: One `evaluate` call serves residual passes and
//!   Jacobian passes; derivative buffers are handed in only when the solver
//!   wants analytic columns.
//! * **Caller-owned weighting**: Residuals are whatever the caller returns,
//!   typically `(data - model) / sigma`; the engine never weights.
//! * **Cooperative control**: The return status lets the user function abort
//!   a fit gracefully or report a hard failure.
//!
//! ## Key concepts
//!
//! * **Mixed derivative modes**: `AnalyticDerivs::column_mut` yields a
//!   buffer only for parameters configured as analytic, so one function
//!   body serves any mix of analytic and numeric parameters.
//! * **Abort vs. Fail**: `Abort` ends the fit in an orderly way (best
//!   parameters so far are kept, a report is produced); `Fail` surfaces as
//!   an error.
//!
//! ## Invariants
//!
//! * `residuals.len()` always equals `residual_count()`.
//! * Derivative columns have `residual_count()` entries and hold
//!   `d residual[i] / d param[j]`.
//!
//! ## Non-goals
//!
//! * This module does not compute finite differences (see the Jacobian
//!   builder).
//! * This module does not validate problem dimensions (see the validator).

// Feature-gated imports
#[cfg(not(feature = "std"))]
use alloc::string::String;
#[cfg(feature = "std")]
use std::string::String;

// Internal dependencies
use crate::primitives::errors::LevmarError;

// ============================================================================
// Evaluation Status
// ============================================================================

/// Outcome of a user-function evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalStatus {
    /// Evaluation succeeded; the residual (and derivative) buffers are filled.
    Ok,

    /// The user requests an orderly stop. The solver terminates with
    /// `FitStatus::Aborted`, keeping the best parameters found so far.
    Abort,

    /// Hard failure; the solver returns `LevmarError::InvalidCallback`.
    Fail,
}

impl EvalStatus {
    /// Whether the evaluation produced usable residuals.
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }

    /// Lift the status into the engine's control flow: `Ok` continues,
    /// `Abort` and `Fail` halt the pass.
    pub(crate) fn into_halt(self, context: &'static str) -> Result<(), FitHalt> {
        match self {
            Self::Ok => Ok(()),
            Self::Abort => Err(FitHalt::Aborted),
            Self::Fail => Err(FitHalt::Error(LevmarError::InvalidCallback(String::from(
                context,
            )))),
        }
    }
}

// ============================================================================
// Early Exit Signal
// ============================================================================

/// Why an evaluation pass stopped before completing.
///
/// Aborts terminate the solve gracefully (a report is still produced);
/// errors propagate to the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum FitHalt {
    /// The user function returned [`EvalStatus::Abort`].
    Aborted,

    /// A hard failure.
    Error(LevmarError),
}

impl From<LevmarError> for FitHalt {
    fn from(e: LevmarError) -> Self {
        Self::Error(e)
    }
}

// ============================================================================
// Analytic Derivative View
// ============================================================================

/// Column-lending view over the Jacobian buffer for analytic derivatives.
///
/// During a Jacobian pass the solver hands this view to
/// [`FitProblem::evaluate`]. Exactly the parameters configured with
/// `DerivSide::Analytic` have a column available; for all others
/// `column_mut` returns `None`, and the solver fills them by finite
/// differences afterwards.
#[derive(Debug)]
pub struct AnalyticDerivs<'a, T> {
    /// Flat storage for the requested columns, `residual_count` entries each.
    columns: &'a mut [T],

    /// Per-parameter offset into `columns`; `None` for numeric parameters.
    offsets: &'a [Option<usize>],

    /// Residuals per column.
    rows: usize,
}

impl<'a, T> AnalyticDerivs<'a, T> {
    /// Assemble a view over `columns` with `rows` residuals per column.
    pub(crate) fn new(columns: &'a mut [T], offsets: &'a [Option<usize>], rows: usize) -> Self {
        Self {
            columns,
            offsets,
            rows,
        }
    }

    /// Number of residuals (rows) per derivative column.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of parameters the fit knows about.
    pub fn param_count(&self) -> usize {
        self.offsets.len()
    }

    /// Whether the solver wants an analytic column for parameter `param`.
    pub fn requested(&self, param: usize) -> bool {
        self.offsets.get(param).map_or(false, Option::is_some)
    }

    /// Mutable derivative column for parameter `param`, or `None` when that
    /// parameter is differentiated numerically (or out of range).
    pub fn column_mut(&mut self, param: usize) -> Option<&mut [T]> {
        let offset = (*self.offsets.get(param)?)?;
        Some(&mut self.columns[offset..offset + self.rows])
    }
}

// ============================================================================
// Fit Problem Trait
// ============================================================================

/// A least-squares problem: residuals of a model against data.
///
/// The fitter minimizes `sum_i residuals[i]^2` over the parameter vector.
/// Implementations typically close over their data arrays:
///
/// ```rust
/// use levmar::prelude::*;
///
/// struct Line {
///     x: Vec<f64>,
///     y: Vec<f64>,
///     sigma: f64,
/// }
///
/// impl FitProblem<f64> for Line {
///     fn residual_count(&self) -> usize {
///         self.x.len()
///     }
///
///     fn evaluate(
///         &self,
///         params: &[f64],
///         residuals: &mut [f64],
///         _derivs: Option<&mut AnalyticDerivs<'_, f64>>,
///     ) -> EvalStatus {
///         for i in 0..self.x.len() {
///             let model = params[0] + params[1] * self.x[i];
///             residuals[i] = (self.y[i] - model) / self.sigma;
///         }
///         EvalStatus::Ok
///     }
/// }
/// ```
pub trait FitProblem<T> {
    /// Number of residuals (data points) the problem produces. Called once
    /// per solve; must stay constant for its duration.
    fn residual_count(&self) -> usize;

    /// Fill `residuals` with the weighted residuals at `params`.
    ///
    /// `derivs` is `Some` only on Jacobian passes and only when at least one
    /// parameter is configured for analytic derivatives. Implementations
    /// that never supply analytic columns can ignore it.
    fn evaluate(
        &self,
        params: &[T],
        residuals: &mut [T],
        derivs: Option<&mut AnalyticDerivs<'_, T>>,
    ) -> EvalStatus;
}
