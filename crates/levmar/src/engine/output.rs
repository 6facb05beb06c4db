//! Output types and result structures for fitting operations.
//!
//! ## Purpose
//!
//! This module defines the termination status taxonomy and the
//! `LevmarResult` struct which encapsulates all outputs from a fit:
//! goodness-of-fit norms, iteration counts, and the optional residual,
//! uncertainty, and covariance arrays.
//!
//! ## Design notes
//!
//! * **Memory Efficiency**: All optional outputs use `Option<Vec<T>>` and
//!   are only populated when requested before the solve.
//! * **Status taxonomy**: Every solve that runs to termination yields
//!   exactly one status; hard failures are errors, not statuses.
//! * **Ergonomics**: Implements `Display` for human-readable output.
//!
//! ## Key concepts
//!
//! * **Best norm**: The final sum of squared weighted residuals (chi-square).
//! * **Pegged count**: Free parameters whose final value sits exactly on a
//!   bound.
//! * **Tolerance warnings**: Statuses reporting that a tolerance was set
//!   below machine precision; the parameters are still usable.
//!
//! ## Invariants
//!
//! * Populated vectors have length `n_points` (residuals) or `n_par`
//!   (uncertainties) or `n_par * n_par` (covariance).
//! * `n_free <= n_par` and `n_pegged <= n_free`.
//!
//! ## Non-goals
//!
//! * This module does not perform calculations; it only stores results.
//! * This module does not validate result consistency (responsibility of
//!   the engine).

// Feature-gated imports
#[cfg(not(feature = "std"))]
use alloc::vec::Vec;
#[cfg(feature = "std")]
use std::vec::Vec;

// External dependencies
use core::fmt::{Debug, Display, Formatter, Result};
use num_traits::Float;

/// Version string reported in fit results.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// Termination Status
// ============================================================================

/// How a fit terminated.
///
/// Exactly one status is produced per solve. The first four variants are
/// convergence successes; the remainder describe caps, tolerance
/// degeneracies, and user-requested stops. Invalid input never produces a
/// status; it surfaces as [`LevmarError`](crate::primitives::errors::LevmarError)
/// before the iteration starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitStatus {
    /// Both actual and predicted reductions of the sum of squares are at
    /// most `ftol`.
    ChiSquare,

    /// The relative change between two consecutive iterates is at most
    /// `xtol`.
    Parameters,

    /// The `ftol` and `xtol` tests both passed on the same iteration.
    ChiSquareAndParameters,

    /// The cosine of the angle between the residual vector and any column
    /// of the Jacobian is at most `gtol` in absolute value; the fit is as
    /// orthogonal as it can get.
    Orthogonality,

    /// The iteration cap was reached before any convergence test passed.
    MaxIterations,

    /// The function-evaluation cap was reached before any convergence test
    /// passed.
    MaxEvaluations,

    /// `ftol` is too small; no further reduction of the sum of squares is
    /// possible at machine precision.
    FtolTooSmall,

    /// `xtol` is too small; no further improvement of the parameters is
    /// possible at machine precision.
    XtolTooSmall,

    /// `gtol` is too small; the residual vector is orthogonal to the
    /// Jacobian columns to machine precision.
    GtolTooSmall,

    /// The user function requested a stop; the parameters hold the best
    /// point accepted before the request.
    Aborted,
}

impl FitStatus {
    // ========================================================================
    // Query Methods
    // ========================================================================

    /// Whether a convergence test was satisfied.
    pub fn is_converged(&self) -> bool {
        matches!(
            self,
            Self::ChiSquare | Self::Parameters | Self::ChiSquareAndParameters | Self::Orthogonality
        )
    }

    /// Whether an iteration or evaluation cap stopped the fit.
    pub fn hit_limit(&self) -> bool {
        matches!(self, Self::MaxIterations | Self::MaxEvaluations)
    }

    /// Whether the fit stalled on a tolerance below machine precision.
    ///
    /// These are warnings, not failures: the returned parameters are the
    /// best achievable for the requested tolerance.
    pub fn is_tolerance_warning(&self) -> bool {
        matches!(self, Self::FtolTooSmall | Self::XtolTooSmall | Self::GtolTooSmall)
    }

    /// Short human-readable description.
    pub fn description(&self) -> &'static str {
        match self {
            Self::ChiSquare => "converged (chi-square criterion)",
            Self::Parameters => "converged (parameter criterion)",
            Self::ChiSquareAndParameters => "converged (chi-square and parameter criteria)",
            Self::Orthogonality => "converged (orthogonality criterion)",
            Self::MaxIterations => "maximum iterations reached",
            Self::MaxEvaluations => "maximum function evaluations reached",
            Self::FtolTooSmall => "ftol is below machine precision",
            Self::XtolTooSmall => "xtol is below machine precision",
            Self::GtolTooSmall => "gtol is below machine precision",
            Self::Aborted => "stopped at user request",
        }
    }
}

impl Display for FitStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        f.write_str(self.description())
    }
}

// ============================================================================
// Result Structure
// ============================================================================

/// Comprehensive fit output: norms, counts, status, and optional arrays.
#[derive(Debug, Clone, PartialEq)]
pub struct LevmarResult<T> {
    /// Termination status.
    pub status: FitStatus,

    /// Final sum of squared weighted residuals (chi-square).
    pub best_norm: T,

    /// Sum of squared weighted residuals at the starting point.
    pub orig_norm: T,

    /// Number of outer iterations performed.
    pub n_iter: usize,

    /// Number of user-function evaluations.
    pub n_eval: usize,

    /// Total number of parameters.
    pub n_par: usize,

    /// Number of free parameters.
    pub n_free: usize,

    /// Number of free parameters pegged at a bound on exit.
    pub n_pegged: usize,

    /// Number of residuals (data points).
    pub n_points: usize,

    /// Final residual vector (`n_points`), if requested.
    pub residuals: Option<Vec<T>>,

    /// 1-sigma parameter uncertainties (`n_par`), if requested. Fixed,
    /// tied, and pegged parameters report zero.
    pub uncertainties: Option<Vec<T>>,

    /// Parameter covariance matrix (`n_par * n_par`, row-major), if
    /// requested. Rows and columns of fixed, tied, and pegged parameters
    /// are zero.
    pub covariance: Option<Vec<T>>,

    /// Library version that produced this result.
    pub version: &'static str,
}

impl<T: Float> LevmarResult<T> {
    // ========================================================================
    // Query Methods
    // ========================================================================

    /// Degrees of freedom of the fit (`n_points - n_free`).
    pub fn degrees_of_freedom(&self) -> usize {
        self.n_points.saturating_sub(self.n_free)
    }

    /// Chi-square per degree of freedom, or `None` for zero degrees of
    /// freedom.
    pub fn reduced_chi_square(&self) -> Option<T> {
        let dof = self.degrees_of_freedom();
        if dof == 0 {
            return None;
        }
        T::from(dof).map(|d| self.best_norm / d)
    }

    /// Check if the final residual vector was captured.
    pub fn has_residuals(&self) -> bool {
        self.residuals.is_some()
    }

    /// Check if parameter uncertainties were computed.
    pub fn has_uncertainties(&self) -> bool {
        self.uncertainties.is_some()
    }

    /// Check if the covariance matrix was computed.
    pub fn has_covariance(&self) -> bool {
        self.covariance.is_some()
    }

    /// Covariance between parameters `i` and `j`, if the matrix was
    /// computed and the indices are in range.
    pub fn covariance_at(&self, i: usize, j: usize) -> Option<T> {
        if i >= self.n_par || j >= self.n_par {
            return None;
        }
        self.covariance.as_ref().map(|c| c[i * self.n_par + j])
    }
}

// ============================================================================
// Display Implementation
// ============================================================================

impl<T: Float + Display + Debug> Display for LevmarResult<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        writeln!(f, "Fit summary:")?;
        writeln!(f, "  Status:      {}", self.status)?;
        writeln!(f, "  Chi-square:  {} -> {}", self.orig_norm, self.best_norm)?;
        if let Some(red) = self.reduced_chi_square() {
            writeln!(
                f,
                "  Reduced:     {} ({} degrees of freedom)",
                red,
                self.degrees_of_freedom()
            )?;
        }
        writeln!(f, "  Iterations:  {}", self.n_iter)?;
        writeln!(f, "  Evaluations: {}", self.n_eval)?;
        writeln!(
            f,
            "  Parameters:  {} total, {} free, {} pegged",
            self.n_par, self.n_free, self.n_pegged
        )?;
        writeln!(f, "  Data points: {}", self.n_points)?;

        if let Some(errors) = &self.uncertainties {
            writeln!(f, "Uncertainties (1-sigma):")?;
            for (i, e) in errors.iter().enumerate() {
                writeln!(f, "  p[{}]: {}", i, e)?;
            }
        }

        Ok(())
    }
}
