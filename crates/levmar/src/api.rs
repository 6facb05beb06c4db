//! High-level API for Levenberg-Marquardt least-squares fitting.
//!
//! ## Purpose
//!
//! This module provides the primary user-facing entry point for fitting. It
//! implements a fluent builder pattern for configuring tolerances, limits,
//! and requested outputs, ending in a reusable solver.
//!
//! ## Design notes
//!
//! * **Ergonomic**: Fluent builder with sensible defaults for all parameters.
//! * **Validated**: Tolerances are validated when `.build()` is called.
//! * **Reusable**: A built solver can fit any number of problems.
//! * **Type-Safe**: Generic over `Float` types for flexible precision.
//!
//! ## Key concepts
//!
//! * **Problem**: Any type implementing [`FitProblem`] supplies residuals.
//! * **Constraints**: Per-parameter descriptors fix, bound, or tie values.
//! * **Configuration Flow**: Builder pattern ending in `.build()`.
//!
//! ### Configuration Flow
//!
//! 1. Create a [`LevmarBuilder`] via `Levmar::new()`.
//! 2. Chain configuration methods (`.ftol()`, `.max_iterations()`, etc.).
//! 3. Call `.build()` to obtain a [`LevmarSolver`].
//! 4. Call `.fit()` or `.fit_constrained()` with a problem and parameters.

// Feature-gated imports
#[cfg(not(feature = "std"))]
use alloc::vec::Vec;
#[cfg(feature = "std")]
use std::vec::Vec;

// External dependencies
use core::fmt::Write;
use num_traits::Float;

// Internal dependencies
use crate::engine::executor::{LevmarConfig, LevmarExecutor};
use crate::engine::validator::Validator;

// Publicly re-exported types
pub use crate::engine::output::{FitStatus, LevmarResult};
pub use crate::primitives::buffer::LevmarBuffer;
pub use crate::primitives::errors::LevmarError;
pub use crate::primitives::parameter::{DerivSide, ParamConstraint, Tie};
pub use crate::primitives::problem::{AnalyticDerivs, EvalStatus, FitProblem};

// ============================================================================
// Builder
// ============================================================================

/// Fluent builder for configuring a Levenberg-Marquardt solver.
#[derive(Debug, Clone)]
pub struct LevmarBuilder<T> {
    /// Relative chi-square convergence tolerance.
    pub ftol: Option<T>,

    /// Relative parameter convergence tolerance.
    pub xtol: Option<T>,

    /// Orthogonality convergence tolerance.
    pub gtol: Option<T>,

    /// Assumed relative noise in the user function.
    pub epsfcn: Option<T>,

    /// Initial trust-region bound factor.
    pub step_factor: Option<T>,

    /// Covariance range tolerance.
    pub covtol: Option<T>,

    /// Outer iteration cap.
    pub max_iterations: Option<usize>,

    /// Function evaluation cap.
    pub max_evaluations: Option<usize>,

    /// Trace verbosity for attached sinks.
    pub print_level: Option<usize>,

    /// Fixed per-parameter scale values.
    pub user_scale: Option<Vec<T>>,

    /// Skip non-finite screening of user values.
    pub no_finite_check: Option<bool>,

    /// Capture the final residual vector.
    pub want_residuals: Option<bool>,

    /// Compute 1-sigma parameter uncertainties.
    pub want_uncertainties: Option<bool>,

    /// Compute the full covariance matrix.
    pub want_covariance: Option<bool>,

    /// Tracks if any parameter was set multiple times (for validation).
    #[doc(hidden)]
    pub duplicate_param: Option<&'static str>,
}

impl<T: Float> Default for LevmarBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Float> LevmarBuilder<T> {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            ftol: None,
            xtol: None,
            gtol: None,
            epsfcn: None,
            step_factor: None,
            covtol: None,
            max_iterations: None,
            max_evaluations: None,
            print_level: None,
            user_scale: None,
            no_finite_check: None,
            want_residuals: None,
            want_uncertainties: None,
            want_covariance: None,
            duplicate_param: None,
        }
    }

    /// Set the relative chi-square convergence tolerance.
    pub fn ftol(mut self, ftol: T) -> Self {
        if self.ftol.is_some() {
            self.duplicate_param = Some("ftol");
        }
        self.ftol = Some(ftol);
        self
    }

    /// Set the relative parameter convergence tolerance.
    pub fn xtol(mut self, xtol: T) -> Self {
        if self.xtol.is_some() {
            self.duplicate_param = Some("xtol");
        }
        self.xtol = Some(xtol);
        self
    }

    /// Set the orthogonality convergence tolerance.
    pub fn gtol(mut self, gtol: T) -> Self {
        if self.gtol.is_some() {
            self.duplicate_param = Some("gtol");
        }
        self.gtol = Some(gtol);
        self
    }

    /// Set the assumed relative noise in the user function. Finite
    /// difference steps never shrink below this level.
    pub fn epsfcn(mut self, epsfcn: T) -> Self {
        if self.epsfcn.is_some() {
            self.duplicate_param = Some("epsfcn");
        }
        self.epsfcn = Some(epsfcn);
        self
    }

    /// Set the initial trust-region bound as a multiple of the scaled
    /// parameter norm.
    pub fn step_factor(mut self, factor: T) -> Self {
        if self.step_factor.is_some() {
            self.duplicate_param = Some("step_factor");
        }
        self.step_factor = Some(factor);
        self
    }

    /// Set the relative range tolerance for rank deficiency in the
    /// covariance computation.
    pub fn covtol(mut self, covtol: T) -> Self {
        if self.covtol.is_some() {
            self.duplicate_param = Some("covtol");
        }
        self.covtol = Some(covtol);
        self
    }

    /// Set the outer iteration cap. Zero runs no iterations and reports
    /// the starting point with its uncertainty estimates.
    pub fn max_iterations(mut self, iterations: usize) -> Self {
        if self.max_iterations.is_some() {
            self.duplicate_param = Some("max_iterations");
        }
        self.max_iterations = Some(iterations);
        self
    }

    /// Set the function evaluation cap. Zero means unlimited.
    pub fn max_evaluations(mut self, evaluations: usize) -> Self {
        if self.max_evaluations.is_some() {
            self.duplicate_param = Some("max_evaluations");
        }
        self.max_evaluations = Some(evaluations);
        self
    }

    /// Set the trace verbosity used when a sink is attached: 0 is silent,
    /// 1 writes one line per iteration, 2 adds parameter values.
    pub fn print_level(mut self, level: usize) -> Self {
        if self.print_level.is_some() {
            self.duplicate_param = Some("print_level");
        }
        self.print_level = Some(level);
        self
    }

    /// Supply fixed per-parameter scale values, one per parameter,
    /// disabling automatic scaling from Jacobian column norms. The length
    /// is checked against the parameter vector when a fit starts.
    pub fn user_scale(mut self, scale: Vec<T>) -> Self {
        if self.user_scale.is_some() {
            self.duplicate_param = Some("user_scale");
        }
        self.user_scale = Some(scale);
        self
    }

    /// Disable the non-finite screens on residuals and Jacobian entries.
    pub fn no_finite_check(mut self) -> Self {
        self.no_finite_check = Some(true);
        self
    }

    /// Include the final residual vector in the result.
    pub fn return_residuals(mut self) -> Self {
        self.want_residuals = Some(true);
        self
    }

    /// Include 1-sigma parameter uncertainties in the result.
    pub fn return_uncertainties(mut self) -> Self {
        self.want_uncertainties = Some(true);
        self
    }

    /// Include the full covariance matrix in the result.
    pub fn return_covariance(mut self) -> Self {
        self.want_covariance = Some(true);
        self
    }

    // ========================================================================
    // Build Method
    // ========================================================================

    /// Build the solver.
    pub fn build(self) -> Result<LevmarSolver<T>, LevmarError> {
        // Check for duplicate parameter configuration
        Validator::validate_no_duplicates(self.duplicate_param)?;

        // Validate tolerances
        if let Some(ftol) = self.ftol {
            Validator::validate_tolerance(ftol, "ftol")?;
        }
        if let Some(xtol) = self.xtol {
            Validator::validate_tolerance(xtol, "xtol")?;
        }
        if let Some(gtol) = self.gtol {
            Validator::validate_tolerance(gtol, "gtol")?;
        }
        if let Some(epsfcn) = self.epsfcn {
            Validator::validate_tolerance(epsfcn, "epsfcn")?;
        }
        if let Some(factor) = self.step_factor {
            Validator::validate_tolerance(factor, "step_factor")?;
        }
        if let Some(covtol) = self.covtol {
            Validator::validate_tolerance(covtol, "covtol")?;
        }

        let mut config = LevmarConfig::default();
        if let Some(ftol) = self.ftol {
            config.ftol = ftol;
        }
        if let Some(xtol) = self.xtol {
            config.xtol = xtol;
        }
        if let Some(gtol) = self.gtol {
            config.gtol = gtol;
        }
        if let Some(epsfcn) = self.epsfcn {
            config.epsfcn = epsfcn;
        }
        if let Some(factor) = self.step_factor {
            config.step_factor = factor;
        }
        if let Some(covtol) = self.covtol {
            config.covtol = covtol;
        }
        if let Some(iterations) = self.max_iterations {
            config.max_iterations = iterations;
        }
        if let Some(evaluations) = self.max_evaluations {
            config.max_evaluations = evaluations;
        }
        if let Some(level) = self.print_level {
            config.print_level = level;
        }
        config.user_scale = self.user_scale;
        if let Some(flag) = self.no_finite_check {
            config.no_finite_check = flag;
        }
        if let Some(flag) = self.want_residuals {
            config.want_residuals = flag;
        }
        if let Some(flag) = self.want_uncertainties {
            config.want_uncertainties = flag;
        }
        if let Some(flag) = self.want_covariance {
            config.want_covariance = flag;
        }

        Ok(LevmarSolver {
            executor: LevmarExecutor::new(config),
        })
    }
}

// ============================================================================
// Solver
// ============================================================================

/// A configured Levenberg-Marquardt solver.
///
/// Solvers are stateless between fits and may be reused for any number of
/// problems and parameter vectors.
#[derive(Debug)]
pub struct LevmarSolver<T> {
    executor: LevmarExecutor<T>,
}

impl<T: Float> LevmarSolver<T> {
    /// Fit an unconstrained problem, refining `params` in place.
    pub fn fit<P: FitProblem<T>>(
        &self,
        problem: &P,
        params: &mut [T],
    ) -> Result<LevmarResult<T>, LevmarError> {
        self.executor.run(problem, params, &[], None, None)
    }

    /// Fit with per-parameter constraints, refining `params` in place.
    ///
    /// `constraints` must be empty or hold one descriptor per parameter.
    pub fn fit_constrained<P: FitProblem<T>>(
        &self,
        problem: &P,
        params: &mut [T],
        constraints: &[ParamConstraint<T>],
    ) -> Result<LevmarResult<T>, LevmarError> {
        self.executor.run(problem, params, constraints, None, None)
    }

    /// Fit while reusing caller-owned working memory.
    ///
    /// Repeated fits through the same buffer allocate nothing once the
    /// buffer has grown to the problem size.
    pub fn fit_with_buffer<P: FitProblem<T>>(
        &self,
        problem: &P,
        params: &mut [T],
        constraints: &[ParamConstraint<T>],
        buffer: &mut LevmarBuffer<T>,
    ) -> Result<LevmarResult<T>, LevmarError> {
        self.executor
            .run(problem, params, constraints, Some(buffer), None)
    }

    /// Fit while writing iteration traces and derivative debug tables to
    /// `sink`. The sink never changes numeric results.
    pub fn fit_traced<P: FitProblem<T>>(
        &self,
        problem: &P,
        params: &mut [T],
        constraints: &[ParamConstraint<T>],
        sink: &mut dyn Write,
    ) -> Result<LevmarResult<T>, LevmarError> {
        self.executor
            .run(problem, params, constraints, None, Some(sink))
    }
}
