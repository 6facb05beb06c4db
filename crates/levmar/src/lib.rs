//! # levmar: Constrained Levenberg-Marquardt curve fitting for Rust
//!
//! A full-featured Levenberg-Marquardt nonlinear least-squares fitter with
//! box constraints, fixed and tied parameters, analytic or numeric
//! derivatives, and parameter uncertainty estimation, for **Rust** on both
//! `std` and `no_std` targets.
//!
//! ## What is Levenberg-Marquardt?
//!
//! Levenberg-Marquardt is the standard algorithm for fitting a nonlinear
//! model to data by minimizing the sum of squared residuals. It blends
//! gradient descent far from the optimum with Gauss-Newton steps near it,
//! steering the blend with a trust region, which makes it fast and robust
//! on the ill-conditioned problems typical of curve fitting. This crate
//! implements the MINPACK formulation with per-parameter box constraints.
//!
//! ## Quick Start
//!
//! ### Typical Use
//!
//! Implement [`FitProblem`](prelude::FitProblem) for your model, then build
//! a solver and fit:
//!
//! ```rust
//! use levmar::prelude::*;
//!
//! // Model: y = a + b*x, measured with uncertainty sigma.
//! struct Line {
//!     x: Vec<f64>,
//!     y: Vec<f64>,
//!     sigma: f64,
//! }
//!
//! impl FitProblem<f64> for Line {
//!     fn residual_count(&self) -> usize {
//!         self.x.len()
//!     }
//!
//!     fn evaluate(
//!         &self,
//!         params: &[f64],
//!         residuals: &mut [f64],
//!         _derivs: Option<&mut AnalyticDerivs<'_, f64>>,
//!     ) -> EvalStatus {
//!         for i in 0..self.x.len() {
//!             let model = params[0] + params[1] * self.x[i];
//!             residuals[i] = (self.y[i] - model) / self.sigma;
//!         }
//!         EvalStatus::Ok
//!     }
//! }
//!
//! let problem = Line {
//!     x: vec![0.0, 1.0, 2.0, 3.0, 4.0],
//!     y: vec![1.1, 3.0, 4.9, 7.1, 8.9],
//!     sigma: 0.1,
//! };
//!
//! // Build the solver
//! let solver = Levmar::new().build()?;
//!
//! // Fit, refining the parameters in place
//! let mut params = [0.0, 1.0];
//! let result = solver.fit(&problem, &mut params)?;
//!
//! assert!(result.status.is_converged());
//! assert!((params[0] - 1.06).abs() < 1e-8);
//! assert!((params[1] - 1.97).abs() < 1e-8);
//! # Result::<(), LevmarError>::Ok(())
//! ```
//!
//! ### Full Features
//!
//! Constraints are per-parameter descriptors: fix a parameter, bound it,
//! tie it to another, or hand the solver analytic derivatives. Uncertainty
//! outputs are opt-in:
//!
//! ```rust
//! use levmar::prelude::*;
//!
//! // Model: y = a + b*x + c*x^2.
//! struct Quadratic {
//!     x: Vec<f64>,
//!     y: Vec<f64>,
//!     sigma: f64,
//! }
//!
//! impl FitProblem<f64> for Quadratic {
//!     fn residual_count(&self) -> usize {
//!         self.x.len()
//!     }
//!
//!     fn evaluate(
//!         &self,
//!         params: &[f64],
//!         residuals: &mut [f64],
//!         _derivs: Option<&mut AnalyticDerivs<'_, f64>>,
//!     ) -> EvalStatus {
//!         for i in 0..self.x.len() {
//!             let model = params[0] + params[1] * self.x[i] + params[2] * self.x[i] * self.x[i];
//!             residuals[i] = (self.y[i] - model) / self.sigma;
//!         }
//!         EvalStatus::Ok
//!     }
//! }
//!
//! let problem = Quadratic {
//!     x: vec![-2.0, -1.0, 0.0, 1.0, 2.0],
//!     y: vec![9.0, 3.0, 1.0, 3.0, 9.0],
//!     sigma: 0.2,
//! };
//!
//! let solver = Levmar::new()
//!     .ftol(1e-12)                 // Tighter chi-square tolerance
//!     .max_iterations(50)          // Iteration cap
//!     .return_uncertainties()      // 1-sigma parameter errors
//!     .return_residuals()          // Final residual vector
//!     .build()?;
//!
//! // Hold the linear term at zero, keep the curvature non-negative.
//! let constraints = [
//!     ParamConstraint::new(),
//!     ParamConstraint::fixed(),
//!     ParamConstraint::new().with_lower(0.0),
//! ];
//!
//! let mut params = [0.5, 0.0, 1.5];
//! let result = solver.fit_constrained(&problem, &mut params, &constraints)?;
//!
//! assert!(result.status.is_converged());
//! assert!((params[0] - 1.0).abs() < 1e-8);
//! assert!((params[2] - 2.0).abs() < 1e-8);
//!
//! // Fixed parameters report zero uncertainty.
//! let errors = result.uncertainties.as_ref().unwrap();
//! assert_eq!(errors[1], 0.0);
//! # Result::<(), LevmarError>::Ok(())
//! ```
//!
//! ### Result and Error Handling
//!
//! The fit methods return a `Result<LevmarResult<T>, LevmarError>`.
//!
//! - **`Ok(LevmarResult<T>)`**: Termination status, chi-square before and
//!   after, iteration and evaluation counts, and the requested arrays.
//! - **`Err(LevmarError)`**: Invalid input (mismatched lengths, bad
//!   constraints, too few data points) or a hard failure reported by the
//!   user function.
//!
//! The `?` operator is idiomatic:
//!
//! ```rust
//! use levmar::prelude::*;
//! # struct Line { x: Vec<f64>, y: Vec<f64> }
//! # impl FitProblem<f64> for Line {
//! #     fn residual_count(&self) -> usize { self.x.len() }
//! #     fn evaluate(&self, p: &[f64], r: &mut [f64], _d: Option<&mut AnalyticDerivs<'_, f64>>) -> EvalStatus {
//! #         for i in 0..self.x.len() { r[i] = self.y[i] - p[0] - p[1] * self.x[i]; }
//! #         EvalStatus::Ok
//! #     }
//! # }
//! # let problem = Line { x: vec![0.0, 1.0, 2.0], y: vec![1.0, 2.0, 3.0] };
//!
//! let solver = Levmar::new().build()?;
//! let mut params = [0.0, 1.0];
//!
//! match solver.fit(&problem, &mut params) {
//!     Ok(result) => {
//!         println!("chi-square {} after {} iterations", result.best_norm, result.n_iter);
//!     }
//!     Err(e) => {
//!         eprintln!("Fit failed: {}", e);
//!     }
//! }
//! # Result::<(), LevmarError>::Ok(())
//! ```
//!
//! ## Minimal Usage (no_std / Embedded)
//!
//! The crate supports `no_std` environments for embedded devices and
//! resource-constrained systems. Disable default features to remove the
//! standard library dependency:
//!
//! ```toml
//! [dependencies]
//! levmar = { version = "0.1", default-features = false }
//! ```
//!
//! **Tips for embedded/no_std usage:**
//! - Use `f32` instead of `f64` to reduce memory footprint
//! - Reuse a `LevmarBuffer` across fits to avoid repeated allocation
//! - Request only the outputs you need (uncertainties and covariance cost
//!   an extra triangular inversion)
//! - Prefer analytic derivatives to cut function evaluations per iteration
//!
//! ## References
//!
//! - Moré, J. J. (1978). "The Levenberg-Marquardt Algorithm: Implementation
//!   and Theory", in *Numerical Analysis*, Lecture Notes in Mathematics 630
//! - Markwardt, C. B. (2009). "Non-linear Least-squares Fitting in IDL with
//!   MPFIT", in *Astronomical Data Analysis Software and Systems XVIII*
//!
//! ## License
//!
//! See the repository for license information and contribution guidelines.

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(not(feature = "std"))]
#[macro_use]
extern crate alloc;

// Layer 1: Primitives - data structures and basic utilities.
mod primitives;

// Layer 2: Math - pure numeric kernels.
mod math;

// Layer 3: Algorithms - constraint handling, Jacobians, damping search.
mod algorithms;

// Layer 4: Evaluation - covariance and uncertainty extraction.
mod evaluation;

// Layer 5: Engine - orchestration and execution control.
mod engine;

// High-level fluent API for least-squares fitting.
mod api;

// Standard fitting prelude.
pub mod prelude {
    pub use crate::api::{
        AnalyticDerivs, DerivSide,
        DerivSide::{Analytic, Auto, Backward, Centered, Forward},
        EvalStatus, FitProblem, FitStatus, LevmarBuffer, LevmarBuilder as Levmar, LevmarError,
        LevmarResult, LevmarSolver, ParamConstraint, Tie,
    };
}

// Internal modules for development and testing.
//
// This module re-exports internal modules for development and testing purposes.
// It is only available with the `dev` feature enabled.
#[cfg(feature = "dev")]
pub mod internals {
    pub mod primitives {
        pub use crate::primitives::*;
    }
    pub mod math {
        pub use crate::math::*;
    }
    pub mod algorithms {
        pub use crate::algorithms::*;
    }
    pub mod evaluation {
        pub use crate::evaluation::*;
    }
    pub mod engine {
        pub use crate::engine::*;
    }
    pub mod api {
        pub use crate::api::*;
    }
}
