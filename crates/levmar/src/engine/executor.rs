//! Execution engine for Levenberg-Marquardt fitting.
//!
//! ## Purpose
//!
//! This module provides the core execution engine that orchestrates a
//! constrained least-squares fit. It owns the outer iteration loop:
//! Jacobian assembly, column scaling, QR factorization, the trust-region
//! step search, step acceptance, and the convergence tests. On
//! termination it packages norms, counts, and the optional residual,
//! uncertainty, and covariance outputs into a result.
//!
//! ## Design notes
//!
//! * **Two nested loops**: the outer loop evaluates the Jacobian once per
//!   accepted point; the inner loop retries shrinking trust radii on the
//!   same Jacobian until a step is accepted or a termination test fires.
//! * **Scaling**: column norms of the initial Jacobian seed the scaling
//!   vector and later iterations only grow it, unless the caller supplied
//!   fixed scale values.
//! * **In-place parameters**: the caller's parameter vector is updated on
//!   every accepted step, so it always holds the best point found even if
//!   the solve stops early.
//! * **Buffers**: callers may pass a [`LevmarBuffer`] to reuse allocations
//!   across repeated solves; otherwise one is created internally.
//!
//! ## Invariants
//!
//! * Accepted parameter vectors never leave their box constraints.
//! * `fvec` always holds the residuals at the last accepted point.
//! * The trust radius `delta` stays positive; the damping parameter `par`
//!   stays non-negative.
//!
//! ## Non-goals
//!
//! * This module does not validate constraint descriptors (handled by the
//!   free-set builder).
//! * This module does not provide the public builder API (handled by the
//!   API layer).

// Feature-gated imports
#[cfg(not(feature = "std"))]
use alloc::format;
#[cfg(not(feature = "std"))]
use alloc::vec;
#[cfg(not(feature = "std"))]
use alloc::vec::Vec;
#[cfg(feature = "std")]
use std::vec;
#[cfg(feature = "std")]
use std::vec::Vec;

// External dependencies
use core::fmt::Write;
use num_traits::Float;

// Internal dependencies
use crate::algorithms::constraints::FreeSet;
use crate::algorithms::jacobian::JacobianContext;
use crate::algorithms::lmpar::lmpar;
use crate::engine::output::{FitStatus, LevmarResult, VERSION};
use crate::engine::validator::Validator;
use crate::evaluation::covariance::{covar, extract_uncertainties, scatter_covar};
use crate::math::norm::{enorm, machep};
use crate::math::qr::qrfac;
use crate::primitives::buffer::LevmarBuffer;
use crate::primitives::errors::LevmarError;
use crate::primitives::parameter::ParamConstraint;
use crate::primitives::problem::{FitHalt, FitProblem};

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for a Levenberg-Marquardt solve.
///
/// Float fields equal to exactly zero select their defaults when the
/// solve starts, so a zeroed struct behaves like `Default::default()`
/// except for the iteration cap, where zero means "no iterations".
#[derive(Debug, Clone, PartialEq)]
pub struct LevmarConfig<T> {
    /// Relative chi-square convergence tolerance.
    pub ftol: T,

    /// Relative parameter convergence tolerance.
    pub xtol: T,

    /// Orthogonality convergence tolerance.
    pub gtol: T,

    /// Assumed relative noise in the user function, floor for the
    /// finite-difference step.
    pub epsfcn: T,

    /// Initial trust-region bound as a multiple of the scaled parameter
    /// norm.
    pub step_factor: T,

    /// Relative range tolerance for rank deficiency in the covariance
    /// computation.
    pub covtol: T,

    /// Outer iteration cap. Zero runs no iterations: the starting point is
    /// treated as final and uncertainty outputs describe its local
    /// curvature.
    pub max_iterations: usize,

    /// Function evaluation cap. Zero means unlimited.
    pub max_evaluations: usize,

    /// Trace verbosity when a sink is attached: 0 is silent, 1 writes one
    /// line per iteration, 2 adds parameter values.
    pub print_level: usize,

    /// Fixed per-parameter scale values (`npar`). When present, internal
    /// scaling from Jacobian column norms is disabled.
    pub user_scale: Option<Vec<T>>,

    /// Skip the non-finite screens on residuals and Jacobian entries.
    pub no_finite_check: bool,

    /// Capture the final residual vector in the result.
    pub want_residuals: bool,

    /// Compute 1-sigma parameter uncertainties.
    pub want_uncertainties: bool,

    /// Compute the full covariance matrix.
    pub want_covariance: bool,
}

impl<T: Float> LevmarConfig<T> {
    // ========================================================================
    // Constants
    // ========================================================================

    /// Default relative chi-square convergence tolerance.
    pub const DEFAULT_FTOL: f64 = 1e-10;

    /// Default relative parameter convergence tolerance.
    pub const DEFAULT_XTOL: f64 = 1e-10;

    /// Default orthogonality convergence tolerance.
    pub const DEFAULT_GTOL: f64 = 1e-10;

    /// Default covariance range tolerance.
    pub const DEFAULT_COVTOL: f64 = 1e-14;

    /// Default initial trust-region bound factor.
    pub const DEFAULT_STEP_FACTOR: f64 = 100.0;

    /// Default outer iteration cap.
    pub const DEFAULT_MAX_ITERATIONS: usize = 200;

    /// Resolve zero sentinels to their defaults.
    pub fn effective(&self) -> Self {
        let zero = T::zero();
        let mut config = self.clone();
        if config.ftol == zero {
            config.ftol = T::from(Self::DEFAULT_FTOL).unwrap();
        }
        if config.xtol == zero {
            config.xtol = T::from(Self::DEFAULT_XTOL).unwrap();
        }
        if config.gtol == zero {
            config.gtol = T::from(Self::DEFAULT_GTOL).unwrap();
        }
        if config.epsfcn == zero {
            config.epsfcn = machep::<T>();
        }
        if config.step_factor == zero {
            config.step_factor = T::from(Self::DEFAULT_STEP_FACTOR).unwrap();
        }
        if config.covtol == zero {
            config.covtol = T::from(Self::DEFAULT_COVTOL).unwrap();
        }
        config
    }
}

impl<T: Float> Default for LevmarConfig<T> {
    fn default() -> Self {
        Self {
            ftol: T::from(Self::DEFAULT_FTOL).unwrap(),
            xtol: T::from(Self::DEFAULT_XTOL).unwrap(),
            gtol: T::from(Self::DEFAULT_GTOL).unwrap(),
            epsfcn: machep::<T>(),
            step_factor: T::from(Self::DEFAULT_STEP_FACTOR).unwrap(),
            covtol: T::from(Self::DEFAULT_COVTOL).unwrap(),
            max_iterations: Self::DEFAULT_MAX_ITERATIONS,
            max_evaluations: 0,
            print_level: 1,
            user_scale: None,
            no_finite_check: false,
            want_residuals: false,
            want_uncertainties: false,
            want_covariance: false,
        }
    }
}

// ============================================================================
// Executor
// ============================================================================

/// Unified executor for Levenberg-Marquardt solves.
#[derive(Debug, Clone)]
pub struct LevmarExecutor<T> {
    /// Solve configuration.
    pub config: LevmarConfig<T>,
}

impl<T: Float> Default for LevmarExecutor<T> {
    fn default() -> Self {
        Self::new(LevmarConfig::default())
    }
}

impl<T: Float> LevmarExecutor<T> {
    /// Create an executor with the given configuration.
    pub fn new(config: LevmarConfig<T>) -> Self {
        Self { config }
    }

    // ========================================================================
    // Main Entry Point
    // ========================================================================

    /// Fit `params` to `problem`, mutating `params` in place.
    ///
    /// `constraints` may be empty (all parameters free) or one descriptor
    /// per parameter. `buffer` optionally recycles working memory across
    /// solves; `sink` optionally receives iteration traces and derivative
    /// debug tables.
    ///
    /// On success `params` holds the best accepted point. Hard failures
    /// return an error; if any step had been accepted before the failure,
    /// `params` holds that last accepted point.
    pub fn run<P: FitProblem<T>>(
        &self,
        problem: &P,
        params: &mut [T],
        constraints: &[ParamConstraint<T>],
        buffer: Option<&mut LevmarBuffer<T>>,
        mut sink: Option<&mut dyn Write>,
    ) -> Result<LevmarResult<T>, LevmarError> {
        let zero = T::zero();
        let one = T::one();
        let p1 = T::from(0.1).unwrap();
        let p25 = T::from(0.25).unwrap();
        let p5 = T::from(0.5).unwrap();
        let p75 = T::from(0.75).unwrap();
        let p0001 = T::from(1e-4).unwrap();

        let config = self.config.effective();
        Validator::validate_tolerance(config.ftol, "ftol")?;
        Validator::validate_tolerance(config.xtol, "xtol")?;
        Validator::validate_tolerance(config.gtol, "gtol")?;
        Validator::validate_tolerance(config.epsfcn, "epsfcn")?;
        Validator::validate_tolerance(config.step_factor, "step_factor")?;
        Validator::validate_tolerance(config.covtol, "covtol")?;
        Validator::validate_params(params)?;

        let free = FreeSet::build(params, constraints)?;
        let npar = params.len();
        let nfree = free.nfree();
        Validator::validate_free_count(nfree)?;

        let m = problem.residual_count();
        Validator::validate_problem_size(m, nfree)?;

        if let Some(scale) = &config.user_scale {
            Validator::validate_scale(scale, npar)?;
        }

        let finite_check = !config.no_finite_check;

        // Working memory: use the caller's buffer when given.
        let mut internal_buffer;
        let buffers = if let Some(b) = buffer {
            b.prepare(m, npar, nfree);
            b
        } else {
            internal_buffer = LevmarBuffer::new();
            internal_buffer.prepare(m, npar, nfree);
            &mut internal_buffer
        };
        let LevmarBuffer {
            fvec,
            fjac,
            qtf,
            diag,
            x,
            xnew,
            ipvt,
            wa1,
            wa2,
            wa3,
            wa4,
            jac_offsets,
        } = buffers;

        // Starting point: full vector with ties resolved, free part gathered.
        xnew.copy_from_slice(params);
        free.resolve_ties(xnew);
        free.gather(xnew, x);

        // Initial residuals.
        let mut nfev = 0usize;
        let first = problem.evaluate(xnew, fvec, None);
        nfev += 1;
        match first.into_halt("initial residual evaluation") {
            Ok(()) => {}
            Err(FitHalt::Aborted) => {
                // The one evaluation that ran still defines both norms.
                let fnorm0 = enorm(fvec);
                let chi0 = fnorm0 * fnorm0;
                return Ok(LevmarResult {
                    status: FitStatus::Aborted,
                    best_norm: chi0,
                    orig_norm: chi0,
                    n_iter: 1,
                    n_eval: nfev,
                    n_par: npar,
                    n_free: nfree,
                    n_pegged: free.count_pegged(params),
                    n_points: m,
                    residuals: None,
                    uncertainties: None,
                    covariance: None,
                    version: VERSION,
                });
            }
            Err(FitHalt::Error(e)) => return Err(e),
        }
        if finite_check {
            screen_residuals(fvec)?;
        }

        let mut fnorm = enorm(fvec);
        let orig_norm = fnorm * fnorm;

        // Iteration state.
        let mut iter = 1usize;
        let mut par = zero;
        let mut delta = zero;
        let mut xnorm = zero;
        let mut fnorm1 = -one;

        let status = 'outer: loop {
            // Evaluate the Jacobian at the current accepted point.
            free.scatter(x, xnew);
            free.resolve_ties(xnew);

            if config.print_level >= 1 {
                if let Some(s) = sink.as_deref_mut() {
                    let chi = fnorm * fnorm;
                    let _ = writeln!(
                        s,
                        "iter {:>4}  nfev {:>6}  chi-square {:>16.8e}",
                        iter,
                        nfev,
                        chi.to_f64().unwrap_or(f64::NAN)
                    );
                    if config.print_level >= 2 {
                        for (i, v) in xnew.iter().enumerate() {
                            let _ =
                                writeln!(s, "    p[{}] = {:>16.8e}", i, v.to_f64().unwrap_or(f64::NAN));
                        }
                    }
                }
            }

            let jac = JacobianContext {
                problem,
                free: &free,
                epsfcn: config.epsfcn,
                finite_check,
            };
            match jac.fill(
                xnew,
                fvec,
                fjac,
                jac_offsets,
                wa4,
                wa2,
                &mut nfev,
                sink.as_deref_mut(),
            ) {
                Ok(()) => {}
                Err(FitHalt::Aborted) => break 'outer FitStatus::Aborted,
                Err(FitHalt::Error(e)) => return Err(e),
            }

            // Keep pegged parameters from being pushed further out.
            free.mask_pegged_columns(x, fvec, fjac, m);

            // Column-pivoted QR of the Jacobian.
            qrfac(m, nfree, fjac, ipvt, wa1, &mut wa2[..nfree], wa3);

            // Seed the scaling vector and the trust radius on the first
            // iteration.
            if iter == 1 {
                match &config.user_scale {
                    Some(scale) => {
                        diag.copy_from_slice(scale);
                    }
                    None => {
                        for j in 0..nfree {
                            diag[free.ifree[j]] = if wa2[j] == zero { one } else { wa2[j] };
                        }
                    }
                }
                for j in 0..nfree {
                    wa3[j] = diag[free.ifree[j]] * x[j];
                }
                xnorm = enorm(&wa3[..nfree]);
                delta = config.step_factor * xnorm;
                if delta == zero {
                    delta = config.step_factor;
                }
            }

            // Form Q^T * fvec in qtf and restore the R diagonal into fjac.
            for i in 0..m {
                wa4[i] = fvec[i];
            }
            for j in 0..nfree {
                let temp3 = fjac[j + m * j];
                if temp3 != zero {
                    let mut sum = zero;
                    for i in j..m {
                        sum = sum + fjac[i + m * j] * wa4[i];
                    }
                    let temp = -sum / temp3;
                    for i in j..m {
                        wa4[i] = wa4[i] + fjac[i + m * j] * temp;
                    }
                }
                fjac[j + m * j] = wa1[j];
                qtf[j] = wa4[j];
            }

            // Norm of the scaled gradient.
            let mut gnorm = zero;
            if fnorm != zero {
                for j in 0..nfree {
                    let l = ipvt[j];
                    if wa2[l] != zero {
                        let mut sum = zero;
                        for i in 0..=j {
                            sum = sum + fjac[i + m * j] * (qtf[i] / fnorm);
                        }
                        gnorm = gnorm.max((sum / wa2[l]).abs());
                    }
                }
            }
            if gnorm <= config.gtol {
                break 'outer FitStatus::Orthogonality;
            }

            // No-iteration mode: the QR factors above are all the
            // covariance computation needs.
            if config.max_iterations == 0 {
                break 'outer FitStatus::MaxIterations;
            }

            // Rescale from the current column norms.
            if config.user_scale.is_none() {
                for j in 0..nfree {
                    let l = free.ifree[j];
                    diag[l] = diag[l].max(wa2[j]);
                }
            }

            // Inner loop: search the trust region until a step is accepted
            // or a termination test fires.
            loop {
                lmpar(
                    nfree,
                    fjac,
                    m,
                    ipvt,
                    &free.ifree,
                    diag,
                    qtf,
                    delta,
                    &mut par,
                    wa1,
                    &mut wa2[..nfree],
                    wa3,
                    &mut wa4[..nfree],
                );

                // The step points downhill; clamp it into the box.
                for v in wa1.iter_mut() {
                    *v = -*v;
                }
                let alpha = free.clamp_step(x, wa1, &mut wa2[..nfree]);

                for j in 0..nfree {
                    wa3[j] = diag[free.ifree[j]] * wa1[j];
                }
                let pnorm = enorm(&wa3[..nfree]);

                // On the first iteration, adjust the initial trust radius.
                if iter == 1 {
                    delta = delta.min(pnorm);
                }

                // Evaluate the trial point.
                free.scatter(&wa2[..nfree], xnew);
                free.resolve_ties(xnew);
                let trial = problem.evaluate(xnew, wa4, None);
                nfev += 1;
                match trial.into_halt("trial residual evaluation") {
                    Ok(()) => {}
                    Err(FitHalt::Aborted) => break 'outer FitStatus::Aborted,
                    Err(FitHalt::Error(e)) => return Err(e),
                }
                if finite_check {
                    screen_residuals(wa4)?;
                }
                fnorm1 = enorm(wa4);

                // Scaled actual reduction.
                let mut actred = -one;
                if p1 * fnorm1 < fnorm {
                    let temp = fnorm1 / fnorm;
                    actred = one - temp * temp;
                }

                // Scaled predicted reduction and directional derivative.
                for j in 0..nfree {
                    wa3[j] = zero;
                }
                for j in 0..nfree {
                    let l = ipvt[j];
                    let temp = wa1[l];
                    for i in 0..=j {
                        wa3[i] = wa3[i] + fjac[i + m * j] * temp;
                    }
                }
                let temp1 = enorm(&wa3[..nfree]) * alpha / fnorm;
                let temp2 = (alpha * par).sqrt() * pnorm / fnorm;
                let prered = temp1 * temp1 + temp2 * temp2 / p5;
                let dirder = -(temp1 * temp1 + temp2 * temp2);

                let ratio = if prered != zero {
                    actred / prered
                } else {
                    zero
                };

                // Update the trust radius.
                if ratio <= p25 {
                    let mut temp = if actred >= zero {
                        p5
                    } else {
                        p5 * dirder / (dirder + p5 * actred)
                    };
                    if p1 * fnorm1 >= fnorm || temp < p1 {
                        temp = p1;
                    }
                    delta = temp * delta.min(pnorm / p1);
                    par = par / temp;
                } else if par == zero || ratio >= p75 {
                    delta = pnorm / p5;
                    par = p5 * par;
                }

                // Successful iteration: update the point and its norms.
                if ratio >= p0001 {
                    for j in 0..nfree {
                        x[j] = wa2[j];
                        wa2[j] = diag[free.ifree[j]] * x[j];
                    }
                    for i in 0..m {
                        fvec[i] = wa4[i];
                    }
                    xnorm = enorm(&wa2[..nfree]);
                    fnorm = fnorm1;
                    iter += 1;

                    free.scatter(x, params);
                    free.resolve_ties(params);
                }

                // Convergence tests.
                let mut info: Option<FitStatus> = None;
                let ftol_ok = actred.abs() <= config.ftol
                    && prered <= config.ftol
                    && p5 * ratio <= one;
                if ftol_ok {
                    info = Some(FitStatus::ChiSquare);
                }
                if delta <= config.xtol * xnorm {
                    info = Some(FitStatus::Parameters);
                }
                if ftol_ok && info == Some(FitStatus::Parameters) {
                    info = Some(FitStatus::ChiSquareAndParameters);
                }
                if let Some(s) = info {
                    break 'outer s;
                }

                // Termination tests and degenerate tolerances.
                if config.max_evaluations > 0 && nfev >= config.max_evaluations {
                    info = Some(FitStatus::MaxEvaluations);
                }
                if iter >= config.max_iterations {
                    info = Some(FitStatus::MaxIterations);
                }
                let eps = machep::<T>();
                if actred.abs() <= eps && prered <= eps && p5 * ratio <= one {
                    info = Some(FitStatus::FtolTooSmall);
                }
                if delta <= eps * xnorm {
                    info = Some(FitStatus::XtolTooSmall);
                }
                if gnorm <= eps {
                    info = Some(FitStatus::GtolTooSmall);
                }
                if let Some(s) = info {
                    break 'outer s;
                }

                // Retry with a smaller radius if the step was rejected.
                if ratio >= p0001 {
                    break;
                }
            }
        };

        // Final point back to the caller.
        free.scatter(x, params);
        free.resolve_ties(params);
        let n_pegged = free.count_pegged(params);

        let best = fnorm.max(fnorm1);
        let best_norm = best * best;

        // Uncertainty outputs from the final QR factors. Pegged parameters
        // are excluded alongside fixed and tied ones.
        let mut uncertainties = None;
        let mut covariance = None;
        if status != FitStatus::Aborted && (config.want_uncertainties || config.want_covariance) {
            let excluded: Vec<bool> = (0..nfree).map(|j| free.is_pegged(j, x[j])).collect();
            covar(nfree, fjac, m, ipvt, config.covtol, &mut wa2[..nfree]);
            if config.want_covariance {
                let mut full = vec![zero; npar * npar];
                scatter_covar(npar, &free.ifree, &excluded, fjac, m, &mut full);
                covariance = Some(full);
            }
            if config.want_uncertainties {
                let mut errors = vec![zero; npar];
                extract_uncertainties(&free.ifree, &excluded, fjac, m, &mut errors);
                uncertainties = Some(errors);
            }
        }

        let residuals = if config.want_residuals {
            Some(fvec.to_vec())
        } else {
            None
        };

        if config.print_level >= 1 {
            if let Some(s) = sink.as_deref_mut() {
                let _ = writeln!(
                    s,
                    "done  nfev {:>6}  chi-square {:>16.8e}  status: {}",
                    nfev,
                    best_norm.to_f64().unwrap_or(f64::NAN),
                    status
                );
            }
        }

        Ok(LevmarResult {
            status,
            best_norm,
            orig_norm,
            n_iter: iter,
            n_eval: nfev,
            n_par: npar,
            n_free: nfree,
            n_pegged,
            n_points: m,
            residuals,
            uncertainties,
            covariance,
            version: VERSION,
        })
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Reject non-finite residuals with a descriptive error.
fn screen_residuals<T: Float>(fvec: &[T]) -> Result<(), LevmarError> {
    for (i, &r) in fvec.iter().enumerate() {
        if !r.is_finite() {
            return Err(LevmarError::NonFiniteValue(format!(
                "resid[{}]={}",
                i,
                r.to_f64().unwrap_or(f64::NAN)
            )));
        }
    }
    Ok(())
}
