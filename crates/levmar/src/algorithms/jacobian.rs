//! Jacobian assembly: finite differences and analytic columns.
//!
//! ## Purpose
//!
//! This module fills the `m x nfree` Jacobian for the current point. Each
//! free parameter gets its column either from the user function (analytic)
//! or from a one- or two-sided difference quotient, with per-parameter step
//! control and bound-aware step direction.
//!
//! ## Design notes
//!
//! * **One analytic pass**: All analytic columns are gathered in a single
//!   user call; the column buffers lent to the user are views straight into
//!   the Jacobian storage, so nothing is copied.
//! * **Probes restore state**: The full parameter vector is perturbed one
//!   component at a time and restored after every probe; tied values are
//!   re-resolved around each probe so the user function always sees a
//!   consistent vector.
//! * **Step sizing**: `h = sqrt(max(epsfcn, machine epsilon)) * |x|`,
//!   overridden by an absolute step, then by a relative step; `h` falls
//!   back to the epsilon itself when the result is zero.
//!
//! ## Key concepts
//!
//! * **Bound-aware direction**: In automatic mode a forward probe that
//!   would cross the upper bound flips to a backward probe.
//! * **Derivative debugging**: For analytic parameters flagged for
//!   debugging, a numeric estimate is computed anyway and both values are
//!   written to the trace sink; the analytic column is kept for the fit.
//!
//! ## Invariants
//!
//! * On return the full parameter vector and all tied values are exactly as
//!   on entry.
//! * Function-evaluation counting includes the analytic pass and every
//!   difference probe.
//!
//! ## Non-goals
//!
//! * No sparse or banded Jacobian structure.
//! * No step-size adaptation beyond the per-parameter overrides.

// Feature-gated imports
#[cfg(not(feature = "std"))]
use alloc::format;

// External dependencies
use core::fmt::Write;
use num_traits::Float;

// Internal dependencies
use crate::algorithms::constraints::FreeSet;
use crate::math::norm::machep;
use crate::primitives::errors::LevmarError;
use crate::primitives::parameter::DerivSide;
use crate::primitives::problem::{AnalyticDerivs, FitHalt, FitProblem};

// Trace output is formatted in f64 regardless of the working precision.
#[inline]
fn dbg_val<T: Float>(v: T) -> f64 {
    v.to_f64().unwrap_or(f64::NAN)
}

// ============================================================================
// Jacobian Context
// ============================================================================

/// Everything the Jacobian pass needs besides the working buffers.
pub struct JacobianContext<'a, T, P> {
    /// The user problem.
    pub problem: &'a P,

    /// Free-parameter view of the constraints.
    pub free: &'a FreeSet<T>,

    /// Assumed relative noise in the user function.
    pub epsfcn: T,

    /// Screen the filled Jacobian for non-finite entries.
    pub finite_check: bool,
}

impl<'a, T: Float, P: FitProblem<T>> JacobianContext<'a, T, P> {
    /// Fill `fjac` (column-major, `fvec.len() x nfree`) at the point `xall`.
    ///
    /// `fvec` holds the residuals at `xall`. `offsets` is the per-parameter
    /// analytic column map, `probe` and `stash` are residual-length scratch,
    /// `nfev` the running evaluation counter, `sink` the optional trace
    /// sink for derivative debugging.
    #[allow(clippy::too_many_arguments)]
    pub fn fill(
        &self,
        xall: &mut [T],
        fvec: &[T],
        fjac: &mut [T],
        offsets: &mut [Option<usize>],
        probe: &mut [T],
        stash: &mut [T],
        nfev: &mut usize,
        mut sink: Option<&mut (dyn Write + '_)>,
    ) -> Result<(), FitHalt> {
        let zero = T::zero();
        let m = fvec.len();
        let nfree = self.free.nfree();

        for v in fjac.iter_mut() {
            *v = zero;
        }
        for o in offsets.iter_mut() {
            *o = None;
        }

        // Gather all analytic columns in one user call. The lent column
        // buffers alias the Jacobian storage directly.
        if self.free.analytic_count() > 0 {
            for j in 0..nfree {
                if self.free.side[j].is_analytic() {
                    offsets[self.free.ifree[j]] = Some(j * m);
                }
            }
            let mut view = AnalyticDerivs::new(fjac, offsets, m);
            let status = self.problem.evaluate(xall, probe, Some(&mut view));
            *nfev += 1;
            status.into_halt("analytic derivative pass")?;
        }

        let eps = self.epsfcn.max(machep::<T>()).sqrt();

        for j in 0..nfree {
            let side = self.free.side[j];
            let debug = self.free.debug[j] && side.is_analytic();
            if side.is_analytic() && !debug {
                continue;
            }

            let full = self.free.ifree[j];
            let temp = xall[full];
            let mut h = eps * temp.abs();
            if self.free.step[j] > zero {
                h = self.free.step[j];
            }
            if self.free.relative_step[j] > zero {
                h = (self.free.relative_step[j] * temp).abs();
            }
            if h == zero {
                h = eps;
            }

            // Step direction: explicit backward flips unconditionally;
            // automatic flips away from the upper bound.
            match side {
                DerivSide::Backward => h = -h,
                DerivSide::Auto => {
                    if self.free.has_upper[j] && temp > self.free.upper[j] - h {
                        h = -h;
                    }
                }
                _ => {}
            }

            if side != DerivSide::Centered {
                // One-sided quotient against the residuals at the base point.
                xall[full] = temp + h;
                self.free.resolve_ties(xall);
                let status = self.problem.evaluate(xall, probe, None);
                *nfev += 1;
                xall[full] = temp;
                status.into_halt("derivative probe")?;

                if debug {
                    if let Some(w) = sink.as_deref_mut() {
                        let _ = writeln!(
                            w,
                            "derivative check: parameter {full} (analytic vs numeric)"
                        );
                        let _ = writeln!(
                            w,
                            "{:>6} {:>14} {:>14} {:>14} {:>14}",
                            "point", "resid", "analytic", "numeric", "diff"
                        );
                        for i in 0..m {
                            let analytic = fjac[i + m * j];
                            let numeric = (probe[i] - fvec[i]) / h;
                            let _ = writeln!(
                                w,
                                "{:6} {:14.6e} {:14.6e} {:14.6e} {:14.6e}",
                                i,
                                dbg_val(fvec[i]),
                                dbg_val(analytic),
                                dbg_val(numeric),
                                dbg_val(analytic - numeric),
                            );
                        }
                    }
                } else {
                    for i in 0..m {
                        fjac[i + m * j] = (probe[i] - fvec[i]) / h;
                    }
                }
            } else {
                // Two-sided quotient, one extra evaluation.
                xall[full] = temp + h;
                self.free.resolve_ties(xall);
                let status = self.problem.evaluate(xall, probe, None);
                *nfev += 1;
                status.into_halt("derivative probe")?;
                stash[..m].copy_from_slice(&probe[..m]);

                xall[full] = temp - h;
                self.free.resolve_ties(xall);
                let status = self.problem.evaluate(xall, probe, None);
                *nfev += 1;
                xall[full] = temp;
                status.into_halt("derivative probe")?;

                let two_h = h + h;
                for i in 0..m {
                    fjac[i + m * j] = (stash[i] - probe[i]) / two_h;
                }
            }
        }

        // Probes left tied values at the last perturbed point; re-resolve
        // for the base point.
        if !self.free.ties.is_empty() {
            self.free.resolve_ties(xall);
        }

        if self.finite_check {
            for j in 0..nfree {
                for i in 0..m {
                    if !fjac[i + m * j].is_finite() {
                        return Err(FitHalt::Error(LevmarError::NonFiniteValue(format!(
                            "derivative of residual {i} for parameter {} = {}",
                            self.free.ifree[j],
                            dbg_val(fjac[i + m * j])
                        ))));
                    }
                }
            }
        }

        Ok(())
    }
}
