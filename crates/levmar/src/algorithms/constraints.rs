//! Free-parameter mapping, bounds, and tie resolution.
//!
//! ## Purpose
//!
//! This module translates the caller's full parameter vector and constraint
//! descriptors into the reduced free-parameter space the optimizer works in,
//! and back. It owns every bound-related decision: step clamping, snapping
//! onto bounds, pegged-parameter bookkeeping, and tie resolution.
//!
//! ## Design notes
//!
//! * **Built once per solve**: The free index map and the normalized
//!   per-parameter control arrays are derived from the constraint slice up
//!   front; iteration code indexes flat arrays only.
//! * **Fail before touching data**: All structural validation (tie cycles,
//!   inverted bounds, starting values outside bounds) happens in `build`,
//!   before the first user-function call.
//! * **Fractional step scaling**: A step that would cross a bound is scaled
//!   by the largest feasible fraction of its full length, then snapped onto
//!   the bound when within a machine epsilon of it.
//!
//! ## Key concepts
//!
//! * **Free parameter**: Not fixed and not tied; owns a Jacobian column.
//! * **Pegged parameter**: A free parameter sitting exactly on one of its
//!   bounds; its step component is zeroed while the step points outward,
//!   and its Jacobian column is zeroed while the gradient points outward.
//! * **Tie order**: Ties are resolved sources-first so chains through other
//!   tied parameters see up-to-date values.
//!
//! ## Invariants
//!
//! * Accepted parameter vectors never leave their box.
//! * Equal bounds (`lower == upper`) are legal and pin the parameter; only
//!   `lower > upper` is an error.
//! * Fixed and tied parameters never count as pegged.
//!
//! ## Non-goals
//!
//! * This module does not evaluate the user function.
//! * This module does not decide step lengths (see the step solver); it
//!   only makes proposed steps feasible.

// Feature-gated imports
#[cfg(not(feature = "std"))]
use alloc::{format, vec::Vec};
#[cfg(feature = "std")]
use std::vec::Vec;

// External dependencies
use num_traits::Float;

// Internal dependencies
use crate::math::norm::machep;
use crate::primitives::errors::LevmarError;
use crate::primitives::parameter::{DerivSide, ParamConstraint, Tie};

// ============================================================================
// Free Set
// ============================================================================

/// The free-parameter view of a constrained fit.
///
/// All per-parameter arrays except `ifree` and `ties` are indexed by free
/// position `j`; `ifree[j]` maps back to the full parameter index.
#[derive(Debug, Clone)]
pub struct FreeSet<T> {
    /// Total parameter count.
    pub npar: usize,

    /// Free position -> full parameter index.
    pub ifree: Vec<usize>,

    /// Lower bound present, per free parameter.
    pub has_lower: Vec<bool>,

    /// Upper bound present, per free parameter.
    pub has_upper: Vec<bool>,

    /// Lower bound values (unused entries are zero).
    pub lower: Vec<T>,

    /// Upper bound values (unused entries are zero).
    pub upper: Vec<T>,

    /// Absolute finite-difference step overrides (zero = none).
    pub step: Vec<T>,

    /// Relative finite-difference step overrides (zero = none).
    pub relative_step: Vec<T>,

    /// Derivative side per free parameter.
    pub side: Vec<DerivSide>,

    /// Derivative-debug flag per free parameter.
    pub debug: Vec<bool>,

    /// Whether any free parameter carries a bound.
    pub any_limits: bool,

    /// Ties in resolution order (full index, relation).
    pub ties: Vec<(usize, Tie<T>)>,
}

impl<T: Float> FreeSet<T> {
    /// Validate `constraints` against `params` and build the free set.
    ///
    /// An empty constraint slice means every parameter is free.
    pub fn build(params: &[T], constraints: &[ParamConstraint<T>]) -> Result<Self, LevmarError> {
        let npar = params.len();
        if !constraints.is_empty() && constraints.len() != npar {
            return Err(LevmarError::ConstraintCountMismatch {
                expected: npar,
                got: constraints.len(),
            });
        }

        let con = |i: usize| constraints.get(i).copied().unwrap_or_default();

        let ties = Self::order_ties(npar, &con)?;

        // Bounds consistency and starting feasibility. Tied parameters are
        // exempt: their values are recomputed before every evaluation and
        // their bounds are ignored.
        for i in 0..npar {
            let c = con(i);
            if c.tied.is_some() {
                continue;
            }
            if let (Some(lo), Some(hi)) = (c.lower, c.upper) {
                if c.is_free() && lo > hi {
                    return Err(LevmarError::InvalidConstraint {
                        param: i,
                        reason: format!(
                            "lower bound {} exceeds upper bound {}",
                            lo.to_f64().unwrap_or(f64::NAN),
                            hi.to_f64().unwrap_or(f64::NAN)
                        ),
                    });
                }
            }
            if let Some(lo) = c.lower {
                if params[i] < lo {
                    return Err(LevmarError::InvalidConstraint {
                        param: i,
                        reason: format!(
                            "starting value {} below lower bound {}",
                            params[i].to_f64().unwrap_or(f64::NAN),
                            lo.to_f64().unwrap_or(f64::NAN)
                        ),
                    });
                }
            }
            if let Some(hi) = c.upper {
                if params[i] > hi {
                    return Err(LevmarError::InvalidConstraint {
                        param: i,
                        reason: format!(
                            "starting value {} above upper bound {}",
                            params[i].to_f64().unwrap_or(f64::NAN),
                            hi.to_f64().unwrap_or(f64::NAN)
                        ),
                    });
                }
            }
        }

        let zero = T::zero();
        let mut ifree = Vec::new();
        let mut has_lower = Vec::new();
        let mut has_upper = Vec::new();
        let mut lower = Vec::new();
        let mut upper = Vec::new();
        let mut step = Vec::new();
        let mut relative_step = Vec::new();
        let mut side = Vec::new();
        let mut debug = Vec::new();
        let mut any_limits = false;

        for i in 0..npar {
            let c = con(i);
            if !c.is_free() {
                continue;
            }
            ifree.push(i);
            has_lower.push(c.lower.is_some());
            has_upper.push(c.upper.is_some());
            lower.push(c.lower.unwrap_or(zero));
            upper.push(c.upper.unwrap_or(zero));
            step.push(c.step.unwrap_or(zero));
            relative_step.push(c.relative_step.unwrap_or(zero));
            side.push(c.side);
            debug.push(c.deriv_debug);
            any_limits = any_limits || c.lower.is_some() || c.upper.is_some();
        }

        Ok(Self {
            npar,
            ifree,
            has_lower,
            has_upper,
            lower,
            upper,
            step,
            relative_step,
            side,
            debug,
            any_limits,
            ties,
        })
    }

    // Order ties sources-first and reject out-of-range, self, and cyclic
    // references.
    fn order_ties(
        npar: usize,
        con: &impl Fn(usize) -> ParamConstraint<T>,
    ) -> Result<Vec<(usize, Tie<T>)>, LevmarError> {
        let mut tied_idx = Vec::new();
        for i in 0..npar {
            if let Some(tie) = con(i).tied {
                if tie.source >= npar {
                    return Err(LevmarError::InvalidConstraint {
                        param: i,
                        reason: format!(
                            "tie source {} out of range for {} parameters",
                            tie.source, npar
                        ),
                    });
                }
                if tie.source == i {
                    return Err(LevmarError::InvalidConstraint {
                        param: i,
                        reason: format!("parameter {i} is tied to itself"),
                    });
                }
                tied_idx.push((i, tie));
            }
        }

        let mut scheduled = vec![false; npar];
        let mut order = Vec::with_capacity(tied_idx.len());
        let mut remaining = tied_idx.len();
        while remaining > 0 {
            let mut progress = false;
            for &(i, tie) in &tied_idx {
                if scheduled[i] {
                    continue;
                }
                let source_ready = con(tie.source).tied.is_none() || scheduled[tie.source];
                if source_ready {
                    scheduled[i] = true;
                    order.push((i, tie));
                    remaining -= 1;
                    progress = true;
                }
            }
            if !progress {
                let first = tied_idx
                    .iter()
                    .map(|&(i, _)| i)
                    .find(|&i| !scheduled[i])
                    .unwrap_or(0);
                return Err(LevmarError::InvalidConstraint {
                    param: first,
                    reason: format!("tie chain through parameter {first} forms a cycle"),
                });
            }
        }
        Ok(order)
    }

    /// Number of free parameters.
    pub fn nfree(&self) -> usize {
        self.ifree.len()
    }

    /// Number of free parameters wanting analytic derivative columns.
    pub fn analytic_count(&self) -> usize {
        self.side.iter().filter(|s| s.is_analytic()).count()
    }

    /// Copy the free components of `xall` into `x`.
    pub fn gather(&self, xall: &[T], x: &mut [T]) {
        for (j, &i) in self.ifree.iter().enumerate() {
            x[j] = xall[i];
        }
    }

    /// Write the free components of `x` back into `xall`.
    pub fn scatter(&self, x: &[T], xall: &mut [T]) {
        for (j, &i) in self.ifree.iter().enumerate() {
            xall[i] = x[j];
        }
    }

    /// Recompute every tied value in `xall`, sources first.
    pub fn resolve_ties(&self, xall: &mut [T]) {
        for &(i, tie) in &self.ties {
            xall[i] = (tie.map)(xall[tie.source]);
        }
    }

    /// Make the proposed step feasible.
    ///
    /// Zeroes step components that push a pegged parameter outward, scales
    /// the whole step by the largest fraction `alpha` that keeps every
    /// bounded parameter inside its box, writes the trial values into
    /// `trial`, and snaps values within a machine epsilon of a bound onto
    /// the bound. Returns `alpha`.
    pub fn clamp_step(&self, x: &[T], step: &mut [T], trial: &mut [T]) -> T {
        let zero = T::zero();
        let one = T::one();
        let eps = machep::<T>();
        let nfree = self.nfree();

        if !self.any_limits {
            for j in 0..nfree {
                trial[j] = x[j] + step[j];
            }
            return one;
        }

        let mut alpha = one;
        for j in 0..nfree {
            let lpegged = self.has_lower[j] && x[j] == self.lower[j];
            let upegged = self.has_upper[j] && x[j] == self.upper[j];
            if lpegged && step[j] < zero {
                step[j] = zero;
            }
            if upegged && step[j] > zero {
                step[j] = zero;
            }
            let moving = step[j].abs() > eps;
            if moving && self.has_lower[j] && x[j] + step[j] < self.lower[j] {
                alpha = alpha.min((self.lower[j] - x[j]) / step[j]);
            }
            if moving && self.has_upper[j] && x[j] + step[j] > self.upper[j] {
                alpha = alpha.min((self.upper[j] - x[j]) / step[j]);
            }
        }

        for j in 0..nfree {
            step[j] = step[j] * alpha;
            trial[j] = x[j] + step[j];
        }

        // Snap values that landed within rounding distance of a bound onto
        // the bound exactly, so pegging detection sees exact equality.
        for j in 0..nfree {
            if self.has_upper[j] {
                let hi = self.upper[j];
                let sgnu = if hi >= zero { one } else { -one };
                let onepm = if hi == zero { eps } else { zero };
                let ulim1 = hi * (one - sgnu * eps) - onepm;
                if trial[j] >= ulim1 {
                    trial[j] = hi;
                }
            }
            if self.has_lower[j] {
                let lo = self.lower[j];
                let sgnl = if lo >= zero { one } else { -one };
                let onepm = if lo == zero { eps } else { zero };
                let llim1 = lo * (one + sgnl * eps) + onepm;
                if trial[j] <= llim1 {
                    trial[j] = lo;
                }
            }
        }

        alpha
    }

    /// Zero Jacobian columns of pegged parameters whose gradient points
    /// outward, so the step solver cannot push them further out.
    pub fn mask_pegged_columns(&self, x: &[T], fvec: &[T], fjac: &mut [T], m: usize) {
        if !self.any_limits {
            return;
        }
        let zero = T::zero();
        for j in 0..self.nfree() {
            let lpegged = self.has_lower[j] && x[j] == self.lower[j];
            let upegged = self.has_upper[j] && x[j] == self.upper[j];
            if !(lpegged || upegged) {
                continue;
            }
            let mut sum = zero;
            for i in 0..m {
                sum = sum + fvec[i] * fjac[i + m * j];
            }
            if (lpegged && sum > zero) || (upegged && sum < zero) {
                for i in 0..m {
                    fjac[i + m * j] = zero;
                }
            }
        }
    }

    /// Whether free parameter `j` sits exactly on one of its bounds.
    pub fn is_pegged(&self, j: usize, value: T) -> bool {
        (self.has_lower[j] && value == self.lower[j])
            || (self.has_upper[j] && value == self.upper[j])
    }

    /// Count free parameters pegged at a bound in the full vector `xall`.
    pub fn count_pegged(&self, xall: &[T]) -> usize {
        (0..self.nfree())
            .filter(|&j| self.is_pegged(j, xall[self.ifree[j]]))
            .count()
    }
}
