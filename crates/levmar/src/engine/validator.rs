//! Input validation for fit configuration and data.
//!
//! ## Purpose
//!
//! This module provides validation functions for problem dimensions,
//! starting parameter values, user-supplied scaling, and configuration
//! fields. Constraint descriptors are validated separately when the free
//! set is built.
//!
//! ## Design notes
//!
//! * **Fail-Fast**: Validation stops at the first error encountered.
//! * **Efficiency**: Checks are ordered from cheap to expensive.
//! * **Generics**: Validation is generic over `Float` types.
//!
//! ## Key concepts
//!
//! * **Degrees of Freedom**: A fit needs at least as many residuals as
//!   free parameters.
//! * **Finite Checks**: Starting values must be finite regardless of the
//!   runtime finite-check flag.
//! * **Zero Sentinels**: Tolerances equal to zero select defaults before
//!   validation runs, so only negative or non-finite values are rejected.
//!
//! ## Invariants
//!
//! * All validated inputs satisfy their respective mathematical constraints.
//! * Validation logic is deterministic and side-effect free.
//!
//! ## Non-goals
//!
//! * This module does not validate constraint descriptors (handled when
//!   the free set is built).
//! * This module does not provide automatic correction of invalid inputs.
//! * This module does not perform the fitting itself.

// Feature-gated imports
#[cfg(not(feature = "std"))]
use alloc::format;

// External dependencies
use num_traits::Float;

// Internal dependencies
use crate::primitives::errors::LevmarError;

// ============================================================================
// Validator
// ============================================================================

/// Validation utility for fit configuration and input data.
///
/// Provides static methods for validating problem dimensions and
/// configuration values. All methods return `Result<(), LevmarError>` and
/// fail fast upon identifying the first violation.
pub struct Validator;

impl Validator {
    // ========================================================================
    // Core Input Validation
    // ========================================================================

    /// Validate the starting parameter vector.
    pub fn validate_params<T: Float>(params: &[T]) -> Result<(), LevmarError> {
        // Check 1: Non-empty vector
        if params.is_empty() {
            return Err(LevmarError::EmptyParams);
        }

        // Check 2: All starting values finite
        for (i, &p) in params.iter().enumerate() {
            if !p.is_finite() {
                return Err(LevmarError::NonFiniteValue(format!(
                    "params[{}]={}",
                    i,
                    p.to_f64().unwrap_or(f64::NAN)
                )));
            }
        }

        Ok(())
    }

    /// Validate the problem dimensions against the free parameter count.
    pub fn validate_problem_size(points: usize, nfree: usize) -> Result<(), LevmarError> {
        if points == 0 {
            return Err(LevmarError::EmptyData);
        }
        if points < nfree {
            return Err(LevmarError::TooFewPoints {
                points,
                free: nfree,
            });
        }
        Ok(())
    }

    /// Validate that at least one parameter is free to vary.
    pub fn validate_free_count(nfree: usize) -> Result<(), LevmarError> {
        if nfree == 0 {
            return Err(LevmarError::NoFreeParams);
        }
        Ok(())
    }

    // ========================================================================
    // Configuration Validation
    // ========================================================================

    /// Validate a tolerance or step-control value.
    ///
    /// # Notes
    ///
    /// * Zero is accepted; it selects the default before the solve starts.
    /// * Tolerances smaller than machine precision are not an error; they
    ///   surface as a warning status when the solve stalls on them.
    pub fn validate_tolerance<T: Float>(value: T, name: &'static str) -> Result<(), LevmarError> {
        if !value.is_finite() || value < T::zero() {
            return Err(LevmarError::InvalidTolerance {
                name,
                value: value.to_f64().unwrap_or(f64::NAN),
            });
        }
        Ok(())
    }

    /// Validate a user-supplied scaling vector.
    pub fn validate_scale<T: Float>(scale: &[T], npar: usize) -> Result<(), LevmarError> {
        if scale.len() != npar {
            return Err(LevmarError::ConstraintCountMismatch {
                expected: npar,
                got: scale.len(),
            });
        }
        for (i, &s) in scale.iter().enumerate() {
            if !s.is_finite() || s <= T::zero() {
                return Err(LevmarError::InvalidScale {
                    param: i,
                    value: s.to_f64().unwrap_or(f64::NAN),
                });
            }
        }
        Ok(())
    }

    /// Validate that no parameters were set multiple times in the builder.
    pub fn validate_no_duplicates(
        duplicate_param: Option<&'static str>,
    ) -> Result<(), LevmarError> {
        if let Some(param) = duplicate_param {
            return Err(LevmarError::DuplicateParameter { parameter: param });
        }
        Ok(())
    }
}
