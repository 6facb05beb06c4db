//! Error types for least-squares fitting.
//!
//! ## Purpose
//!
//! This module defines error conditions that can occur while setting up or
//! running a fit, including input validation, constraint validation, and
//! user-callback failures.
//!
//! ## Design notes
//!
//! * **Contextual**: Errors include relevant values (e.g., parameter indices,
//!   offending bounds).
//! * **Deferred**: Errors are often caught and stored during builder configuration.
//! * **No-std**: Supports `no_std` environments by using `alloc` for dynamic messages.
//! * **Trait Implementation**: Implements `Display` and `std::error::Error` (when `std` is enabled).
//!
//! ## Key concepts
//!
//! 1. **Input validation**: Empty parameter vectors, zero data points, non-finite values.
//! 2. **Constraint validation**: Inverted bounds, starting values outside bounds, tie cycles.
//! 3. **Configuration validation**: Non-positive user scale entries, duplicate builder calls.
//! 4. **Callback failures**: Hard failures reported by the user's residual function.
//!
//! ## Invariants
//!
//! * All variants provide sufficient context for diagnosis.
//! * Errors surface before caller-owned parameter values are modified.
//! * Numeric payloads are converted to `f64` for uniform reporting.
//!
//! ## Non-goals
//!
//! * This module does not perform the validation logic itself.
//! * This module does not provide error recovery or fallback strategies.

// Feature-gated imports
#[cfg(not(feature = "std"))]
use alloc::string::String;
#[cfg(feature = "std")]
use std::error::Error;
#[cfg(feature = "std")]
use std::string::String;

// External dependencies
use core::fmt::{Display, Formatter, Result};

// ============================================================================
// Error Type
// ============================================================================

/// Error type for least-squares fitting operations.
#[derive(Debug, Clone, PartialEq)]
pub enum LevmarError {
    /// The parameter vector is empty; a fit needs at least one parameter.
    EmptyParams,

    /// The problem reports zero residuals; a fit needs at least one data point.
    EmptyData,

    /// Every parameter is fixed or tied, leaving nothing to optimize.
    NoFreeParams,

    /// Fewer residuals than free parameters (negative degrees of freedom).
    TooFewPoints {
        /// Number of residuals the problem produces.
        points: usize,
        /// Number of free parameters.
        free: usize,
    },

    /// A per-parameter array (constraints, user scale) does not match the
    /// parameter vector length.
    ConstraintCountMismatch {
        /// Number of parameters supplied.
        expected: usize,
        /// Number of per-parameter entries supplied.
        got: usize,
    },

    /// A constraint descriptor is inconsistent (inverted bounds, starting
    /// value outside its bounds, tie cycle, tie source out of range).
    InvalidConstraint {
        /// Index of the offending parameter.
        param: usize,
        /// Human-readable description of the inconsistency.
        reason: String,
    },

    /// A user-supplied scale entry is non-positive or non-finite.
    InvalidScale {
        /// Index of the offending scale entry.
        param: usize,
        /// The value provided.
        value: f64,
    },

    /// A tolerance or step-control value is out of range.
    InvalidTolerance {
        /// Name of the configuration field.
        name: &'static str,
        /// The value provided.
        value: f64,
    },

    /// The user's residual function reported a hard failure.
    InvalidCallback(String),

    /// A residual or derivative came back NaN or infinite while finite
    /// checking was enabled.
    NonFiniteValue(String),

    /// Parameter was set multiple times in the builder.
    DuplicateParameter {
        /// Name of the parameter that was set multiple times.
        parameter: &'static str,
    },
}

// ============================================================================
// Display Implementation
// ============================================================================

impl Display for LevmarError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            Self::EmptyParams => write!(f, "Parameter vector is empty"),
            Self::EmptyData => write!(f, "Problem produces no residuals"),
            Self::NoFreeParams => {
                write!(f, "No free parameters: every parameter is fixed or tied")
            }
            Self::TooFewPoints { points, free } => {
                write!(
                    f,
                    "Too few data points: {points} residuals for {free} free parameters"
                )
            }
            Self::ConstraintCountMismatch { expected, got } => {
                write!(
                    f,
                    "Per-parameter count mismatch: {got} entries for {expected} parameters"
                )
            }
            Self::InvalidConstraint { param, reason } => {
                write!(f, "Invalid constraint on parameter {param}: {reason}")
            }
            Self::InvalidScale { param, value } => {
                write!(
                    f,
                    "Invalid scale for parameter {param}: {value} (must be > 0 and finite)"
                )
            }
            Self::InvalidTolerance { name, value } => {
                write!(f, "Invalid {name}: {value} (must be >= 0 and finite)")
            }
            Self::InvalidCallback(msg) => write!(f, "User function failed: {msg}"),
            Self::NonFiniteValue(s) => write!(f, "Non-finite value: {s}"),
            Self::DuplicateParameter { parameter } => {
                write!(
                    f,
                    "Parameter '{parameter}' was set multiple times. Each parameter can only be configured once."
                )
            }
        }
    }
}

// ============================================================================
// Standard Error Trait
// ============================================================================

#[cfg(feature = "std")]
impl Error for LevmarError {}
