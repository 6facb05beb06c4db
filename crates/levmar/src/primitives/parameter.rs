//! Per-parameter constraint descriptors.
//!
//! ## Purpose
//!
//! This module defines the per-parameter controls a caller can attach to a
//! fit: fixing, box constraints, finite-difference step overrides,
//! derivative sidedness, and ties to other parameters.
//!
//! ## Design notes
//!
//! * **Plain data**: Descriptors are passive; interpretation lives in the
//!   constraint manager.
//! * **Defaults**: A default descriptor means free, unbounded, automatic
//!   numeric derivatives.
//! * **Chainable**: `with_*` helpers allow terse construction in tests and
//!   examples; fields stay public for direct initialization.
//!
//! ## Key concepts
//!
//! * **Fixed**: The parameter is held at its starting value and drops out of
//!   the free set.
//! * **Tied**: The parameter is recomputed from another parameter before
//!   every evaluation via a caller-supplied relation; it also drops out of
//!   the free set and its bounds are ignored.
//! * **Derivative side**: How the Jacobian column for this parameter is
//!   obtained (one-sided/two-sided differences or an analytic column).
//!
//! ## Invariants
//!
//! * A descriptor never stores the parameter value itself; values live in
//!   the caller's vector.
//!
//! ## Non-goals
//!
//! * This module does not validate descriptors (see the engine validator).
//! * This module does not evaluate tie relations or derivatives.

// ============================================================================
// Derivative Side
// ============================================================================

/// How the Jacobian column for a parameter is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DerivSide {
    /// One-sided forward difference, with the step flipped backward when a
    /// forward probe would cross the upper bound.
    #[default]
    Auto,

    /// Forward difference: `(f(x + h) - f(x)) / h`.
    Forward,

    /// Backward difference: `(f(x - h) - f(x)) / (-h)`.
    Backward,

    /// Two-sided difference: `(f(x + h) - f(x - h)) / (2 h)`. Costs one
    /// extra function evaluation per column.
    Centered,

    /// The user function fills this column analytically.
    Analytic,
}

impl DerivSide {
    /// Whether this side requires finite-difference evaluations.
    pub fn is_numeric(&self) -> bool {
        !matches!(self, Self::Analytic)
    }

    /// Whether this side takes its column from the user function.
    pub fn is_analytic(&self) -> bool {
        matches!(self, Self::Analytic)
    }
}

// ============================================================================
// Tie Relation
// ============================================================================

/// Slaves one parameter to another through a caller-supplied relation.
///
/// Before every model evaluation the engine sets
/// `params[i] = (map)(params[source])` for a parameter `i` carrying this
/// descriptor. The relation is opaque to the engine.
#[derive(Debug, Clone, Copy)]
pub struct Tie<T> {
    /// Index of the parameter this one follows.
    pub source: usize,

    /// Relation applied to the source value.
    pub map: fn(T) -> T,
}

impl<T> Tie<T> {
    /// Create a tie to `source` through `map`.
    pub fn new(source: usize, map: fn(T) -> T) -> Self {
        Self { source, map }
    }
}

// Equality goes by the source index only; function-pointer identity is
// not a meaningful comparison.
impl<T> PartialEq for Tie<T> {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

// ============================================================================
// Parameter Constraint
// ============================================================================

/// Per-parameter fitting controls.
///
/// An empty constraint slice passed to the solver means every parameter is
/// free; a non-empty slice must provide one descriptor per parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamConstraint<T> {
    /// Hold the parameter at its starting value.
    pub fixed: bool,

    /// Lower bound, if any.
    pub lower: Option<T>,

    /// Upper bound, if any.
    pub upper: Option<T>,

    /// Absolute finite-difference step override.
    pub step: Option<T>,

    /// Relative finite-difference step override. Takes precedence over
    /// `step` when both are set.
    pub relative_step: Option<T>,

    /// Derivative computation mode for this parameter's Jacobian column.
    pub side: DerivSide,

    /// Compare the analytic column against a numeric estimate and write the
    /// table to the trace sink. Only meaningful with `DerivSide::Analytic`.
    pub deriv_debug: bool,

    /// Tie relation, if this parameter follows another.
    pub tied: Option<Tie<T>>,
}

impl<T> Default for ParamConstraint<T> {
    fn default() -> Self {
        Self {
            fixed: false,
            lower: None,
            upper: None,
            step: None,
            relative_step: None,
            side: DerivSide::Auto,
            deriv_debug: false,
            tied: None,
        }
    }
}

impl<T> ParamConstraint<T> {
    /// A free, unbounded parameter with automatic numeric derivatives.
    pub fn new() -> Self {
        Self::default()
    }

    /// A parameter held at its starting value.
    pub fn fixed() -> Self {
        Self {
            fixed: true,
            ..Self::default()
        }
    }

    /// A parameter tied to `source` through `map`.
    pub fn tied_to(source: usize, map: fn(T) -> T) -> Self {
        Self {
            tied: Some(Tie::new(source, map)),
            ..Self::default()
        }
    }

    /// Set the lower bound.
    pub fn with_lower(mut self, lower: T) -> Self {
        self.lower = Some(lower);
        self
    }

    /// Set the upper bound.
    pub fn with_upper(mut self, upper: T) -> Self {
        self.upper = Some(upper);
        self
    }

    /// Set an absolute finite-difference step.
    pub fn with_step(mut self, step: T) -> Self {
        self.step = Some(step);
        self
    }

    /// Set a relative finite-difference step.
    pub fn with_relative_step(mut self, relative_step: T) -> Self {
        self.relative_step = Some(relative_step);
        self
    }

    /// Set the derivative side.
    pub fn with_side(mut self, side: DerivSide) -> Self {
        self.side = side;
        self
    }

    /// Enable the analytic-vs-numeric derivative comparison for this
    /// parameter.
    pub fn with_deriv_debug(mut self) -> Self {
        self.deriv_debug = true;
        self
    }

    /// Whether this parameter participates in the free set.
    pub fn is_free(&self) -> bool {
        !self.fixed && self.tied.is_none()
    }
}
